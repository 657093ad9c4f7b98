//! The Entity World: single source of truth for what exists in one match.
//!
//! The world owns every live unit, building, projectile, beam and area
//! effect, mirrors bodies into the [`Physics`] collaborator, and answers
//! the targeting queries combat logic relies on.
//!
//! All mutation is synchronous. A change is visible to the next query in
//! the same tick. Housed units (garrisoned or hangared) stay in the unit
//! collection with their body disabled, so they are skipped by every
//! spatial query and by physics stepping but are never swept.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entity::{Building, EntityCore, EntityId, PlayerId, Team, Unit};
use crate::error::Result;
use crate::math::{decimal_serde, Fixed, Vec2Fixed};
use crate::modifier::ResearchModifier;
use crate::ordnance::{AreaEffect, Beam, Ordnance, Projectile};
use crate::physics::{BodyDesc, BodyId, BodySlot, Physics};
use crate::weapon::{ElevationTargeting, Weapon};

/// Tunables of the world's queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSettings {
    /// Distance within which cloaked entities are visible to an observer.
    #[serde(with = "decimal_serde")]
    pub cloak_detection_radius: Fixed,
    /// How long a resolved beam stays drawn.
    pub beam_display_ms: u64,
    /// Extra reach added to projectile collision checks.
    #[serde(with = "decimal_serde")]
    pub projectile_hit_slack: Fixed,
    /// Angular probes tried when looking for a free spawn point.
    pub spawn_probe_count: u32,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            cloak_detection_radius: Fixed::from_num(5),
            beam_display_ms: 150,
            projectile_hit_slack: Fixed::from_num(0.25),
            spawn_probe_count: 16,
        }
    }
}

/// One application of damage, for the tick report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DamageEvent {
    /// Entity damaged.
    pub target: EntityId,
    /// Entity credited.
    pub source: EntityId,
    /// Health actually removed.
    pub amount: Fixed,
    /// Whether this damage destroyed the target.
    pub lethal: bool,
}

/// Standing completed buildings of one player.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Census {
    /// Types of completed, living buildings.
    pub building_types: BTreeSet<String>,
    /// Highest tier among them.
    pub tier: u8,
    /// Total power produced.
    pub power_produced: i64,
    /// Total power consumed.
    pub power_consumed: i64,
}

impl Census {
    /// Consumption exceeds production.
    #[must_use]
    pub fn is_low_power(&self) -> bool {
        self.power_consumed > self.power_produced
    }
}

/// Live entity collections of one match.
#[derive(Debug)]
pub struct EntityWorld {
    next_id: u64,
    units: BTreeMap<EntityId, Unit>,
    buildings: BTreeMap<EntityId, Building>,
    projectiles: BTreeMap<EntityId, Projectile>,
    beams: BTreeMap<EntityId, Beam>,
    area_effects: BTreeMap<EntityId, AreaEffect>,
    physics: Box<dyn Physics>,
    settings: WorldSettings,
    damage_log: Vec<DamageEvent>,
}

impl EntityWorld {
    /// Create an empty world over a physics collaborator.
    #[must_use]
    pub fn new(physics: Box<dyn Physics>, settings: WorldSettings) -> Self {
        Self {
            next_id: 1,
            units: BTreeMap::new(),
            buildings: BTreeMap::new(),
            projectiles: BTreeMap::new(),
            beams: BTreeMap::new(),
            area_effects: BTreeMap::new(),
            physics,
            settings,
            damage_log: Vec::new(),
        }
    }

    /// Query tunables.
    #[must_use]
    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    /// The physics collaborator.
    #[must_use]
    pub fn physics(&self) -> &dyn Physics {
        self.physics.as_ref()
    }

    /// The physics collaborator, mutably.
    pub fn physics_mut(&mut self) -> &mut dyn Physics {
        self.physics.as_mut()
    }

    /// Reserve a fresh entity id.
    pub fn allocate_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    // ========================================
    // Lifecycle
    // ========================================

    /// Add a unit, assigning its id and creating its body.
    ///
    /// A malformed body is a fatal configuration error and is returned.
    pub fn add_unit(&mut self, mut unit: Unit) -> Result<EntityId> {
        let id = self.allocate_id();
        unit.core.id = id;
        let desc = BodyDesc::solid(unit.core.position, unit.core.radius, unit.core.elevation.layer());
        self.physics.add_body(BodyId::main(id), desc)?;
        if unit.is_housed() {
            self.physics.set_enabled(BodyId::main(id), false);
        }
        debug!(id = %id, kind = %unit.core.type_id, owner = unit.core.owner.0, "Unit added");
        self.units.insert(id, unit);
        Ok(id)
    }

    /// Add a building, assigning its id and creating its static body.
    pub fn add_building(&mut self, mut building: Building) -> Result<EntityId> {
        let id = self.allocate_id();
        building.core.id = id;
        let desc = BodyDesc::solid(
            building.core.position,
            building.core.radius,
            building.core.elevation.layer(),
        )
        .fixed_in_place();
        self.physics.add_body(BodyId::main(id), desc)?;
        debug!(id = %id, kind = %building.core.type_id, owner = building.core.owner.0, "Building added");
        self.buildings.insert(id, building);
        Ok(id)
    }

    /// Add ordnance produced by a weapon fire.
    ///
    /// Projectiles get a non-colliding body; beams are stored for display only.
    pub fn add_ordnance(&mut self, ordnance: Ordnance) -> Result<()> {
        match ordnance {
            Ordnance::Projectile(projectile) => {
                let desc = BodyDesc::projectile(
                    projectile.position,
                    projectile.velocity,
                    projectile.size,
                    projectile.linear_damping,
                );
                self.physics.add_body(BodyId::main(projectile.id), desc)?;
                self.projectiles.insert(projectile.id, projectile);
            }
            Ordnance::Beam(beam) => {
                self.beams.insert(beam.id, beam);
            }
        }
        Ok(())
    }

    /// Add an area effect, assigning its id.
    pub fn add_area_effect(&mut self, mut area: AreaEffect) -> EntityId {
        let id = self.allocate_id();
        area.id = id;
        self.area_effects.insert(id, area);
        id
    }

    /// Remove any entity and its bodies. Returns whether it existed.
    pub fn remove(&mut self, id: EntityId) -> bool {
        let existed = self.units.remove(&id).is_some()
            || self.buildings.remove(&id).is_some()
            || self.projectiles.remove(&id).is_some()
            || self.beams.remove(&id).is_some()
            || self.area_effects.remove(&id).is_some();

        if existed {
            self.physics.remove_body(BodyId::main(id));
            self.physics.remove_body(BodyId::sensor(id));
        }
        existed
    }

    /// Whether an entity of any kind exists.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.units.contains_key(&id)
            || self.buildings.contains_key(&id)
            || self.projectiles.contains_key(&id)
            || self.beams.contains_key(&id)
            || self.area_effects.contains_key(&id)
    }

    // ========================================
    // Accessors
    // ========================================

    /// Shared state of a unit or building.
    #[must_use]
    pub fn core(&self, id: EntityId) -> Option<&EntityCore> {
        self.units
            .get(&id)
            .map(|u| &u.core)
            .or_else(|| self.buildings.get(&id).map(|b| &b.core))
    }

    /// Shared state of a unit or building, mutably.
    pub fn core_mut(&mut self, id: EntityId) -> Option<&mut EntityCore> {
        if let Some(unit) = self.units.get_mut(&id) {
            return Some(&mut unit.core);
        }
        self.buildings.get_mut(&id).map(|b| &mut b.core)
    }

    /// A unit.
    #[must_use]
    pub fn unit(&self, id: EntityId) -> Option<&Unit> {
        self.units.get(&id)
    }

    /// A unit, mutably.
    pub fn unit_mut(&mut self, id: EntityId) -> Option<&mut Unit> {
        self.units.get_mut(&id)
    }

    /// A building.
    #[must_use]
    pub fn building(&self, id: EntityId) -> Option<&Building> {
        self.buildings.get(&id)
    }

    /// A building, mutably.
    pub fn building_mut(&mut self, id: EntityId) -> Option<&mut Building> {
        self.buildings.get_mut(&id)
    }

    /// A projectile in flight.
    #[must_use]
    pub fn projectile(&self, id: EntityId) -> Option<&Projectile> {
        self.projectiles.get(&id)
    }

    /// A projectile in flight, mutably.
    pub fn projectile_mut(&mut self, id: EntityId) -> Option<&mut Projectile> {
        self.projectiles.get_mut(&id)
    }

    /// All units in id order (housed ones included).
    pub fn units(&self) -> impl Iterator<Item = &Unit> {
        self.units.values()
    }

    /// All buildings in id order.
    pub fn buildings(&self) -> impl Iterator<Item = &Building> {
        self.buildings.values()
    }

    /// Projectiles in flight.
    pub fn projectiles(&self) -> impl Iterator<Item = &Projectile> {
        self.projectiles.values()
    }

    /// Beams still on display.
    pub fn beams(&self) -> impl Iterator<Item = &Beam> {
        self.beams.values()
    }

    /// Live area effects.
    pub fn area_effects(&self) -> impl Iterator<Item = &AreaEffect> {
        self.area_effects.values()
    }

    /// Snapshot of unit ids, for loops that mutate the world.
    #[must_use]
    pub fn unit_ids(&self) -> Vec<EntityId> {
        self.units.keys().copied().collect()
    }

    /// Snapshot of building ids.
    #[must_use]
    pub fn building_ids(&self) -> Vec<EntityId> {
        self.buildings.keys().copied().collect()
    }

    /// Snapshot of projectile ids.
    #[must_use]
    pub fn projectile_ids(&self) -> Vec<EntityId> {
        self.projectiles.keys().copied().collect()
    }

    /// Units and buildings owned by a player.
    #[must_use]
    pub fn owned_by(&self, player: PlayerId) -> Vec<EntityId> {
        self.units
            .values()
            .map(|u| &u.core)
            .chain(self.buildings.values().map(|b| &b.core))
            .filter(|c| c.owner == player)
            .map(|c| c.id)
            .collect()
    }

    /// Units and buildings flagged inactive, awaiting the sweep.
    #[must_use]
    pub fn inactive_entities(&self) -> Vec<EntityId> {
        self.units
            .values()
            .map(|u| &u.core)
            .chain(self.buildings.values().map(|b| &b.core))
            .filter(|c| !c.active)
            .map(|c| c.id)
            .collect()
    }

    /// Completed buildings of a player and their power balance.
    #[must_use]
    pub fn census(&self, player: PlayerId) -> Census {
        let mut census = Census::default();
        for building in self.buildings.values() {
            if building.core.owner != player || !building.is_operational() {
                continue;
            }
            census.building_types.insert(building.core.type_id.clone());
            census.tier = census.tier.max(building.tier);
            if building.power >= 0 {
                census.power_produced += i64::from(building.power);
            } else {
                census.power_consumed += i64::from(building.power.unsigned_abs());
            }
        }
        census
    }

    // ========================================
    // Targeting
    // ========================================

    /// Whether an entity is a legal target for `team` from `origin`.
    ///
    /// The target must be alive, on the field, hostile, at a permitted
    /// elevation, within `range` (edge distance), and either uncloaked or
    /// within the cloak detection radius of `origin`.
    #[must_use]
    pub fn is_valid_target(
        &self,
        origin: Vec2Fixed,
        team: Team,
        target: EntityId,
        targeting: ElevationTargeting,
        range: Fixed,
    ) -> bool {
        let core = match (self.units.get(&target), self.buildings.get(&target)) {
            (Some(unit), _) if !unit.is_housed() => &unit.core,
            (None, Some(building)) => &building.core,
            _ => return false,
        };
        self.targetable(origin, team, core, targeting)
            && edge_distance(origin, core) <= range
    }

    fn targetable(
        &self,
        origin: Vec2Fixed,
        team: Team,
        core: &EntityCore,
        targeting: ElevationTargeting,
    ) -> bool {
        core.active
            && team.is_hostile(core.team)
            && targeting.allows(core.elevation)
            && (!core.cloaked
                || origin.distance(core.position) <= self.settings.cloak_detection_radius)
    }

    /// Nearest enemy a weapon may engage from `origin`.
    ///
    /// Range and damage are taken after `modifier`. Strictly smaller
    /// distance wins; ties go to the first found (units before buildings,
    /// each in id order).
    #[must_use]
    pub fn find_nearest_enemy_targetable(
        &self,
        origin: Vec2Fixed,
        team: Team,
        weapon: &Weapon,
        modifier: &ResearchModifier,
    ) -> Option<EntityId> {
        self.find_nearest_hostile(origin, team, weapon.targeting(), weapon.effective_range(modifier))
    }

    /// Nearest legal target for an elevation set within `range`.
    #[must_use]
    pub fn find_nearest_hostile(
        &self,
        origin: Vec2Fixed,
        team: Team,
        targeting: ElevationTargeting,
        range: Fixed,
    ) -> Option<EntityId> {
        let candidates = self
            .units
            .values()
            .filter(|u| !u.is_housed())
            .map(|u| &u.core)
            .chain(self.buildings.values().map(|b| &b.core));

        let mut best: Option<(EntityId, Fixed)> = None;
        for core in candidates {
            if !self.targetable(origin, team, core, targeting) {
                continue;
            }
            let distance = edge_distance(origin, core);
            if distance > range {
                continue;
            }
            if best.map_or(true, |(_, d)| distance < d) {
                best = Some((core.id, distance));
            }
        }
        best.map(|(id, _)| id)
    }

    /// Hostile units and buildings whose bodies overlap a circle.
    #[must_use]
    pub fn hostiles_in_radius(
        &self,
        center: Vec2Fixed,
        radius: Fixed,
        team: Team,
        targeting: ElevationTargeting,
    ) -> Vec<EntityId> {
        let filter = |body: BodyId| {
            body.slot == BodySlot::Main
                && self
                    .core(body.entity)
                    .is_some_and(|c| c.active && team.is_hostile(c.team) && targeting.allows(c.elevation))
        };
        self.physics
            .overlapping(center, radius, &filter)
            .into_iter()
            .map(|body| body.entity)
            .collect()
    }

    /// Whether any hostile on the field stands within detection range of a
    /// cloaked entity.
    #[must_use]
    pub fn is_cloak_detected(&self, id: EntityId) -> bool {
        let Some(core) = self.core(id) else {
            return false;
        };
        let radius = self.settings.cloak_detection_radius;
        let observers = self
            .units
            .values()
            .filter(|u| u.is_on_field())
            .map(|u| &u.core)
            .chain(self.buildings.values().map(|b| &b.core).filter(|c| c.active));
        observers
            .filter(|c| c.team.is_hostile(core.team))
            .any(|c| c.position.distance(core.position) <= radius)
    }

    // ========================================
    // Damage
    // ========================================

    /// Apply damage; a target brought to zero is flagged inactive.
    ///
    /// Returns the health actually removed. Missing or already inactive
    /// targets take nothing.
    pub fn apply_damage(&mut self, target: EntityId, amount: Fixed, source: EntityId) -> Fixed {
        let Some(core) = self.core_mut(target) else {
            return Fixed::ZERO;
        };
        if !core.active {
            return Fixed::ZERO;
        }
        let applied = core.health.apply_damage(amount);
        let lethal = core.health.is_dead();
        if lethal {
            core.active = false;
            debug!(target = %target, source = %source, "Entity destroyed");
        }
        if applied > Fixed::ZERO {
            self.damage_log.push(DamageEvent {
                target,
                source,
                amount: applied,
                lethal,
            });
        }
        applied
    }

    /// Restore health. Returns the amount actually restored.
    pub fn heal(&mut self, target: EntityId, amount: Fixed) -> Fixed {
        match self.core_mut(target) {
            Some(core) if core.active => core.health.heal(amount),
            _ => Fixed::ZERO,
        }
    }

    /// Take the damage recorded since the last drain.
    pub fn drain_damage_log(&mut self) -> Vec<DamageEvent> {
        std::mem::take(&mut self.damage_log)
    }

    // ========================================
    // Placement
    // ========================================

    /// Find a collision-free point for a new unit next to a host.
    ///
    /// Probes points around `center` at increasing angular offsets from +X
    /// (0, +a, -a, +2a, -2a, ...); the first free point wins. When every
    /// probe is blocked, returns a point pushed further out along +X.
    #[must_use]
    pub fn find_spawn_position(
        &self,
        center: Vec2Fixed,
        host_radius: Fixed,
        radius: Fixed,
        layer: u8,
    ) -> Vec2Fixed {
        let distance = host_radius + radius + Fixed::ONE;
        let probes = self.settings.spawn_probe_count.max(1);
        let step = Fixed::from_num(360) / Fixed::from_num(probes);

        for i in 0..probes {
            let magnitude = Fixed::from_num(i.div_ceil(2));
            let angle = if i % 2 == 1 { step * magnitude } else { -step * magnitude };
            let point = center + Vec2Fixed::UNIT_X.rotate_degrees(angle).scale(distance);
            if self.physics.is_area_free(point, radius, layer) {
                return point;
            }
        }

        center + Vec2Fixed::UNIT_X.scale(distance + radius * 2)
    }

    /// Move an entity's logical position and its body.
    pub fn teleport(&mut self, id: EntityId, position: Vec2Fixed) {
        if let Some(core) = self.core_mut(id) {
            core.position = position;
        }
        self.physics.set_position(BodyId::main(id), position);
    }

    /// Set a unit's velocity on its body.
    pub fn set_velocity(&mut self, id: EntityId, velocity: Vec2Fixed) {
        self.physics.set_velocity(BodyId::main(id), velocity);
    }

    // ========================================
    // Housing
    // ========================================

    /// House a unit inside a garrison building at `at`.
    ///
    /// The unit stays active; its body is disabled.
    pub fn garrison_unit(&mut self, unit: EntityId, building: EntityId, at: Vec2Fixed) -> bool {
        let Some(u) = self.units.get_mut(&unit) else {
            return false;
        };
        u.garrisoned_in = Some(building);
        u.order = None;
        u.core.target = None;
        self.physics.set_enabled(BodyId::main(unit), false);
        self.teleport(unit, at);
        true
    }

    /// House an aircraft inside a hangar.
    pub fn hangar_unit(&mut self, unit: EntityId, hangar: EntityId) -> bool {
        let Some(position) = self.core(hangar).map(|c| c.position) else {
            return false;
        };
        let Some(u) = self.units.get_mut(&unit) else {
            return false;
        };
        u.hangared_in = Some(hangar);
        u.order = None;
        u.core.target = None;
        self.physics.set_enabled(BodyId::main(unit), false);
        self.teleport(unit, position);
        true
    }

    /// Put a housed unit back on the field at `at`.
    pub fn release_unit(&mut self, unit: EntityId, at: Vec2Fixed) -> bool {
        let Some(u) = self.units.get_mut(&unit) else {
            return false;
        };
        u.garrisoned_in = None;
        u.hangared_in = None;
        self.physics.set_enabled(BodyId::main(unit), true);
        self.teleport(unit, at);
        true
    }

    // ========================================
    // Shields
    // ========================================

    /// Create a disabled shield sensor around a building.
    pub fn add_shield_sensor(&mut self, building: EntityId, radius: Fixed) -> Result<()> {
        let position = self
            .core(building)
            .map(|c| c.position)
            .ok_or(crate::error::GameError::EntityNotFound(building.0))?;
        self.physics
            .add_body(BodyId::sensor(building), BodyDesc::sensor(position, radius))?;
        Ok(())
    }

    /// Switch a building's shield sensor on or off.
    pub fn set_shield_enabled(&mut self, building: EntityId, enabled: bool) {
        self.physics.set_enabled(BodyId::sensor(building), enabled);
    }

    /// Whether a building's shield is up.
    #[must_use]
    pub fn is_shield_enabled(&self, building: EntityId) -> bool {
        self.physics.is_enabled(BodyId::sensor(building))
    }

    /// First enabled shield hostile to `team` whose radius contains `point`.
    #[must_use]
    pub fn shield_covering(&self, point: Vec2Fixed, team: Team) -> Option<EntityId> {
        self.buildings.values().find_map(|b| {
            let body = BodyId::sensor(b.core.id);
            if !b.core.active || !team.is_hostile(b.core.team) || !self.physics.is_enabled(body) {
                return None;
            }
            let center = self.physics.position(body)?;
            let radius = self.physics.radius(body)?;
            (center.distance_squared(point) <= radius.saturating_mul(radius)).then_some(b.core.id)
        })
    }

    // ========================================
    // Physics mirroring
    // ========================================

    /// Copy body positions back into units and projectiles after a step.
    pub fn sync_from_physics(&mut self) {
        for (id, unit) in &mut self.units {
            if unit.is_housed() {
                continue;
            }
            if let Some(position) = self.physics.position(BodyId::main(*id)) {
                unit.core.position = position;
            }
        }
        for (id, projectile) in &mut self.projectiles {
            let body = BodyId::main(*id);
            if let Some(position) = self.physics.position(body) {
                projectile.position = position;
            }
            if let Some(velocity) = self.physics.velocity(body) {
                projectile.velocity = velocity;
            }
        }
    }

    /// Drop beams whose display time has passed.
    pub fn expire_beams(&mut self, now_ms: u64) {
        self.beams.retain(|_, beam| beam.expires_at_ms > now_ms);
    }

    /// Drop area effects whose lifetime has passed.
    pub fn expire_area_effects(&mut self, now_ms: u64) {
        self.area_effects.retain(|_, area| area.expires_at_ms > now_ms);
    }
}

/// Distance from `origin` to the edge of an entity's body.
fn edge_distance(origin: Vec2Fixed, core: &EntityCore) -> Fixed {
    (origin.distance(core.position) - core.radius).max(Fixed::ZERO)
}
