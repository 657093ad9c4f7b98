//! Aircraft housing and sorties.
//!
//! A hangar keeps a fixed number of aircraft. Housed aircraft are off the
//! field and slowly repaired; lost ones are rebuilt one at a time. A sortie
//! launches one aircraft toward a point with limited fuel and ammunition,
//! tracked by a [`SortieModule`] attached to the aircraft. When either runs
//! out the aircraft flies home and docks once close enough. Destroying the
//! hangar destroys every aircraft inside it.

use tracing::{debug, info};

use super::{spawn_unit, Behavior, Module, ModuleCtx};
use crate::entity::{EntityId, UnitOrder};
use crate::math::{ms_to_seconds, Fixed, Vec2Fixed};
use crate::modifier::ResearchModifier;

/// Aircraft bays of one building.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HangarModule {
    aircraft: String,
    capacity: u32,
    fuel_ms: u64,
    ammo: u32,
    ammo_bonus: u32,
    repair_per_second: Fixed,
    housed: Vec<EntityId>,
    airborne: Vec<EntityId>,
    rebuild_ms: u64,
}

impl HangarModule {
    /// Create empty bays for `capacity` aircraft of one type.
    #[must_use]
    pub fn new(aircraft: String, capacity: u32, fuel_ms: u64, ammo: u32, repair_per_second: Fixed) -> Self {
        Self {
            aircraft,
            capacity,
            fuel_ms,
            ammo,
            ammo_bonus: 0,
            repair_per_second,
            housed: Vec::new(),
            airborne: Vec::new(),
            rebuild_ms: 0,
        }
    }

    /// Aircraft inside.
    #[must_use]
    pub fn housed(&self) -> &[EntityId] {
        &self.housed
    }

    /// Aircraft out on a sortie.
    #[must_use]
    pub fn airborne(&self) -> &[EntityId] {
        &self.airborne
    }

    /// Shots each sortie starts with.
    #[must_use]
    pub fn sortie_ammo(&self) -> u32 {
        self.ammo.saturating_add(self.ammo_bonus)
    }

    fn fleet_size(&self) -> usize {
        self.housed.len() + self.airborne.len()
    }

    fn build_housed(&mut self, ctx: &mut ModuleCtx<'_>) -> bool {
        let Some((owner, position)) = ctx.host_core().map(|c| (c.owner, c.position)) else {
            return false;
        };
        let aircraft = match spawn_unit(ctx, &self.aircraft, owner, position) {
            Ok(id) => id,
            Err(error) => {
                ctx.fail(error);
                return false;
            }
        };
        ctx.world.hangar_unit(aircraft, ctx.host);
        self.housed.push(aircraft);
        debug!(hangar = %ctx.host, aircraft = %aircraft, "Aircraft housed");
        true
    }

    /// Launch one housed aircraft toward `target`.
    pub fn launch(&mut self, ctx: &mut ModuleCtx<'_>, target: Vec2Fixed) -> bool {
        if !ctx.host_operational() || self.housed.is_empty() {
            return false;
        }
        let Some((center, host_radius)) = ctx.host_core().map(|c| (c.position, c.radius)) else {
            return false;
        };
        let aircraft = self.housed.remove(0);
        let Some((radius, layer)) = ctx.world.core(aircraft).map(|c| (c.radius, c.elevation.layer())) else {
            return false;
        };
        let spot = ctx.world.find_spawn_position(center, host_radius, radius, layer);
        ctx.world.release_unit(aircraft, spot);

        let sortie = SortieModule::new(
            ctx.host,
            ctx.now_ms.saturating_add(self.fuel_ms),
            self.sortie_ammo(),
        );
        if let Some(unit) = ctx.world.unit_mut(aircraft) {
            unit.core.modules.retain(|m| m.as_sortie().is_none());
            unit.core.modules.push(Module::Sortie(sortie));
            unit.order = Some(UnitOrder::MoveTo(target));
        }
        self.airborne.push(aircraft);
        info!(hangar = %ctx.host, aircraft = %aircraft, "Sortie launched");
        true
    }

    /// Take a returning aircraft back in.
    pub fn dock(&mut self, ctx: &mut ModuleCtx<'_>, aircraft: EntityId) -> bool {
        let Some(index) = self.airborne.iter().position(|id| *id == aircraft) else {
            return false;
        };
        if !ctx.world.hangar_unit(aircraft, ctx.host) {
            return false;
        }
        self.airborne.remove(index);
        if let Some(core) = ctx.world.core_mut(aircraft) {
            core.modules.retain(|m| m.as_sortie().is_none());
        }
        self.housed.push(aircraft);
        debug!(hangar = %ctx.host, aircraft = %aircraft, "Aircraft docked");
        true
    }
}

impl Behavior for HangarModule {
    fn update(&mut self, ctx: &mut ModuleCtx<'_>) {
        let host = ctx.host;
        let world = &*ctx.world;
        self.housed.retain(|id| {
            world
                .unit(*id)
                .is_some_and(|u| u.core.active && u.hangared_in == Some(host))
        });
        self.airborne.retain(|id| {
            world.unit(*id).is_some_and(|u| {
                u.core.active
                    && u.core
                        .module(Module::as_sortie)
                        .is_some_and(|s| s.hangar() == host)
            })
        });
        if !ctx.host_operational() {
            return;
        }

        let repair = self.repair_per_second.saturating_mul(ms_to_seconds(ctx.dt_ms));
        for aircraft in &self.housed {
            ctx.world.heal(*aircraft, repair);
        }

        if self.fleet_size() >= self.capacity as usize {
            self.rebuild_ms = 0;
            return;
        }
        let build_time = ctx.data.unit(&self.aircraft).map_or(0, |u| u.build_time_ms);
        self.rebuild_ms = self.rebuild_ms.saturating_add(ctx.dt_ms);
        if self.rebuild_ms >= build_time && self.build_housed(ctx) {
            self.rebuild_ms = 0;
        }
    }

    fn on_construction_complete(&mut self, ctx: &mut ModuleCtx<'_>) {
        while self.fleet_size() < self.capacity as usize {
            if !self.build_housed(ctx) {
                break;
            }
        }
    }

    fn on_destroy(&mut self, ctx: &mut ModuleCtx<'_>) {
        for aircraft in self.housed.drain(..) {
            if let Some(core) = ctx.world.core_mut(aircraft) {
                core.active = false;
            }
        }
        debug!(hangar = %ctx.host, "Hangar destroyed with its housed aircraft");
    }

    fn apply_research_modifiers(&mut self, modifier: &ResearchModifier) {
        self.ammo_bonus = modifier.aircraft_ammo;
    }
}

// ========================================
// Sortie
// ========================================

/// Fuel and ammunition of an aircraft away from its hangar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortieModule {
    hangar: EntityId,
    fuel_deadline_ms: u64,
    ammo: u32,
    returning: bool,
}

impl SortieModule {
    /// Start a sortie from `hangar`.
    #[must_use]
    pub fn new(hangar: EntityId, fuel_deadline_ms: u64, ammo: u32) -> Self {
        Self {
            hangar,
            fuel_deadline_ms,
            ammo,
            returning: false,
        }
    }

    /// Home hangar.
    #[must_use]
    pub fn hangar(&self) -> EntityId {
        self.hangar
    }

    /// Shots left.
    #[must_use]
    pub fn ammo(&self) -> u32 {
        self.ammo
    }

    /// Time at which fuel runs out.
    #[must_use]
    pub fn fuel_deadline_ms(&self) -> u64 {
        self.fuel_deadline_ms
    }

    /// Whether the aircraft is heading home.
    #[must_use]
    pub fn is_returning(&self) -> bool {
        self.returning
    }

    /// Whether the aircraft may still fire.
    #[must_use]
    pub fn can_engage(&self) -> bool {
        !self.returning && self.ammo > 0
    }

    /// Spend one shot.
    pub fn consume_ammo(&mut self) {
        self.ammo = self.ammo.saturating_sub(1);
    }
}

impl Behavior for SortieModule {
    fn update(&mut self, ctx: &mut ModuleCtx<'_>) {
        if !self.returning && (ctx.now_ms >= self.fuel_deadline_ms || self.ammo == 0) {
            self.returning = true;
            debug!(aircraft = %ctx.host, ammo = self.ammo, "Returning to base");
        }
        if self.returning {
            let home = UnitOrder::ReturnToBase(self.hangar);
            if let Some(unit) = ctx.host_unit_mut() {
                unit.order = Some(home);
                unit.core.target = None;
            }
        }
    }
}
