//! Combat resolution.
//!
//! Target acquisition and weapon firing shared by units, turrets,
//! garrisons and deployed walkers, plus the per-tick resolution of
//! everything already in flight:
//! - Projectiles: range expiry, shield interception, direct hits,
//!   splash, flak bursts, electric chains, piercing, seeking
//! - Area effects: damage over time inside a circle
//!
//! Damage always goes through [`EntityWorld::apply_damage`], which flags
//! destroyed entities inactive; removal happens in the end-of-tick sweep.

use tracing::{debug, trace};

use crate::behavior::{Module, ModuleCtx};
use crate::entity::{EntityId, PlayerId, Stance, Team, UnitOrder};
use crate::error::Result;
use crate::math::{ms_to_seconds, Fixed, Vec2Fixed};
use crate::modifier::ResearchModifier;
use crate::ordnance::{AreaEffect, OrdnanceEffects, Projectile};
use crate::physics::BodyId;
use crate::weapon::{ElevationTargeting, FireRequest, Weapon};
use crate::world::EntityWorld;

/// Splash and chain damage as a fraction of the direct hit.
const SECONDARY_DAMAGE_FRACTION: Fixed = Fixed::from_bits(1 << 31);

/// Who is pulling the trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shooter {
    /// Entity credited with the damage.
    pub id: EntityId,
    /// Player credited with the damage.
    pub owner: PlayerId,
    /// Side of the shooter.
    pub team: Team,
    /// Muzzle position.
    pub origin: Vec2Fixed,
    /// Body beams must pass through.
    pub body: Option<BodyId>,
}

impl Shooter {
    /// Shooter firing from an entity's own position.
    #[must_use]
    pub fn from_entity(world: &EntityWorld, id: EntityId) -> Option<Self> {
        let core = world.core(id)?;
        Some(Self {
            id,
            owner: core.owner,
            team: core.team,
            origin: core.position,
            body: Some(BodyId::main(id)),
        })
    }
}

// ============================================================================
// Targeting
// ============================================================================

/// Keep `current` while it stays a legal target, otherwise pick the nearest.
#[must_use]
pub fn acquire_target(
    world: &EntityWorld,
    shooter: &Shooter,
    weapon: &Weapon,
    modifier: &ResearchModifier,
    current: Option<EntityId>,
) -> Option<EntityId> {
    let range = weapon.effective_range(modifier);
    if let Some(current) = current {
        if world.is_valid_target(shooter.origin, shooter.team, current, weapon.targeting(), range) {
            return Some(current);
        }
    }
    world.find_nearest_enemy_targetable(shooter.origin, shooter.team, weapon, modifier)
}

/// Fire `weapon` at `target` if it is ready.
///
/// Produced projectiles are added to the world. Returns whether anything
/// was fired; only physics faults are errors.
pub fn fire_at(
    world: &mut EntityWorld,
    weapon: &mut Weapon,
    modifier: &ResearchModifier,
    shooter: &Shooter,
    target: EntityId,
    now_ms: u64,
) -> Result<bool> {
    let Some(core) = world.core(target) else {
        return Ok(false);
    };
    let request = FireRequest {
        origin: shooter.origin,
        target_pos: core.position,
        target_elevation: core.elevation,
        target: Some(target),
        source: shooter.id,
        owner_player: shooter.owner,
        team: shooter.team,
        ignored_body: shooter.body,
        now_ms,
    };

    let ordnance = weapon.fire(&request, world, modifier);
    let fired = !ordnance.is_empty();
    for shot in ordnance {
        world.add_ordnance(shot)?;
    }
    if fired {
        trace!(shooter = %shooter.id, target = %target, weapon = %weapon.id(), "Weapon fired");
    }
    Ok(fired)
}

/// Acquire (sticky) and fire in one step.
///
/// Returns the target kept for next tick.
pub fn engage(
    world: &mut EntityWorld,
    weapon: &mut Weapon,
    modifier: &ResearchModifier,
    shooter: &Shooter,
    current: Option<EntityId>,
    now_ms: u64,
) -> Result<(Option<EntityId>, bool)> {
    let Some(target) = acquire_target(world, shooter, weapon, modifier, current) else {
        return Ok((None, false));
    };
    let fired = fire_at(world, weapon, modifier, shooter, target, now_ms)?;
    Ok((Some(target), fired))
}

// ============================================================================
// Unit Combat
// ============================================================================

/// Let every armed unit on the field pick a target and fire.
///
/// Explicit attack orders take priority. Aggressive units otherwise acquire
/// the nearest enemy; passive and cloaked units hold fire. Deployed units fire through
/// their deploy module, housed units through their garrison. Aircraft on a
/// sortie stop firing once out of ammo or heading home.
pub fn combat_system(ctx: &mut ModuleCtx<'_>) {
    for id in ctx.world.unit_ids() {
        if let Err(error) = unit_attack(ctx, id) {
            ctx.fail(error);
            return;
        }
    }
}

fn unit_attack(ctx: &mut ModuleCtx<'_>, id: EntityId) -> Result<()> {
    let Some(unit) = ctx.world.unit(id) else {
        return Ok(());
    };
    if !unit.is_on_field() || unit.deployed || unit.core.weapon.is_none() || unit.core.cloaked {
        return Ok(());
    }
    if let Some(sortie) = unit.core.module(Module::as_sortie) {
        if !sortie.can_engage() {
            return Ok(());
        }
    }

    let explicit = match unit.order {
        Some(UnitOrder::Attack(target)) => Some(target),
        _ => None,
    };
    let passive = unit.stance == Stance::Passive;
    let current = unit.core.target;
    let owner = unit.core.owner;
    if passive && explicit.is_none() {
        if let Some(u) = ctx.world.unit_mut(id) {
            u.core.target = None;
        }
        return Ok(());
    }

    let modifier = ctx.modifier_of(owner);
    let Some(shooter) = Shooter::from_entity(ctx.world, id) else {
        return Ok(());
    };
    let Some(mut weapon) = ctx.world.core_mut(id).and_then(|c| c.weapon.take()) else {
        return Ok(());
    };

    let outcome = match explicit {
        Some(target) => {
            let range = weapon.effective_range(&modifier);
            if ctx
                .world
                .is_valid_target(shooter.origin, shooter.team, target, weapon.targeting(), range)
            {
                fire_at(ctx.world, &mut weapon, &modifier, &shooter, target, ctx.now_ms)
                    .map(|fired| (Some(target), fired))
            } else {
                Ok((None, false))
            }
        }
        None => engage(ctx.world, &mut weapon, &modifier, &shooter, current, ctx.now_ms),
    };

    let target_pos = outcome
        .as_ref()
        .ok()
        .and_then(|(t, _)| *t)
        .and_then(|t| ctx.world.core(t))
        .map(|c| c.position);
    if let Some(core) = ctx.world.core_mut(id) {
        core.weapon = Some(weapon);
        if let Ok((target, _)) = &outcome {
            core.target = *target;
        }
        if let Some(point) = target_pos {
            core.face(point);
        }
        if matches!(outcome, Ok((_, true))) {
            if let Some(sortie) = core.module_mut(Module::as_sortie_mut) {
                sortie.consume_ammo();
            }
        }
    }
    outcome.map(|_| ())
}

// ============================================================================
// Projectiles
// ============================================================================

/// Turn seeking projectiles toward their live targets.
pub fn seeking_system(world: &mut EntityWorld) {
    for id in world.projectile_ids() {
        let Some(projectile) = world.projectile(id) else {
            continue;
        };
        if !projectile.effects.contains(OrdnanceEffects::SEEKING) {
            continue;
        }
        let Some(target) = projectile.target.and_then(|t| world.core(t)) else {
            continue;
        };
        if !target.active {
            continue;
        }
        let heading = projectile.position.direction_to(target.position, projectile.velocity.normalize());
        let velocity = heading.scale(projectile.speed);
        world.set_velocity(id, velocity);
        if let Some(p) = world.projectile_mut(id) {
            p.velocity = velocity;
        }
    }
}

/// Resolve every projectile after the physics step.
pub fn projectile_system(ctx: &mut ModuleCtx<'_>) {
    let slack = ctx.world.settings().projectile_hit_slack;
    let chain_radius = ctx.config.electric_chain_radius;
    for id in ctx.world.projectile_ids() {
        let Some(projectile) = ctx.world.projectile(id).cloned() else {
            continue;
        };
        if resolve_projectile(ctx.world, projectile, slack, chain_radius, ctx.now_ms) {
            ctx.world.remove(id);
        }
    }
}

/// Resolve one projectile. Returns whether it is spent.
fn resolve_projectile(
    world: &mut EntityWorld,
    mut projectile: Projectile,
    slack: Fixed,
    chain_radius: Fixed,
    now_ms: u64,
) -> bool {
    if projectile.origin.distance(projectile.position) > projectile.max_range {
        trace!(id = %projectile.id, "Projectile expired at max range");
        return true;
    }

    // Shields stop hostile rounds fired from outside their bubble.
    if let Some(shield) = world.shield_covering(projectile.position, projectile.team) {
        if world.shield_covering(projectile.origin, projectile.team) != Some(shield) {
            debug!(projectile = %projectile.id, shield = %shield, "Projectile intercepted by shield");
            world.apply_damage(shield, projectile.damage, projectile.source);
            return true;
        }
    }

    if projectile.effects.contains(OrdnanceEffects::FLAK) {
        let airborne = airborne_only(projectile.targeting);
        let victims = world.hostiles_in_radius(
            projectile.position,
            projectile.splash_radius,
            projectile.team,
            airborne,
        );
        if !victims.is_empty() {
            for victim in victims {
                world.apply_damage(victim, projectile.damage, projectile.source);
            }
            spawn_area(world, &projectile, now_ms);
            return true;
        }
    }

    let reach = projectile.size + slack;
    let struck = world
        .hostiles_in_radius(projectile.position, reach, projectile.team, projectile.targeting)
        .into_iter()
        .find(|id| !projectile.hit.contains(id));
    let Some(struck) = struck else {
        return false;
    };

    world.apply_damage(struck, projectile.damage, projectile.source);
    let secondary = projectile.damage.saturating_mul(SECONDARY_DAMAGE_FRACTION);

    if projectile.effects.contains(OrdnanceEffects::EXPLOSIVE) && projectile.splash_radius > Fixed::ZERO {
        for victim in world.hostiles_in_radius(
            projectile.position,
            projectile.splash_radius,
            projectile.team,
            projectile.targeting,
        ) {
            if victim != struck {
                world.apply_damage(victim, secondary, projectile.source);
            }
        }
    }

    if projectile.effects.contains(OrdnanceEffects::ELECTRIC) {
        let jump = world
            .hostiles_in_radius(projectile.position, chain_radius, projectile.team, projectile.targeting)
            .into_iter()
            .filter(|id| *id != struck)
            .min_by_key(|id| {
                world
                    .core(*id)
                    .map_or(Fixed::MAX, |c| c.position.distance_squared(projectile.position))
            });
        if let Some(jump) = jump {
            world.apply_damage(jump, secondary, projectile.source);
        }
    }

    spawn_area(world, &projectile, now_ms);

    if projectile.effects.contains(OrdnanceEffects::PIERCING) {
        projectile.hit.insert(struck);
        if let Some(p) = world.projectile_mut(projectile.id) {
            p.hit = projectile.hit;
        }
        return false;
    }
    true
}

fn airborne_only(targeting: ElevationTargeting) -> ElevationTargeting {
    match targeting {
        ElevationTargeting::GroundOnly => ElevationTargeting::GroundOnly,
        ElevationTargeting::GroundAndLow | ElevationTargeting::LowAndHigh | ElevationTargeting::AllElevations => {
            ElevationTargeting::LowAndHigh
        }
    }
}

fn spawn_area(world: &mut EntityWorld, projectile: &Projectile, now_ms: u64) {
    let Some(spec) = projectile.area_effect else {
        return;
    };
    world.add_area_effect(AreaEffect {
        id: EntityId(0),
        owner_player: projectile.owner_player,
        team: projectile.team,
        center: projectile.position,
        radius: spec.radius,
        damage_per_second: spec.damage_per_second,
        targeting: projectile.targeting,
        expires_at_ms: now_ms.saturating_add(spec.duration_ms),
    });
}

// ============================================================================
// Area Effects
// ============================================================================

/// Apply area damage for one tick, then drop expired zones and beams.
pub fn area_effect_system(world: &mut EntityWorld, dt_ms: u64, now_ms: u64) {
    let dt = ms_to_seconds(dt_ms);
    let zones: Vec<AreaEffect> = world.area_effects().cloned().collect();
    for zone in zones {
        let amount = zone.damage_per_second.saturating_mul(dt);
        for victim in world.hostiles_in_radius(zone.center, zone.radius, zone.team, zone.targeting) {
            world.apply_damage(victim, amount, zone.id);
        }
    }
    world.expire_area_effects(now_ms);
    world.expire_beams(now_ms);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{WeaponData, WeaponKind};
    use crate::entity::{Building, EntityCore, Unit};
    use crate::ordnance::{AreaEffectSpec, Ordnance};
    use crate::physics::CirclePhysics;
    use crate::roles::UnitRole;
    use crate::world::WorldSettings;

    fn fixed(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    fn world() -> EntityWorld {
        EntityWorld::new(Box::new(CirclePhysics::new()), WorldSettings::default())
    }

    fn soldier(world: &mut EntityWorld, team: u8, x: i32) -> EntityId {
        let core = EntityCore::new(
            "soldier",
            PlayerId(team),
            Team(team),
            Vec2Fixed::from_ints(x, 0),
            fixed(100),
            Fixed::ONE,
        );
        world
            .add_unit(Unit::new(core, UnitRole::INFANTRY, fixed(2)))
            .unwrap()
    }

    fn rifle() -> Weapon {
        Weapon::new(WeaponData {
            id: "rifle".to_string(),
            kind: WeaponKind::Projectile {
                speed: fixed(20),
                linear_damping: Fixed::ZERO,
            },
            damage: fixed(10),
            range: fixed(8),
            attack_rate: Fixed::ONE,
            targeting: ElevationTargeting::GroundAndLow,
            effects: OrdnanceEffects::empty(),
            splash_radius: Fixed::ZERO,
            area_effect: None,
            visual_size: Fixed::from_num(0.25),
        })
    }

    fn shell(world: &mut EntityWorld, at: Vec2Fixed, effects: OrdnanceEffects) -> Projectile {
        Projectile {
            id: world.allocate_id(),
            source: EntityId(999),
            owner_player: PlayerId(1),
            team: Team(1),
            origin: Vec2Fixed::ZERO,
            position: at,
            velocity: Vec2Fixed::ZERO,
            speed: fixed(10),
            linear_damping: Fixed::ZERO,
            target: None,
            damage: fixed(40),
            max_range: fixed(20),
            targeting: ElevationTargeting::GroundOnly,
            effects,
            splash_radius: fixed(3),
            area_effect: None,
            hit: std::collections::BTreeSet::new(),
            size: Fixed::from_num(0.25),
        }
    }

    fn health(world: &EntityWorld, id: EntityId) -> Fixed {
        world.core(id).unwrap().health.current
    }

    #[test]
    fn test_acquire_keeps_valid_target() {
        let mut world = world();
        let shooter_id = soldier(&mut world, 1, 0);
        let far = soldier(&mut world, 2, 6);
        let near = soldier(&mut world, 2, 3);
        let shooter = Shooter::from_entity(&world, shooter_id).unwrap();
        let weapon = rifle();

        let fresh = acquire_target(&world, &shooter, &weapon, &ResearchModifier::IDENTITY, None);
        assert_eq!(fresh, Some(near));

        let sticky = acquire_target(&world, &shooter, &weapon, &ResearchModifier::IDENTITY, Some(far));
        assert_eq!(sticky, Some(far));
    }

    #[test]
    fn test_fire_at_adds_projectile() {
        let mut world = world();
        let shooter_id = soldier(&mut world, 1, 0);
        let target = soldier(&mut world, 2, 5);
        let shooter = Shooter::from_entity(&world, shooter_id).unwrap();
        let mut weapon = rifle();

        assert!(fire_at(&mut world, &mut weapon, &ResearchModifier::IDENTITY, &shooter, target, 0).unwrap());
        assert_eq!(world.projectiles().count(), 1);
        assert!(!fire_at(&mut world, &mut weapon, &ResearchModifier::IDENTITY, &shooter, target, 500).unwrap());
        assert_eq!(world.projectiles().count(), 1);
    }

    #[test]
    fn test_direct_hit_consumes_projectile() {
        let mut world = world();
        let target = soldier(&mut world, 2, 5);
        let projectile = shell(&mut world, Vec2Fixed::from_ints(5, 0), OrdnanceEffects::empty());

        assert!(resolve_projectile(&mut world, projectile, Fixed::from_num(0.25), fixed(4), 0));
        assert_eq!(health(&world, target), fixed(60));
    }

    #[test]
    fn test_explosive_splash_is_half_damage() {
        let mut world = world();
        let primary = soldier(&mut world, 2, 5);
        let bystander = soldier(&mut world, 2, 7);
        let projectile = shell(&mut world, Vec2Fixed::from_ints(5, 0), OrdnanceEffects::EXPLOSIVE);

        resolve_projectile(&mut world, projectile, Fixed::from_num(0.25), fixed(4), 0);
        assert_eq!(health(&world, primary), fixed(60));
        assert_eq!(health(&world, bystander), fixed(80));
    }

    #[test]
    fn test_piercing_continues_and_skips_hit_set() {
        let mut world = world();
        let target = soldier(&mut world, 2, 5);
        let projectile = shell(&mut world, Vec2Fixed::from_ints(5, 0), OrdnanceEffects::PIERCING);
        let id = projectile.id;
        world.add_ordnance(Ordnance::Projectile(projectile.clone())).unwrap();

        assert!(!resolve_projectile(&mut world, projectile, Fixed::from_num(0.25), fixed(4), 0));
        let again = world.projectile(id).unwrap().clone();
        assert!(again.hit.contains(&target));
        assert!(!resolve_projectile(&mut world, again, Fixed::from_num(0.25), fixed(4), 0));
        assert_eq!(health(&world, target), fixed(60));
    }

    #[test]
    fn test_electric_chains_to_nearest_other() {
        let mut world = world();
        let primary = soldier(&mut world, 2, 5);
        let near = soldier(&mut world, 2, 8);
        let far = soldier(&mut world, 2, 20);
        let projectile = shell(&mut world, Vec2Fixed::from_ints(5, 0), OrdnanceEffects::ELECTRIC);

        resolve_projectile(&mut world, projectile, Fixed::from_num(0.25), fixed(4), 0);
        assert_eq!(health(&world, primary), fixed(60));
        assert_eq!(health(&world, near), fixed(80));
        assert_eq!(health(&world, far), fixed(100));
    }

    #[test]
    fn test_projectile_expires_past_range() {
        let mut world = world();
        let target = soldier(&mut world, 2, 25);
        let projectile = shell(&mut world, Vec2Fixed::from_ints(25, 0), OrdnanceEffects::empty());

        assert!(resolve_projectile(&mut world, projectile, Fixed::from_num(0.25), fixed(4), 0));
        assert_eq!(health(&world, target), fixed(100));
    }

    #[test]
    fn test_shield_intercepts_outside_fire() {
        let mut world = world();
        let core = EntityCore::new(
            "shield_gen",
            PlayerId(2),
            Team(2),
            Vec2Fixed::from_ints(10, 0),
            fixed(500),
            Fixed::ONE,
        );
        let generator = world.add_building(Building::new(core, 0, 1)).unwrap();
        world.add_shield_sensor(generator, fixed(6)).unwrap();
        world.set_shield_enabled(generator, true);
        let inside = soldier(&mut world, 2, 9);

        let projectile = shell(&mut world, Vec2Fixed::from_ints(9, 0), OrdnanceEffects::empty());
        assert!(resolve_projectile(&mut world, projectile, Fixed::from_num(0.25), fixed(4), 0));
        assert_eq!(health(&world, inside), fixed(100));
        assert_eq!(health(&world, generator), fixed(460));
    }

    #[test]
    fn test_area_effect_damages_per_second() {
        let mut world = world();
        let victim = soldier(&mut world, 2, 1);
        let mut projectile = shell(&mut world, Vec2Fixed::from_ints(1, 0), OrdnanceEffects::empty());
        projectile.area_effect = Some(AreaEffectSpec {
            radius: fixed(3),
            damage_per_second: fixed(10),
            duration_ms: 2000,
        });
        resolve_projectile(&mut world, projectile, Fixed::from_num(0.25), fixed(4), 0);
        assert_eq!(world.area_effects().count(), 1);

        area_effect_system(&mut world, 500, 500);
        assert_eq!(health(&world, victim), fixed(55));

        area_effect_system(&mut world, 1500, 2000);
        assert_eq!(world.area_effects().count(), 0);
    }
}
