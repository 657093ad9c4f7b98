//! Weapon firing and ordnance creation.
//!
//! A [`Weapon`] is the stateful half of a weapon template: it remembers when
//! it last fired. [`Weapon::fire`] turns a [`FireRequest`] into concrete
//! ordnance:
//! - Projectile weapons spawn one kinetic body aimed at the target
//! - Beam weapons resolve instantly along a ray and apply damage on the spot
//! - Multi-projectile weapons fan out N bodies that share the damage
//!
//! Damage, range and rate are scaled by the owner's research modifier at
//! fire time, so upgrades apply to weapons already in the field.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::data::{SpreadPattern, WeaponData, WeaponKind};
use crate::entity::{Elevation, EntityId, PlayerId, Team};
use crate::math::{Fixed, Vec2Fixed};
use crate::modifier::ResearchModifier;
use crate::ordnance::{AreaEffectSpec, Beam, Ordnance, Projectile};
use crate::physics::{BodyId, BodySlot};
use crate::world::EntityWorld;

/// Which elevations a weapon may be fired at.
///
/// This is the rock-paper-scissors axis between ground forces and aircraft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ElevationTargeting {
    /// Ground targets only.
    #[default]
    GroundOnly,
    /// Ground and low-flying targets.
    GroundAndLow,
    /// Airborne targets only.
    LowAndHigh,
    /// Everything.
    AllElevations,
}

impl ElevationTargeting {
    /// Whether a target at `elevation` may be engaged.
    #[must_use]
    pub const fn allows(self, elevation: Elevation) -> bool {
        match self {
            Self::GroundOnly => matches!(elevation, Elevation::Ground),
            Self::GroundAndLow => matches!(elevation, Elevation::Ground | Elevation::Low),
            Self::LowAndHigh => matches!(elevation, Elevation::Low | Elevation::High),
            Self::AllElevations => true,
        }
    }
}

/// Everything a weapon needs to know about one shot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FireRequest {
    /// Muzzle position.
    pub origin: Vec2Fixed,
    /// Aim point.
    pub target_pos: Vec2Fixed,
    /// Elevation of the thing aimed at.
    pub target_elevation: Elevation,
    /// Entity aimed at, if any (seeking ordnance follows it).
    pub target: Option<EntityId>,
    /// Entity credited with the shot.
    pub source: EntityId,
    /// Player credited with the shot.
    pub owner_player: PlayerId,
    /// Team of the firing side.
    pub team: Team,
    /// Body the beam ray must pass through (usually the shooter's own).
    pub ignored_body: Option<BodyId>,
    /// Current simulation time.
    pub now_ms: u64,
}

/// A weapon instance with its cooldown state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Weapon {
    /// Static template.
    pub data: WeaponData,
    /// Simulation time of the last successful fire.
    pub last_fire_ms: Option<u64>,
}

impl Weapon {
    /// Create a weapon that is ready to fire.
    #[must_use]
    pub fn new(data: WeaponData) -> Self {
        Self {
            data,
            last_fire_ms: None,
        }
    }

    /// Template id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.data.id
    }

    /// Elevation targeting of the template.
    #[must_use]
    pub fn targeting(&self) -> ElevationTargeting {
        self.data.targeting
    }

    /// Milliseconds between shots under `modifier`, or `None` if the
    /// effective rate is not positive (the weapon never fires).
    #[must_use]
    pub fn interval_ms(&self, modifier: &ResearchModifier) -> Option<Fixed> {
        let rate = self.data.attack_rate.saturating_mul(modifier.attack_rate);
        if rate <= Fixed::ZERO {
            return None;
        }
        Some(Fixed::from_num(1000).saturating_div(rate))
    }

    /// Whether the cooldown has elapsed at `now_ms`.
    #[must_use]
    pub fn can_fire(&self, now_ms: u64, modifier: &ResearchModifier) -> bool {
        let Some(interval) = self.interval_ms(modifier) else {
            return false;
        };
        match self.last_fire_ms {
            None => true,
            Some(last) => Fixed::saturating_from_num(now_ms.saturating_sub(last)) >= interval,
        }
    }

    /// Range after research.
    #[must_use]
    pub fn effective_range(&self, modifier: &ResearchModifier) -> Fixed {
        self.data.range.saturating_mul(modifier.weapon_range)
    }

    /// Damage per shot after research.
    #[must_use]
    pub fn effective_damage(&self, modifier: &ResearchModifier) -> Fixed {
        let multiplier = match self.data.kind {
            WeaponKind::Beam => modifier.beam_damage,
            WeaponKind::Projectile { .. } | WeaponKind::MultiProjectile { .. } => {
                modifier.projectile_damage
            }
        };
        self.data.damage.saturating_mul(multiplier)
    }

    /// Fire at a target.
    ///
    /// Returns an empty list when the cooldown is pending or the target's
    /// elevation is not allowed. The cooldown resets only when ordnance is
    /// produced. Projectiles are returned for the caller to add to the
    /// world; beams have already applied their damage.
    ///
    /// Only hostile bodies stop a beam. Friendly and neutral bodies, and
    /// hostile ones at an elevation the weapon cannot hit, are passed
    /// through. A hostile shield sensor stops it whatever it covers.
    pub fn fire(
        &mut self,
        request: &FireRequest,
        world: &mut EntityWorld,
        modifier: &ResearchModifier,
    ) -> Vec<Ordnance> {
        if !self.data.targeting.allows(request.target_elevation) {
            debug!(
                weapon = %self.data.id,
                elevation = ?request.target_elevation,
                "Fire rejected: elevation not targetable"
            );
            return Vec::new();
        }
        if !self.can_fire(request.now_ms, modifier) {
            return Vec::new();
        }

        let aim = request
            .origin
            .direction_to(request.target_pos, Vec2Fixed::UNIT_X);
        let damage = self.effective_damage(modifier);
        let range = self.effective_range(modifier);

        let ordnance = match &self.data.kind {
            WeaponKind::Beam => vec![Ordnance::Beam(self.resolve_beam(
                request, world, aim, damage, range,
            ))],
            WeaponKind::Projectile {
                speed,
                linear_damping,
            } => vec![Ordnance::Projectile(self.projectile(
                request,
                world.allocate_id(),
                request.origin,
                aim,
                *speed,
                *linear_damping,
                damage,
                range,
            ))],
            WeaponKind::MultiProjectile {
                speed,
                linear_damping,
                count,
                pattern,
            } => {
                let count = (*count).max(1);
                let share = damage / Fixed::from_num(count);
                (0..count)
                    .map(|i| {
                        let (origin, direction) = spread(request.origin, aim, pattern, i, count);
                        Ordnance::Projectile(self.projectile(
                            request,
                            world.allocate_id(),
                            origin,
                            direction,
                            *speed,
                            *linear_damping,
                            share,
                            range,
                        ))
                    })
                    .collect()
            }
        };

        self.last_fire_ms = Some(request.now_ms);
        ordnance
    }

    #[allow(clippy::too_many_arguments)]
    fn projectile(
        &self,
        request: &FireRequest,
        id: EntityId,
        origin: Vec2Fixed,
        direction: Vec2Fixed,
        speed: Fixed,
        linear_damping: Fixed,
        damage: Fixed,
        max_range: Fixed,
    ) -> Projectile {
        Projectile {
            id,
            source: request.source,
            owner_player: request.owner_player,
            team: request.team,
            origin,
            position: origin,
            velocity: direction.scale(speed),
            speed,
            linear_damping,
            target: request.target,
            damage,
            max_range,
            targeting: self.data.targeting,
            effects: self.data.effects,
            splash_radius: self.data.splash_radius,
            area_effect: self.data.area_effect.as_ref().map(|a| AreaEffectSpec {
                radius: a.radius,
                damage_per_second: a.damage_per_second,
                duration_ms: a.duration_ms,
            }),
            hit: std::collections::BTreeSet::new(),
            size: self.data.visual_size,
        }
    }

    /// Nearest hostile obstacle or hostile shield along the clipped ray.
    fn resolve_beam(
        &self,
        request: &FireRequest,
        world: &mut EntityWorld,
        direction: Vec2Fixed,
        damage: Fixed,
        range: Fixed,
    ) -> Beam {
        let clip = range.min(request.origin.distance(request.target_pos));
        let targeting = self.data.targeting;
        let team = request.team;
        let ignored = request.ignored_body;

        let hit = {
            let filter = |body: BodyId| -> bool {
                if Some(body) == ignored {
                    return false;
                }
                let Some(core) = world.core(body.entity) else {
                    return false;
                };
                if !core.active || !team.is_hostile(core.team) {
                    return false;
                }
                match body.slot {
                    // Shields intercept regardless of what they cover.
                    BodySlot::Sensor => true,
                    BodySlot::Main => targeting.allows(core.elevation),
                }
            };
            world
                .physics()
                .ray_cast(request.origin, direction, clip, &filter)
        };

        let (end, struck) = match hit {
            Some(hit) => (hit.point, Some(hit.body.entity)),
            None => (request.origin + direction.scale(clip), None),
        };

        if let Some(target) = struck {
            world.apply_damage(target, damage, request.source);
        }

        Beam {
            id: world.allocate_id(),
            source: request.source,
            team,
            origin: request.origin,
            end,
            damage,
            hit: struck,
            effects: self.data.effects,
            size: self.data.visual_size,
            expires_at_ms: request.now_ms.saturating_add(world.settings().beam_display_ms),
        }
    }
}

/// Launch point and direction of shot `index` out of `count`.
fn spread(
    origin: Vec2Fixed,
    aim: Vec2Fixed,
    pattern: &SpreadPattern,
    index: u32,
    count: u32,
) -> (Vec2Fixed, Vec2Fixed) {
    let index = Fixed::from_num(index);
    match pattern {
        SpreadPattern::Parallel { spacing } => {
            let center = Fixed::from_num(count - 1) / 2;
            let offset = aim.perpendicular().scale((index - center) * *spacing);
            (origin + offset, aim)
        }
        SpreadPattern::Fan { cone_degrees } => {
            if count < 2 {
                return (origin, aim);
            }
            let step = *cone_degrees / Fixed::from_num(count - 1);
            let angle = -*cone_degrees / 2 + index * step;
            (origin, aim.rotate_degrees(angle))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Building, EntityCore, Unit};
    use crate::ordnance::OrdnanceEffects;
    use crate::physics::CirclePhysics;
    use crate::roles::UnitRole;
    use crate::world::WorldSettings;

    fn fixed(n: i32) -> Fixed {
        Fixed::from_num(n)
    }

    fn weapon(kind: WeaponKind, targeting: ElevationTargeting) -> Weapon {
        Weapon::new(WeaponData {
            id: "test_gun".to_string(),
            damage: fixed(30),
            range: fixed(20),
            attack_rate: fixed(2),
            targeting,
            kind,
            effects: OrdnanceEffects::empty(),
            splash_radius: Fixed::ZERO,
            area_effect: None,
            visual_size: Fixed::from_num(0.25),
        })
    }

    fn world() -> EntityWorld {
        EntityWorld::new(Box::new(CirclePhysics::new()), WorldSettings::default())
    }

    fn request(origin: Vec2Fixed, target_pos: Vec2Fixed, now_ms: u64) -> FireRequest {
        FireRequest {
            origin,
            target_pos,
            target_elevation: Elevation::Ground,
            target: None,
            source: EntityId(999),
            owner_player: PlayerId(1),
            team: Team(1),
            ignored_body: None,
            now_ms,
        }
    }

    fn enemy_unit(world: &mut EntityWorld, x: i32, radius: i32) -> EntityId {
        let core = EntityCore::new("target", PlayerId(2), Team(2), Vec2Fixed::from_ints(x, 0), fixed(100), fixed(radius));
        world.add_unit(Unit::new(core, UnitRole::VEHICLE, fixed(1))).unwrap()
    }

    #[test]
    fn test_elevation_targeting_sets() {
        use Elevation::{Ground, High, Low};
        assert!(ElevationTargeting::GroundOnly.allows(Ground));
        assert!(!ElevationTargeting::GroundOnly.allows(Low));
        assert!(ElevationTargeting::GroundAndLow.allows(Low));
        assert!(!ElevationTargeting::GroundAndLow.allows(High));
        assert!(!ElevationTargeting::LowAndHigh.allows(Ground));
        assert!(ElevationTargeting::LowAndHigh.allows(High));
        for e in [Ground, Low, High] {
            assert!(ElevationTargeting::AllElevations.allows(e));
        }
    }

    #[test]
    fn test_cooldown_window() {
        let mut world = world();
        let mut gun = weapon(
            WeaponKind::Projectile {
                speed: fixed(10),
                linear_damping: Fixed::ZERO,
            },
            ElevationTargeting::GroundOnly,
        );
        let modifier = ResearchModifier::IDENTITY;
        let shot = request(Vec2Fixed::ZERO, Vec2Fixed::from_ints(10, 0), 1000);

        assert!(gun.can_fire(1000, &modifier));
        assert_eq!(gun.fire(&shot, &mut world, &modifier).len(), 1);

        // 2 shots per second: 500ms interval.
        assert!(!gun.can_fire(1499, &modifier));
        assert!(gun.fire(&request(Vec2Fixed::ZERO, Vec2Fixed::from_ints(10, 0), 1499), &mut world, &modifier).is_empty());
        assert_eq!(gun.last_fire_ms, Some(1000));
        assert!(gun.can_fire(1500, &modifier));
    }

    #[test]
    fn test_attack_rate_modifier_shortens_interval() {
        let gun = weapon(WeaponKind::Beam, ElevationTargeting::GroundOnly);
        let mut fast = ResearchModifier::IDENTITY;
        fast.attack_rate = fixed(2);
        let mut fired = gun.clone();
        fired.last_fire_ms = Some(0);
        assert!(!fired.can_fire(249, &fast));
        assert!(fired.can_fire(250, &fast));
        assert!(!fired.can_fire(250, &ResearchModifier::IDENTITY));
    }

    #[test]
    fn test_zero_rate_never_fires() {
        let mut gun = weapon(WeaponKind::Beam, ElevationTargeting::GroundOnly);
        gun.data.attack_rate = Fixed::ZERO;
        assert!(!gun.can_fire(1_000_000, &ResearchModifier::IDENTITY));
    }

    #[test]
    fn test_disallowed_elevation_yields_nothing_and_keeps_timer() {
        let mut world = world();
        let mut gun = weapon(
            WeaponKind::Projectile {
                speed: fixed(10),
                linear_damping: Fixed::ZERO,
            },
            ElevationTargeting::GroundOnly,
        );
        let mut shot = request(Vec2Fixed::ZERO, Vec2Fixed::from_ints(10, 0), 0);
        shot.target_elevation = Elevation::High;
        assert!(gun.fire(&shot, &mut world, &ResearchModifier::IDENTITY).is_empty());
        assert_eq!(gun.last_fire_ms, None);
    }

    #[test]
    fn test_projectile_scaled_by_modifier() {
        let mut world = world();
        let mut gun = weapon(
            WeaponKind::Projectile {
                speed: fixed(10),
                linear_damping: Fixed::from_num(0.1),
            },
            ElevationTargeting::GroundOnly,
        );
        let mut modifier = ResearchModifier::IDENTITY;
        modifier.projectile_damage = Fixed::from_num(1.5);
        modifier.weapon_range = fixed(2);

        let shot = request(Vec2Fixed::ZERO, Vec2Fixed::from_ints(0, 10), 0);
        let out = gun.fire(&shot, &mut world, &modifier);
        let projectile = out[0].as_projectile().unwrap();
        assert_eq!(projectile.damage, fixed(45));
        assert_eq!(projectile.max_range, fixed(40));
        assert_eq!(projectile.velocity, Vec2Fixed::from_ints(0, 10));
        assert_eq!(projectile.linear_damping, Fixed::from_num(0.1));
    }

    #[test]
    fn test_multi_projectile_splits_damage() {
        let mut world = world();
        let mut gun = weapon(
            WeaponKind::MultiProjectile {
                speed: fixed(10),
                linear_damping: Fixed::ZERO,
                count: 3,
                pattern: SpreadPattern::Parallel { spacing: fixed(2) },
            },
            ElevationTargeting::GroundOnly,
        );
        let shot = request(Vec2Fixed::ZERO, Vec2Fixed::from_ints(10, 0), 0);
        let out = gun.fire(&shot, &mut world, &ResearchModifier::IDENTITY);

        assert_eq!(out.len(), 3);
        let total: Fixed = out.iter().map(Ordnance::damage).sum();
        assert_eq!(total, fixed(30));

        let origins: Vec<Vec2Fixed> = out
            .iter()
            .map(|o| o.as_projectile().unwrap().origin)
            .collect();
        assert_eq!(
            origins,
            vec![
                Vec2Fixed::from_ints(0, -2),
                Vec2Fixed::ZERO,
                Vec2Fixed::from_ints(0, 2)
            ]
        );
        let ids: std::collections::BTreeSet<_> = out.iter().map(|o| o.as_projectile().unwrap().id).collect();
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_fan_pattern_is_symmetric() {
        let mut world = world();
        let mut gun = weapon(
            WeaponKind::MultiProjectile {
                speed: fixed(10),
                linear_damping: Fixed::ZERO,
                count: 3,
                pattern: SpreadPattern::Fan {
                    cone_degrees: fixed(90),
                },
            },
            ElevationTargeting::GroundOnly,
        );
        let shot = request(Vec2Fixed::ZERO, Vec2Fixed::from_ints(10, 0), 0);
        let out = gun.fire(&shot, &mut world, &ResearchModifier::IDENTITY);
        let vel: Vec<Vec2Fixed> = out.iter().map(|o| o.as_projectile().unwrap().velocity).collect();

        assert_eq!(vel[1], Vec2Fixed::from_ints(10, 0));
        let eps = Fixed::from_num(0.001);
        assert!((vel[0].y + vel[2].y).abs() < eps);
        assert!((vel[0].x - vel[2].x).abs() < eps);
        assert!(vel[0].y < Fixed::ZERO);
    }

    #[test]
    fn test_beam_hits_first_enemy_and_applies_damage() {
        let mut world = world();
        let near = enemy_unit(&mut world, 5, 1);
        let far = enemy_unit(&mut world, 10, 1);
        let mut gun = weapon(WeaponKind::Beam, ElevationTargeting::GroundOnly);

        let shot = request(Vec2Fixed::ZERO, Vec2Fixed::from_ints(10, 0), 0);
        let out = gun.fire(&shot, &mut world, &ResearchModifier::IDENTITY);
        let beam = out[0].as_beam().unwrap();

        assert_eq!(beam.hit, Some(near));
        assert_eq!(beam.end, Vec2Fixed::from_ints(4, 0));
        assert_eq!(world.core(near).unwrap().health.current, fixed(70));
        assert_eq!(world.core(far).unwrap().health.current, fixed(100));
    }

    #[test]
    fn test_beam_clipped_to_range_and_target_distance() {
        let mut world = world();
        let mut gun = weapon(WeaponKind::Beam, ElevationTargeting::GroundOnly);

        let out = gun.fire(
            &request(Vec2Fixed::ZERO, Vec2Fixed::from_ints(50, 0), 0),
            &mut world,
            &ResearchModifier::IDENTITY,
        );
        let beam = out[0].as_beam().unwrap();
        assert_eq!(beam.hit, None);
        assert_eq!(beam.length(), fixed(20));

        let out = gun.fire(
            &request(Vec2Fixed::ZERO, Vec2Fixed::from_ints(0, 7), 1000),
            &mut world,
            &ResearchModifier::IDENTITY,
        );
        assert_eq!(out[0].as_beam().unwrap().length(), fixed(7));
    }

    #[test]
    fn test_beam_passes_friendly_and_wrong_elevation() {
        let mut world = world();
        let core = EntityCore::new("friend", PlayerId(1), Team(1), Vec2Fixed::from_ints(5, 0), fixed(100), fixed(1));
        let friend = world.add_unit(Unit::new(core, UnitRole::INFANTRY, fixed(1))).unwrap();
        let mut gun = weapon(WeaponKind::Beam, ElevationTargeting::GroundOnly);

        let out = gun.fire(
            &request(Vec2Fixed::ZERO, Vec2Fixed::from_ints(10, 0), 0),
            &mut world,
            &ResearchModifier::IDENTITY,
        );
        assert_eq!(out[0].as_beam().unwrap().hit, None);
        assert_eq!(world.core(friend).unwrap().health.current, fixed(100));
    }

    #[test]
    fn test_beam_stops_at_shield_boundary() {
        let mut world = world();
        let core = EntityCore::new("bunker", PlayerId(2), Team(2), Vec2Fixed::from_ints(20, 0), fixed(500), fixed(2));
        let bunker = world.add_building(Building::new(core, 0, 1)).unwrap();
        world.add_shield_sensor(bunker, fixed(6)).unwrap();
        world.set_shield_enabled(bunker, true);

        let mut gun = weapon(WeaponKind::Beam, ElevationTargeting::GroundOnly);
        gun.data.range = fixed(30);
        let out = gun.fire(
            &request(Vec2Fixed::ZERO, Vec2Fixed::from_ints(20, 0), 0),
            &mut world,
            &ResearchModifier::IDENTITY,
        );
        let beam = out[0].as_beam().unwrap();

        assert_eq!(beam.end, Vec2Fixed::from_ints(14, 0));
        assert_eq!(beam.hit, Some(bunker));
        assert_eq!(world.core(bunker).unwrap().health.current, fixed(470));
    }
}
