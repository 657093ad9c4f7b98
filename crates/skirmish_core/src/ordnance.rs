//! Transient damage carriers: projectiles, beams and area effects.
//!
//! Ordnance is created by [`Weapon::fire`](crate::weapon::Weapon::fire),
//! owned by the Entity World until it resolves (impact, range exhaustion,
//! expiry) and then removed.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, PlayerId, Team};
use crate::math::{Fixed, Vec2Fixed};
use crate::weapon::ElevationTargeting;

/// A single special-effect tag as written in data files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrdnanceEffect {
    /// Splash damage around the impact point.
    Explosive,
    /// Keeps flying after a hit; never hits the same entity twice.
    Piercing,
    /// Re-steers toward its target entity every step.
    Seeking,
    /// Detonates by proximity against airborne targets.
    Flak,
    /// Arcs half damage to the nearest other enemy on hit.
    Electric,
}

/// Set of [`OrdnanceEffect`] tags.
///
/// # Example
///
/// ```
/// use skirmish_core::ordnance::OrdnanceEffects;
///
/// let effects = OrdnanceEffects::EXPLOSIVE.union(OrdnanceEffects::SEEKING);
/// assert!(effects.contains(OrdnanceEffects::SEEKING));
/// assert!(!effects.contains(OrdnanceEffects::FLAK));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<OrdnanceEffect>", into = "Vec<OrdnanceEffect>")]
pub struct OrdnanceEffects(u8);

impl OrdnanceEffects {
    /// Splash damage.
    pub const EXPLOSIVE: Self = Self(1 << 0);
    /// Pass-through.
    pub const PIERCING: Self = Self(1 << 1);
    /// Homing.
    pub const SEEKING: Self = Self(1 << 2);
    /// Proximity fuse against aircraft.
    pub const FLAK: Self = Self(1 << 3);
    /// Chain arc.
    pub const ELECTRIC: Self = Self(1 << 4);

    const ALL: [(OrdnanceEffect, Self); 5] = [
        (OrdnanceEffect::Explosive, Self::EXPLOSIVE),
        (OrdnanceEffect::Piercing, Self::PIERCING),
        (OrdnanceEffect::Seeking, Self::SEEKING),
        (OrdnanceEffect::Flak, Self::FLAK),
        (OrdnanceEffect::Electric, Self::ELECTRIC),
    ];

    /// No effects.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Check if all flags in `other` are set in `self`.
    #[inline]
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Union of flags.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Raw bits for hashing.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }
}

impl From<Vec<OrdnanceEffect>> for OrdnanceEffects {
    fn from(tags: Vec<OrdnanceEffect>) -> Self {
        tags.into_iter().fold(Self::empty(), |acc, tag| {
            let flag = Self::ALL
                .iter()
                .find(|(t, _)| *t == tag)
                .map_or(Self::empty(), |(_, f)| *f);
            acc.union(flag)
        })
    }
}

impl From<OrdnanceEffects> for Vec<OrdnanceEffect> {
    fn from(effects: OrdnanceEffects) -> Self {
        OrdnanceEffects::ALL
            .iter()
            .filter(|(_, flag)| effects.contains(*flag))
            .map(|(tag, _)| *tag)
            .collect()
    }
}

/// Lingering damage zone left behind by some ordnance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaEffect {
    /// Entity id (assigned by the world).
    pub id: EntityId,
    /// Player credited with the damage.
    pub owner_player: PlayerId,
    /// Team of the firing side.
    pub team: Team,
    /// Zone center.
    pub center: Vec2Fixed,
    /// Zone radius.
    pub radius: Fixed,
    /// Damage per second to each enemy inside.
    pub damage_per_second: Fixed,
    /// Elevations the zone affects.
    pub targeting: ElevationTargeting,
    /// Simulation time at which the zone disappears.
    pub expires_at_ms: u64,
}

/// A kinetic body in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projectile {
    /// Entity id (assigned by the world).
    pub id: EntityId,
    /// Entity that fired it.
    pub source: EntityId,
    /// Player credited with the damage.
    pub owner_player: PlayerId,
    /// Team of the firing side.
    pub team: Team,
    /// Launch point; range is measured from here.
    pub origin: Vec2Fixed,
    /// Current position.
    pub position: Vec2Fixed,
    /// Launch velocity.
    pub velocity: Vec2Fixed,
    /// Travel speed in units per second.
    pub speed: Fixed,
    /// Linear damping applied by the physics step.
    pub linear_damping: Fixed,
    /// Entity aimed at, for seeking ordnance.
    pub target: Option<EntityId>,
    /// Damage on direct hit.
    pub damage: Fixed,
    /// Distance after which the projectile self-removes.
    pub max_range: Fixed,
    /// Elevations this projectile may hit.
    pub targeting: ElevationTargeting,
    /// Special effects.
    pub effects: OrdnanceEffects,
    /// Splash radius for explosive and flak ordnance.
    pub splash_radius: Fixed,
    /// Zone spawned at the impact point.
    pub area_effect: Option<AreaEffectSpec>,
    /// Entities already hit (piercing ordnance).
    pub hit: BTreeSet<EntityId>,
    /// Visual size; also the collision radius.
    pub size: Fixed,
}

/// Parameters of an area effect to spawn on impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AreaEffectSpec {
    /// Zone radius.
    pub radius: Fixed,
    /// Damage per second.
    pub damage_per_second: Fixed,
    /// Lifetime.
    pub duration_ms: u64,
}

/// A resolved instant-hit beam, kept briefly for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beam {
    /// Entity id (assigned by the world).
    pub id: EntityId,
    /// Entity that fired it.
    pub source: EntityId,
    /// Team of the firing side.
    pub team: Team,
    /// Start of the drawn beam.
    pub origin: Vec2Fixed,
    /// Resolved endpoint.
    pub end: Vec2Fixed,
    /// Damage dealt (already applied at fire time).
    pub damage: Fixed,
    /// Entity that absorbed the beam, if any.
    pub hit: Option<EntityId>,
    /// Special effects.
    pub effects: OrdnanceEffects,
    /// Visual width.
    pub size: Fixed,
    /// Simulation time at which the beam stops being drawn.
    pub expires_at_ms: u64,
}

impl Beam {
    /// Drawn length of the beam.
    #[must_use]
    pub fn length(&self) -> Fixed {
        self.origin.distance(self.end)
    }
}

/// Any ordnance produced by a weapon fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ordnance {
    /// Kinetic projectile.
    Projectile(Projectile),
    /// Instant-hit beam.
    Beam(Beam),
}

impl Ordnance {
    /// Damage carried.
    #[must_use]
    pub fn damage(&self) -> Fixed {
        match self {
            Self::Projectile(p) => p.damage,
            Self::Beam(b) => b.damage,
        }
    }

    /// Team of the firing side.
    #[must_use]
    pub fn team(&self) -> Team {
        match self {
            Self::Projectile(p) => p.team,
            Self::Beam(b) => b.team,
        }
    }

    /// Borrow as a projectile.
    #[must_use]
    pub fn as_projectile(&self) -> Option<&Projectile> {
        match self {
            Self::Projectile(p) => Some(p),
            Self::Beam(_) => None,
        }
    }

    /// Borrow as a beam.
    #[must_use]
    pub fn as_beam(&self) -> Option<&Beam> {
        match self {
            Self::Beam(b) => Some(b),
            Self::Projectile(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effects_from_tags() {
        let effects: OrdnanceEffects =
            vec![OrdnanceEffect::Explosive, OrdnanceEffect::Electric].into();
        assert!(effects.contains(OrdnanceEffects::EXPLOSIVE));
        assert!(effects.contains(OrdnanceEffects::ELECTRIC));
        assert!(!effects.contains(OrdnanceEffects::PIERCING));
    }

    #[test]
    fn test_effects_ron_list() {
        let effects: OrdnanceEffects = ron::from_str("[Seeking, Flak]").unwrap();
        assert_eq!(effects, OrdnanceEffects::SEEKING.union(OrdnanceEffects::FLAK));
        let back: Vec<OrdnanceEffect> = effects.into();
        assert_eq!(back, vec![OrdnanceEffect::Seeking, OrdnanceEffect::Flak]);
    }
}
