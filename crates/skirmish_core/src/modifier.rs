//! Cumulative numeric modifiers granted by research.
//!
//! A [`ResearchModifier`] has two kinds of fields:
//! - **Multiplicative** (`Fixed`, identity `1`): combined by multiplication.
//! - **Additive** (`u32`, identity `0`): combined by addition.
//!
//! The same type describes a single research's effect, a faction's base
//! stat multipliers, and a player's folded cumulative modifier.

use serde::{Deserialize, Serialize};

use crate::math::{decimal_serde, Fixed};

/// Numeric effects of completed research.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchModifier {
    /// Damage of kinetic projectiles.
    #[serde(with = "decimal_serde")]
    pub projectile_damage: Fixed,
    /// Damage of instant-hit beams.
    #[serde(with = "decimal_serde")]
    pub beam_damage: Fixed,
    /// Shots per second.
    #[serde(with = "decimal_serde")]
    pub attack_rate: Fixed,
    /// Weapon reach.
    #[serde(with = "decimal_serde")]
    pub weapon_range: Fixed,
    /// Max health of newly produced units.
    #[serde(with = "decimal_serde")]
    pub unit_health: Fixed,
    /// Max health of newly placed buildings.
    #[serde(with = "decimal_serde")]
    pub building_health: Fixed,
    /// Movement speed of newly produced units.
    #[serde(with = "decimal_serde")]
    pub unit_speed: Fixed,
    /// Rate at which production queues accumulate time.
    #[serde(with = "decimal_serde")]
    pub production_speed: Fixed,
    /// Amount gathered per harvest or mining cycle.
    #[serde(with = "decimal_serde")]
    pub harvest_rate: Fixed,
    /// Bank interest payouts.
    #[serde(with = "decimal_serde")]
    pub bank_interest: Fixed,
    /// Extra cargo capacity for harvesters.
    pub worker_capacity: u32,
    /// Extra garrison slots per building.
    pub garrison_capacity: u32,
    /// Extra ammunition per sortie.
    pub aircraft_ammo: u32,
}

impl Default for ResearchModifier {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ResearchModifier {
    /// The modifier that changes nothing.
    pub const IDENTITY: Self = Self {
        projectile_damage: Fixed::ONE,
        beam_damage: Fixed::ONE,
        attack_rate: Fixed::ONE,
        weapon_range: Fixed::ONE,
        unit_health: Fixed::ONE,
        building_health: Fixed::ONE,
        unit_speed: Fixed::ONE,
        production_speed: Fixed::ONE,
        harvest_rate: Fixed::ONE,
        bank_interest: Fixed::ONE,
        worker_capacity: 0,
        garrison_capacity: 0,
        aircraft_ammo: 0,
    };

    /// Combine two modifiers field by field.
    #[must_use]
    pub fn combine(&self, other: &Self) -> Self {
        Self {
            projectile_damage: self.projectile_damage.saturating_mul(other.projectile_damage),
            beam_damage: self.beam_damage.saturating_mul(other.beam_damage),
            attack_rate: self.attack_rate.saturating_mul(other.attack_rate),
            weapon_range: self.weapon_range.saturating_mul(other.weapon_range),
            unit_health: self.unit_health.saturating_mul(other.unit_health),
            building_health: self.building_health.saturating_mul(other.building_health),
            unit_speed: self.unit_speed.saturating_mul(other.unit_speed),
            production_speed: self.production_speed.saturating_mul(other.production_speed),
            harvest_rate: self.harvest_rate.saturating_mul(other.harvest_rate),
            bank_interest: self.bank_interest.saturating_mul(other.bank_interest),
            worker_capacity: self.worker_capacity.saturating_add(other.worker_capacity),
            garrison_capacity: self.garrison_capacity.saturating_add(other.garrison_capacity),
            aircraft_ammo: self.aircraft_ammo.saturating_add(other.aircraft_ammo),
        }
    }

    /// Fold any number of modifiers, starting from [`Self::IDENTITY`].
    #[must_use]
    pub fn fold<'a, I>(modifiers: I) -> Self
    where
        I: IntoIterator<Item = &'a ResearchModifier>,
    {
        modifiers
            .into_iter()
            .fold(Self::IDENTITY, |acc, m| acc.combine(m))
    }

    /// Whether this modifier changes nothing.
    #[must_use]
    pub fn is_identity(&self) -> bool {
        *self == Self::IDENTITY
    }
}
