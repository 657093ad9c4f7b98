//! Weapon templates.

use serde::{Deserialize, Serialize};

use crate::math::{decimal_serde, Fixed};
use crate::ordnance::OrdnanceEffects;
use crate::weapon::ElevationTargeting;

/// How a multi-projectile weapon spreads its shots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpreadPattern {
    /// Evenly spaced side by side, perpendicular to the aim direction, centered.
    Parallel {
        /// Distance between neighbouring shots.
        #[serde(with = "decimal_serde")]
        spacing: Fixed,
    },
    /// Evenly spaced within a cone, centered on the aim direction.
    Fan {
        /// Total cone angle in degrees.
        #[serde(with = "decimal_serde")]
        cone_degrees: Fixed,
    },
}

/// Delivery mechanism of a weapon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeaponKind {
    /// One kinetic projectile per shot.
    Projectile {
        /// Travel speed in units per second.
        #[serde(with = "decimal_serde")]
        speed: Fixed,
        /// Fraction of velocity lost per second.
        #[serde(default, with = "decimal_serde")]
        linear_damping: Fixed,
    },
    /// Instant hit along a ray.
    Beam,
    /// Several projectiles per shot, sharing the damage.
    MultiProjectile {
        /// Travel speed in units per second.
        #[serde(with = "decimal_serde")]
        speed: Fixed,
        /// Fraction of velocity lost per second.
        #[serde(default, with = "decimal_serde")]
        linear_damping: Fixed,
        /// Projectiles per shot.
        count: u32,
        /// Spread layout.
        pattern: SpreadPattern,
    },
}

/// Lingering zone left where ordnance lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AreaEffectData {
    /// Zone radius.
    #[serde(with = "decimal_serde")]
    pub radius: Fixed,
    /// Damage per second to enemies inside.
    #[serde(with = "decimal_serde")]
    pub damage_per_second: Fixed,
    /// Lifetime in milliseconds.
    pub duration_ms: u64,
}

/// Data-driven weapon definition.
///
/// # Example RON
///
/// ```ron
/// WeaponData(
///     id: "flak_battery",
///     damage: 24,
///     range: 14,
///     attack_rate: 1.5,
///     targeting: LowAndHigh,
///     kind: MultiProjectile(speed: 30, count: 3, pattern: Fan(cone_degrees: 20)),
///     effects: [Flak, Explosive],
///     splash_radius: 2,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponData {
    /// Unique string identifier.
    pub id: String,
    /// Damage per shot (split across projectiles for multi-projectile weapons).
    #[serde(with = "decimal_serde")]
    pub damage: Fixed,
    /// Reach in world units.
    #[serde(with = "decimal_serde")]
    pub range: Fixed,
    /// Shots per second.
    #[serde(with = "decimal_serde")]
    pub attack_rate: Fixed,
    /// Which elevations may be targeted.
    pub targeting: ElevationTargeting,
    /// Delivery mechanism.
    pub kind: WeaponKind,
    /// Special effects of the ordnance.
    #[serde(default)]
    pub effects: OrdnanceEffects,
    /// Splash radius for explosive or flak ordnance.
    #[serde(default, with = "decimal_serde")]
    pub splash_radius: Fixed,
    /// Zone left at the impact point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area_effect: Option<AreaEffectData>,
    /// Visual size of the ordnance.
    #[serde(default = "default_visual_size", with = "decimal_serde")]
    pub visual_size: Fixed,
}

fn default_visual_size() -> Fixed {
    Fixed::from_num(0.25)
}

impl WeaponData {
    /// Check the template for values the simulation cannot use.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.damage < Fixed::ZERO {
            errors.push(format!("Weapon '{}' has negative damage", self.id));
        }
        if self.range <= Fixed::ZERO {
            errors.push(format!("Weapon '{}' has non-positive range", self.id));
        }
        if self.attack_rate <= Fixed::ZERO {
            errors.push(format!("Weapon '{}' has non-positive attack rate", self.id));
        }
        if self.visual_size <= Fixed::ZERO {
            errors.push(format!("Weapon '{}' has non-positive visual size", self.id));
        }
        match &self.kind {
            WeaponKind::Projectile { speed, .. } if *speed <= Fixed::ZERO => {
                errors.push(format!("Weapon '{}' has non-positive projectile speed", self.id));
            }
            WeaponKind::MultiProjectile { speed, count, .. } => {
                if *speed <= Fixed::ZERO {
                    errors.push(format!("Weapon '{}' has non-positive projectile speed", self.id));
                }
                if *count == 0 {
                    errors.push(format!("Weapon '{}' fires zero projectiles", self.id));
                }
            }
            _ => {}
        }
        errors
    }
}
