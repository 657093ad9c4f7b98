//! Behavior module templates.
//!
//! Each unit or building type lists the modules its instances receive.
//! One instance is created per entry when the entity is spawned.

use serde::{Deserialize, Serialize};

use crate::math::{decimal_serde, Fixed};

/// Default production queue length.
const fn default_queue_size() -> usize {
    5
}

/// Template for one behavior module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleData {
    /// FIFO unit production. Producible types come from the faction's
    /// building-to-units map.
    Production {
        /// Maximum queued orders.
        #[serde(default = "default_queue_size")]
        queue_size: usize,
    },
    /// Independently upgradable defensive weapon.
    Turret {
        /// Weapon template id.
        weapon: String,
    },
    /// Houses friendly infantry, which fire from inside.
    Garrison {
        /// Base number of slots.
        capacity: u32,
    },
    /// Sensor that intercepts incoming beams and projectiles.
    Shield {
        /// Sensor radius.
        #[serde(with = "decimal_serde")]
        radius: Fixed,
    },
    /// Periodic interest on stored resources.
    Bank {
        /// Payout interval in milliseconds.
        interval_ms: u64,
        /// Fraction of stored resources paid per interval.
        #[serde(with = "decimal_serde")]
        rate: Fixed,
        /// Payouts at or below this amount are not announced.
        min_notify: u32,
    },
    /// Carries resources from deposits back to depots.
    Harvest {
        /// Base cargo capacity.
        capacity: u32,
        /// Amount gathered per cycle.
        amount_per_cycle: u32,
        /// Time between cycles.
        cooldown_ms: u64,
        /// Reach to deposits and depots (edge to edge).
        #[serde(with = "decimal_serde")]
        range: Fixed,
    },
    /// Strips a deposit, crediting its owner directly.
    Mine {
        /// Amount extracted per cycle.
        yield_per_cycle: u32,
        /// Time between cycles.
        cooldown_ms: u64,
        /// Reach to the deposit (edge to edge).
        #[serde(with = "decimal_serde")]
        range: Fixed,
    },
    /// Restores health of friendly infantry.
    Heal {
        /// Health restored per cycle.
        #[serde(with = "decimal_serde")]
        amount: Fixed,
        /// Time between cycles.
        cooldown_ms: u64,
        /// Reach (edge to edge).
        #[serde(with = "decimal_serde")]
        range: Fixed,
    },
    /// Restores health of friendly buildings, vehicles and aircraft.
    Repair {
        /// Health restored per cycle.
        #[serde(with = "decimal_serde")]
        amount: Fixed,
        /// Time between cycles.
        cooldown_ms: u64,
        /// Reach (edge to edge).
        #[serde(with = "decimal_serde")]
        range: Fixed,
    },
    /// Toggleable invisibility.
    Cloak {
        /// Minimum time between toggles.
        cooldown_ms: u64,
    },
    /// Toggle between mobile and an immobile multi-turret mode.
    Deploy {
        /// Minimum time between toggles.
        cooldown_ms: u64,
        /// Weapon template ids of the deployed turrets.
        turrets: Vec<String>,
    },
    /// Houses and launches aircraft on fuel- and ammo-limited sorties.
    Hangar {
        /// Aircraft unit type id.
        aircraft: String,
        /// Number of aircraft housed.
        capacity: u32,
        /// Sortie fuel in milliseconds of flight.
        fuel_ms: u64,
        /// Shots per sortie.
        ammo: u32,
        /// Health restored per second to housed aircraft.
        #[serde(with = "decimal_serde")]
        repair_per_second: Fixed,
    },
    /// Continuous healing of nearby friendly units.
    Aura {
        /// Aura radius.
        #[serde(with = "decimal_serde")]
        radius: Fixed,
        /// Health restored per second.
        #[serde(with = "decimal_serde")]
        heal_per_second: Fixed,
    },
}

impl ModuleData {
    /// Short name for diagnostics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Production { .. } => "production",
            Self::Turret { .. } => "turret",
            Self::Garrison { .. } => "garrison",
            Self::Shield { .. } => "shield",
            Self::Bank { .. } => "bank",
            Self::Harvest { .. } => "harvest",
            Self::Mine { .. } => "mine",
            Self::Heal { .. } => "heal",
            Self::Repair { .. } => "repair",
            Self::Cloak { .. } => "cloak",
            Self::Deploy { .. } => "deploy",
            Self::Hangar { .. } => "hangar",
            Self::Aura { .. } => "aura",
        }
    }

    /// Weapon ids referenced by this template.
    pub fn weapon_refs(&self) -> impl Iterator<Item = &String> {
        let (single, many): (Option<&String>, &[String]) = match self {
            Self::Turret { weapon } => (Some(weapon), &[]),
            Self::Deploy { turrets, .. } => (None, turrets.as_slice()),
            _ => (None, &[]),
        };
        single.into_iter().chain(many.iter())
    }

    /// Whether the module only makes sense on a building.
    #[must_use]
    pub const fn is_building_module(&self) -> bool {
        matches!(
            self,
            Self::Production { .. }
                | Self::Turret { .. }
                | Self::Garrison { .. }
                | Self::Shield { .. }
                | Self::Bank { .. }
                | Self::Hangar { .. }
        )
    }

    /// Whether the module only makes sense on a unit.
    #[must_use]
    pub const fn is_unit_module(&self) -> bool {
        matches!(
            self,
            Self::Harvest { .. }
                | Self::Mine { .. }
                | Self::Heal { .. }
                | Self::Repair { .. }
                | Self::Cloak { .. }
                | Self::Deploy { .. }
        )
    }
}
