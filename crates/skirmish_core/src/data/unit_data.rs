//! Unit data structures for data-driven unit definitions.

use serde::{Deserialize, Serialize};

use super::module_data::ModuleData;
use crate::entity::Elevation;
use crate::math::{decimal_serde, Fixed};

/// Data-driven unit definition.
///
/// # Example RON
///
/// ```ron
/// UnitData(
///     id: "rifle_squad",
///     name: "Rifle Squad",
///     cost: 50,
///     build_time_ms: 4000,
///     health: 80,
///     speed: 3.5,
///     radius: 0.5,
///     weapon: Some("rifle"),
///     tags: ["infantry"],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitData {
    /// Unique string identifier for this unit type.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Resource cost to produce.
    pub cost: u32,

    /// Production time in milliseconds.
    pub build_time_ms: u64,

    /// Maximum health.
    #[serde(with = "decimal_serde")]
    pub health: Fixed,

    /// Movement speed in units per second.
    #[serde(with = "decimal_serde")]
    pub speed: Fixed,

    /// Collision radius.
    #[serde(with = "decimal_serde")]
    pub radius: Fixed,

    /// Altitude class.
    #[serde(default)]
    pub elevation: Elevation,

    /// Weapon template id (None for non-combat units).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weapon: Option<String>,

    /// Behavior modules attached at spawn.
    #[serde(default)]
    pub modules: Vec<ModuleData>,

    /// Tags for role classification (e.g. "infantry", "vehicle", "aircraft").
    #[serde(default)]
    pub tags: Vec<String>,
}

impl UnitData {
    /// Check if this unit has the specified tag.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Check if this unit can engage in combat.
    #[must_use]
    pub fn is_combatant(&self) -> bool {
        self.weapon.is_some()
    }
}
