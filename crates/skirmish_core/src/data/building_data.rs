//! Building data structures for data-driven building definitions.

use serde::{Deserialize, Serialize};

use super::module_data::ModuleData;
use crate::math::{decimal_serde, Fixed};

/// Data-driven building definition.
///
/// # Example RON
///
/// ```ron
/// BuildingData(
///     id: "barracks",
///     name: "Barracks",
///     cost: 150,
///     build_time_ms: 10000,
///     health: 600,
///     radius: 3,
///     power: -10,
///     modules: [Production()],
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingData {
    /// Unique string identifier for this building type.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Resource cost to place.
    pub cost: u32,

    /// Construction time in milliseconds.
    pub build_time_ms: u64,

    /// Maximum health.
    #[serde(with = "decimal_serde")]
    pub health: Fixed,

    /// Footprint radius.
    #[serde(with = "decimal_serde")]
    pub radius: Fixed,

    /// Signed power: positive produces, negative consumes.
    #[serde(default)]
    pub power: i32,

    /// Tech tier this building grants once complete.
    #[serde(default = "default_tier")]
    pub tier: u8,

    /// Buildings that must already stand before this one may be placed.
    #[serde(default)]
    pub requires: Vec<String>,

    /// Weapon template id fired by the building itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weapon: Option<String>,

    /// Behavior modules attached at spawn.
    #[serde(default)]
    pub modules: Vec<ModuleData>,

    /// Resource reserve, for neutral deposits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserve: Option<u32>,

    /// Tags (e.g. "depot" accepts harvester deliveries).
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Default tier for buildings without explicit tier.
const fn default_tier() -> u8 {
    1
}

impl BuildingData {
    /// Check if this building has the specified tag.
    #[must_use]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Check if this building produces units.
    #[must_use]
    pub fn is_producer(&self) -> bool {
        self.modules
            .iter()
            .any(|m| matches!(m, ModuleData::Production { .. }))
    }
}
