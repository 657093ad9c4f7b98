//! Tech tree data: building-stat research and unit-unlock nodes.
//!
//! The two kinds of node form independent tracks that share one research
//! queue per player. Prerequisites may point into either track.

use serde::{Deserialize, Serialize};

use crate::modifier::ResearchModifier;

/// Building-stat research: a fixed numeric modifier.
///
/// # Example RON
///
/// ```ron
/// StatResearchData(
///     id: "hardened_rounds",
///     name: "Hardened Rounds",
///     cost: 200,
///     duration_ms: 30000,
///     required_building: "armory",
///     modifier: (projectile_damage: 1.15),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatResearchData {
    /// Unique string identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Resource cost, paid when research starts.
    pub cost: u32,
    /// Research time in milliseconds.
    pub duration_ms: u64,
    /// Research ids (either track) that must be completed first.
    #[serde(default)]
    pub prerequisites: Vec<String>,
    /// Building type that must be standing.
    pub required_building: String,
    /// Effect folded into the cumulative modifier on completion.
    #[serde(default)]
    pub modifier: ResearchModifier,
    /// Completing this adds one concurrent research slot.
    #[serde(default)]
    pub unlocks_research_slot: bool,
}

/// Unit-unlock tech node.
///
/// # Example RON
///
/// ```ron
/// UnitTechData(
///     id: "heavy_armor_doctrine",
///     name: "Heavy Armor Doctrine",
///     cost: 300,
///     duration_ms: 45000,
///     exclusive_with: ["air_doctrine"],
///     unlocks_unit: Some("siege_tank"),
///     required_tier: 2,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitTechData {
    /// Unique string identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Resource cost, paid when research starts.
    pub cost: u32,
    /// Research time in milliseconds.
    pub duration_ms: u64,
    /// Research ids (either track) that must be completed first.
    #[serde(default)]
    pub prerequisites: Vec<String>,
    /// Nodes permanently locked when this one completes.
    #[serde(default)]
    pub exclusive_with: Vec<String>,
    /// Unit type added to the available set.
    #[serde(default)]
    pub unlocks_unit: Option<String>,
    /// Unit type removed from the available set.
    #[serde(default)]
    pub replaces_unit: Option<String>,
    /// Building type that must be standing.
    #[serde(default)]
    pub required_building: Option<String>,
    /// Minimum tech tier among the player's standing buildings.
    #[serde(default = "default_tier")]
    pub required_tier: u8,
}

/// Default tier for nodes without explicit tier.
const fn default_tier() -> u8 {
    1
}

impl StatResearchData {
    /// Check if this research has a specific prerequisite.
    #[must_use]
    pub fn requires(&self, id: &str) -> bool {
        self.prerequisites.iter().any(|p| p == id)
    }
}

impl UnitTechData {
    /// Check if this node has a specific prerequisite.
    #[must_use]
    pub fn requires(&self, id: &str) -> bool {
        self.prerequisites.iter().any(|p| p == id)
    }

    /// Check if completing this node locks another.
    #[must_use]
    pub fn excludes(&self, id: &str) -> bool {
        self.exclusive_with.iter().any(|e| e == id)
    }
}
