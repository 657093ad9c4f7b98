//! Static faction configuration.
//!
//! This module contains pure data structures that define faction units,
//! buildings, weapons and both research tracks, plus the validated
//! [`GameData`] registry built from them. All structs are designed to be
//! deserialized from RON files.
//!
//! **Note:** This module contains no IO - it only parses text handed to it.
//! File loading is handled by `skirmish_tools` or the hosting process.

mod building_data;
mod faction_data;
mod module_data;
mod registry;
mod research_data;
mod unit_data;
mod weapon_data;

pub use building_data::BuildingData;
pub use faction_data::{parse_faction, FactionData};
pub use module_data::ModuleData;
pub use registry::GameData;
pub use research_data::{StatResearchData, UnitTechData};
pub use unit_data::UnitData;
pub use weapon_data::{AreaEffectData, SpreadPattern, WeaponData, WeaponKind};
