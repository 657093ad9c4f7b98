//! Validated, immutable lookup tables built once per process.
//!
//! [`GameData`] is constructed from every loaded [`FactionData`] before any
//! match starts. Construction fails on the first integrity problem, so a
//! registry that exists is always consistent. Matches share it through an
//! `Arc` and never mutate it.

use std::collections::BTreeMap;

use tracing::info;

use super::building_data::BuildingData;
use super::faction_data::FactionData;
use super::research_data::{StatResearchData, UnitTechData};
use super::unit_data::UnitData;
use super::weapon_data::WeaponData;
use crate::error::{GameError, Result};
use crate::factions::FactionId;

/// Registry of all static configuration.
///
/// Unit, building, weapon and research ids form global namespaces: the same
/// id may not appear in two factions.
#[derive(Debug, Clone, Default)]
pub struct GameData {
    factions: BTreeMap<FactionId, FactionData>,
    units: BTreeMap<String, UnitData>,
    buildings: BTreeMap<String, BuildingData>,
    weapons: BTreeMap<String, WeaponData>,
    stat_research: BTreeMap<String, StatResearchData>,
    unit_tech: BTreeMap<String, UnitTechData>,
    research_faction: BTreeMap<String, FactionId>,
}

fn insert_unique<T: Clone>(
    map: &mut BTreeMap<String, T>,
    kind: &'static str,
    id: &str,
    value: &T,
) -> Result<()> {
    if map.insert(id.to_string(), value.clone()).is_some() {
        return Err(GameError::DuplicateId {
            kind,
            id: id.to_string(),
        });
    }
    Ok(())
}

impl GameData {
    /// Index and validate a set of factions.
    pub fn new(factions: Vec<FactionData>) -> Result<Self> {
        let mut data = Self::default();

        for faction in factions {
            let problems = faction.validate();
            if !problems.is_empty() {
                return Err(GameError::InvalidFactionData {
                    faction: faction.id.to_string(),
                    problems,
                });
            }

            for unit in &faction.units {
                insert_unique(&mut data.units, "unit", &unit.id, unit)?;
            }
            for building in &faction.buildings {
                insert_unique(&mut data.buildings, "building", &building.id, building)?;
            }
            for weapon in &faction.weapons {
                insert_unique(&mut data.weapons, "weapon", &weapon.id, weapon)?;
            }
            for research in &faction.stat_research {
                insert_unique(&mut data.stat_research, "research", &research.id, research)?;
                insert_unique(&mut data.research_faction, "research", &research.id, &faction.id)?;
            }
            for node in &faction.unit_tech {
                insert_unique(&mut data.unit_tech, "research", &node.id, node)?;
                insert_unique(&mut data.research_faction, "research", &node.id, &faction.id)?;
            }

            info!(
                faction = %faction.id,
                units = faction.units.len(),
                buildings = faction.buildings.len(),
                research = faction.stat_research.len() + faction.unit_tech.len(),
                "Faction registered"
            );

            let id = faction.id.clone();
            if data.factions.insert(id.clone(), faction).is_some() {
                return Err(GameError::DuplicateId {
                    kind: "faction",
                    id: id.0,
                });
            }
        }

        Ok(data)
    }

    /// Look up a faction.
    pub fn faction(&self, id: &FactionId) -> Result<&FactionData> {
        self.factions
            .get(id)
            .ok_or_else(|| GameError::FactionNotFound(id.to_string()))
    }

    /// All registered factions in id order.
    pub fn factions(&self) -> impl Iterator<Item = &FactionData> {
        self.factions.values()
    }

    /// Look up a unit type.
    #[must_use]
    pub fn unit(&self, id: &str) -> Option<&UnitData> {
        self.units.get(id)
    }

    /// Look up a unit type, treating absence as an integrity failure.
    pub fn require_unit(&self, id: &str) -> Result<&UnitData> {
        self.unit(id).ok_or_else(|| GameError::UnknownType {
            kind: "unit",
            id: id.to_string(),
        })
    }

    /// Look up a building type.
    #[must_use]
    pub fn building(&self, id: &str) -> Option<&BuildingData> {
        self.buildings.get(id)
    }

    /// Look up a building type, treating absence as an integrity failure.
    pub fn require_building(&self, id: &str) -> Result<&BuildingData> {
        self.building(id).ok_or_else(|| GameError::UnknownType {
            kind: "building",
            id: id.to_string(),
        })
    }

    /// Look up a weapon template.
    #[must_use]
    pub fn weapon(&self, id: &str) -> Option<&WeaponData> {
        self.weapons.get(id)
    }

    /// Look up a weapon template, treating absence as an integrity failure.
    pub fn require_weapon(&self, id: &str) -> Result<&WeaponData> {
        self.weapon(id).ok_or_else(|| GameError::UnknownType {
            kind: "weapon",
            id: id.to_string(),
        })
    }

    /// Look up building-stat research.
    #[must_use]
    pub fn stat_research(&self, id: &str) -> Option<&StatResearchData> {
        self.stat_research.get(id)
    }

    /// Look up a unit-unlock node.
    #[must_use]
    pub fn unit_tech(&self, id: &str) -> Option<&UnitTechData> {
        self.unit_tech.get(id)
    }

    /// Faction that owns a research id (either track).
    #[must_use]
    pub fn research_faction(&self, id: &str) -> Option<&FactionId> {
        self.research_faction.get(id)
    }

    /// Unit types a faction's building type can produce.
    #[must_use]
    pub fn producible_units(&self, faction: &FactionId, building: &str) -> &[String] {
        self.factions
            .get(faction)
            .map(|f| f.producible_units(building))
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Fixed;
    use crate::modifier::ResearchModifier;

    fn faction(id: &str, unit_ids: &[&str]) -> FactionData {
        FactionData {
            id: FactionId::new(id),
            display_name: id.to_string(),
            units: unit_ids
                .iter()
                .map(|u| UnitData {
                    id: (*u).to_string(),
                    name: (*u).to_string(),
                    cost: 10,
                    build_time_ms: 100,
                    health: Fixed::from_num(10),
                    speed: Fixed::ONE,
                    radius: Fixed::ONE,
                    elevation: crate::entity::Elevation::Ground,
                    weapon: None,
                    modules: vec![],
                    tags: vec![],
                })
                .collect(),
            buildings: vec![],
            weapons: vec![],
            stat_research: vec![],
            unit_tech: vec![],
            starter_units: vec![],
            production: BTreeMap::new(),
            stat_multipliers: ResearchModifier::IDENTITY,
        }
    }

    #[test]
    fn test_registry_indexes_factions() {
        let data = GameData::new(vec![faction("a", &["scout"]), faction("b", &["tank"])]).unwrap();
        assert!(data.unit("scout").is_some());
        assert!(data.unit("tank").is_some());
        assert!(data.faction(&FactionId::new("a")).is_ok());
        assert!(matches!(
            data.faction(&FactionId::new("zzz")),
            Err(GameError::FactionNotFound(_))
        ));
        assert!(matches!(
            data.require_unit("ghost"),
            Err(GameError::UnknownType { kind: "unit", .. })
        ));
    }

    #[test]
    fn test_registry_rejects_cross_faction_duplicates() {
        let result = GameData::new(vec![faction("a", &["scout"]), faction("b", &["scout"])]);
        assert!(matches!(result, Err(GameError::DuplicateId { kind: "unit", .. })));
    }

    #[test]
    fn test_registry_rejects_duplicate_faction() {
        let result = GameData::new(vec![faction("a", &[]), faction("a", &[])]);
        assert!(matches!(result, Err(GameError::DuplicateId { kind: "faction", .. })));
    }

    #[test]
    fn test_registry_rejects_invalid_faction() {
        let mut bad = faction("a", &[]);
        bad.starter_units.push("ghost".to_string());
        let result = GameData::new(vec![bad]);
        assert!(matches!(result, Err(GameError::InvalidFactionData { .. })));
    }
}
