//! Faction data structure combining all faction-specific definitions.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::building_data::BuildingData;
use super::module_data::ModuleData;
use super::research_data::{StatResearchData, UnitTechData};
use super::unit_data::UnitData;
use super::weapon_data::WeaponData;
use crate::error::{GameError, Result};
use crate::factions::FactionId;
use crate::math::Fixed;
use crate::modifier::ResearchModifier;

/// Complete faction data definition.
///
/// Contains all units, buildings, weapons and both research tracks for a
/// single faction. Loaded from a RON document before any match starts.
///
/// # Example RON
///
/// ```ron
/// FactionData(
///     id: "vanguard",
///     display_name: "Vanguard Coalition",
///     units: [...],
///     buildings: [...],
///     weapons: [...],
///     stat_research: [...],
///     unit_tech: [...],
///     starter_units: ["rifle_squad", "harvester"],
///     production: {"barracks": ["rifle_squad", "medic"]},
///     stat_multipliers: (unit_speed: 1.1),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionData {
    /// Faction identifier.
    pub id: FactionId,

    /// Display name.
    pub display_name: String,

    /// All unit types available to this faction.
    #[serde(default)]
    pub units: Vec<UnitData>,

    /// All building types available to this faction.
    #[serde(default)]
    pub buildings: Vec<BuildingData>,

    /// Weapon templates used by this faction's units, buildings and modules.
    #[serde(default)]
    pub weapons: Vec<WeaponData>,

    /// Building-stat research track.
    #[serde(default)]
    pub stat_research: Vec<StatResearchData>,

    /// Unit-unlock research track.
    #[serde(default)]
    pub unit_tech: Vec<UnitTechData>,

    /// Units available without any research.
    #[serde(default)]
    pub starter_units: Vec<String>,

    /// Building type id to the unit types it can produce.
    #[serde(default)]
    pub production: BTreeMap<String, Vec<String>>,

    /// Faction-wide base multipliers, combined with research.
    #[serde(default)]
    pub stat_multipliers: ResearchModifier,
}

/// Parse a faction from RON text.
///
/// `label` names the source (usually a path) in error messages.
pub fn parse_faction(text: &str, label: &str) -> Result<FactionData> {
    ron::from_str(text).map_err(|e| GameError::DataParse {
        path: label.to_string(),
        message: e.to_string(),
    })
}

impl FactionData {
    /// Find a unit by its ID.
    #[must_use]
    pub fn get_unit(&self, id: &str) -> Option<&UnitData> {
        self.units.iter().find(|u| u.id == id)
    }

    /// Find a building by its ID.
    #[must_use]
    pub fn get_building(&self, id: &str) -> Option<&BuildingData> {
        self.buildings.iter().find(|b| b.id == id)
    }

    /// Find a weapon by its ID.
    #[must_use]
    pub fn get_weapon(&self, id: &str) -> Option<&WeaponData> {
        self.weapons.iter().find(|w| w.id == id)
    }

    /// Find building-stat research by its ID.
    #[must_use]
    pub fn get_stat_research(&self, id: &str) -> Option<&StatResearchData> {
        self.stat_research.iter().find(|r| r.id == id)
    }

    /// Find a unit-unlock node by its ID.
    #[must_use]
    pub fn get_unit_tech(&self, id: &str) -> Option<&UnitTechData> {
        self.unit_tech.iter().find(|t| t.id == id)
    }

    /// Whether `id` names research on either track.
    #[must_use]
    pub fn has_research(&self, id: &str) -> bool {
        self.get_stat_research(id).is_some() || self.get_unit_tech(id).is_some()
    }

    /// Unit types a building type can produce.
    #[must_use]
    pub fn producible_units(&self, building: &str) -> &[String] {
        self.production
            .get(building)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Validate internal consistency of faction data.
    ///
    /// Checks for:
    /// - Duplicate ids within each table
    /// - Dangling unit, building, weapon and research references
    /// - Self-referencing and cyclic research prerequisites
    /// - Modules attached to the wrong kind of entity
    /// - Unusable numeric values
    ///
    /// Returns a list of validation errors.
    #[must_use]
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        self.check_duplicates(&mut errors);
        self.check_entities(&mut errors);
        self.check_production(&mut errors);
        self.check_research(&mut errors);

        for weapon in &self.weapons {
            errors.extend(weapon.validate());
        }

        errors
    }

    fn check_duplicates(&self, errors: &mut Vec<String>) {
        fn dupes<'a>(kind: &str, ids: impl Iterator<Item = &'a str>, errors: &mut Vec<String>) {
            let mut seen = BTreeSet::new();
            for id in ids {
                if !seen.insert(id) {
                    errors.push(format!("Duplicate {kind} '{id}'"));
                }
            }
        }

        dupes("unit", self.units.iter().map(|u| u.id.as_str()), errors);
        dupes("building", self.buildings.iter().map(|b| b.id.as_str()), errors);
        dupes("weapon", self.weapons.iter().map(|w| w.id.as_str()), errors);
        dupes(
            "research",
            self.stat_research
                .iter()
                .map(|r| r.id.as_str())
                .chain(self.unit_tech.iter().map(|t| t.id.as_str())),
            errors,
        );
    }

    fn check_modules(&self, owner: &str, modules: &[ModuleData], is_building: bool, errors: &mut Vec<String>) {
        for module in modules {
            if is_building && module.is_unit_module() {
                errors.push(format!("Building '{owner}' has unit-only module '{}'", module.name()));
            }
            if !is_building && module.is_building_module() {
                errors.push(format!("Unit '{owner}' has building-only module '{}'", module.name()));
            }
            for weapon in module.weapon_refs() {
                if self.get_weapon(weapon).is_none() {
                    errors.push(format!(
                        "'{owner}' module '{}' uses unknown weapon '{weapon}'",
                        module.name()
                    ));
                }
            }
            if let ModuleData::Hangar { aircraft, capacity, .. } = module {
                match self.get_unit(aircraft) {
                    None => errors.push(format!("Hangar '{owner}' houses unknown unit '{aircraft}'")),
                    Some(unit) if !unit.elevation.is_airborne() => errors.push(format!(
                        "Hangar '{owner}' houses ground unit '{aircraft}'"
                    )),
                    Some(_) => {}
                }
                if *capacity == 0 {
                    errors.push(format!("Hangar '{owner}' has zero capacity"));
                }
            }
            if let ModuleData::Bank { interval_ms: 0, .. } = module {
                errors.push(format!("Bank '{owner}' has a zero interval"));
            }
        }
    }

    fn check_entities(&self, errors: &mut Vec<String>) {
        for unit in &self.units {
            if unit.health <= Fixed::ZERO || unit.radius <= Fixed::ZERO {
                errors.push(format!("Unit '{}' needs positive health and radius", unit.id));
            }
            if let Some(weapon) = &unit.weapon {
                if self.get_weapon(weapon).is_none() {
                    errors.push(format!("Unit '{}' uses unknown weapon '{weapon}'", unit.id));
                }
            }
            self.check_modules(&unit.id, &unit.modules, false, errors);
        }

        for building in &self.buildings {
            if building.health <= Fixed::ZERO || building.radius <= Fixed::ZERO {
                errors.push(format!(
                    "Building '{}' needs positive health and radius",
                    building.id
                ));
            }
            if let Some(weapon) = &building.weapon {
                if self.get_weapon(weapon).is_none() {
                    errors.push(format!(
                        "Building '{}' uses unknown weapon '{weapon}'",
                        building.id
                    ));
                }
            }
            for required in &building.requires {
                if self.get_building(required).is_none() {
                    errors.push(format!(
                        "Building '{}' requires unknown building '{required}'",
                        building.id
                    ));
                }
            }
            self.check_modules(&building.id, &building.modules, true, errors);
        }
    }

    fn check_production(&self, errors: &mut Vec<String>) {
        for (building_id, units) in &self.production {
            match self.get_building(building_id) {
                None => errors.push(format!("Production map names unknown building '{building_id}'")),
                Some(building) if !building.is_producer() => errors.push(format!(
                    "Building '{building_id}' produces units but has no production module"
                )),
                Some(_) => {}
            }
            for unit_id in units {
                if self.get_unit(unit_id).is_none() {
                    errors.push(format!(
                        "Building '{building_id}' produces unknown unit '{unit_id}'"
                    ));
                }
            }
        }

        for unit_id in &self.starter_units {
            if self.get_unit(unit_id).is_none() {
                errors.push(format!("Starter unit '{unit_id}' not found"));
            }
        }
    }

    fn check_research(&self, errors: &mut Vec<String>) {
        for research in &self.stat_research {
            if self.get_building(&research.required_building).is_none() {
                errors.push(format!(
                    "Research '{}' requires unknown building '{}'",
                    research.id, research.required_building
                ));
            }
            self.check_prerequisites(&research.id, &research.prerequisites, errors);
        }

        for node in &self.unit_tech {
            self.check_prerequisites(&node.id, &node.prerequisites, errors);

            for exclusive in &node.exclusive_with {
                if exclusive == &node.id {
                    errors.push(format!("Tech '{}' excludes itself", node.id));
                } else if self.get_unit_tech(exclusive).is_none() {
                    errors.push(format!(
                        "Tech '{}' is exclusive with unknown tech '{exclusive}'",
                        node.id
                    ));
                }
            }
            for unit_id in node.unlocks_unit.iter().chain(node.replaces_unit.iter()) {
                if self.get_unit(unit_id).is_none() {
                    errors.push(format!("Tech '{}' references unknown unit '{unit_id}'", node.id));
                }
            }
            if let Some(building) = &node.required_building {
                if self.get_building(building).is_none() {
                    errors.push(format!(
                        "Tech '{}' requires unknown building '{building}'",
                        node.id
                    ));
                }
            }
        }

        if let Some(id) = self.find_prerequisite_cycle() {
            errors.push(format!("Research '{id}' is part of a prerequisite cycle"));
        }
    }

    fn check_prerequisites(&self, id: &str, prerequisites: &[String], errors: &mut Vec<String>) {
        for prereq in prerequisites {
            if prereq == id {
                errors.push(format!("Research '{id}' requires itself"));
            } else if !self.has_research(prereq) {
                errors.push(format!("Research '{id}' has unknown prerequisite '{prereq}'"));
            }
        }
    }

    fn prerequisites_of(&self, id: &str) -> &[String] {
        self.get_stat_research(id)
            .map(|r| r.prerequisites.as_slice())
            .or_else(|| self.get_unit_tech(id).map(|t| t.prerequisites.as_slice()))
            .unwrap_or(&[])
    }

    /// Depth-first search for a cycle through prerequisite edges.
    fn find_prerequisite_cycle(&self) -> Option<String> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            faction: &'a FactionData,
            id: &'a str,
            marks: &mut BTreeMap<&'a str, Mark>,
        ) -> Option<String> {
            match marks.get(id) {
                Some(Mark::Done) => return None,
                Some(Mark::Visiting) => return Some(id.to_string()),
                None => {}
            }
            marks.insert(id, Mark::Visiting);
            for prereq in faction.prerequisites_of(id) {
                if prereq != id && faction.has_research(prereq) {
                    if let Some(found) = visit(faction, prereq, marks) {
                        return Some(found);
                    }
                }
            }
            marks.insert(id, Mark::Done);
            None
        }

        let mut marks = BTreeMap::new();
        self.stat_research
            .iter()
            .map(|r| r.id.as_str())
            .chain(self.unit_tech.iter().map(|t| t.id.as_str()))
            .find_map(|id| visit(self, id, &mut marks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Elevation;

    fn unit(id: &str) -> UnitData {
        UnitData {
            id: id.to_string(),
            name: id.to_string(),
            cost: 50,
            build_time_ms: 1000,
            health: Fixed::from_num(80),
            speed: Fixed::from_num(3),
            radius: Fixed::from_num(0.5),
            elevation: Elevation::Ground,
            weapon: None,
            modules: vec![],
            tags: vec!["infantry".to_string()],
        }
    }

    fn building(id: &str, modules: Vec<ModuleData>) -> BuildingData {
        BuildingData {
            id: id.to_string(),
            name: id.to_string(),
            cost: 100,
            build_time_ms: 5000,
            health: Fixed::from_num(500),
            radius: Fixed::from_num(3),
            power: 0,
            tier: 1,
            requires: vec![],
            weapon: None,
            modules,
            reserve: None,
            tags: vec![],
        }
    }

    fn tech(id: &str, prerequisites: &[&str]) -> UnitTechData {
        UnitTechData {
            id: id.to_string(),
            name: id.to_string(),
            cost: 100,
            duration_ms: 1000,
            prerequisites: prerequisites.iter().map(|s| (*s).to_string()).collect(),
            exclusive_with: vec![],
            unlocks_unit: None,
            replaces_unit: None,
            required_building: None,
            required_tier: 1,
        }
    }

    fn create_test_faction_data() -> FactionData {
        FactionData {
            id: FactionId::new("vanguard"),
            display_name: "Vanguard".to_string(),
            units: vec![unit("rifle_squad")],
            buildings: vec![building(
                "barracks",
                vec![ModuleData::Production { queue_size: 5 }],
            )],
            weapons: vec![],
            stat_research: vec![],
            unit_tech: vec![tech("drill", &[])],
            starter_units: vec!["rifle_squad".to_string()],
            production: BTreeMap::from([(
                "barracks".to_string(),
                vec!["rifle_squad".to_string()],
            )]),
            stat_multipliers: ResearchModifier::IDENTITY,
        }
    }

    #[test]
    fn test_lookups() {
        let faction = create_test_faction_data();
        assert!(faction.get_unit("rifle_squad").is_some());
        assert!(faction.get_building("barracks").is_some());
        assert!(faction.has_research("drill"));
        assert_eq!(faction.producible_units("barracks"), &["rifle_squad".to_string()][..]);
        assert!(faction.producible_units("bunker").is_empty());
    }

    #[test]
    fn test_validate_valid_data() {
        let faction = create_test_faction_data();
        let errors = faction.validate();
        assert!(errors.is_empty(), "Errors: {errors:?}");
    }

    #[test]
    fn test_validate_dangling_production_reference() {
        let mut faction = create_test_faction_data();
        faction
            .production
            .get_mut("barracks")
            .unwrap()
            .push("ghost".to_string());

        let errors = faction.validate();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("unknown unit 'ghost'"));
    }

    #[test]
    fn test_validate_duplicate_ids() {
        let mut faction = create_test_faction_data();
        faction.units.push(unit("rifle_squad"));
        let errors = faction.validate();
        assert!(errors.iter().any(|e| e.contains("Duplicate unit 'rifle_squad'")));
    }

    #[test]
    fn test_validate_prerequisite_problems() {
        let mut faction = create_test_faction_data();
        faction.unit_tech.push(tech("dangling", &["nowhere"]));
        faction.unit_tech.push(tech("selfish", &["selfish"]));
        let errors = faction.validate();
        assert!(errors.iter().any(|e| e.contains("unknown prerequisite 'nowhere'")));
        assert!(errors.iter().any(|e| e.contains("'selfish' requires itself")));
    }

    #[test]
    fn test_validate_prerequisite_cycle() {
        let mut faction = create_test_faction_data();
        faction.unit_tech.push(tech("a", &["b"]));
        faction.unit_tech.push(tech("b", &["a"]));
        let errors = faction.validate();
        assert!(errors.iter().any(|e| e.contains("prerequisite cycle")));
    }

    #[test]
    fn test_validate_misplaced_module() {
        let mut faction = create_test_faction_data();
        faction.units[0].modules.push(ModuleData::Garrison { capacity: 2 });
        let errors = faction.validate();
        assert!(errors.iter().any(|e| e.contains("building-only module 'garrison'")));
    }

    #[test]
    fn test_parse_faction_reports_label() {
        let err = parse_faction("FactionData(", "broken.ron").unwrap_err();
        assert!(err.to_string().contains("broken.ron"));
    }
}
