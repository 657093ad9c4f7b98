//! Dual-track research and tech gating.
//!
//! Each player owns one [`ResearchManager`]. Building-stat research and
//! unit-unlock tech share a single queue of active entries bounded by
//! [`ResearchManager::max_simultaneous_research`].
//!
//! ## State machine
//!
//! Every research id is in at most one of `active`, `completed`, `locked`:
//! - `eligible -> active -> completed` for both tracks
//! - completing a unit-unlock node moves every id in its `exclusive_with`
//!   list to `locked`, cancelling it if it was active
//! - `locked` and `completed` are terminal
//!
//! ## Caches
//!
//! The cumulative modifier is the fold of every completed stat research and
//! is recomputed only when a stat research completes. The available-unit
//! set (starters plus unlocks, minus replacements) is recomputed eagerly on
//! every unit-unlock completion, so it is never stale when read.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::data::{FactionData, GameData};
use crate::factions::FactionId;
use crate::modifier::ResearchModifier;
use crate::world::Census;

/// Identifies a research entry and the track it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResearchKey {
    /// Building-stat research.
    Stat(String),
    /// Unit-unlock tech node.
    Unit(String),
}

impl ResearchKey {
    /// The research id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Stat(id) | Self::Unit(id) => id,
        }
    }
}

impl std::fmt::Display for ResearchKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stat(id) => write!(f, "stat:{id}"),
            Self::Unit(id) => write!(f, "unit:{id}"),
        }
    }
}

/// Progress of one active research.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActiveResearch {
    /// Which research.
    pub key: ResearchKey,
    /// Time accumulated so far.
    pub elapsed_ms: u64,
    /// Time required to complete.
    pub required_ms: u64,
}

/// Why research could not be started.
///
/// Expected gameplay outcomes; callers absorb these into a `bool`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResearchError {
    /// No research with this id exists for the player's faction.
    #[error("unknown research '{0}'")]
    Unknown(String),
    /// Already completed.
    #[error("research '{0}' already completed")]
    AlreadyCompleted(String),
    /// Already in progress.
    #[error("research '{0}' already active")]
    AlreadyActive(String),
    /// Foreclosed by a mutually exclusive sibling.
    #[error("research '{0}' is locked")]
    Locked(String),
    /// A prerequisite is not completed.
    #[error("research '{id}' requires '{missing}'")]
    MissingPrerequisite {
        /// Research requested.
        id: String,
        /// First prerequisite not completed.
        missing: String,
    },
    /// The required building is not standing.
    #[error("research '{id}' requires building '{building}'")]
    MissingBuilding {
        /// Research requested.
        id: String,
        /// Required building type.
        building: String,
    },
    /// The player's tech tier is too low.
    #[error("research '{id}' requires tier {required}, player has {current}")]
    TierTooLow {
        /// Research requested.
        id: String,
        /// Tier required.
        required: u8,
        /// Tier held.
        current: u8,
    },
    /// Every research slot is busy.
    #[error("all {0} research slots are busy")]
    AtCapacity(usize),
    /// The player cannot pay.
    #[error("research costs {cost}, player has {available}")]
    InsufficientResources {
        /// Cost of the research.
        cost: u32,
        /// Resources held.
        available: u32,
    },
}

/// A research that passed every eligibility check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchTicket {
    /// Which research.
    pub key: ResearchKey,
    /// Resource cost.
    pub cost: u32,
    /// Duration.
    pub duration_ms: u64,
}

/// Per-player research state.
#[derive(Debug, Clone)]
pub struct ResearchManager {
    faction: FactionId,
    starter_units: BTreeSet<String>,
    completed_stat: BTreeSet<String>,
    completed_units: BTreeSet<String>,
    locked: BTreeSet<String>,
    active: BTreeMap<String, ActiveResearch>,
    slot_unlocks: usize,
    cumulative: ResearchModifier,
    available_units: BTreeSet<String>,
}

impl ResearchManager {
    /// Fresh research state for a faction: nothing researched, starter
    /// units available.
    #[must_use]
    pub fn new(faction: &FactionData) -> Self {
        let starter_units: BTreeSet<String> = faction.starter_units.iter().cloned().collect();
        Self {
            faction: faction.id.clone(),
            available_units: starter_units.clone(),
            starter_units,
            completed_stat: BTreeSet::new(),
            completed_units: BTreeSet::new(),
            locked: BTreeSet::new(),
            active: BTreeMap::new(),
            slot_unlocks: 0,
            cumulative: ResearchModifier::IDENTITY,
        }
    }

    /// Faction whose tech tree this manager walks.
    #[must_use]
    pub fn faction(&self) -> &FactionId {
        &self.faction
    }

    // ========================================
    // Queries
    // ========================================

    /// Concurrent research cap: one plus one per completed slot unlock.
    #[must_use]
    pub fn max_simultaneous_research(&self) -> usize {
        1 + self.slot_unlocks
    }

    /// Whether a research id (either track) is completed.
    #[must_use]
    pub fn is_completed(&self, id: &str) -> bool {
        self.completed_stat.contains(id) || self.completed_units.contains(id)
    }

    /// Whether a research id is in progress.
    #[must_use]
    pub fn is_active(&self, id: &str) -> bool {
        self.active.contains_key(id)
    }

    /// Whether a research id has been foreclosed.
    #[must_use]
    pub fn is_locked(&self, id: &str) -> bool {
        self.locked.contains(id)
    }

    /// Completed building-stat research ids.
    #[must_use]
    pub fn completed_stat(&self) -> &BTreeSet<String> {
        &self.completed_stat
    }

    /// Completed unit-unlock ids.
    #[must_use]
    pub fn completed_units(&self) -> &BTreeSet<String> {
        &self.completed_units
    }

    /// Locked ids.
    #[must_use]
    pub fn locked(&self) -> &BTreeSet<String> {
        &self.locked
    }

    /// Active entries in id order.
    pub fn active(&self) -> impl Iterator<Item = &ActiveResearch> {
        self.active.values()
    }

    /// `(elapsed, required)` of an active research.
    #[must_use]
    pub fn progress(&self, id: &str) -> Option<(u64, u64)> {
        self.active.get(id).map(|a| (a.elapsed_ms, a.required_ms))
    }

    /// Fold of every completed building-stat modifier.
    #[must_use]
    pub fn cumulative_modifier(&self) -> &ResearchModifier {
        &self.cumulative
    }

    /// Unit types the player may currently produce.
    #[must_use]
    pub fn available_units(&self) -> &BTreeSet<String> {
        &self.available_units
    }

    /// Whether a unit type is currently available.
    #[must_use]
    pub fn is_unit_available(&self, unit: &str) -> bool {
        self.available_units.contains(unit)
    }

    // ========================================
    // Eligibility
    // ========================================

    /// Resolve a research id to its track, if it belongs to this faction.
    #[must_use]
    pub fn key_for(&self, id: &str, data: &GameData) -> Option<ResearchKey> {
        if data.research_faction(id) != Some(&self.faction) {
            return None;
        }
        if data.stat_research(id).is_some() {
            Some(ResearchKey::Stat(id.to_string()))
        } else if data.unit_tech(id).is_some() {
            Some(ResearchKey::Unit(id.to_string()))
        } else {
            None
        }
    }

    /// Check whether a research can start now.
    pub fn check(
        &self,
        id: &str,
        census: &Census,
        data: &GameData,
    ) -> Result<ResearchTicket, ResearchError> {
        let key = self
            .key_for(id, data)
            .ok_or_else(|| ResearchError::Unknown(id.to_string()))?;

        if self.is_completed(id) {
            return Err(ResearchError::AlreadyCompleted(id.to_string()));
        }
        if self.is_active(id) {
            return Err(ResearchError::AlreadyActive(id.to_string()));
        }
        if self.is_locked(id) {
            return Err(ResearchError::Locked(id.to_string()));
        }

        let (prerequisites, building, tier, cost, duration_ms) = match &key {
            ResearchKey::Stat(_) => {
                let node = data
                    .stat_research(id)
                    .ok_or_else(|| ResearchError::Unknown(id.to_string()))?;
                (
                    &node.prerequisites,
                    Some(&node.required_building),
                    1,
                    node.cost,
                    node.duration_ms,
                )
            }
            ResearchKey::Unit(_) => {
                let node = data
                    .unit_tech(id)
                    .ok_or_else(|| ResearchError::Unknown(id.to_string()))?;
                (
                    &node.prerequisites,
                    node.required_building.as_ref(),
                    node.required_tier,
                    node.cost,
                    node.duration_ms,
                )
            }
        };

        if let Some(missing) = prerequisites.iter().find(|p| !self.is_completed(p)) {
            return Err(ResearchError::MissingPrerequisite {
                id: id.to_string(),
                missing: missing.clone(),
            });
        }
        if let Some(building) = building {
            if !census.building_types.contains(building) {
                return Err(ResearchError::MissingBuilding {
                    id: id.to_string(),
                    building: building.clone(),
                });
            }
        }
        if census.tier < tier {
            return Err(ResearchError::TierTooLow {
                id: id.to_string(),
                required: tier,
                current: census.tier,
            });
        }
        if self.active.len() >= self.max_simultaneous_research() {
            return Err(ResearchError::AtCapacity(self.max_simultaneous_research()));
        }

        Ok(ResearchTicket {
            key,
            cost,
            duration_ms,
        })
    }

    /// Whether a research can start now.
    #[must_use]
    pub fn can_start(&self, id: &str, census: &Census, data: &GameData) -> bool {
        self.check(id, census, data).is_ok()
    }

    /// Start research from a ticket produced by [`Self::check`].
    pub fn begin(&mut self, ticket: ResearchTicket) {
        let id = ticket.key.id().to_string();
        debug!(faction = %self.faction, research = %ticket.key, "Research started");
        self.active.insert(
            id,
            ActiveResearch {
                key: ticket.key,
                elapsed_ms: 0,
                required_ms: ticket.duration_ms,
            },
        );
    }

    /// Check and start in one step, ignoring cost.
    pub fn start(
        &mut self,
        id: &str,
        census: &Census,
        data: &GameData,
    ) -> Result<ResearchKey, ResearchError> {
        let ticket = self.check(id, census, data)?;
        let key = ticket.key.clone();
        self.begin(ticket);
        Ok(key)
    }

    /// Drop an active research; its progress is discarded.
    pub fn cancel(&mut self, id: &str) -> bool {
        let removed = self.active.remove(id).is_some();
        if removed {
            debug!(faction = %self.faction, research = id, "Research cancelled");
        }
        removed
    }

    /// Stat research the player could start right now, in id order.
    #[must_use]
    pub fn eligible_stat_research(&self, census: &Census, data: &GameData) -> Vec<String> {
        data.faction(&self.faction)
            .map(|f| {
                f.stat_research
                    .iter()
                    .filter(|r| self.can_start(&r.id, census, data))
                    .map(|r| r.id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Unit tech the player could start right now, in id order.
    #[must_use]
    pub fn eligible_unit_tech(&self, census: &Census, data: &GameData) -> Vec<String> {
        data.faction(&self.faction)
            .map(|f| {
                f.unit_tech
                    .iter()
                    .filter(|t| self.can_start(&t.id, census, data))
                    .map(|t| t.id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    // ========================================
    // Progress
    // ========================================

    /// Advance every active research by `dt_ms`.
    ///
    /// Returns the research completed this call, in id order. A research
    /// locked by a sibling completing earlier in the same call does not
    /// complete.
    pub fn advance(&mut self, dt_ms: u64, data: &GameData) -> Vec<ResearchKey> {
        let mut finished = Vec::new();
        for (id, entry) in &mut self.active {
            entry.elapsed_ms = entry.elapsed_ms.saturating_add(dt_ms);
            if entry.elapsed_ms >= entry.required_ms {
                finished.push(id.clone());
            }
        }

        let mut completed = Vec::new();
        for id in finished {
            let Some(entry) = self.active.remove(&id) else {
                continue;
            };
            self.complete(&entry.key, data);
            completed.push(entry.key);
        }
        completed
    }

    fn complete(&mut self, key: &ResearchKey, data: &GameData) {
        match key {
            ResearchKey::Stat(id) => {
                self.completed_stat.insert(id.clone());
                if data.stat_research(id).is_some_and(|r| r.unlocks_research_slot) {
                    self.slot_unlocks += 1;
                }
                self.recompute_modifier(data);
                info!(faction = %self.faction, research = %id, "Stat research completed");
            }
            ResearchKey::Unit(id) => {
                self.completed_units.insert(id.clone());
                if let Some(node) = data.unit_tech(id) {
                    for sibling in &node.exclusive_with {
                        if self.is_completed(sibling) {
                            continue;
                        }
                        self.active.remove(sibling);
                        if self.locked.insert(sibling.clone()) {
                            info!(faction = %self.faction, locked = %sibling, by = %id, "Research branch locked");
                        }
                    }
                }
                self.recompute_available_units(data);
                info!(faction = %self.faction, research = %id, "Unit tech completed");
            }
        }
    }

    fn recompute_modifier(&mut self, data: &GameData) {
        self.cumulative = ResearchModifier::fold(
            self.completed_stat
                .iter()
                .filter_map(|id| data.stat_research(id))
                .map(|r| &r.modifier),
        );
    }

    fn recompute_available_units(&mut self, data: &GameData) {
        let nodes: Vec<_> = self
            .completed_units
            .iter()
            .filter_map(|id| data.unit_tech(id))
            .collect();

        let mut available = self.starter_units.clone();
        available.extend(nodes.iter().filter_map(|n| n.unlocks_unit.clone()));
        for node in &nodes {
            if let Some(replaced) = &node.replaces_unit {
                available.remove(replaced);
            }
        }
        self.available_units = available;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Fixed;
    use crate::test_data::sample_data;

    fn census(buildings: &[&str], tier: u8) -> Census {
        Census {
            building_types: buildings.iter().map(|b| (*b).to_string()).collect(),
            tier,
            ..Census::default()
        }
    }

    fn manager(data: &GameData) -> ResearchManager {
        ResearchManager::new(data.faction(&FactionId::new("sample")).unwrap())
    }

    #[test]
    fn test_starts_with_starters_and_single_slot() {
        let data = sample_data();
        let research = manager(&data);
        assert_eq!(research.max_simultaneous_research(), 1);
        assert!(research.is_unit_available("rifle_squad"));
        assert!(!research.is_unit_available("tank"));
        assert!(research.cumulative_modifier().is_identity());
    }

    #[test]
    fn test_requires_building_and_prerequisites() {
        let data = sample_data();
        let mut research = manager(&data);

        assert_eq!(
            research.check("hardened_rounds", &census(&[], 1), &data),
            Err(ResearchError::MissingBuilding {
                id: "hardened_rounds".to_string(),
                building: "lab".to_string(),
            })
        );
        let lab = census(&["lab"], 1);
        assert!(matches!(
            research.check("tungsten_cores", &lab, &data),
            Err(ResearchError::MissingPrerequisite { .. })
        ));
        assert!(matches!(
            research.check("no_such_thing", &lab, &data),
            Err(ResearchError::Unknown(_))
        ));

        research.start("hardened_rounds", &lab, &data).unwrap();
        assert!(matches!(
            research.check("hardened_rounds", &lab, &data),
            Err(ResearchError::AlreadyActive(_))
        ));
        research.advance(1000, &data);
        assert!(research.is_completed("hardened_rounds"));
        assert!(research.can_start("tungsten_cores", &lab, &data));
    }

    #[test]
    fn test_cap_rejects_second_start() {
        let data = sample_data();
        let mut research = manager(&data);
        let lab = census(&["lab"], 1);
        research.start("hardened_rounds", &lab, &data).unwrap();
        assert_eq!(
            research.start("parallel_labs", &lab, &data),
            Err(ResearchError::AtCapacity(1))
        );
    }

    #[test]
    fn test_slot_unlocks_stack() {
        let data = sample_data();
        let mut research = manager(&data);
        let lab = census(&["lab"], 1);

        research.start("parallel_labs", &lab, &data).unwrap();
        research.advance(1000, &data);
        assert_eq!(research.max_simultaneous_research(), 2);

        research.start("research_grid", &lab, &data).unwrap();
        research.start("hardened_rounds", &lab, &data).unwrap();
        research.advance(1000, &data);
        assert_eq!(research.max_simultaneous_research(), 3);
    }

    #[test]
    fn test_cumulative_modifier_is_exact_product() {
        let data = sample_data();
        let mut research = manager(&data);
        let lab = census(&["lab"], 1);

        research.start("hardened_rounds", &lab, &data).unwrap();
        research.advance(1000, &data);
        research.start("tungsten_cores", &lab, &data).unwrap();
        research.advance(999, &data);
        assert_eq!(research.progress("tungsten_cores"), Some((999, 1000)));
        let completed = research.advance(1, &data);
        assert_eq!(completed, vec![ResearchKey::Stat("tungsten_cores".to_string())]);

        let expected = Fixed::from_num(1.15) * Fixed::from_num(1.12);
        assert_eq!(research.cumulative_modifier().projectile_damage, expected);
        let as_float: f64 = expected.to_num();
        assert!((as_float - 1.288).abs() < 1e-6);
    }

    #[test]
    fn test_exclusive_sibling_locked_forever() {
        let data = sample_data();
        let mut research = manager(&data);
        let factory = census(&["factory"], 2);

        assert!(research.can_start("air_doctrine", &factory, &data));
        research.start("armor_doctrine", &factory, &data).unwrap();
        research.advance(2000, &data);

        assert!(research.is_locked("air_doctrine"));
        assert_eq!(
            research.check("air_doctrine", &factory, &data),
            Err(ResearchError::Locked("air_doctrine".to_string()))
        );
        assert!(research.is_unit_available("tank"));
        assert!(!research.is_unit_available("gunship"));
        assert!(!research.eligible_unit_tech(&factory, &data).contains(&"air_doctrine".to_string()));
    }

    #[test]
    fn test_tier_gate() {
        let data = sample_data();
        let research = manager(&data);
        assert!(matches!(
            research.check("armor_doctrine", &census(&["factory"], 1), &data),
            Err(ResearchError::TierTooLow { required: 2, current: 1, .. })
        ));
    }

    #[test]
    fn test_replacement_removes_unit() {
        let data = sample_data();
        let mut research = manager(&data);
        let factory = census(&["factory"], 2);

        research.start("armor_doctrine", &factory, &data).unwrap();
        research.advance(2000, &data);
        research.start("heavy_armor", &factory, &data).unwrap();
        research.advance(2000, &data);

        assert!(research.is_unit_available("heavy_tank"));
        assert!(!research.is_unit_available("tank"));
        assert!(research.is_unit_available("rifle_squad"));
    }

    #[test]
    fn test_cancel_discards_progress() {
        let data = sample_data();
        let mut research = manager(&data);
        let lab = census(&["lab"], 1);

        research.start("hardened_rounds", &lab, &data).unwrap();
        research.advance(600, &data);
        assert!(research.cancel("hardened_rounds"));
        assert!(!research.cancel("hardened_rounds"));

        research.start("hardened_rounds", &lab, &data).unwrap();
        assert_eq!(research.progress("hardened_rounds"), Some((0, 1000)));
    }

    #[test]
    fn test_eligible_listing() {
        let data = sample_data();
        let research = manager(&data);
        let eligible = research.eligible_stat_research(&census(&["lab"], 1), &data);
        assert!(eligible.contains(&"hardened_rounds".to_string()));
        assert!(!eligible.contains(&"tungsten_cores".to_string()));
        assert!(!eligible.contains(&"deep_vaults".to_string()));
    }
}
