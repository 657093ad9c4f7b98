//! Per-player match state: resources, power and research.

use tracing::debug;

use crate::data::{FactionData, GameData};
use crate::entity::{PlayerId, Team};
use crate::factions::FactionId;
use crate::modifier::ResearchModifier;
use crate::research::{ResearchError, ResearchKey, ResearchManager};
use crate::world::Census;

/// One seat in a match.
#[derive(Debug, Clone)]
pub struct Player {
    /// Player slot.
    pub id: PlayerId,
    /// Alliance.
    pub team: Team,
    /// Faction played.
    pub faction: FactionId,
    /// Stored resources.
    pub resources: u32,
    /// Research state.
    pub research: ResearchManager,
    /// Consumption exceeds production (refreshed every tick).
    pub low_power: bool,
    /// Highest tier among completed buildings (refreshed every tick).
    pub tier: u8,
    faction_modifier: ResearchModifier,
}

impl Player {
    /// Create a player for a faction.
    #[must_use]
    pub fn new(id: PlayerId, team: Team, faction: &FactionData, resources: u32) -> Self {
        Self {
            id,
            team,
            faction: faction.id.clone(),
            resources,
            research: ResearchManager::new(faction),
            low_power: false,
            tier: 0,
            faction_modifier: faction.stat_multipliers.clone(),
        }
    }

    /// Faction base multipliers combined with cumulative research.
    #[must_use]
    pub fn effective_modifier(&self) -> ResearchModifier {
        self.faction_modifier
            .combine(self.research.cumulative_modifier())
    }

    /// Whether the player holds at least `amount`.
    #[must_use]
    pub fn can_afford(&self, amount: u32) -> bool {
        self.resources >= amount
    }

    /// Pay `amount` if possible.
    pub fn spend(&mut self, amount: u32) -> bool {
        if !self.can_afford(amount) {
            return false;
        }
        self.resources -= amount;
        true
    }

    /// Receive resources.
    pub fn deposit(&mut self, amount: u32) {
        self.resources = self.resources.saturating_add(amount);
    }

    /// Pay for and start research.
    pub fn start_research(
        &mut self,
        id: &str,
        census: &Census,
        data: &GameData,
    ) -> Result<ResearchKey, ResearchError> {
        let ticket = self.research.check(id, census, data)?;
        if !self.spend(ticket.cost) {
            return Err(ResearchError::InsufficientResources {
                cost: ticket.cost,
                available: self.resources,
            });
        }
        debug!(player = self.id.0, research = id, cost = ticket.cost, "Research paid");
        let key = ticket.key.clone();
        self.research.begin(ticket);
        Ok(key)
    }
}
