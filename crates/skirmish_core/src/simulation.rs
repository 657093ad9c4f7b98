//! Per-match tick orchestrator.
//!
//! A [`Match`] owns one Entity World, its players and a random stream, and
//! advances all of them together in [`Match::tick`].
//!
//! # Tick order
//!
//! 1. Queued player commands, in arrival order
//! 2. Research progress and newly completed modifiers
//! 3. Construction, then power and tier
//! 4. Behavior module updates (buildings, then units)
//! 5. Movement orders become velocities
//! 6. Unit weapons acquire and fire
//! 7. Ordnance steering, physics step, projectile impacts, area damage
//! 8. Hangar docking
//! 9. Sweep of inactive entities
//!
//! Research runs before modules so a completed modifier is already in
//! force for the production and combat of the same tick.
//!
//! # Determinism
//!
//! - No floating-point math (uses fixed-point via [`Fixed`](crate::math::Fixed))
//! - Randomness only from the match's seeded ChaCha stream
//! - Every collection is visited in id order
//! - Same data, config and command stream always produce the same state

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, BTreeSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::behavior::{self, ModuleCtx};
use crate::combat::{area_effect_system, combat_system, projectile_system, seeking_system};
use crate::command::{self, apply_command, PlayerCommand};
use crate::data::GameData;
use crate::entity::{EntityId, PlayerId, Team};
use crate::error::{GameError, Result};
use crate::factions::FactionId;
use crate::math::{decimal_serde, Fixed, Vec2Fixed};
use crate::notification::NotificationSink;
use crate::physics::Physics;
use crate::player::Player;
use crate::research::ResearchKey;
use crate::systems::{
    construction_system, housing_system, module_system, movement_system, physics_system,
    power_system, research_system, sweep_system,
};
use crate::world::{DamageEvent, EntityWorld, WorldSettings};

/// Tunables of one match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// Seed of the match random stream.
    pub seed: u64,
    /// Resources each player starts with.
    pub starting_resources: u32,
    /// Distance within which cloaked entities are visible to an observer.
    #[serde(with = "decimal_serde")]
    pub cloak_detection_radius: Fixed,
    /// How long a resolved beam stays drawn.
    pub beam_display_ms: u64,
    /// Extra reach added to projectile collision checks.
    #[serde(with = "decimal_serde")]
    pub projectile_hit_slack: Fixed,
    /// Angular probes tried when looking for a free spawn point.
    pub spawn_probe_count: u32,
    /// Edge gap at which a returning aircraft lands.
    #[serde(with = "decimal_serde")]
    pub hangar_dock_radius: Fixed,
    /// Edge gap within which a unit may enter a garrison.
    #[serde(with = "decimal_serde")]
    pub garrison_entry_range: Fixed,
    /// Reach of the secondary arc of electric ordnance.
    #[serde(with = "decimal_serde")]
    pub electric_chain_radius: Fixed,
}

impl Default for MatchConfig {
    fn default() -> Self {
        let world = WorldSettings::default();
        Self {
            seed: 0,
            starting_resources: 1000,
            cloak_detection_radius: world.cloak_detection_radius,
            beam_display_ms: world.beam_display_ms,
            projectile_hit_slack: world.projectile_hit_slack,
            spawn_probe_count: world.spawn_probe_count,
            hangar_dock_radius: Fixed::ONE,
            garrison_entry_range: Fixed::from_num(2),
            electric_chain_radius: Fixed::from_num(4),
        }
    }
}

impl MatchConfig {
    /// Parse a config from RON.
    pub fn from_ron(text: &str) -> Result<Self> {
        ron::from_str(text).map_err(|e| GameError::DataParse {
            path: "match config".to_string(),
            message: e.to_string(),
        })
    }

    /// The subset the Entity World needs.
    #[must_use]
    pub fn world_settings(&self) -> WorldSettings {
        WorldSettings {
            cloak_detection_radius: self.cloak_detection_radius,
            beam_display_ms: self.beam_display_ms,
            projectile_hit_slack: self.projectile_hit_slack,
            spawn_probe_count: self.spawn_probe_count,
        }
    }
}

/// Everything that happened during one tick.
#[derive(Debug, Clone, Default)]
pub struct TickReport {
    /// Tick number (1 for the first tick).
    pub tick: u64,
    /// Simulation time at the end of the tick.
    pub now_ms: u64,
    /// Damage applied, in application order.
    pub damage: Vec<DamageEvent>,
    /// Entities removed by the sweep.
    pub deaths: Vec<EntityId>,
    /// Units and buildings created.
    pub spawned: Vec<EntityId>,
    /// Research that finished.
    pub research_completed: Vec<(PlayerId, ResearchKey)>,
    /// Commands that were refused, with the reason.
    pub rejected_commands: Vec<(PlayerId, String)>,
}

type Phase = fn(&mut ModuleCtx<'_>);

/// Systems after command processing, in execution order.
const TICK_PHASES: [(&str, Phase); 12] = [
    ("research", research_system),
    ("construction", construction_system),
    ("power", power_system),
    ("modules", module_system),
    ("movement", movement_system),
    ("combat", combat_system),
    ("seeking", seeking_phase),
    ("physics", physics_system),
    ("projectiles", projectile_system),
    ("area effects", area_effect_phase),
    ("housing", housing_system),
    ("sweep", sweep_system),
];

fn seeking_phase(ctx: &mut ModuleCtx<'_>) {
    seeking_system(ctx.world);
}

fn area_effect_phase(ctx: &mut ModuleCtx<'_>) {
    area_effect_system(ctx.world, ctx.dt_ms, ctx.now_ms);
}

/// One running match.
pub struct Match {
    data: Arc<GameData>,
    config: MatchConfig,
    world: EntityWorld,
    players: BTreeMap<PlayerId, Player>,
    notifications: Box<dyn NotificationSink>,
    rng: ChaCha8Rng,
    pending: Vec<(PlayerId, PlayerCommand)>,
    tick: u64,
    now_ms: u64,
    game_over: bool,
}

impl Match {
    /// Create an empty match.
    #[must_use]
    pub fn new(
        data: Arc<GameData>,
        config: MatchConfig,
        physics: Box<dyn Physics>,
        notifications: Box<dyn NotificationSink>,
    ) -> Self {
        let world = EntityWorld::new(physics, config.world_settings());
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self {
            data,
            config,
            world,
            players: BTreeMap::new(),
            notifications,
            rng,
            pending: Vec::new(),
            tick: 0,
            now_ms: 0,
            game_over: false,
        }
    }

    // ========================================
    // Accessors
    // ========================================

    /// Shared static data.
    #[must_use]
    pub fn data(&self) -> &Arc<GameData> {
        &self.data
    }

    /// Match tunables.
    #[must_use]
    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    /// Live entities.
    #[must_use]
    pub fn world(&self) -> &EntityWorld {
        &self.world
    }

    /// Live entities, mutably.
    pub fn world_mut(&mut self) -> &mut EntityWorld {
        &mut self.world
    }

    /// A player.
    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// A player, mutably.
    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    /// All players in id order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Ticks run so far.
    #[must_use]
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Simulation clock.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    // ========================================
    // Players
    // ========================================

    /// Seat a player.
    pub fn add_player(&mut self, id: PlayerId, team: Team, faction: &FactionId) -> Result<()> {
        if id == PlayerId::NEUTRAL || self.players.contains_key(&id) {
            return Err(GameError::DuplicateId {
                kind: "player",
                id: id.0.to_string(),
            });
        }
        let faction_data = self.data.faction(faction)?;
        let player = Player::new(id, team, faction_data, self.config.starting_resources);
        self.players.insert(id, player);
        info!(player = id.0, team = team.0, faction = %faction, "Player joined");
        Ok(())
    }

    /// Remove a player and flag everything they own for destruction.
    pub fn remove_player(&mut self, id: PlayerId) -> bool {
        if self.players.remove(&id).is_none() {
            return false;
        }
        for entity in self.world.owned_by(id) {
            self.destroy(entity);
        }
        self.pending.retain(|(player, _)| *player != id);
        info!(player = id.0, "Player left");
        true
    }

    // ========================================
    // Entities
    // ========================================

    /// Create a completed building, for match setup.
    pub fn spawn_building(
        &mut self,
        owner: PlayerId,
        type_id: &str,
        position: Vec2Fixed,
    ) -> Result<EntityId> {
        self.require_owner(owner)?;
        self.outside_tick(|ctx| behavior::spawn_building(ctx, type_id, owner, position, true))
    }

    /// Create a unit, for match setup.
    pub fn spawn_unit(
        &mut self,
        owner: PlayerId,
        type_id: &str,
        position: Vec2Fixed,
    ) -> Result<EntityId> {
        self.require_owner(owner)?;
        self.outside_tick(|ctx| behavior::spawn_unit(ctx, type_id, owner, position))
    }

    /// Pay for a building and lay it down under construction.
    ///
    /// Returns `None` when the placement is refused.
    pub fn place_building(
        &mut self,
        owner: PlayerId,
        type_id: &str,
        position: Vec2Fixed,
    ) -> Option<EntityId> {
        let placed = self
            .outside_tick(|ctx| Ok(command::place_building(ctx, owner, type_id, position)))
            .ok()?;
        match placed {
            Ok(id) => Some(id),
            Err(error) => {
                debug!(player = owner.0, kind = type_id, %error, "Placement refused");
                None
            }
        }
    }

    /// Flag an entity for destruction at the end of the next tick.
    pub fn destroy(&mut self, id: EntityId) -> bool {
        match self.world.core_mut(id) {
            Some(core) if core.active => {
                core.active = false;
                true
            }
            _ => false,
        }
    }

    fn require_owner(&self, owner: PlayerId) -> Result<()> {
        if owner == PlayerId::NEUTRAL || self.players.contains_key(&owner) {
            Ok(())
        } else {
            Err(GameError::PlayerNotFound(owner.0))
        }
    }

    /// Run `f` with a context at the current time, outside any tick.
    fn outside_tick<T>(&mut self, f: impl FnOnce(&mut ModuleCtx<'_>) -> Result<T>) -> Result<T> {
        let mut report = TickReport::default();
        let now_ms = self.now_ms;
        let mut ctx = self.context(&mut report, now_ms, 0);
        let result = f(&mut ctx);
        match ctx.take_fault() {
            Some(fault) => Err(fault),
            None => result,
        }
    }

    fn context<'a>(
        &'a mut self,
        report: &'a mut TickReport,
        now_ms: u64,
        dt_ms: u64,
    ) -> ModuleCtx<'a> {
        ModuleCtx::new(
            &mut self.world,
            &mut self.players,
            &self.data,
            &self.config,
            self.notifications.as_mut(),
            &mut self.rng,
            report,
            now_ms,
            dt_ms,
        )
    }

    // ========================================
    // Commands and research
    // ========================================

    /// Queue a command for the start of the next tick.
    ///
    /// Returns false when the player is not in the match.
    pub fn accept_player_command(&mut self, player: PlayerId, command: PlayerCommand) -> bool {
        if !self.players.contains_key(&player) {
            debug!(player = player.0, "Command from unknown player dropped");
            return false;
        }
        self.pending.push((player, command));
        true
    }

    /// Start research immediately.
    pub fn start_research(&mut self, player: PlayerId, id: &str) -> bool {
        let census = self.world.census(player);
        let Some(seat) = self.players.get_mut(&player) else {
            return false;
        };
        match seat.start_research(id, &census, &self.data) {
            Ok(key) => {
                debug!(player = player.0, research = %key, "Research started");
                true
            }
            Err(error) => {
                debug!(player = player.0, research = id, %error, "Research refused");
                false
            }
        }
    }

    /// Cancel active research. Nothing is refunded.
    pub fn cancel_research(&mut self, player: PlayerId, id: &str) -> bool {
        self.players
            .get_mut(&player)
            .is_some_and(|p| p.research.cancel(id))
    }

    // ========================================
    // Tick
    // ========================================

    /// Advance the match by `delta_ms`.
    ///
    /// Errors are integrity faults (a physics fault, an unresolvable static
    /// type); the match should not be ticked again after one.
    pub fn tick(&mut self, delta_ms: u64) -> Result<TickReport> {
        self.tick += 1;
        self.now_ms += delta_ms;

        let mut report = TickReport {
            tick: self.tick,
            now_ms: self.now_ms,
            ..TickReport::default()
        };
        let commands = std::mem::take(&mut self.pending);
        let now_ms = self.now_ms;
        let mut ctx = self.context(&mut report, now_ms, delta_ms);

        for (player, command) in commands {
            if let Err(error) = apply_command(&mut ctx, player, command) {
                debug!(player = player.0, %error, "Command rejected");
                ctx.report.rejected_commands.push((player, error.to_string()));
            }
        }
        if let Some(fault) = ctx.take_fault() {
            warn!(phase = "commands", %fault, "Tick aborted");
            return Err(fault);
        }

        for (name, phase) in TICK_PHASES {
            phase(&mut ctx);
            if let Some(fault) = ctx.take_fault() {
                warn!(phase = name, %fault, "Tick aborted");
                return Err(fault);
            }
        }

        let damage = ctx.world.drain_damage_log();
        report.damage = damage;

        if !self.game_over && self.is_game_over() {
            self.game_over = true;
            info!(tick = self.tick, winner = ?self.winner().map(|t| t.0), "Game over");
        }

        #[cfg(debug_assertions)]
        {
            let hash = self.state_hash();
            tracing::trace!(tick = self.tick, state_hash = hash, "Simulation state hash");
        }

        Ok(report)
    }

    // ========================================
    // Outcome
    // ========================================

    /// Teams that still have a player owning a live unit or building.
    fn surviving_teams(&self) -> BTreeSet<Team> {
        self.players
            .values()
            .filter(|p| {
                self.world
                    .owned_by(p.id)
                    .into_iter()
                    .any(|id| self.world.core(id).is_some_and(|c| c.active))
            })
            .map(|p| p.team)
            .collect()
    }

    /// Fewer than two teams remain standing.
    #[must_use]
    pub fn is_game_over(&self) -> bool {
        self.surviving_teams().len() < 2
    }

    /// The last team standing, once the game is over.
    #[must_use]
    pub fn winner(&self) -> Option<Team> {
        let teams = self.surviving_teams();
        if teams.len() == 1 {
            teams.into_iter().next()
        } else {
            None
        }
    }

    /// Hash of the simulation state for desync detection.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();

        self.tick.hash(&mut hasher);
        self.now_ms.hash(&mut hasher);

        for player in self.players.values() {
            player.id.hash(&mut hasher);
            player.resources.hash(&mut hasher);
            player.research.completed_stat().hash(&mut hasher);
            player.research.completed_units().hash(&mut hasher);
            for active in player.research.active() {
                active.key.id().hash(&mut hasher);
                active.elapsed_ms.hash(&mut hasher);
            }
        }

        let cores = self
            .world
            .units()
            .map(|u| &u.core)
            .chain(self.world.buildings().map(|b| &b.core));
        for core in cores {
            core.id.hash(&mut hasher);
            core.position.x.to_bits().hash(&mut hasher);
            core.position.y.to_bits().hash(&mut hasher);
            core.health.current.to_bits().hash(&mut hasher);
            core.health.max.to_bits().hash(&mut hasher);
            core.active.hash(&mut hasher);
            core.target.hash(&mut hasher);
        }

        for projectile in self.world.projectiles() {
            projectile.id.hash(&mut hasher);
            projectile.position.x.to_bits().hash(&mut hasher);
            projectile.position.y.to_bits().hash(&mut hasher);
            projectile.target.hash(&mut hasher);
            projectile.damage.to_bits().hash(&mut hasher);
        }

        hasher.finish()
    }
}
