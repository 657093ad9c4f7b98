//! Balance testing utilities.
//!
//! Runs headless unit-versus-unit battles from the sample faction and
//! summarizes who won and what was left.

use skirmish_core::entity::{EntityId, PlayerId, Team};
use skirmish_core::simulation::{Match, MatchConfig};

use crate::fixtures::{pos, two_player_match};

/// Result of a simulated battle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattleResult {
    /// The winning team (None if draw/timeout).
    pub winner: Option<Team>,
    /// Ticks elapsed.
    pub ticks: u64,
    /// Starting army value for side A.
    pub army_value_a: u32,
    /// Starting army value for side B.
    pub army_value_b: u32,
    /// Remaining army value for side A.
    pub remaining_value_a: u32,
    /// Remaining army value for side B.
    pub remaining_value_b: u32,
}

/// Statistics for a set of battles.
#[derive(Debug, Clone, Default)]
pub struct BattleStats {
    /// Total battles run.
    pub total_battles: u32,
    /// Wins for side A.
    pub wins_a: u32,
    /// Wins for side B.
    pub wins_b: u32,
    /// Draws (timeouts or simultaneous elimination).
    pub draws: u32,
}

impl BattleStats {
    /// Fold one result in.
    pub fn record(&mut self, result: &BattleResult) {
        self.total_battles += 1;
        match result.winner {
            Some(Team(1)) => self.wins_a += 1,
            Some(_) => self.wins_b += 1,
            None => self.draws += 1,
        }
    }

    /// Win rate for side A (0.0 to 1.0).
    pub fn win_rate_a(&self) -> f64 {
        if self.total_battles == 0 {
            return 0.5;
        }
        self.wins_a as f64 / self.total_battles as f64
    }

    /// Win rate for side B (0.0 to 1.0).
    pub fn win_rate_b(&self) -> f64 {
        if self.total_battles == 0 {
            return 0.5;
        }
        self.wins_b as f64 / self.total_battles as f64
    }
}

/// Unit types and counts fielded by one side.
pub type Army<'a> = &'a [(&'a str, u32)];

fn field(game: &mut Match, player: PlayerId, army: Army<'_>, x: i32) -> Vec<EntityId> {
    let mut ids = Vec::new();
    let mut slot = 0_i32;
    for &(kind, count) in army {
        for _ in 0..count {
            let y = (slot % 8) * 3 - 12;
            let column = slot / 8;
            let offset = if x < 0 { -column * 3 } else { column * 3 };
            let id = game
                .spawn_unit(player, kind, pos(x + offset, y))
                .expect("army unit type exists");
            ids.push(id);
            slot += 1;
        }
    }
    ids
}

fn value(game: &Match, units: &[EntityId]) -> u32 {
    units
        .iter()
        .filter(|id| game.world().core(**id).is_some_and(|c| c.active))
        .filter_map(|id| game.world().core(*id))
        .filter_map(|c| game.data().unit(&c.type_id))
        .map(|u| u.cost)
        .sum()
}

/// Fight `army_a` (team 1, left) against `army_b` (team 2, right).
///
/// Both sides are ordered to the middle and fight with default stances
/// until one side is wiped out or `max_ticks` 50 ms ticks pass.
///
/// # Panics
///
/// Panics if an army names an unknown unit type or a tick faults.
pub fn run_battle(seed: u64, army_a: Army<'_>, army_b: Army<'_>, max_ticks: u64) -> BattleResult {
    let mut game = two_player_match(MatchConfig {
        seed,
        ..MatchConfig::default()
    });
    let side_a = field(&mut game, PlayerId(1), army_a, -15);
    let side_b = field(&mut game, PlayerId(2), army_b, 15);
    let army_value_a = value(&game, &side_a);
    let army_value_b = value(&game, &side_b);

    for (player, units) in [(PlayerId(1), &side_a), (PlayerId(2), &side_b)] {
        game.accept_player_command(
            player,
            skirmish_core::command::PlayerCommand::Move {
                units: units.clone(),
                target: pos(0, 0),
            },
        );
    }

    let mut ticks = 0;
    while ticks < max_ticks && !game.is_game_over() {
        game.tick(50).expect("tick succeeds");
        ticks += 1;
    }

    BattleResult {
        winner: game.winner(),
        ticks,
        army_value_a,
        army_value_b,
        remaining_value_a: value(&game, &side_a),
        remaining_value_b: value(&game, &side_b),
    }
}
