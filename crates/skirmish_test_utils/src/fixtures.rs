//! Test fixtures and helpers.
//!
//! The sample faction is a complete faction document exercising every
//! behavior module and both research tracks, with numbers picked to keep
//! test arithmetic exact.

use std::sync::Arc;

use fixed::types::I32F32;
use skirmish_core::data::{parse_faction, FactionData, GameData};
use skirmish_core::entity::{EntityId, PlayerId, Team};
use skirmish_core::factions::FactionId;
use skirmish_core::math::Vec2Fixed;
use skirmish_core::notification::NullSink;
use skirmish_core::physics::CirclePhysics;
use skirmish_core::simulation::{Match, MatchConfig};

/// RON source of the sample faction.
pub const SAMPLE_FACTION_RON: &str = include_str!("../data/sample_faction.ron");

/// RON source of the neutral map objects.
pub const NEUTRAL_RON: &str = include_str!("../data/neutral.ron");

/// Id of the sample faction.
pub const SAMPLE: &str = "sample";

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Shorthand for an integer position.
#[must_use]
pub fn pos(x: i32, y: i32) -> Vec2Fixed {
    Vec2Fixed::from_ints(x, y)
}

/// The parsed sample faction.
///
/// # Panics
///
/// Panics if the bundled document does not parse.
#[must_use]
pub fn sample_faction() -> FactionData {
    parse_faction(SAMPLE_FACTION_RON, "sample_faction.ron").expect("sample faction parses")
}

/// The parsed neutral faction.
///
/// # Panics
///
/// Panics if the bundled document does not parse.
#[must_use]
pub fn neutral_faction() -> FactionData {
    parse_faction(NEUTRAL_RON, "neutral.ron").expect("neutral faction parses")
}

/// Registry holding the sample and neutral factions.
///
/// # Panics
///
/// Panics if the bundled factions fail validation.
#[must_use]
pub fn sample_data() -> Arc<GameData> {
    Arc::new(GameData::new(vec![sample_faction(), neutral_faction()]).expect("sample data is valid"))
}

/// An empty two-player sample match: player 1 on team 1, player 2 on team 2.
///
/// # Panics
///
/// Panics if the sample faction is missing.
#[must_use]
pub fn two_player_match(config: MatchConfig) -> Match {
    let mut game = Match::new(
        sample_data(),
        config,
        Box::new(CirclePhysics::new()),
        Box::new(NullSink),
    );
    for (player, team) in [(PlayerId(1), Team(1)), (PlayerId(2), Team(2))] {
        game.add_player(player, team, &FactionId::new(SAMPLE))
            .expect("sample faction registered");
    }
    game
}

/// Bases and armies of one side of [`skirmish_match`].
#[derive(Debug, Clone, Default)]
pub struct Side {
    /// Pre-built buildings.
    pub buildings: Vec<EntityId>,
    /// Spawned units.
    pub units: Vec<EntityId>,
}

/// A populated two-player match: a base per side and `squads` mixed
/// squads advancing on each other across a 60-unit gap.
///
/// # Panics
///
/// Panics if a sample type is missing.
#[must_use]
pub fn skirmish_match(seed: u64, squads: u32) -> (Match, [Side; 2]) {
    let mut game = two_player_match(MatchConfig {
        seed,
        ..MatchConfig::default()
    });
    let mut sides = [Side::default(), Side::default()];

    for (index, (player, x, facing)) in [(PlayerId(1), -30, 1), (PlayerId(2), 30, -1)]
        .into_iter()
        .enumerate()
    {
        let side = &mut sides[index];
        for (kind, offset) in [("hq", 0), ("plant", 8), ("barracks", 16), ("tower", 24)] {
            let id = game
                .spawn_building(player, kind, pos(x - facing * 12, offset - 12))
                .expect("sample building");
            side.buildings.push(id);
        }
        for squad in 0..squads as i32 {
            let y = squad * 4 - squads as i32 * 2;
            for (kind, dx) in [("tank", 0), ("rifle_squad", -2), ("medic", -4)] {
                let id = game
                    .spawn_unit(player, kind, pos(x + facing * dx, y))
                    .expect("sample unit");
                side.units.push(id);
            }
        }
        game.accept_player_command(
            player,
            skirmish_core::command::PlayerCommand::Move {
                units: side.units.clone(),
                target: pos(0, 0),
            },
        );
    }

    (game, sides)
}
