//! Static data shared by unit tests.
//!
//! The sample faction is the same document the integration fixtures load.

use std::sync::Arc;

use crate::data::{parse_faction, FactionData, GameData};
use crate::math::Fixed;

const SAMPLE_FACTION: &str = include_str!("../../skirmish_test_utils/data/sample_faction.ron");
const NEUTRAL_FACTION: &str = include_str!("../../skirmish_test_utils/data/neutral.ron");

pub(crate) fn fixed(n: i32) -> Fixed {
    Fixed::from_num(n)
}

pub(crate) fn sample_faction() -> FactionData {
    parse_faction(SAMPLE_FACTION, "sample_faction.ron").expect("sample faction parses")
}

pub(crate) fn sample_data() -> Arc<GameData> {
    let neutral = parse_faction(NEUTRAL_FACTION, "neutral.ron").expect("neutral faction parses");
    Arc::new(GameData::new(vec![sample_faction(), neutral]).expect("sample data is valid"))
}
