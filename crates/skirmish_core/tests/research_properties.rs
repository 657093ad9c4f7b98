//! Property tests for the research engine.
//!
//! Random start / cancel / advance sequences against the sample faction
//! with every building standing, checking the tech-tree invariants after
//! every step.

use proptest::prelude::*;
use skirmish_core::data::GameData;
use skirmish_core::factions::FactionId;
use skirmish_core::modifier::ResearchModifier;
use skirmish_core::research::ResearchManager;
use skirmish_core::world::Census;
use skirmish_test_utils::fixtures::{sample_data, SAMPLE};

#[derive(Debug, Clone)]
enum Op {
    Start(usize),
    Cancel(usize),
    Advance(u64),
}

fn research_ids(data: &GameData) -> Vec<String> {
    let faction = data.faction(&FactionId::new(SAMPLE)).unwrap();
    faction
        .stat_research
        .iter()
        .map(|r| r.id.clone())
        .chain(faction.unit_tech.iter().map(|t| t.id.clone()))
        .collect()
}

fn full_census(data: &GameData) -> Census {
    let faction = data.faction(&FactionId::new(SAMPLE)).unwrap();
    Census {
        building_types: faction.buildings.iter().map(|b| b.id.clone()).collect(),
        tier: 2,
        ..Census::default()
    }
}

fn arb_ops(count: usize) -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        3 => (0..count).prop_map(Op::Start),
        1 => (0..count).prop_map(Op::Cancel),
        3 => (0u64..2500).prop_map(Op::Advance),
    ];
    proptest::collection::vec(op, 1..60)
}

fn prerequisites<'a>(data: &'a GameData, id: &str) -> &'a [String] {
    data.stat_research(id)
        .map(|r| r.prerequisites.as_slice())
        .or_else(|| data.unit_tech(id).map(|t| t.prerequisites.as_slice()))
        .unwrap_or(&[])
}

fn check_invariants(research: &ResearchManager, data: &GameData, ids: &[String]) {
    // Prerequisites hold for everything active or completed.
    for id in ids {
        if research.is_active(id) || research.is_completed(id) {
            for prerequisite in prerequisites(data, id) {
                assert!(
                    research.is_completed(prerequisite),
                    "{id} is active or completed without {prerequisite}"
                );
            }
        }
    }

    // Slot cap starts at one and grows by one per slot unlock.
    let unlocks = research
        .completed_stat()
        .iter()
        .filter(|id| data.stat_research(id).is_some_and(|r| r.unlocks_research_slot))
        .count();
    assert_eq!(research.max_simultaneous_research(), 1 + unlocks);
    assert!(research.active().count() <= research.max_simultaneous_research());

    // Excluded siblings of completed tech are locked and never progress.
    for id in research.completed_units() {
        for excluded in &data.unit_tech(id).unwrap().exclusive_with {
            assert!(research.is_locked(excluded));
            assert!(!research.is_completed(excluded));
            assert!(!research.is_active(excluded));
        }
    }

    // Cumulative modifier is the exact fold of completed stat modifiers.
    let expected = ResearchModifier::fold(
        research
            .completed_stat()
            .iter()
            .map(|id| &data.stat_research(id).unwrap().modifier),
    );
    assert_eq!(research.cumulative_modifier(), &expected);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn prop_research_invariants_hold(ops in arb_ops(10)) {
        let data = sample_data();
        let ids = research_ids(&data);
        prop_assert_eq!(ids.len(), 10);
        let census = full_census(&data);
        let mut research = ResearchManager::new(data.faction(&FactionId::new(SAMPLE)).unwrap());

        for op in ops {
            match op {
                Op::Start(i) => {
                    let _ = research.start(&ids[i], &census, &data);
                }
                Op::Cancel(i) => {
                    research.cancel(&ids[i]);
                }
                Op::Advance(ms) => {
                    research.advance(ms, &data);
                }
            }
            check_invariants(&research, &data, &ids);
        }
    }

    #[test]
    fn prop_completion_requires_full_duration(splits in proptest::collection::vec(1u64..400, 1..20)) {
        let data = sample_data();
        let census = full_census(&data);
        let mut research = ResearchManager::new(data.faction(&FactionId::new(SAMPLE)).unwrap());
        research.start("hardened_rounds", &census, &data).unwrap();

        let mut elapsed = 0;
        for dt in splits {
            elapsed += dt;
            let done = !research.advance(dt, &data).is_empty();
            prop_assert_eq!(done, elapsed >= 1000 && elapsed - dt < 1000);
            if done {
                break;
            }
        }
    }
}

#[test]
fn test_two_damage_upgrades_multiply() {
    let data = sample_data();
    let census = full_census(&data);
    let mut research = ResearchManager::new(data.faction(&FactionId::new(SAMPLE)).unwrap());
    research.start("hardened_rounds", &census, &data).unwrap();
    research.advance(1000, &data);
    research.start("tungsten_cores", &census, &data).unwrap();
    research.advance(1000, &data);

    let damage: f64 = research.cumulative_modifier().projectile_damage.to_num();
    assert!((damage - 1.288).abs() < 1e-6);
}
