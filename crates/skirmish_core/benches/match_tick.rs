//! Tick benchmarks for skirmish_core.
//!
//! Run with: `cargo bench -p skirmish_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use skirmish_test_utils::fixtures::skirmish_match;

/// One 50 ms tick of a populated match, before and during the battle.
pub fn match_tick_benchmark(c: &mut Criterion) {
    c.bench_function("tick_approach_4_squads", |b| {
        b.iter_batched(
            || skirmish_match(1, 4).0,
            |mut game| black_box(game.tick(50).map(|report| report.damage.len())),
            BatchSize::SmallInput,
        )
    });

    c.bench_function("tick_engaged_4_squads", |b| {
        b.iter_batched(
            || {
                let (mut game, _) = skirmish_match(1, 4);
                for _ in 0..240 {
                    let _ = game.tick(50);
                }
                game
            },
            |mut game| black_box(game.tick(50).map(|report| report.damage.len())),
            BatchSize::LargeInput,
        )
    });

    c.bench_function("state_hash", |b| {
        let (game, _) = skirmish_match(1, 4);
        b.iter(|| black_box(game.state_hash()))
    });
}

criterion_group!(benches, match_tick_benchmark);
criterion_main!(benches);
