//! Determinism testing utilities.
//!
//! Provides a harness for verifying that a match produces identical
//! results given identical inputs.
//!
//! # Testing Strategy
//!
//! A match must be reproducible from its data, config and command stream.
//! Sources of non-determinism include:
//!
//! - **Floating-point math**: Different CPUs can produce different results.
//!   We use fixed-point arithmetic via [`skirmish_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   We always iterate in sorted entity ID order.
//!
//! - **System randomness**: All random rolls come from the match's seeded
//!   ChaCha stream.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual system determinism (movement, combat, etc.)
//! 2. **Property tests**: Random inputs must still produce deterministic outputs
//! 3. **Integration tests**: Full match scenarios are reproducible
//! 4. **Parallel tests**: Running N matches on N threads all match

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::thread;

use skirmish_core::simulation::Match;

/// Result of a determinism check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical final state.
    pub is_deterministic: bool,
    /// State hash of each run.
    pub hashes: Vec<u64>,
    /// Number of ticks each run executed.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Distinct hashes observed.
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Panic with diagnostics if the runs diverged.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Match is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Result of running matches on parallel threads.
#[derive(Debug, Clone)]
pub struct ParallelSimResult {
    /// Final state hash of each match.
    pub hashes: Vec<u64>,
    /// Ticks each match executed.
    pub ticks: u64,
    /// Number of matches.
    pub num_sims: usize,
}

impl ParallelSimResult {
    /// Whether every match ended in the same state.
    #[must_use]
    pub fn is_deterministic(&self) -> bool {
        self.hashes.windows(2).all(|w| w[0] == w[1])
    }

    /// Panic with diagnostics if the matches diverged.
    ///
    /// # Panics
    ///
    /// Panics if the matches produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic() {
            let mut unique: Vec<u64> = self.hashes.clone();
            unique.sort_unstable();
            unique.dedup();
            panic!(
                "Parallel matches diverged!\n\
                 Matches: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {}\n\
                 All hashes: {:?}",
                self.num_sims,
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run `setup` + `ticks` × `step` several times and compare final hashes.
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run a match twice with fixed-length ticks and compare.
///
/// # Panics
///
/// Panics if a tick returns an integrity fault.
pub fn verify_match_determinism<F>(setup_fn: F, num_ticks: u64, delta_ms: u64) -> DeterminismResult
where
    F: Fn() -> Match,
{
    verify_determinism(
        2,
        num_ticks,
        &setup_fn,
        |game| {
            game.tick(delta_ms).expect("tick succeeds");
        },
        Match::state_hash,
    )
}

/// Run `num_sims` matches on scoped threads and collect final hashes.
///
/// # Panics
///
/// Panics if a tick faults or a thread panics.
pub fn run_parallel_simulations_scoped<F>(
    setup_fn: F,
    num_sims: usize,
    num_ticks: u64,
    delta_ms: u64,
) -> ParallelSimResult
where
    F: Fn() -> Match + Sync,
{
    let hashes = thread::scope(|s| {
        let handles: Vec<_> = (0..num_sims)
            .map(|_| {
                s.spawn(|| {
                    let mut game = setup_fn();
                    for _ in 0..num_ticks {
                        game.tick(delta_ms).expect("tick succeeds");
                    }
                    game.state_hash()
                })
            })
            .collect();

        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    ParallelSimResult {
        hashes,
        ticks: num_ticks,
        num_sims,
    }
}

/// First tick at which two identically set up matches differ.
///
/// Returns `Some(0)` if they differ before any tick and `None` if they
/// never diverge.
///
/// # Panics
///
/// Panics if a tick faults.
pub fn find_first_divergence<F>(setup_fn: F, num_ticks: u64, delta_ms: u64) -> Option<u64>
where
    F: Fn() -> Match,
{
    let mut first = setup_fn();
    let mut second = setup_fn();

    if first.state_hash() != second.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        first.tick(delta_ms).expect("tick succeeds");
        second.tick(delta_ms).expect("tick succeeds");

        if first.state_hash() != second.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Hash any hashable value with the default hasher.
pub fn compute_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::skirmish_match;

    #[test]
    fn test_verify_determinism_counter() {
        let result = verify_determinism(3, 10, || 0_u64, |n| *n += 1, |n| *n);
        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![10, 10, 10]);
    }

    #[test]
    fn test_detects_divergence() {
        use std::cell::Cell;
        let runs = Cell::new(0_u64);
        let result = verify_determinism(
            2,
            1,
            || {
                runs.set(runs.get() + 1);
                runs.get()
            },
            |_| {},
            |n| *n,
        );
        assert!(!result.is_deterministic);
        assert_eq!(result.unique_hashes().len(), 2);
    }

    #[test]
    fn test_skirmish_is_deterministic() {
        verify_match_determinism(|| skirmish_match(7, 2).0, 100, 50).assert_deterministic();
    }

    #[test]
    fn test_parallel_skirmishes_agree() {
        run_parallel_simulations_scoped(|| skirmish_match(3, 1).0, 4, 60, 50).assert_deterministic();
    }

    #[test]
    fn test_no_divergence() {
        assert_eq!(find_first_divergence(|| skirmish_match(11, 1).0, 40, 50), None);
    }

    #[test]
    fn test_compute_hash_stable() {
        assert_eq!(compute_hash(&(1_u8, "x")), compute_hash(&(1_u8, "x")));
    }
}
