//! # Skirmish Test Utilities
//!
//! Shared testing utilities for all crates:
//! - Sample faction data and ready-made matches
//! - Determinism test harness
//! - Battle runner for balance checks
//! - Property-based testing strategies

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod balance;
pub mod determinism;
pub mod fixtures;
pub mod strategies;

/// Re-export proptest for convenience.
pub use proptest;
