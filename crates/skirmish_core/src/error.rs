//! Error types for the match simulation.
//!
//! Only configuration and integrity failures are errors. Expected-invalid
//! gameplay input (wrong team, out of range, cooldown pending) is absorbed
//! where it happens and never surfaces as a [`GameError`].

use thiserror::Error;

use crate::physics::PhysicsError;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all simulation errors.
#[derive(Debug, Error)]
pub enum GameError {
    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParse {
        /// Path (or label) of the document that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Two static definitions share one identifier.
    #[error("Duplicate {kind} id '{id}'")]
    DuplicateId {
        /// What kind of definition collided (unit, building, ...).
        kind: &'static str,
        /// The colliding identifier.
        id: String,
    },

    /// A faction's tables reference definitions that do not exist.
    #[error("Faction '{faction}' failed validation: {}", problems.join("; "))]
    InvalidFactionData {
        /// Faction that failed.
        faction: String,
        /// Every problem found.
        problems: Vec<String>,
    },

    /// Faction not present in the registry.
    #[error("Faction not found: {0}")]
    FactionNotFound(String),

    /// A static type id could not be resolved at runtime.
    #[error("Unknown {kind} type '{id}'")]
    UnknownType {
        /// Kind of type (unit, building, weapon).
        kind: &'static str,
        /// The unresolved id.
        id: String,
    },

    /// Invalid entity reference.
    #[error("Entity not found: {0}")]
    EntityNotFound(u64),

    /// Invalid player reference.
    #[error("Player not found: {0}")]
    PlayerNotFound(u8),

    /// Fault reported by the physics collaborator.
    #[error("Physics fault: {0}")]
    Physics(#[from] PhysicsError),
}
