//! Faction identifiers.
//!
//! Factions are data-driven: the set of factions is whatever the loaded
//! configuration declares, so the identifier is a string newtype rather
//! than a closed enum.

use serde::{Deserialize, Serialize};

/// Unique identifier for factions.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FactionId(pub String);

impl FactionId {
    /// Create a faction id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FactionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}
