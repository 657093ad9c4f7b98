//! # Skirmish Development Tools
//!
//! Command-line tools for development:
//! - Faction data loading and validation
//! - Research tree inspection

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod loader;
pub mod tree;
pub mod validate;

use std::path::PathBuf;

use skirmish_core::error::GameError;
use thiserror::Error;

/// Errors raised by the tools.
#[derive(Debug, Error)]
pub enum ToolError {
    /// A file or directory could not be read.
    #[error("Failed to read '{path}': {source}")]
    Io {
        /// Offending path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// A directory holds no faction documents.
    #[error("No faction files found in '{0}'")]
    NoFactions(PathBuf),

    /// The data failed to parse or validate.
    #[error(transparent)]
    Game(#[from] GameError),
}

/// Result type alias using [`ToolError`].
pub type Result<T> = std::result::Result<T, ToolError>;
