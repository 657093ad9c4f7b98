//! # Skirmish Core
//!
//! Server-authoritative simulation core for one real-time strategy match.
//!
//! This crate decides, every tick, what every unit and building does, how
//! weapons resolve damage, and how each player's research gates what can be
//! built and how strong it is.
//!
//! The core is deterministic:
//! - No rendering
//! - No IO
//! - No unseeded randomness (a per-match ChaCha stream)
//! - No floating-point math in the tick path (uses fixed-point)
//! - Timers run on a simulated millisecond clock, never wall time
//!
//! ## Crate Structure
//!
//! - [`world`] - Entity World: live entities, targeting queries, lifecycle
//! - [`behavior`] - Composable behavior modules attached to entities
//! - [`weapon`] - Weapon firing and ordnance creation
//! - [`research`] - Dual-track research and tech gating
//! - [`simulation`] - The per-match tick orchestrator
//! - [`data`] - Static faction configuration and its registry
//! - [`physics`] - Physics collaborator boundary and a circle-body implementation
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod behavior;
pub mod combat;
pub mod command;
pub mod data;
pub mod entity;
pub mod error;
pub mod factions;
pub mod math;
pub mod modifier;
pub mod notification;
pub mod ordnance;
pub mod physics;
pub mod player;
pub mod research;
pub mod roles;
pub mod simulation;
pub mod systems;
pub mod weapon;
pub mod world;

#[cfg(test)]
mod test_data;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::behavior::{Behavior, Module, ModuleCtx};
    pub use crate::command::PlayerCommand;
    pub use crate::data::{FactionData, GameData};
    pub use crate::entity::{Building, Elevation, EntityId, Health, PlayerId, Stance, Team, Unit};
    pub use crate::error::{GameError, Result};
    pub use crate::factions::FactionId;
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::modifier::ResearchModifier;
    pub use crate::notification::{Notification, NotificationCategory, NotificationSink};
    pub use crate::physics::{CirclePhysics, Physics};
    pub use crate::research::{ResearchKey, ResearchManager};
    pub use crate::simulation::{Match, MatchConfig, TickReport};
    pub use crate::weapon::{ElevationTargeting, Weapon};
    pub use crate::world::EntityWorld;
}
