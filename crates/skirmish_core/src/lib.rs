//! # Skirmish Core
//!
//! Deterministic team combat simulation.
//!
//! This crate contains **only** deterministic logic:
//! - No rendering
//! - No IO beyond optional config loading
//! - No system randomness
//! - No floating-point math (uses fixed-point)
//!
//! Teams of melee, ranged and artillery units pick the nearest enemy,
//! close in, attack on their own cooldowns and get unstuck when their
//! movement stalls. The same inputs always produce the same battle.
//!
//! ## Crate Structure
//!
//! - [`registry`] - Team membership bucketed by archetype
//! - [`targeting`] - Periodic nearest-enemy assignment
//! - [`behavior`] - Idle / Move / Attack state machine
//! - [`stuck`] - Stuck detection and recovery
//! - [`combat`] - Melee, ranged and artillery resolution
//! - [`projectile`] - Homing artillery shells
//! - [`simulation`] - Core battle loop
//! - [`math`] - Fixed-point math utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod behavior;
pub mod combat;
pub mod components;
pub mod config;
pub mod error;
pub mod math;
pub mod movement;
pub mod projectile;
pub mod registry;
pub mod scheduler;
pub mod simulation;
pub mod stuck;
pub mod targeting;
pub mod telemetry;
pub mod unit;
pub mod value;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::combat::{CombatEvent, DamageEvent, DamageSource};
    pub use crate::components::*;
    pub use crate::config::{BattleConfig, StuckConfig, TICK_RATE};
    pub use crate::error::{BattleError, Result};
    pub use crate::math::{Fixed, Vec2Fixed};
    pub use crate::movement::{DirectMover, MovementProvider};
    pub use crate::projectile::Projectile;
    pub use crate::registry::{SpawnArea, Team, TeamRegistry, TeamSpec};
    pub use crate::simulation::{Battle, TickEvents, UnitSpawn};
    pub use crate::stuck::StuckRecovery;
    pub use crate::telemetry::{NullSink, TelemetrySink, TracingSink};
    pub use crate::unit::Unit;
    pub use crate::value::{CellFamily, Direct, Observed, ValueCell};
}
