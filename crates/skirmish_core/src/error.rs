//! Error types for the battle simulation.
//!
//! Only caller mistakes at the API boundary become errors. Inside a tick,
//! stale references and missing data degrade to "skip this unit".

use thiserror::Error;

use crate::components::{TeamId, UnitId};

/// Result type alias using [`BattleError`].
pub type Result<T> = std::result::Result<T, BattleError>;

/// Top-level error type for battle simulation errors.
#[derive(Debug, Error)]
pub enum BattleError {
    /// Unit handle does not refer to a unit in the battle.
    #[error("Unit not found: {0}")]
    UnitNotFound(UnitId),

    /// Team index is not registered.
    #[error("Team not found: {0}")]
    TeamNotFound(TeamId),

    /// Team index is already registered.
    #[error("Team {0} already exists")]
    DuplicateTeam(TeamId),

    /// Failed to read a configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ConfigRead {
        /// Path to the file that failed to load.
        path: String,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Configuration text did not parse.
    #[error("Failed to parse config: {0}")]
    ConfigParse(#[from] ron::error::SpannedError),

    /// Operation not valid in the current battle phase.
    #[error("Invalid battle state: {0}")]
    InvalidState(String),
}
