//! Battle configuration.
//!
//! Loaded from RON. Durations are given in ticks; fixed-point values are
//! written as plain decimals.
//!
//! ```ron
//! BattleConfig(
//!     targeting_interval: 20,
//!     stuck: StuckConfig(check_interval: 100, movement_threshold: 0.1),
//!     attack_range_hysteresis: 0.5,
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BattleError, Result};
use crate::math::{fixed_serde, Fixed};

/// Ticks per simulated second.
pub const TICK_RATE: u32 = 20;

/// Duration of one tick in milliseconds.
pub const TICK_DURATION_MS: u32 = 1000 / TICK_RATE;

/// Convert simulated seconds to whole ticks, rounding to nearest.
#[must_use]
pub fn seconds_to_ticks(seconds: Fixed) -> u32 {
    let ticks = (seconds * Fixed::from_num(TICK_RATE)).round();
    ticks.checked_to_num::<u32>().unwrap_or(0)
}

/// Stuck recovery monitor parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StuckConfig {
    /// Ticks between position samples.
    pub check_interval: u32,
    /// Movement below this between samples counts as not moving.
    #[serde(with = "fixed_serde")]
    pub movement_threshold: Fixed,
    /// A target within `engaged_factor × attack range` means engaged.
    #[serde(with = "fixed_serde")]
    pub engaged_factor: Fixed,
    /// Consecutive stuck intervals before recovery is forced.
    pub recovery_intervals: u32,
}

impl Default for StuckConfig {
    fn default() -> Self {
        Self {
            check_interval: 5 * TICK_RATE,
            movement_threshold: Fixed::from_num(0.1),
            engaged_factor: Fixed::from_num(1.1),
            recovery_intervals: 2,
        }
    }
}

impl StuckConfig {
    /// Accumulated stuck time that triggers recovery.
    #[must_use]
    pub const fn recovery_threshold(&self) -> u32 {
        self.check_interval.saturating_mul(self.recovery_intervals)
    }
}

/// Battle-wide tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    /// Ticks between targeting passes.
    pub targeting_interval: u32,
    /// Stuck monitor parameters.
    pub stuck: StuckConfig,
    /// Ticks between death and handle invalidation.
    pub destroy_delay: u32,
    /// Extra range granted while a unit is already attacking.
    #[serde(with = "fixed_serde")]
    pub attack_range_hysteresis: Fixed,
    /// Ticks between projectile retarget searches.
    pub projectile_retarget_interval: u32,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            targeting_interval: TICK_RATE,
            stuck: StuckConfig::default(),
            destroy_delay: TICK_RATE,
            attack_range_hysteresis: Fixed::ZERO,
            projectile_retarget_interval: TICK_RATE / 2,
        }
    }
}

impl BattleConfig {
    /// Parse from RON text. Missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::ConfigParse`] on malformed input.
    pub fn from_ron_str(text: &str) -> Result<Self> {
        Ok(ron::from_str(text)?)
    }

    /// Load from a RON file.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::ConfigRead`] if the file cannot be read and
    /// [`BattleError::ConfigParse`] if it does not parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| BattleError::ConfigRead {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_ron_str(&text)
    }
}
