//! Headless battle runner for CI verification and tuning.
//!
//! Loads a battle [`Scenario`] from RON, plays it to completion without
//! graphics and reports the outcome as JSON.
//!
//! - **stdout**: The JSON [`BattleReport`]
//! - **stderr**: Logs (human-readable)
//!
//! # Example
//!
//! ```bash
//! # Built-in two-team skirmish
//! cargo run -p skirmish_headless -- skirmish
//!
//! # Run a scenario file
//! cargo run -p skirmish_headless -- run --scenario scenarios/line_battle.ron
//!
//! # Verify determinism
//! cargo run -p skirmish_headless -- verify --runs 5
//! ```

pub mod runner;
pub mod scenario;

pub use runner::{BattleReport, HeadlessRunner, Outcome, TeamReport};
pub use scenario::{Scenario, ScenarioError, TeamSetup, UnitGroup};
