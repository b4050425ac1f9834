//! Scenario loading and configuration.
//!
//! Scenarios define the initial battle for headless runs: the battle
//! config, each team's spawn area and the unit groups placed inside it.
//!
//! # Example RON
//!
//! ```ron
//! Scenario(
//!     name: "Line battle",
//!     description: "Melee screen with artillery support",
//!     max_ticks: Some(6000),
//!     teams: [
//!         TeamSetup(
//!             index: 0,
//!             name: "Blue",
//!             color: "#3060ff",
//!             spawn_area: (center: (x: -15.0, y: 0.0), radius: 5.0),
//!             groups: [
//!                 UnitGroup(archetype: Melee, count: 6),
//!                 UnitGroup(archetype: Artillery, count: 2),
//!             ],
//!         ),
//!     ],
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use skirmish_core::components::{Archetype, TeamId, UnitStats, UnitTemplate};
use skirmish_core::config::BattleConfig;
use skirmish_core::error::BattleError;
use skirmish_core::math::{Fixed, Vec2Fixed};
use skirmish_core::registry::{SpawnArea, TeamSpec};
use skirmish_core::simulation::{Battle, UnitSpawn};
use skirmish_core::value::CellFamily;
use thiserror::Error;

/// Error type for scenario operations.
#[derive(Error, Debug)]
pub enum ScenarioError {
    /// File not found.
    #[error("Scenario file not found: {0}")]
    FileNotFound(String),
    /// Failed to read file.
    #[error("Failed to read scenario file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse RON.
    #[error("Failed to parse scenario: {0}")]
    ParseError(#[from] ron::error::SpannedError),
    /// The scenario is well-formed but cannot be played.
    #[error("Invalid scenario: {0}")]
    Invalid(String),
    /// The battle rejected the setup.
    #[error("Battle setup failed: {0}")]
    Battle(#[from] BattleError),
}

/// A group of identical units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitGroup {
    /// Combat role.
    pub archetype: Archetype,
    /// How many to spawn.
    pub count: u32,
    /// Stat overrides. Missing stats use the archetype defaults.
    #[serde(default)]
    pub template: Option<UnitTemplate>,
}

impl UnitGroup {
    /// Group with default stats.
    #[must_use]
    pub const fn new(archetype: Archetype, count: u32) -> Self {
        Self {
            archetype,
            count,
            template: None,
        }
    }

    /// Resolved stats for every unit of the group.
    pub fn stats(&self) -> Result<UnitStats, ScenarioError> {
        match &self.template {
            None => Ok(UnitStats::for_archetype(self.archetype)),
            Some(template) if template.archetype == self.archetype => Ok(template.resolve()),
            Some(template) => Err(ScenarioError::Invalid(format!(
                "{} group carries a {} template",
                self.archetype.name(),
                template.archetype.name()
            ))),
        }
    }
}

/// One team's setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSetup {
    /// Team index.
    pub index: TeamId,
    /// Display name.
    pub name: String,
    /// Display color.
    #[serde(default)]
    pub color: String,
    /// Where the team's units are placed.
    pub spawn_area: SpawnArea,
    /// Units to spawn, in order.
    pub groups: Vec<UnitGroup>,
}

impl TeamSetup {
    /// Total units across all groups.
    #[must_use]
    pub fn unit_count(&self) -> usize {
        self.groups.iter().map(|g| g.count as usize).sum()
    }
}

/// A complete scenario configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Human-readable description.
    #[serde(default)]
    pub description: String,
    /// Battle tuning.
    #[serde(default)]
    pub config: BattleConfig,
    /// Tick limit before the battle is called a draw.
    #[serde(default)]
    pub max_ticks: Option<u64>,
    /// Participating teams.
    pub teams: Vec<TeamSetup>,
}

impl Default for Scenario {
    fn default() -> Self {
        Self::skirmish()
    }
}

impl Scenario {
    /// Default tick limit: five simulated minutes.
    pub const DEFAULT_MAX_TICKS: u64 = 5 * 60 * skirmish_core::config::TICK_RATE as u64;

    /// Load a scenario from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ScenarioError::FileNotFound(path.display().to_string()));
        }
        let contents = std::fs::read_to_string(path)?;
        Self::from_ron_str(&contents)
    }

    /// Load from a RON string (useful for embedded scenarios).
    pub fn from_ron_str(ron: &str) -> Result<Self, ScenarioError> {
        let scenario: Scenario = ron::from_str(ron)?;
        Ok(scenario)
    }

    /// Built-in two-team skirmish with every archetype on both sides.
    #[must_use]
    pub fn skirmish() -> Self {
        let side = |index: TeamId, name: &str, color: &str, x: i32| TeamSetup {
            index,
            name: name.to_string(),
            color: color.to_string(),
            spawn_area: SpawnArea::new(Vec2Fixed::from_ints(x, 0), Fixed::from_num(6)),
            groups: vec![
                UnitGroup::new(Archetype::Melee, 8),
                UnitGroup::new(Archetype::Ranged, 5),
                UnitGroup::new(Archetype::Artillery, 2),
            ],
        };
        Self {
            name: "Standard Skirmish".to_string(),
            description: "Two mirrored mixed armies".to_string(),
            config: BattleConfig::default(),
            max_ticks: Some(Self::DEFAULT_MAX_TICKS),
            teams: vec![
                side(0, "Blue", "#3060ff", -18),
                side(1, "Red", "#ff4030", 18),
            ],
        }
    }

    /// Tick limit to use, preferring an explicit override.
    #[must_use]
    pub fn tick_limit(&self, overridden: Option<u64>) -> u64 {
        overridden
            .or(self.max_ticks)
            .unwrap_or(Self::DEFAULT_MAX_TICKS)
    }

    /// Check the scenario can produce a battle.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.teams.len() < 2 {
            return Err(ScenarioError::Invalid(format!(
                "need at least 2 teams, found {}",
                self.teams.len()
            )));
        }
        for team in &self.teams {
            if team.unit_count() == 0 {
                return Err(ScenarioError::Invalid(format!("team {} has no units", team.name)));
            }
            for group in &team.groups {
                group.stats()?;
            }
        }
        Ok(())
    }

    /// Build the battle in its prep phase.
    ///
    /// Each team's units are placed on its spawn area's spiral in group
    /// order.
    pub fn build<F: CellFamily>(&self) -> Result<Battle<F>, ScenarioError> {
        self.validate()?;
        let mut battle = Battle::new(self.config);

        for team in &self.teams {
            battle.add_team(TeamSpec {
                index: team.index,
                color: team.color.clone(),
                spawn_area: team.spawn_area,
            })?;
        }

        for team in &self.teams {
            let total = team.unit_count();
            let mut slot = 0;
            for group in &team.groups {
                let stats = group.stats()?;
                for _ in 0..group.count {
                    let position = team.spawn_area.placement(slot, total);
                    battle.spawn_unit(UnitSpawn::new(team.index, stats, position))?;
                    slot += 1;
                }
            }
            tracing::debug!(team = team.index, units = total, "team deployed");
        }

        Ok(battle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_core::value::Direct;

    #[test]
    fn test_skirmish_builds() {
        let scenario = Scenario::skirmish();
        let battle: Battle<Direct> = scenario.build().unwrap();
        assert_eq!(battle.registry().total_units(0), 15);
        assert_eq!(battle.registry().total_units(1), 15);
        assert!(!battle.is_simulating());
    }

    #[test]
    fn test_parse_ron() {
        let ron = r#"
            Scenario(
                name: "Tiny",
                max_ticks: Some(100),
                config: (targeting_interval: 10),
                teams: [
                    TeamSetup(
                        index: 0,
                        name: "A",
                        spawn_area: (center: (x: -5.0, y: 0.0), radius: 1.0),
                        groups: [UnitGroup(archetype: Melee, count: 2)],
                    ),
                    TeamSetup(
                        index: 1,
                        name: "B",
                        color: "red",
                        spawn_area: (center: (x: 5.0, y: 0.0), radius: 1.0),
                        groups: [
                            UnitGroup(
                                archetype: Ranged,
                                count: 1,
                                template: Some(UnitTemplate(archetype: Ranged, damage: Some(3))),
                            ),
                        ],
                    ),
                ],
            )
        "#;
        let scenario = Scenario::from_ron_str(ron).unwrap();
        assert_eq!(scenario.config.targeting_interval, 10);
        assert_eq!(scenario.tick_limit(None), 100);
        assert_eq!(scenario.tick_limit(Some(7)), 7);

        let battle: Battle<Direct> = scenario.build().unwrap();
        let ranged = battle.registry().team(1).unwrap().bucket(Archetype::Ranged)[0];
        assert_eq!(battle.unit(ranged).unwrap().stats().combat.damage, 3);
    }

    #[test]
    fn test_mismatched_template_is_rejected() {
        let mut scenario = Scenario::skirmish();
        scenario.teams[0].groups[0].template = Some(UnitTemplate::empty(Archetype::Artillery));
        assert!(matches!(
            scenario.build::<Direct>(),
            Err(ScenarioError::Invalid(_))
        ));
    }

    #[test]
    fn test_single_team_is_rejected() {
        let mut scenario = Scenario::skirmish();
        scenario.teams.truncate(1);
        assert!(matches!(scenario.validate(), Err(ScenarioError::Invalid(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = Scenario::load("/definitely/not/here.ron");
        assert!(matches!(result, Err(ScenarioError::FileNotFound(_))));
    }
}
