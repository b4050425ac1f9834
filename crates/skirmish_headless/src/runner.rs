//! Headless battle runner.
//!
//! Plays a [`Scenario`] to completion and condenses the tick events into a
//! [`BattleReport`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use skirmish_core::combat::CombatEvent;
use skirmish_core::components::TeamId;
use skirmish_core::simulation::{Battle, TickEvents};
use skirmish_core::telemetry::TracingSink;
use skirmish_core::value::Direct;

use crate::scenario::{Scenario, ScenarioError};

/// How a battle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// One team survived.
    Victory,
    /// No team survived.
    MutualDestruction,
    /// The tick limit was reached with several teams standing.
    Timeout,
}

/// Per-team summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamReport {
    /// Display name.
    pub name: String,
    /// Units at the start.
    pub deployed: usize,
    /// Units still alive.
    pub surviving: usize,
    /// Units lost.
    pub lost: usize,
    /// Damage dealt by this team's units.
    pub damage_dealt: u64,
}

/// Outcome of one headless battle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleReport {
    /// Scenario name.
    pub scenario: String,
    /// How the battle ended.
    pub outcome: Outcome,
    /// Winning team, if exactly one survived.
    pub winner: Option<TeamId>,
    /// Ticks simulated.
    pub ticks: u64,
    /// Per-team summaries.
    pub teams: BTreeMap<TeamId, TeamReport>,
    /// Total unit deaths.
    pub deaths: usize,
    /// Teams in the order they were defeated.
    pub defeated_order: Vec<TeamId>,
    /// Forced stuck recoveries.
    pub stuck_recoveries: usize,
    /// Attacks executed.
    pub attacks: usize,
    /// Artillery rounds launched.
    pub projectiles_fired: usize,
    /// Final battle state hash.
    pub state_hash: u64,
}

impl BattleReport {
    /// Render as pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Running tallies while the battle plays.
#[derive(Debug, Default)]
struct Tally {
    deaths: usize,
    defeated_order: Vec<TeamId>,
    stuck_recoveries: usize,
    attacks: usize,
    projectiles_fired: usize,
    damage_by_team: BTreeMap<TeamId, u64>,
}

impl Tally {
    fn absorb(&mut self, events: &TickEvents) {
        self.deaths += events.deaths.len();
        self.defeated_order.extend(&events.teams_defeated);
        self.stuck_recoveries += events.stuck_recoveries.len();

        for event in &events.combat_events {
            match event {
                CombatEvent::AttackStarted { .. } => self.attacks += 1,
                CombatEvent::ProjectileSpawned { .. } => self.projectiles_fired += 1,
                _ => {}
            }
        }
        for damage in &events.damage_events {
            if let Some(team) = damage.attacker_team {
                *self.damage_by_team.entry(team).or_default() += u64::from(damage.damage);
            }
        }
    }
}

/// Plays scenarios headlessly.
#[derive(Debug)]
pub struct HeadlessRunner {
    scenario: Scenario,
    max_ticks: u64,
    telemetry: bool,
}

impl HeadlessRunner {
    /// Runner for `scenario` with its own tick limit.
    #[must_use]
    pub fn new(scenario: Scenario) -> Self {
        let max_ticks = scenario.tick_limit(None);
        Self {
            scenario,
            max_ticks,
            telemetry: false,
        }
    }

    /// Builder method to override the tick limit.
    #[must_use]
    pub fn with_max_ticks(mut self, max_ticks: Option<u64>) -> Self {
        self.max_ticks = self.scenario.tick_limit(max_ticks);
        self
    }

    /// Builder method to forward combat telemetry to the log.
    #[must_use]
    pub fn with_telemetry(mut self, enabled: bool) -> Self {
        self.telemetry = enabled;
        self
    }

    /// Play the battle until it is decided or the tick limit is hit.
    pub fn run(&self) -> Result<BattleReport, ScenarioError> {
        let mut battle: Battle<Direct> = self.scenario.build()?;
        if self.telemetry {
            battle.set_telemetry(Box::new(TracingSink));
        }

        let mut teams: BTreeMap<TeamId, TeamReport> = self
            .scenario
            .teams
            .iter()
            .map(|t| {
                let report = TeamReport {
                    name: t.name.clone(),
                    deployed: t.unit_count(),
                    ..TeamReport::default()
                };
                (t.index, report)
            })
            .collect();

        tracing::info!(
            scenario = %self.scenario.name,
            teams = teams.len(),
            max_ticks = self.max_ticks,
            "running battle"
        );

        battle.start();
        let mut tally = Tally::default();
        while battle.current_tick() < self.max_ticks && battle.surviving_teams().len() > 1 {
            let events = battle.tick();
            tally.absorb(&events);
        }

        let surviving = battle.surviving_teams();
        let outcome = match surviving.len() {
            0 => Outcome::MutualDestruction,
            1 => Outcome::Victory,
            _ => Outcome::Timeout,
        };

        for (index, report) in &mut teams {
            report.surviving = battle.registry().total_units(*index);
            report.lost = report.deployed.saturating_sub(report.surviving);
            report.damage_dealt = tally.damage_by_team.get(index).copied().unwrap_or(0);
        }

        let report = BattleReport {
            scenario: self.scenario.name.clone(),
            outcome,
            winner: battle.winner(),
            ticks: battle.current_tick(),
            teams,
            deaths: tally.deaths,
            defeated_order: tally.defeated_order,
            stuck_recoveries: tally.stuck_recoveries,
            attacks: tally.attacks,
            projectiles_fired: tally.projectiles_fired,
            state_hash: battle.state_hash(),
        };

        tracing::info!(
            outcome = ?report.outcome,
            winner = ?report.winner,
            ticks = report.ticks,
            "battle finished"
        );
        Ok(report)
    }

    /// Play the battle `runs` times and check every run ends identically.
    pub fn verify_determinism(&self, runs: usize) -> Result<bool, ScenarioError> {
        let mut first: Option<BattleReport> = None;
        for run in 0..runs {
            let report = self.run()?;
            match &first {
                None => first = Some(report),
                Some(expected) if *expected == report => {}
                Some(expected) => {
                    tracing::warn!(
                        run,
                        expected = expected.state_hash,
                        actual = report.state_hash,
                        "battle diverged"
                    );
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}
