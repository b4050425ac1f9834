//! Entity and team registry.
//!
//! Owns the partition of live units into teams and, within each team,
//! archetype buckets. Iteration order is fixed: teams by ascending index,
//! buckets in [`Archetype`] order, units in registration order. The
//! targeting engine's tie-break relies on this order.
//!
//! # Defeat signal
//!
//! [`TeamRegistry::unregister`] returns the team it just emptied, at most
//! once per team life. Repeated queries of an empty team never signal
//! again; only [`TeamRegistry::clear`] re-arms the latch.
//!
//! ```
//! use skirmish_core::components::Archetype;
//! use skirmish_core::registry::{TeamRegistry, TeamSpec};
//!
//! let mut registry = TeamRegistry::new();
//! registry.add_team(TeamSpec::new(0, "red")).unwrap();
//! registry.register(7, 0, Archetype::Melee).unwrap();
//!
//! assert_eq!(registry.unregister(7), Some(0));
//! assert_eq!(registry.unregister(7), None);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::components::{Archetype, TeamId, UnitId};
use crate::error::{BattleError, Result};
use crate::math::{fixed_cos, fixed_sin, fixed_sqrt, fixed_serde, Fixed, Vec2Fixed};

/// Golden angle in radians, `π·(3 − √5)` as raw fixed-point bits.
const GOLDEN_ANGLE: Fixed = Fixed::from_bits(10_307_763_583);

/// Circular placement region. Never consulted by combat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SpawnArea {
    /// Circle center.
    pub center: Vec2Fixed,
    /// Circle radius.
    #[serde(with = "fixed_serde")]
    pub radius: Fixed,
}

impl SpawnArea {
    /// Create a spawn area.
    #[must_use]
    pub const fn new(center: Vec2Fixed, radius: Fixed) -> Self {
        Self { center, radius }
    }

    /// Position of the `index`-th of `count` units.
    ///
    /// Points lie on a golden-angle spiral filling the circle evenly; the
    /// same inputs always give the same point.
    #[must_use]
    pub fn placement(&self, index: usize, count: usize) -> Vec2Fixed {
        if count <= 1 || self.radius == Fixed::ZERO {
            return self.center;
        }
        let fraction = (Fixed::from_num(index) + Fixed::from_num(0.5)) / Fixed::from_num(count);
        let r = self.radius * fixed_sqrt(fraction);
        let theta = GOLDEN_ANGLE * Fixed::from_num(index);
        self.center + Vec2Fixed::new(r * fixed_cos(theta), r * fixed_sin(theta))
    }
}

/// Team creation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamSpec {
    /// Primary team identifier.
    pub index: TeamId,
    /// Display color. Opaque to the core.
    pub color: String,
    /// Placement region.
    #[serde(default)]
    pub spawn_area: SpawnArea,
}

impl TeamSpec {
    /// Team spec with a default spawn area at the origin.
    #[must_use]
    pub fn new(index: TeamId, color: impl Into<String>) -> Self {
        Self {
            index,
            color: color.into(),
            spawn_area: SpawnArea::default(),
        }
    }

    /// Builder method to set the spawn area.
    #[must_use]
    pub fn with_spawn_area(mut self, center: Vec2Fixed, radius: Fixed) -> Self {
        self.spawn_area = SpawnArea::new(center, radius);
        self
    }
}

/// A team and its units, bucketed by archetype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    index: TeamId,
    color: String,
    spawn_area: SpawnArea,
    units_by_archetype: BTreeMap<Archetype, Vec<UnitId>>,
    defeated: bool,
}

impl Team {
    fn new(spec: TeamSpec) -> Self {
        Self {
            index: spec.index,
            color: spec.color,
            spawn_area: spec.spawn_area,
            units_by_archetype: BTreeMap::new(),
            defeated: false,
        }
    }

    /// Team identifier.
    #[must_use]
    pub const fn index(&self) -> TeamId {
        self.index
    }

    /// Display color.
    #[must_use]
    pub fn color(&self) -> &str {
        &self.color
    }

    /// Placement region.
    #[must_use]
    pub const fn spawn_area(&self) -> &SpawnArea {
        &self.spawn_area
    }

    /// Whether the defeat signal has fired for this team life.
    #[must_use]
    pub const fn is_defeated(&self) -> bool {
        self.defeated
    }

    /// Units in one archetype bucket, in registration order.
    #[must_use]
    pub fn bucket(&self, archetype: Archetype) -> &[UnitId] {
        self.units_by_archetype
            .get(&archetype)
            .map_or(&[], Vec::as_slice)
    }

    /// Non-empty buckets in archetype order.
    pub fn buckets(&self) -> impl Iterator<Item = (Archetype, &[UnitId])> {
        self.units_by_archetype
            .iter()
            .map(|(archetype, units)| (*archetype, units.as_slice()))
    }

    /// Sum of bucket sizes.
    #[must_use]
    pub fn total_units(&self) -> usize {
        self.units_by_archetype.values().map(Vec::len).sum()
    }

    /// Every unit, buckets in order.
    pub fn units(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.units_by_archetype.values().flatten().copied()
    }
}

/// Registry of teams and their live units.
#[derive(Debug, Clone, Default)]
pub struct TeamRegistry {
    teams: BTreeMap<TeamId, Team>,
    membership: BTreeMap<UnitId, (TeamId, Archetype)>,
}

impl TeamRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a team.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::DuplicateTeam`] if the index is taken.
    pub fn add_team(&mut self, spec: TeamSpec) -> Result<()> {
        if self.teams.contains_key(&spec.index) {
            return Err(BattleError::DuplicateTeam(spec.index));
        }
        self.teams.insert(spec.index, Team::new(spec));
        Ok(())
    }

    /// Register `unit` under `team` and `archetype`.
    ///
    /// Returns `false` (and logs a warning) if the unit is already
    /// registered anywhere; the existing entry is kept.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::TeamNotFound`] for an unknown team.
    pub fn register(&mut self, unit: UnitId, team: TeamId, archetype: Archetype) -> Result<bool> {
        let Some(entry) = self.teams.get_mut(&team) else {
            return Err(BattleError::TeamNotFound(team));
        };
        if let Some((existing, _)) = self.membership.get(&unit) {
            tracing::warn!(unit, team = *existing, "unit already registered, ignoring");
            return Ok(false);
        }
        entry
            .units_by_archetype
            .entry(archetype)
            .or_default()
            .push(unit);
        self.membership.insert(unit, (team, archetype));
        Ok(true)
    }

    /// Remove `unit` from its bucket, deleting the bucket if it empties.
    ///
    /// Returns the team index when this removal defeated the team. Fires
    /// at most once per team life; unknown units are ignored.
    pub fn unregister(&mut self, unit: UnitId) -> Option<TeamId> {
        let (team_id, archetype) = self.membership.remove(&unit)?;
        let team = self.teams.get_mut(&team_id)?;

        if let Some(bucket) = team.units_by_archetype.get_mut(&archetype) {
            bucket.retain(|u| *u != unit);
            if bucket.is_empty() {
                team.units_by_archetype.remove(&archetype);
            }
        }

        if team.total_units() == 0 && !team.defeated {
            team.defeated = true;
            return Some(team_id);
        }
        None
    }

    /// Live unit count for a team. Unknown teams count as empty.
    #[must_use]
    pub fn total_units(&self, team: TeamId) -> usize {
        self.teams.get(&team).map_or(0, Team::total_units)
    }

    /// Snapshot of a team's units in bucket order.
    #[must_use]
    pub fn all_units(&self, team: TeamId) -> Vec<UnitId> {
        self.teams
            .get(&team)
            .map(|t| t.units().collect())
            .unwrap_or_default()
    }

    /// Empty a team without raising the defeat signal.
    ///
    /// The cleared team starts a new life: its latch is re-armed.
    pub fn clear(&mut self, team: TeamId) {
        let Some(entry) = self.teams.get_mut(&team) else {
            return;
        };
        entry.units_by_archetype.clear();
        entry.defeated = false;
        self.membership.retain(|_, (t, _)| *t != team);
    }

    /// Look up a team.
    #[must_use]
    pub fn team(&self, team: TeamId) -> Option<&Team> {
        self.teams.get(&team)
    }

    /// Teams in ascending index order.
    pub fn teams(&self) -> impl Iterator<Item = &Team> {
        self.teams.values()
    }

    /// Team a unit is registered under.
    #[must_use]
    pub fn team_of(&self, unit: UnitId) -> Option<TeamId> {
        self.membership.get(&unit).map(|(team, _)| *team)
    }

    /// Whether a unit is registered.
    #[must_use]
    pub fn contains(&self, unit: UnitId) -> bool {
        self.membership.contains_key(&unit)
    }

    /// Teams that still have units, ascending.
    #[must_use]
    pub fn teams_with_units(&self) -> Vec<TeamId> {
        self.teams
            .values()
            .filter(|t| t.total_units() > 0)
            .map(Team::index)
            .collect()
    }

    /// Check bucket bookkeeping against the membership index.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::InvalidState`] describing the first mismatch.
    pub fn validate(&self) -> Result<()> {
        let mut seen = 0;
        for team in self.teams.values() {
            for (archetype, units) in team.buckets() {
                if units.is_empty() {
                    return Err(BattleError::InvalidState(format!(
                        "team {} keeps an empty {} bucket",
                        team.index,
                        archetype.name()
                    )));
                }
                for unit in units {
                    if self.membership.get(unit) != Some(&(team.index, archetype)) {
                        return Err(BattleError::InvalidState(format!(
                            "unit {unit} misfiled under team {}",
                            team.index
                        )));
                    }
                    seen += 1;
                }
            }
        }
        if seen != self.membership.len() {
            return Err(BattleError::InvalidState(format!(
                "{} units indexed but {seen} bucketed",
                self.membership.len()
            )));
        }
        Ok(())
    }
}
