//! Targeting engine.
//!
//! Nearest-enemy queries and the periodic pass that hands every targetless
//! unit its nearest living enemy. Assignment is greedy and per-unit: many
//! units may converge on the same enemy.
//!
//! # Tie-break
//!
//! Candidates are visited in registry order (team index ascending, then
//! archetype bucket, then registration order) and only a strictly closer
//! candidate replaces the current best. Equidistant enemies therefore
//! resolve to the first visited, which is stable for an unchanged set.

use crate::behavior;
use crate::components::{TeamId, UnitId};
use crate::math::{Fixed, Vec2Fixed};
use crate::registry::TeamRegistry;
use crate::scheduler::Cadence;
use crate::simulation::World;
use crate::unit::UnitStorage;
use crate::value::CellFamily;

/// Nearest living unit not on `team` to `point`, optionally limited to
/// `max_distance`.
#[must_use]
pub fn nearest_enemy_to<F: CellFamily>(
    units: &UnitStorage<F>,
    registry: &TeamRegistry,
    team: TeamId,
    point: Vec2Fixed,
    max_distance: Option<Fixed>,
) -> Option<UnitId> {
    let max_sq = max_distance.map(|d| d.saturating_mul(d));
    let mut best: Option<(UnitId, Fixed)> = None;

    for other in registry.teams().filter(|t| t.index() != team) {
        for (_, bucket) in other.buckets() {
            for &id in bucket {
                let Some(unit) = units.get_alive(id) else {
                    continue;
                };
                let dist_sq = unit.position().distance_squared(point);
                if max_sq.is_some_and(|max| dist_sq > max) {
                    continue;
                }
                if best.map_or(true, |(_, best_sq)| dist_sq < best_sq) {
                    best = Some((id, dist_sq));
                }
            }
        }
    }

    best.map(|(id, _)| id)
}

/// Nearest living enemy of `source`.
///
/// Returns `None` when the source no longer exists or no enemy is alive.
#[must_use]
pub fn find_nearest_enemy<F: CellFamily>(
    units: &UnitStorage<F>,
    registry: &TeamRegistry,
    source: UnitId,
) -> Option<UnitId> {
    let unit = units.get(source)?;
    nearest_enemy_to(units, registry, unit.team(), unit.position(), None)
}

/// Periodic target assignment.
#[derive(Debug, Clone)]
pub struct TargetingEngine {
    cadence: Cadence,
}

impl TargetingEngine {
    /// Engine whose first pass runs on the first simulated tick.
    #[must_use]
    pub const fn new(interval: u32) -> Self {
        Self {
            cadence: Cadence::primed(interval),
        }
    }

    /// Advance the cadence one tick; `true` when a pass is due.
    pub fn is_due(&mut self) -> bool {
        self.cadence.tick()
    }

    /// Run one pass over every living, active unit without a valid target.
    ///
    /// A unit whose dead target has no replacement is cleared to `None`
    /// rather than left pointing at the corpse. Returns how many units
    /// received a new target.
    pub fn update_targets<F: CellFamily>(&self, world: &mut World<F>) -> usize {
        let mut assigned = 0;

        for id in world.units.sorted_ids() {
            let Some(unit) = world.units.get(id) else {
                continue;
            };
            if unit.is_dead() || !unit.is_ai_active() {
                continue;
            }
            if world.units.is_valid_target(unit.team(), unit.target()) {
                continue;
            }
            let stale = unit.target().is_some();

            match find_nearest_enemy(&world.units, &world.registry, id) {
                Some(enemy) => {
                    behavior::set_target(world, id, Some(enemy));
                    assigned += 1;
                }
                None if stale => behavior::set_target(world, id, None),
                None => {}
            }
        }

        if assigned > 0 {
            tracing::debug!(tick = world.tick, assigned, "targeting pass");
        }
        assigned
    }
}
