//! Stuck recovery monitor.
//!
//! Samples every living unit's position on its own cadence. A unit that
//! barely moved since the last sample, has a target, and is not engaged
//! with it accumulates stuck time. A unit still inside its effective
//! attack range, hysteresis included, counts as engaged. Anything else
//! resets the timer to zero. Once the timer reaches the recovery threshold the unit's target
//! is cleared, a fresh nearest enemy is assigned if one exists, and its
//! path is reset.

use std::collections::BTreeMap;

use crate::behavior;
use crate::components::UnitId;
use crate::config::StuckConfig;
use crate::math::Vec2Fixed;
use crate::scheduler::Cadence;
use crate::simulation::World;
use crate::targeting::find_nearest_enemy;
use crate::value::CellFamily;

/// Per-unit tracking state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StuckRecord {
    /// Position at the previous sample.
    pub last_position: Vec2Fixed,
    /// Accumulated stuck time in ticks.
    pub stuck_timer: u32,
}

/// A forced recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StuckRecovery {
    /// Recovered unit.
    pub unit: UnitId,
    /// Where it was stuck.
    pub position: Vec2Fixed,
    /// Target it was stuck on.
    pub previous_target: Option<UnitId>,
    /// Target assigned by the recovery, if any.
    pub new_target: Option<UnitId>,
}

/// Periodic stuck detection and recovery.
#[derive(Debug, Clone)]
pub struct StuckMonitor {
    config: StuckConfig,
    cadence: Cadence,
    records: BTreeMap<UnitId, StuckRecord>,
}

impl StuckMonitor {
    /// Monitor that takes its first sample on the first simulated tick.
    #[must_use]
    pub fn new(config: StuckConfig) -> Self {
        Self {
            config,
            cadence: Cadence::primed(config.check_interval),
            records: BTreeMap::new(),
        }
    }

    /// Advance the cadence one tick; `true` when a check is due.
    pub fn is_due(&mut self) -> bool {
        self.cadence.tick()
    }

    /// Tracking record for a unit.
    #[must_use]
    pub fn record(&self, unit: UnitId) -> Option<&StuckRecord> {
        self.records.get(&unit)
    }

    /// Number of tracked units.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.records.len()
    }

    /// Run one check over every living unit.
    pub fn check<F: CellFamily>(&mut self, world: &mut World<F>) -> Vec<StuckRecovery> {
        self.records
            .retain(|id, _| world.units.get_alive(*id).is_some());

        let hysteresis = world.config.attack_range_hysteresis;
        let interval = self.cadence.interval();
        let threshold = self.config.recovery_threshold().max(interval);
        let mut recoveries = Vec::new();

        for id in world.units.sorted_ids() {
            let Some(unit) = world.units.get_alive(id) else {
                continue;
            };
            let position = unit.position();
            let target = unit.target();

            let Some(record) = self.records.get_mut(&id) else {
                self.records.insert(
                    id,
                    StuckRecord {
                        last_position: position,
                        stuck_timer: 0,
                    },
                );
                continue;
            };

            let delta = position.distance(record.last_position);
            record.last_position = position;

            let engaged = target
                .filter(|t| world.units.is_valid_target(unit.team(), Some(*t)))
                .and_then(|t| world.units.get(t))
                .is_some_and(|t| {
                    let reach = unit.attack_range().saturating_mul(self.config.engaged_factor);
                    position.distance_squared(t.position()) <= reach.saturating_mul(reach)
                        || behavior::in_attack_range(unit, t.position(), hysteresis)
                });

            if delta < self.config.movement_threshold && target.is_some() && !engaged {
                record.stuck_timer = record.stuck_timer.saturating_add(interval);
            } else {
                record.stuck_timer = 0;
            }

            if record.stuck_timer >= threshold {
                record.stuck_timer = 0;
                recoveries.push(recover(world, id, position, target));
            }
        }

        recoveries
    }
}

fn recover<F: CellFamily>(
    world: &mut World<F>,
    unit: UnitId,
    position: Vec2Fixed,
    previous_target: Option<UnitId>,
) -> StuckRecovery {
    behavior::set_target(world, unit, None);
    let new_target = find_nearest_enemy(&world.units, &world.registry, unit);
    if new_target.is_some() {
        behavior::set_target(world, unit, new_target);
    }
    if let Some(u) = world.units.get_mut(unit) {
        u.with_mover(|m| m.reset_path());
    }

    tracing::info!(
        tick = world.tick,
        unit,
        ?previous_target,
        ?new_target,
        "recovered stuck unit"
    );
    world.telemetry.record_stuck(world.tick, unit, position);

    StuckRecovery {
        unit,
        position,
        previous_target,
        new_target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Archetype, BehaviorKind, UnitStats};
    use crate::config::BattleConfig;
    use crate::math::Fixed;
    use crate::movement::DirectMover;
    use crate::registry::TeamSpec;
    use crate::simulation::{Battle, UnitSpawn};

    fn battle(config: BattleConfig) -> Battle {
        let mut battle = Battle::new(config);
        battle.add_team(TeamSpec::new(0, "blue")).unwrap();
        battle.add_team(TeamSpec::new(1, "red")).unwrap();
        battle
    }

    fn melee() -> UnitStats {
        UnitStats::for_archetype(Archetype::Melee).with_range(Fixed::from_num(2))
    }

    #[test]
    fn engaged_units_are_never_stuck() {
        let mut battle = battle(BattleConfig::default());
        let a = battle
            .spawn_unit(UnitSpawn::new(0, melee().with_health(10_000), Vec2Fixed::ZERO))
            .unwrap();
        battle
            .spawn_unit(UnitSpawn::new(
                1,
                melee().with_health(10_000),
                Vec2Fixed::from_ints(1, 0),
            ))
            .unwrap();
        battle.start();

        let mut recoveries = 0;
        for _ in 0..1000 {
            recoveries += battle.tick().stuck_recoveries.len();
        }
        assert_eq!(recoveries, 0);
        assert_eq!(battle.unit(a).unwrap().behavior(), BehaviorKind::Attack);
    }

    #[test]
    fn attacker_held_by_hysteresis_is_not_stuck() {
        let mut battle = battle(BattleConfig {
            attack_range_hysteresis: Fixed::ONE,
            ..BattleConfig::default()
        });
        let a = battle
            .spawn_unit(UnitSpawn::new(0, melee().with_health(10_000), Vec2Fixed::ZERO))
            .unwrap();
        let b = battle
            .spawn_unit(
                UnitSpawn::new(1, melee().with_health(10_000), Vec2Fixed::from_ints(2, 0))
                    .without_mover(),
            )
            .unwrap();
        battle.start();
        battle.tick();
        assert_eq!(battle.unit(a).unwrap().behavior(), BehaviorKind::Attack);

        // Past the 1.1x engaged radius, inside range plus hysteresis.
        battle
            .unit_mut(b)
            .unwrap()
            .set_position(Vec2Fixed::new(Fixed::from_num(2.5), Fixed::ZERO));

        let mut recoveries = 0;
        for _ in 0..400 {
            let events = battle.tick();
            recoveries += events.stuck_recoveries.iter().filter(|r| r.unit == a).count();
            assert!(events.transitions.iter().all(|t| t.unit != a));
        }
        assert_eq!(recoveries, 0);
        assert_eq!(battle.unit(a).unwrap().behavior(), BehaviorKind::Attack);
        assert!(battle.unit(b).unwrap().health() < 10_000);
    }

    #[test]
    fn idle_units_are_never_stuck() {
        let mut battle = battle(BattleConfig::default());
        battle
            .spawn_unit(UnitSpawn::new(0, melee(), Vec2Fixed::ZERO))
            .unwrap();
        battle.start();

        let mut recoveries = 0;
        for _ in 0..1000 {
            recoveries += battle.tick().stuck_recoveries.len();
        }
        assert_eq!(recoveries, 0);
    }

    #[test]
    fn blocked_unit_recovers_after_two_intervals() {
        let mut battle = battle(BattleConfig::default());
        let a = battle
            .spawn_unit(
                UnitSpawn::new(0, melee(), Vec2Fixed::ZERO)
                    .with_mover(Box::new(DirectMover::blocked(Fixed::ONE))),
            )
            .unwrap();
        let b = battle
            .spawn_unit(
                UnitSpawn::new(1, melee(), Vec2Fixed::from_ints(10, 0))
                    .with_mover(Box::new(DirectMover::blocked(Fixed::ONE))),
            )
            .unwrap();
        battle.start();

        let mut recovered_at = Vec::new();
        for tick in 0..=200 {
            for r in battle.tick().stuck_recoveries {
                if r.unit == a {
                    assert_eq!(r.previous_target, Some(b));
                    assert_eq!(r.new_target, Some(b));
                    recovered_at.push(tick);
                }
            }
        }
        assert_eq!(recovered_at, vec![200]);
        assert_eq!(battle.stuck_monitor().record(a).unwrap().stuck_timer, 0);
    }

    #[test]
    fn records_for_dead_units_are_dropped() {
        let mut battle = battle(BattleConfig::default());
        let a = battle
            .spawn_unit(UnitSpawn::new(0, melee(), Vec2Fixed::ZERO))
            .unwrap();
        let b = battle
            .spawn_unit(UnitSpawn::new(1, melee(), Vec2Fixed::from_ints(50, 0)))
            .unwrap();
        battle.start();
        battle.tick();
        assert!(battle.stuck_monitor().record(b).is_some());

        battle.deal_damage(b, 1000).unwrap();
        battle.run_for(100);
        assert!(battle.stuck_monitor().record(b).is_none());
        assert!(battle.stuck_monitor().record(a).is_some());
        assert_eq!(battle.stuck_monitor().tracked(), 1);
    }
}
