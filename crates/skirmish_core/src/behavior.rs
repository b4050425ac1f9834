//! Per-unit Idle / Move / Attack state machine.
//!
//! [`set_target`] is the only way a unit changes state. It validates the
//! new target, computes the next state, then always runs the old state's
//! exit and the new state's enter as a pair, even when the state kind is
//! unchanged. Move and Attack re-evaluate themselves by calling
//! `set_target` again with their current target.
//!
//! Updates tolerate stale targets, missing or unready movement providers,
//! and dead or inactive units by returning early.

use crate::combat;
use crate::components::{BehaviorKind, UnitId};
use crate::math::{Fixed, Vec2Fixed};
use crate::simulation::World;
use crate::unit::{AttackTimer, Unit};
use crate::value::CellFamily;

/// `target` is within the unit's effective attack range.
///
/// The hysteresis margin widens the range only for a unit already in
/// Attack.
#[must_use]
pub fn in_attack_range<F: CellFamily>(
    unit: &Unit<F>,
    target: Vec2Fixed,
    hysteresis: Fixed,
) -> bool {
    let mut range = unit.attack_range();
    if unit.behavior() == BehaviorKind::Attack {
        range = range.saturating_add(hysteresis);
    }
    unit.position().distance_squared(target) <= range.saturating_mul(range)
}

/// Point `target` at `unit`'s next state and run the transition.
///
/// An invalid target (missing, dead or friendly) is treated as `None`.
/// Dead units never transition.
pub fn set_target<F: CellFamily>(world: &mut World<F>, unit_id: UnitId, target: Option<UnitId>) {
    let hysteresis = world.config.attack_range_hysteresis;
    let Some(unit) = world.units.get(unit_id) else {
        return;
    };
    if unit.is_dead() {
        return;
    }

    let target = target.filter(|t| world.units.is_valid_target(unit.team(), Some(*t)));
    let target_pos = target
        .and_then(|t| world.units.get(t))
        .map(Unit::position);
    let from = unit.behavior();
    let to = match target_pos {
        None => BehaviorKind::Idle,
        Some(pos) if in_attack_range(unit, pos, hysteresis) => BehaviorKind::Attack,
        Some(_) => BehaviorKind::Move,
    };

    let tick = world.tick;
    let Some(unit) = world.units.get_mut(unit_id) else {
        return;
    };
    exit(unit, from);
    unit.set_target_raw(target);
    unit.set_behavior_raw(to);
    enter(unit, to, target_pos);

    if from != to {
        tracing::debug!(tick, unit = unit_id, ?from, ?to, ?target, "state transition");
        world.telemetry.record_state_transition(tick, unit_id, from, to);
        world.events.transitions.push(Transition {
            unit: unit_id,
            from,
            to,
        });
    }
}

/// A change of behavior state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    /// Unit that changed state.
    pub unit: UnitId,
    /// Previous state.
    pub from: BehaviorKind,
    /// New state.
    pub to: BehaviorKind,
}

fn enter<F: CellFamily>(unit: &mut Unit<F>, state: BehaviorKind, target_pos: Option<Vec2Fixed>) {
    match state {
        BehaviorKind::Idle => unit.with_mover(|m| {
            m.stop(true);
            m.reset_path();
        }),
        BehaviorKind::Move => {
            if let Some(pos) = target_pos {
                unit.with_mover(|m| {
                    m.stop(false);
                    m.set_destination(pos);
                });
            }
        }
        BehaviorKind::Attack => {
            unit.with_mover(|m| m.stop(true));
            unit.attack_timer = AttackTimer::fresh();
            if let Some(pos) = target_pos {
                unit.face(pos);
            }
        }
    }
}

fn exit<F: CellFamily>(unit: &mut Unit<F>, state: BehaviorKind) {
    if state == BehaviorKind::Attack {
        unit.attack_timer = AttackTimer::fresh();
    }
}

/// Run one tick of `unit_id`'s current state.
pub fn update<F: CellFamily>(world: &mut World<F>, unit_id: UnitId) {
    let hysteresis = world.config.attack_range_hysteresis;
    let Some(unit) = world.units.get(unit_id) else {
        return;
    };
    if unit.is_dead() || !unit.is_ai_active() {
        return;
    }

    let target = unit.target();
    let target_pos = target
        .filter(|t| world.units.is_valid_target(unit.team(), Some(*t)))
        .and_then(|t| world.units.get(t))
        .map(Unit::position);

    match unit.behavior() {
        BehaviorKind::Idle => {}
        BehaviorKind::Move => {
            let Some(pos) = target_pos else {
                set_target(world, unit_id, None);
                return;
            };
            if in_attack_range(unit, pos, hysteresis) {
                set_target(world, unit_id, target);
                return;
            }
            if let Some(unit) = world.units.get_mut(unit_id) {
                unit.with_mover(|m| m.set_destination(pos));
            }
        }
        BehaviorKind::Attack => {
            let (Some(pos), Some(target)) = (target_pos, target) else {
                set_target(world, unit_id, None);
                return;
            };
            if !in_attack_range(unit, pos, hysteresis) {
                set_target(world, unit_id, Some(target));
                return;
            }
            update_attack(world, unit_id, target, pos);
        }
    }
}

fn update_attack<F: CellFamily>(
    world: &mut World<F>,
    unit_id: UnitId,
    target: UnitId,
    target_pos: Vec2Fixed,
) {
    let Some(unit) = world.units.get_mut(unit_id) else {
        return;
    };
    unit.face(target_pos);

    let timer = unit.attack_timer;
    let combat = unit.stats().combat;
    let wait = if timer.first_attack {
        combat.initial_attack_delay
    } else {
        combat.attack_cooldown
    };

    if timer.elapsed >= wait {
        combat::attack(world, unit_id, target);
        if let Some(unit) = world.units.get_mut(unit_id) {
            unit.attack_timer = AttackTimer {
                elapsed: 0,
                first_attack: false,
            };
        }
    }

    if let Some(unit) = world.units.get_mut(unit_id) {
        if unit.behavior() == BehaviorKind::Attack {
            unit.attack_timer.elapsed = unit.attack_timer.elapsed.saturating_add(1);
        }
    }
}
