//! Fire-and-forget telemetry hooks.
//!
//! The battle behaves identically with or without a sink attached.

use crate::components::{BehaviorKind, TeamId, UnitId};
use crate::math::Vec2Fixed;

/// Receives combat notifications. Every method defaults to a no-op.
pub trait TelemetrySink {
    /// An attack was executed.
    fn record_attack(&mut self, _tick: u64, _attacker: UnitId, _target: UnitId) {}

    /// A unit took damage.
    fn record_damage(&mut self, _tick: u64, _target: UnitId, _amount: u32, _remaining: u32) {}

    /// A unit changed behavior state.
    fn record_state_transition(
        &mut self,
        _tick: u64,
        _unit: UnitId,
        _from: BehaviorKind,
        _to: BehaviorKind,
    ) {
    }

    /// A stuck unit was forcibly recovered.
    fn record_stuck(&mut self, _tick: u64, _unit: UnitId, _position: Vec2Fixed) {}

    /// A unit died.
    fn record_death(&mut self, _tick: u64, _unit: UnitId) {}

    /// A team lost its last unit.
    fn record_team_defeated(&mut self, _tick: u64, _team: TeamId) {}

    /// A projectile exploded.
    fn record_detonation(&mut self, _tick: u64, _position: Vec2Fixed, _victims: usize) {}
}

/// Sink that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl TelemetrySink for NullSink {}

/// Sink that forwards everything to `tracing` at debug level.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn record_attack(&mut self, tick: u64, attacker: UnitId, target: UnitId) {
        tracing::debug!(tick, attacker, target, "attack");
    }

    fn record_damage(&mut self, tick: u64, target: UnitId, amount: u32, remaining: u32) {
        tracing::debug!(tick, target, amount, remaining, "damage");
    }

    fn record_state_transition(
        &mut self,
        tick: u64,
        unit: UnitId,
        from: BehaviorKind,
        to: BehaviorKind,
    ) {
        tracing::debug!(tick, unit, ?from, ?to, "state transition");
    }

    fn record_stuck(&mut self, tick: u64, unit: UnitId, position: Vec2Fixed) {
        tracing::debug!(
            tick,
            unit,
            x = position.x.to_num::<f64>(),
            y = position.y.to_num::<f64>(),
            "stuck"
        );
    }

    fn record_death(&mut self, tick: u64, unit: UnitId) {
        tracing::debug!(tick, unit, "death");
    }

    fn record_team_defeated(&mut self, tick: u64, team: TeamId) {
        tracing::debug!(tick, team, "team defeated");
    }

    fn record_detonation(&mut self, tick: u64, position: Vec2Fixed, victims: usize) {
        tracing::debug!(
            tick,
            victims,
            x = position.x.to_num::<f64>(),
            y = position.y.to_num::<f64>(),
            "detonation"
        );
    }
}
