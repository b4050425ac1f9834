//! Units and their storage.
//!
//! A [`Unit`] carries identity, kinematics, a read-only stat block and
//! the mutable combat state. Combat state that outside observers care
//! about (health, death, target, behavior) is held in value cells chosen
//! by the battle's [`CellFamily`].

use std::collections::HashMap;

use crate::components::{Archetype, BehaviorKind, TeamId, UnitId, UnitStats};
use crate::math::{Fixed, Vec2Fixed};
use crate::movement::MovementProvider;
use crate::value::{new_cell, CellFamily, Direct, ValueCell};

/// Per-state timer owned by the Attack state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct AttackTimer {
    /// Ticks since entering Attack or since the last attack.
    pub elapsed: u32,
    /// No attack has landed since entering Attack.
    pub first_attack: bool,
}

impl AttackTimer {
    pub(crate) const fn fresh() -> Self {
        Self {
            elapsed: 0,
            first_attack: true,
        }
    }
}

/// A combat unit.
#[derive(Debug)]
pub struct Unit<F: CellFamily = Direct> {
    id: UnitId,
    team: TeamId,
    stats: UnitStats,
    position: Vec2Fixed,
    facing: Vec2Fixed,
    health: F::Cell<u32>,
    dead: F::Cell<bool>,
    target: F::Cell<Option<UnitId>>,
    state: F::Cell<BehaviorKind>,
    pub(crate) attack_timer: AttackTimer,
    ai_active: bool,
    collision_enabled: bool,
    mover: Option<Box<dyn MovementProvider>>,
}

impl<F: CellFamily> Unit<F> {
    /// Create a unit at full health, idle, with AI inactive.
    #[must_use]
    pub fn new(
        team: TeamId,
        stats: UnitStats,
        position: Vec2Fixed,
        mover: Option<Box<dyn MovementProvider>>,
    ) -> Self {
        Self {
            id: 0,
            team,
            stats,
            position,
            facing: Vec2Fixed::UNIT_X,
            health: new_cell::<F, _>(stats.max_health),
            dead: new_cell::<F, _>(false),
            target: new_cell::<F, _>(None),
            state: new_cell::<F, _>(BehaviorKind::Idle),
            attack_timer: AttackTimer::fresh(),
            ai_active: false,
            collision_enabled: true,
            mover,
        }
    }

    /// Unit handle.
    #[must_use]
    pub const fn id(&self) -> UnitId {
        self.id
    }

    /// Owning team.
    #[must_use]
    pub const fn team(&self) -> TeamId {
        self.team
    }

    /// Combat role.
    #[must_use]
    pub const fn archetype(&self) -> Archetype {
        self.stats.archetype()
    }

    /// Resolved stat block.
    #[must_use]
    pub const fn stats(&self) -> &UnitStats {
        &self.stats
    }

    /// Base attack range.
    #[must_use]
    pub const fn attack_range(&self) -> Fixed {
        self.stats.combat.attack_range
    }

    /// Planar position.
    #[must_use]
    pub const fn position(&self) -> Vec2Fixed {
        self.position
    }

    /// Move the unit directly, bypassing its movement provider.
    pub fn set_position(&mut self, position: Vec2Fixed) {
        self.position = position;
    }

    /// Unit-length facing direction.
    #[must_use]
    pub const fn facing(&self) -> Vec2Fixed {
        self.facing
    }

    /// Current health points.
    #[must_use]
    pub fn health(&self) -> u32 {
        self.health.get()
    }

    /// Maximum health points.
    #[must_use]
    pub const fn max_health(&self) -> u32 {
        self.stats.max_health
    }

    /// Whether the unit has died. Dead units stay in storage until their
    /// scheduled destruction.
    #[must_use]
    pub fn is_dead(&self) -> bool {
        self.dead.get()
    }

    /// Whether behavior updates run for this unit.
    #[must_use]
    pub const fn is_ai_active(&self) -> bool {
        self.ai_active
    }

    /// Whether hit tests consider this unit.
    #[must_use]
    pub const fn collision_enabled(&self) -> bool {
        self.collision_enabled
    }

    /// Current target handle. Must be re-validated before use.
    #[must_use]
    pub fn target(&self) -> Option<UnitId> {
        self.target.get()
    }

    /// Current behavior state.
    #[must_use]
    pub fn behavior(&self) -> BehaviorKind {
        self.state.get()
    }

    /// Movement provider, if the unit has one.
    #[must_use]
    pub fn mover(&self) -> Option<&dyn MovementProvider> {
        self.mover.as_deref()
    }

    /// Health cell, for attaching observers.
    pub fn health_cell_mut(&mut self) -> &mut F::Cell<u32> {
        &mut self.health
    }

    /// Death flag cell, for attaching observers.
    pub fn dead_cell_mut(&mut self) -> &mut F::Cell<bool> {
        &mut self.dead
    }

    /// Target cell, for attaching observers.
    pub fn target_cell_mut(&mut self) -> &mut F::Cell<Option<UnitId>> {
        &mut self.target
    }

    /// Behavior cell, for attaching observers.
    pub fn behavior_cell_mut(&mut self) -> &mut F::Cell<BehaviorKind> {
        &mut self.state
    }

    /// Alive and distinct-team check used for every target validation.
    #[must_use]
    pub fn is_enemy_of(&self, team: TeamId) -> bool {
        !self.is_dead() && self.team != team
    }

    pub(crate) fn set_ai_active(&mut self, active: bool) {
        self.ai_active = active;
    }

    pub(crate) fn set_health(&mut self, health: u32) {
        self.health.set(health);
    }

    pub(crate) fn set_target_raw(&mut self, target: Option<UnitId>) {
        self.target.set(target);
    }

    pub(crate) fn set_behavior_raw(&mut self, state: BehaviorKind) {
        self.state.set(state);
    }

    /// Mark dead and switch off everything a corpse should not do.
    pub(crate) fn mark_dead(&mut self) {
        self.dead.set(true);
        self.ai_active = false;
        self.collision_enabled = false;
        self.with_mover(|m| m.stop(true));
    }

    /// Run `f` against the provider when it exists and is ready.
    pub(crate) fn with_mover(&mut self, f: impl FnOnce(&mut dyn MovementProvider)) {
        if let Some(mover) = self.mover.as_deref_mut() {
            if mover.is_ready() {
                f(mover);
            }
        }
    }

    /// Integrate one tick of movement and update facing.
    pub(crate) fn advance(&mut self) {
        let Some(mover) = self.mover.as_deref_mut() else {
            return;
        };
        if !mover.is_ready() {
            return;
        }
        self.position = mover.advance(self.position);
        let velocity = mover.velocity();
        if !velocity.is_zero() {
            self.facing = velocity.normalize();
        }
    }

    /// Point the unit at `point` without moving it.
    pub(crate) fn face(&mut self, point: Vec2Fixed) {
        let dir = (point - self.position).normalize();
        if !dir.is_zero() {
            self.facing = dir;
        }
    }
}

/// Storage for all units in a battle.
///
/// Uses a `HashMap` for O(1) lookup by handle, with deterministic
/// iteration via sorted keys when running passes.
#[derive(Debug)]
pub struct UnitStorage<F: CellFamily = Direct> {
    units: HashMap<UnitId, Unit<F>>,
    next_id: UnitId,
}

impl<F: CellFamily> UnitStorage<F> {
    /// Create empty storage.
    #[must_use]
    pub fn new() -> Self {
        Self {
            units: HashMap::new(),
            next_id: 1,
        }
    }

    /// Insert a unit and return its new handle.
    pub fn insert(&mut self, mut unit: Unit<F>) -> UnitId {
        let id = self.next_id;
        self.next_id += 1;
        unit.id = id;
        self.units.insert(id, unit);
        id
    }

    /// Remove a unit, invalidating its handle.
    pub fn remove(&mut self, id: UnitId) -> Option<Unit<F>> {
        self.units.remove(&id)
    }

    /// Get a unit by handle.
    #[must_use]
    pub fn get(&self, id: UnitId) -> Option<&Unit<F>> {
        self.units.get(&id)
    }

    /// Get a mutable unit by handle.
    pub fn get_mut(&mut self, id: UnitId) -> Option<&mut Unit<F>> {
        self.units.get_mut(&id)
    }

    /// Get a unit only if it is alive.
    #[must_use]
    pub fn get_alive(&self, id: UnitId) -> Option<&Unit<F>> {
        self.units.get(&id).filter(|u| !u.is_dead())
    }

    /// Check if a handle is still valid.
    #[must_use]
    pub fn contains(&self, id: UnitId) -> bool {
        self.units.contains_key(&id)
    }

    /// Number of stored units, dead or alive.
    #[must_use]
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Check if storage is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Sorted handles for deterministic iteration.
    #[must_use]
    pub fn sorted_ids(&self) -> Vec<UnitId> {
        let mut ids: Vec<_> = self.units.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Iterate over all units (not in deterministic order).
    pub fn iter(&self) -> impl Iterator<Item = (&UnitId, &Unit<F>)> {
        self.units.iter()
    }

    /// `target` resolves to a living unit on a different team than `team`.
    #[must_use]
    pub fn is_valid_target(&self, team: TeamId, target: Option<UnitId>) -> bool {
        target
            .and_then(|t| self.get(t))
            .is_some_and(|t| t.is_enemy_of(team))
    }
}

impl<F: CellFamily> Default for UnitStorage<F> {
    fn default() -> Self {
        Self::new()
    }
}
