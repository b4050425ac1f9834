//! Tick-based timing: interval gates and deferred actions.
//!
//! Nothing here blocks. A [`Cadence`] is re-checked every tick and opens
//! once its interval has elapsed; a [`Scheduler`] holds actions keyed by
//! the tick they fall due.

use std::collections::BTreeMap;

use crate::components::UnitId;

/// Fixed-interval gate for periodic passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    interval: u32,
    elapsed: u32,
}

impl Cadence {
    /// Gate that first opens after a full interval. Zero counts as one.
    #[must_use]
    pub const fn new(interval: u32) -> Self {
        let interval = if interval == 0 { 1 } else { interval };
        Self {
            interval,
            elapsed: 0,
        }
    }

    /// Gate that opens on the very next tick, then every interval.
    #[must_use]
    pub const fn primed(interval: u32) -> Self {
        let mut cadence = Self::new(interval);
        cadence.elapsed = cadence.interval - 1;
        cadence
    }

    /// Interval in ticks.
    #[must_use]
    pub const fn interval(&self) -> u32 {
        self.interval
    }

    /// Advance one tick. Returns `true` when the pass is due.
    pub fn tick(&mut self) -> bool {
        self.elapsed += 1;
        if self.elapsed >= self.interval {
            self.elapsed = 0;
            true
        } else {
            false
        }
    }
}

/// An action to run once a tick is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeferredAction {
    /// Remove a dead unit from storage, invalidating its handle.
    DestroyUnit(UnitId),
}

/// Deferred actions keyed by due tick.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    queue: BTreeMap<u64, Vec<DeferredAction>>,
}

impl Scheduler {
    /// Create an empty scheduler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `action` to run at `due_tick`.
    pub fn schedule(&mut self, due_tick: u64, action: DeferredAction) {
        self.queue.entry(due_tick).or_default().push(action);
    }

    /// Remove and return every action due at or before `now`, in due
    /// order, then scheduling order.
    pub fn drain_due(&mut self, now: u64) -> Vec<DeferredAction> {
        let later = self.queue.split_off(&(now + 1));
        let due = std::mem::replace(&mut self.queue, later);
        due.into_values().flatten().collect()
    }

    /// Number of pending actions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.values().map(Vec::len).sum()
    }

    /// Check if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
