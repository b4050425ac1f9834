//! Movement providers.
//!
//! Path following is a black box to the battle: states hand a provider a
//! destination, stop it, reset its path and read its velocity. The driver
//! calls [`MovementProvider::advance`] once per tick to integrate position.
//!
//! Every call on a provider that is not ready must be a no-op.

use std::fmt;

use crate::math::{Fixed, Vec2Fixed};

/// Go-to-point / stop / report-velocity abstraction.
pub trait MovementProvider: fmt::Debug {
    /// Whether the provider accepts commands.
    fn is_ready(&self) -> bool;

    /// Request travel to `point`.
    fn set_destination(&mut self, point: Vec2Fixed);

    /// Halt (`true`) or resume (`false`) travel.
    fn stop(&mut self, stopped: bool);

    /// Forget the current destination and zero velocity.
    fn reset_path(&mut self);

    /// Velocity produced by the last [`advance`](Self::advance).
    fn velocity(&self) -> Vec2Fixed;

    /// Integrate one tick from `position`, returning the new position.
    fn advance(&mut self, position: Vec2Fixed) -> Vec2Fixed;
}

/// Built-in straight-line provider.
///
/// Moves directly toward its destination at a fixed speed per tick and
/// lands exactly on it. A *blocked* mover computes velocity as usual but
/// never changes position, which is how an obstacle that defeats the
/// path follower looks from the outside. A *disabled* mover is never
/// ready.
///
/// # Example
///
/// ```
/// use skirmish_core::math::{Fixed, Vec2Fixed};
/// use skirmish_core::movement::{DirectMover, MovementProvider};
///
/// let mut mover = DirectMover::new(Fixed::from_num(2));
/// mover.set_destination(Vec2Fixed::from_ints(3, 0));
///
/// let p = mover.advance(Vec2Fixed::ZERO);
/// assert_eq!(p, Vec2Fixed::from_ints(2, 0));
/// let p = mover.advance(p);
/// assert_eq!(p, Vec2Fixed::from_ints(3, 0));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectMover {
    speed: Fixed,
    destination: Option<Vec2Fixed>,
    stopped: bool,
    velocity: Vec2Fixed,
    ready: bool,
    blocked: bool,
}

impl DirectMover {
    /// Ready mover with the given speed per tick.
    #[must_use]
    pub fn new(speed: Fixed) -> Self {
        Self {
            speed,
            destination: None,
            stopped: false,
            velocity: Vec2Fixed::ZERO,
            ready: true,
            blocked: false,
        }
    }

    /// Mover whose position never changes.
    #[must_use]
    pub fn blocked(speed: Fixed) -> Self {
        Self {
            blocked: true,
            ..Self::new(speed)
        }
    }

    /// Mover that is never ready.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            ready: false,
            ..Self::new(Fixed::ZERO)
        }
    }

    /// Current destination, if any.
    #[must_use]
    pub const fn destination(&self) -> Option<Vec2Fixed> {
        self.destination
    }

    /// Whether travel is halted.
    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        self.stopped
    }
}

impl MovementProvider for DirectMover {
    fn is_ready(&self) -> bool {
        self.ready
    }

    fn set_destination(&mut self, point: Vec2Fixed) {
        if !self.ready {
            return;
        }
        self.destination = Some(point);
    }

    fn stop(&mut self, stopped: bool) {
        if !self.ready {
            return;
        }
        self.stopped = stopped;
        if stopped {
            self.velocity = Vec2Fixed::ZERO;
        }
    }

    fn reset_path(&mut self) {
        if !self.ready {
            return;
        }
        self.destination = None;
        self.velocity = Vec2Fixed::ZERO;
    }

    fn velocity(&self) -> Vec2Fixed {
        if self.ready {
            self.velocity
        } else {
            Vec2Fixed::ZERO
        }
    }

    fn advance(&mut self, position: Vec2Fixed) -> Vec2Fixed {
        if !self.ready {
            return position;
        }
        let Some(destination) = self.destination.filter(|_| !self.stopped) else {
            self.velocity = Vec2Fixed::ZERO;
            return position;
        };

        let delta = destination - position;
        let distance = delta.length();
        self.velocity = if distance <= self.speed {
            delta
        } else {
            delta.normalize().scale(self.speed)
        };

        if self.blocked {
            return position;
        }
        if distance <= self.speed {
            self.destination = None;
            return destination;
        }
        position + self.velocity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_halts_and_resume_continues() {
        let mut mover = DirectMover::new(Fixed::ONE);
        mover.set_destination(Vec2Fixed::from_ints(10, 0));

        mover.stop(true);
        assert_eq!(mover.advance(Vec2Fixed::ZERO), Vec2Fixed::ZERO);
        assert!(mover.velocity().is_zero());

        mover.stop(false);
        assert_eq!(mover.advance(Vec2Fixed::ZERO), Vec2Fixed::from_ints(1, 0));
        assert_eq!(mover.velocity(), Vec2Fixed::from_ints(1, 0));
    }

    #[test]
    fn reset_path_drops_destination() {
        let mut mover = DirectMover::new(Fixed::ONE);
        mover.set_destination(Vec2Fixed::from_ints(0, 5));
        mover.reset_path();
        assert_eq!(mover.destination(), None);
        assert_eq!(mover.advance(Vec2Fixed::ZERO), Vec2Fixed::ZERO);
    }

    #[test]
    fn blocked_mover_reports_velocity_but_stays_put() {
        let mut mover = DirectMover::blocked(Fixed::ONE);
        mover.set_destination(Vec2Fixed::from_ints(10, 0));
        let start = Vec2Fixed::from_ints(2, 2);
        assert_eq!(mover.advance(start), start);
        assert!(!mover.velocity().is_zero());
    }

    #[test]
    fn disabled_mover_ignores_everything() {
        let mut mover = DirectMover::disabled();
        mover.set_destination(Vec2Fixed::from_ints(10, 0));
        mover.stop(true);
        assert!(!mover.is_ready());
        assert_eq!(mover.destination(), None);
        assert!(!mover.is_stopped());
        assert_eq!(mover.advance(Vec2Fixed::ZERO), Vec2Fixed::ZERO);
    }
}
