//! Artillery projectiles.
//!
//! A round flies straight for its initial phase, then homes: its turn
//! rate and speed both accelerate toward their caps while its heading is
//! steered at the target. A round whose target is lost searches the
//! retarget radius on a fixed cadence and keeps flying straight if
//! nothing is found.
//!
//! A round ends in one of three ways:
//!
//! - contact with a living enemy: explodes, damaging every living enemy
//!   within the explosion radius exactly once;
//! - lifespan expiry: despawns silently;
//! - the battle stops simulating: every round is cleared silently.

use crate::combat::{self, CombatEvent};
use crate::components::{ProjectileId, ProjectileParams, TeamId, UnitId};
use crate::math::{segment_circle_contact, Fixed, Vec2Fixed};
use crate::simulation::World;
use crate::targeting::nearest_enemy_to;
use crate::unit::UnitStorage;
use crate::value::CellFamily;

/// An artillery round in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projectile {
    id: ProjectileId,
    owner: UnitId,
    owner_team: TeamId,
    target: Option<UnitId>,
    position: Vec2Fixed,
    direction: Vec2Fixed,
    speed: Fixed,
    turn_rate: Fixed,
    damage: u32,
    params: ProjectileParams,
    elapsed: u32,
    retarget_timer: u32,
    homing: bool,
}

impl Projectile {
    /// Projectile handle.
    #[must_use]
    pub const fn id(&self) -> ProjectileId {
        self.id
    }

    /// Firing unit. May no longer exist.
    #[must_use]
    pub const fn owner(&self) -> UnitId {
        self.owner
    }

    /// Team the round was fired for.
    #[must_use]
    pub const fn owner_team(&self) -> TeamId {
        self.owner_team
    }

    /// Current target handle.
    #[must_use]
    pub const fn target(&self) -> Option<UnitId> {
        self.target
    }

    /// Current position.
    #[must_use]
    pub const fn position(&self) -> Vec2Fixed {
        self.position
    }

    /// Unit-length heading.
    #[must_use]
    pub const fn direction(&self) -> Vec2Fixed {
        self.direction
    }

    /// Current speed per tick.
    #[must_use]
    pub const fn speed(&self) -> Fixed {
        self.speed
    }

    /// Ticks in flight.
    #[must_use]
    pub const fn elapsed(&self) -> u32 {
        self.elapsed
    }

    /// Whether the straight phase is over.
    #[must_use]
    pub const fn is_homing(&self) -> bool {
        self.homing
    }

    /// Kinematic parameters copied from the firer.
    #[must_use]
    pub const fn params(&self) -> &ProjectileParams {
        &self.params
    }
}

/// Launch a round from `owner` at `target`.
pub(crate) fn spawn<F: CellFamily>(
    world: &mut World<F>,
    owner: UnitId,
    target: UnitId,
    damage: u32,
    params: ProjectileParams,
) -> Option<ProjectileId> {
    let unit = world.units.get(owner)?;
    let (origin, owner_team, facing) = (unit.position(), unit.team(), unit.facing());
    let target_pos = world.units.get(target)?.position();
    let mut direction = (target_pos - origin).normalize();
    if direction.is_zero() {
        direction = facing;
    }

    let id = world.next_projectile_id();
    let projectile = Projectile {
        id,
        owner,
        owner_team,
        target: Some(target),
        position: origin,
        direction,
        speed: params.initial_speed,
        turn_rate: params.initial_turn_rate,
        damage,
        params,
        elapsed: 0,
        retarget_timer: 0,
        homing: false,
    };
    world.projectiles.insert(id, projectile);
    world.events.combat_events.push(CombatEvent::ProjectileSpawned {
        projectile: id,
        source: owner,
        target,
    });
    Some(id)
}

/// Advance every round one tick.
pub(crate) fn update_projectiles<F: CellFamily>(world: &mut World<F>) {
    if !world.simulating {
        if !world.projectiles.is_empty() {
            tracing::debug!(count = world.projectiles.len(), "clearing projectiles");
            world.projectiles.clear();
        }
        return;
    }

    let ids: Vec<ProjectileId> = world.projectiles.keys().copied().collect();
    for id in ids {
        let Some(mut projectile) = world.projectiles.remove(&id) else {
            continue;
        };
        if step(world, &mut projectile) {
            world.projectiles.insert(id, projectile);
        }
    }
}

/// One tick of flight. Returns `false` when the round is gone.
fn step<F: CellFamily>(world: &mut World<F>, p: &mut Projectile) -> bool {
    p.elapsed += 1;
    if p.elapsed >= p.params.lifespan {
        tracing::debug!(projectile = p.id, "projectile expired");
        world
            .events
            .combat_events
            .push(CombatEvent::ProjectileExpired { projectile: p.id });
        return false;
    }

    reacquire(world, p);

    if p.elapsed > p.params.straight_ticks {
        p.homing = true;
        p.speed = (p.speed + p.params.acceleration).min(p.params.max_speed);
        let target_pos = p
            .target
            .and_then(|t| world.units.get(t))
            .map(|t| t.position());
        if let Some(target_pos) = target_pos {
            p.turn_rate = (p.turn_rate + p.params.turn_acceleration).min(p.params.max_turn_rate);
            let desired = (target_pos - p.position).normalize();
            p.direction = p.direction.rotate_towards(desired, p.turn_rate);
        }
    }

    let start = p.position;
    let end = start + p.direction.scale(p.speed);

    match first_contact(&world.units, p.owner_team, start, end, p.params.collision_radius) {
        Some(t) => {
            let impact = start + (end - start).scale(t);
            detonate(world, p, impact);
            false
        }
        None => {
            p.position = end;
            true
        }
    }
}

/// Keep the target valid, searching for a replacement on the retarget
/// cadence. The first search happens on the tick the target is lost.
fn reacquire<F: CellFamily>(world: &mut World<F>, p: &mut Projectile) {
    if world.units.is_valid_target(p.owner_team, p.target) {
        p.retarget_timer = 0;
        return;
    }
    p.target = None;

    let interval = world.config.projectile_retarget_interval.max(1);
    let due = p.retarget_timer % interval == 0;
    p.retarget_timer = p.retarget_timer.wrapping_add(1);
    if !due {
        return;
    }

    let found = nearest_enemy_to(
        &world.units,
        &world.registry,
        p.owner_team,
        p.position,
        Some(p.params.retarget_radius),
    );
    if let Some(target) = found {
        tracing::debug!(projectile = p.id, target, "projectile retargeted");
        p.target = Some(target);
        p.retarget_timer = 0;
        world.events.combat_events.push(CombatEvent::ProjectileRetargeted {
            projectile: p.id,
            target,
        });
    }
}

/// Earliest contact along `start → end` with a living, collidable enemy.
fn first_contact<F: CellFamily>(
    units: &UnitStorage<F>,
    team: TeamId,
    start: Vec2Fixed,
    end: Vec2Fixed,
    radius: Fixed,
) -> Option<Fixed> {
    let mut best: Option<Fixed> = None;
    for id in units.sorted_ids() {
        let Some(unit) = units.get(id) else {
            continue;
        };
        if !unit.is_enemy_of(team) || !unit.collision_enabled() {
            continue;
        }
        let reach = radius + unit.stats().combat.body_radius;
        if let Some(t) = segment_circle_contact(start, end, unit.position(), reach) {
            if best.map_or(true, |b| t < b) {
                best = Some(t);
            }
        }
    }
    best
}

/// Living enemies of `team` within `radius` of `center`, in handle order.
#[must_use]
pub fn splash_victims<F: CellFamily>(
    units: &UnitStorage<F>,
    team: TeamId,
    center: Vec2Fixed,
    radius: Fixed,
) -> Vec<UnitId> {
    let radius_sq = radius.saturating_mul(radius);
    units
        .sorted_ids()
        .into_iter()
        .filter(|id| {
            units.get(*id).is_some_and(|u| {
                u.is_enemy_of(team) && u.position().distance_squared(center) <= radius_sq
            })
        })
        .collect()
}

/// Apply splash damage at `impact`. The victim list is fixed before any
/// damage lands, so each unit is hit at most once.
fn detonate<F: CellFamily>(world: &mut World<F>, p: &Projectile, impact: Vec2Fixed) {
    let victims = splash_victims(&world.units, p.owner_team, impact, p.params.explosion_radius);
    for &victim in &victims {
        combat::take_damage(
            world,
            victim,
            p.damage,
            Some(combat::DamageSource {
                unit: p.owner,
                team: p.owner_team,
            }),
        );
    }

    tracing::debug!(projectile = p.id, victims = victims.len(), "projectile detonated");
    world
        .telemetry
        .record_detonation(world.tick, impact, victims.len());
    world.events.combat_events.push(CombatEvent::ProjectileDetonated {
        projectile: p.id,
        position: impact,
        victims,
    });
}
