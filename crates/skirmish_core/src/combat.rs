//! Combat resolution.
//!
//! Attack execution per archetype, damage application and the death
//! lifecycle. `attack` is only reached from the Attack state with a
//! living attacker and a valid target.
//!
//! ## Archetypes
//!
//! | Archetype | Attack |
//! |-----------|--------|
//! | Melee     | Stops and deals damage directly |
//! | Ranged    | Retreats if crowded, then hit-scans toward the target; the first enemy on the line takes the damage |
//! | Artillery | Launches a homing projectile; the firer deals no direct damage |

use crate::components::{Archetype, Loadout, ProjectileId, RangedStats, TeamId, UnitId};
use crate::math::{ray_circle_distance, Fixed, Vec2Fixed};
use crate::projectile;
use crate::scheduler::DeferredAction;
use crate::simulation::World;
use crate::value::CellFamily;

// ============================================================================
// Events
// ============================================================================

/// Events generated by combat resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CombatEvent {
    /// An attack was executed.
    AttackStarted {
        /// Unit performing the attack.
        attacker: UnitId,
        /// Its target.
        target: UnitId,
        /// Attack variant used.
        archetype: Archetype,
    },
    /// A ranged unit backed away from a crowding enemy.
    Retreat {
        /// Retreating unit.
        unit: UnitId,
        /// Where it was told to go.
        destination: Vec2Fixed,
    },
    /// A hit-scan shot was fired.
    ShotFired {
        /// Shooter.
        attacker: UnitId,
        /// First enemy struck, if any.
        hit: Option<UnitId>,
    },
    /// An artillery round was launched.
    ProjectileSpawned {
        /// New projectile.
        projectile: ProjectileId,
        /// Firing unit.
        source: UnitId,
        /// Initial target.
        target: UnitId,
    },
    /// A projectile lost its target and acquired another.
    ProjectileRetargeted {
        /// Projectile.
        projectile: ProjectileId,
        /// Newly acquired target.
        target: UnitId,
    },
    /// A projectile exploded.
    ProjectileDetonated {
        /// Projectile.
        projectile: ProjectileId,
        /// Impact point.
        position: Vec2Fixed,
        /// Every unit damaged by the blast.
        victims: Vec<UnitId>,
    },
    /// A projectile reached its lifespan without hitting anything.
    ProjectileExpired {
        /// Projectile.
        projectile: ProjectileId,
    },
}

/// Who dealt a hit. The team is captured at the time of the attack, so it
/// survives the attacking unit being destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageSource {
    /// Attacking unit. May no longer exist.
    pub unit: UnitId,
    /// Team the unit fought for.
    pub team: TeamId,
}

/// Damage applied to a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DamageEvent {
    /// The unit dealing damage, if any.
    pub attacker: Option<UnitId>,
    /// Team credited with the damage, if any.
    pub attacker_team: Option<TeamId>,
    /// The unit receiving damage.
    pub target: UnitId,
    /// Amount of damage dealt.
    pub damage: u32,
    /// Health left afterwards.
    pub remaining: u32,
}

// ============================================================================
// Attacks
// ============================================================================

/// Execute one attack by `attacker` on `target`.
///
/// Does nothing if either side is dead, missing, or on the same team.
pub(crate) fn attack<F: CellFamily>(world: &mut World<F>, attacker: UnitId, target: UnitId) {
    let Some(unit) = world.units.get_alive(attacker) else {
        return;
    };
    if !world.units.is_valid_target(unit.team(), Some(target)) {
        return;
    }
    let loadout = unit.stats().loadout;
    let damage = unit.stats().combat.damage;
    let source = DamageSource {
        unit: attacker,
        team: unit.team(),
    };
    let tick = world.tick;

    tracing::debug!(tick, attacker, target, archetype = loadout.archetype().name(), "attack");
    world.telemetry.record_attack(tick, attacker, target);
    world.events.combat_events.push(CombatEvent::AttackStarted {
        attacker,
        target,
        archetype: loadout.archetype(),
    });

    match loadout {
        Loadout::Melee => {
            if let Some(unit) = world.units.get_mut(attacker) {
                unit.with_mover(|m| m.stop(true));
            }
            take_damage(world, target, damage, Some(source));
        }
        Loadout::Ranged(ranged) => ranged_attack(world, source, target, damage, ranged),
        Loadout::Artillery(params) => {
            projectile::spawn(world, attacker, target, damage, params);
        }
    }
}

fn ranged_attack<F: CellFamily>(
    world: &mut World<F>,
    source: DamageSource,
    target: UnitId,
    damage: u32,
    ranged: RangedStats,
) {
    let Some(target_pos) = world.units.get(target).map(|t| t.position()) else {
        return;
    };
    let attacker = source.unit;
    let Some(unit) = world.units.get_mut(attacker) else {
        return;
    };
    unit.face(target_pos);
    let position = unit.position();
    let facing = unit.facing();
    let team = source.team;
    let range = unit.attack_range();

    let too_close = ranged.retreat_distance.saturating_mul(ranged.retreat_distance);
    if position.distance_squared(target_pos) < too_close {
        let mut away = (position - target_pos).normalize();
        if away.is_zero() {
            away = -facing;
        }
        let destination = position + away.scale(ranged.retreat_step);
        unit.with_mover(|m| {
            m.stop(false);
            m.set_destination(destination);
        });
        world.events.combat_events.push(CombatEvent::Retreat {
            unit: attacker,
            destination,
        });
    }

    let fire_point = position + facing.scale(ranged.muzzle_offset);
    let mut direction = (target_pos - fire_point).normalize();
    if direction.is_zero() {
        direction = facing;
    }

    let hit = first_enemy_on_ray(world, team, fire_point, direction, range);
    world.events.combat_events.push(CombatEvent::ShotFired { attacker, hit });
    if let Some(hit) = hit {
        take_damage(world, hit, damage, Some(source));
    }
}

/// First living, collidable enemy of `team` struck by a ray from `origin`
/// within `max_distance`. Friendly units never block the shot.
fn first_enemy_on_ray<F: CellFamily>(
    world: &World<F>,
    team: TeamId,
    origin: Vec2Fixed,
    direction: Vec2Fixed,
    max_distance: Fixed,
) -> Option<UnitId> {
    let mut best: Option<(UnitId, Fixed)> = None;
    for id in world.units.sorted_ids() {
        let Some(unit) = world.units.get(id) else {
            continue;
        };
        if !unit.is_enemy_of(team) || !unit.collision_enabled() {
            continue;
        }
        let radius = unit.stats().combat.body_radius;
        let Some(distance) = ray_circle_distance(origin, direction, unit.position(), radius) else {
            continue;
        };
        if distance > max_distance {
            continue;
        }
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((id, distance));
        }
    }
    best.map(|(id, _)| id)
}

// ============================================================================
// Damage and death
// ============================================================================

/// Apply `amount` damage to `target`.
///
/// Ignored if the target is missing or already dead. Health saturates at
/// zero, which kills. Returns `true` if this damage killed the target.
pub fn take_damage<F: CellFamily>(
    world: &mut World<F>,
    target: UnitId,
    amount: u32,
    source: Option<DamageSource>,
) -> bool {
    let Some(unit) = world.units.get_mut(target) else {
        return false;
    };
    if unit.is_dead() {
        return false;
    }
    let remaining = unit.health().saturating_sub(amount);
    unit.set_health(remaining);

    world.telemetry.record_damage(world.tick, target, amount, remaining);
    world.events.damage_events.push(DamageEvent {
        attacker: source.map(|s| s.unit),
        attacker_team: source.map(|s| s.team),
        target,
        damage: amount,
        remaining,
    });

    if remaining == 0 {
        die(world, target);
        return true;
    }
    false
}

/// Kill `unit_id`. A second call is a no-op.
///
/// Marks the unit dead, switches off its AI and collision, stops its
/// mover, unregisters it (possibly defeating its team) and schedules its
/// destruction after the configured delay.
pub fn die<F: CellFamily>(world: &mut World<F>, unit_id: UnitId) {
    let Some(unit) = world.units.get_mut(unit_id) else {
        return;
    };
    if unit.is_dead() {
        return;
    }
    unit.mark_dead();
    let team = unit.team();
    let tick = world.tick;

    tracing::debug!(tick, unit = unit_id, team, "unit died");
    world.telemetry.record_death(tick, unit_id);
    world.events.deaths.push(unit_id);

    if let Some(defeated) = world.registry.unregister(unit_id) {
        tracing::info!(tick, team = defeated, "team defeated");
        world.telemetry.record_team_defeated(tick, defeated);
        world.events.teams_defeated.push(defeated);
    }

    let due = tick + u64::from(world.config.destroy_delay);
    world.scheduler.schedule(due, DeferredAction::DestroyUnit(unit_id));
}
