//! End-to-end battle scenarios.

use skirmish_core::prelude::*;
use skirmish_test_utils::fixtures::{fixed, pos, spawn, two_team_battle};

fn melee_with_range(range: i32) -> UnitStats {
    UnitStats::for_archetype(Archetype::Melee).with_range(fixed(range))
}

fn immobile(battle: &mut Battle, team: TeamId, stats: UnitStats, at: Vec2Fixed) -> UnitId {
    battle
        .spawn_unit(UnitSpawn::new(team, stats, at).without_mover())
        .unwrap()
}

fn spawned_projectile(events: &TickEvents) -> Option<ProjectileId> {
    events.combat_events.iter().find_map(|e| match e {
        CombatEvent::ProjectileSpawned { projectile, .. } => Some(*projectile),
        _ => None,
    })
}

// =========================================================================
// Adjacent units engage without moving
// =========================================================================

#[test]
fn adjacent_units_enter_attack_directly() {
    let mut battle: Battle = two_team_battle();
    let a = battle
        .spawn_unit(UnitSpawn::new(0, melee_with_range(2), pos(0, 0)))
        .unwrap();
    let b = battle
        .spawn_unit(UnitSpawn::new(1, melee_with_range(2), pos(1, 0)))
        .unwrap();
    battle.start();

    let events = battle.tick();
    assert_eq!(battle.unit(a).unwrap().target(), Some(b));
    assert_eq!(battle.unit(b).unwrap().target(), Some(a));
    assert_eq!(battle.unit(a).unwrap().behavior(), BehaviorKind::Attack);
    assert_eq!(battle.unit(b).unwrap().behavior(), BehaviorKind::Attack);

    let all = {
        let mut all = events;
        all.merge(battle.run_for(60));
        all
    };
    assert!(all.transitions.iter().all(|t| t.to != BehaviorKind::Move));
    assert!(all
        .transitions
        .iter()
        .all(|t| t.from == BehaviorKind::Idle && t.to == BehaviorKind::Attack));
}

// =========================================================================
// Blocked units get unstuck
// =========================================================================

#[test]
fn blocked_unit_is_recovered_after_two_check_intervals() {
    let mut battle: Battle = two_team_battle();
    let blocked = |x| {
        UnitSpawn::new(1, melee_with_range(2), pos(x, 0))
            .with_mover(Box::new(DirectMover::blocked(fixed(1))))
    };
    let a = battle
        .spawn_unit(UnitSpawn { team: 0, ..blocked(0) })
        .unwrap();
    let b = battle.spawn_unit(blocked(10)).unwrap();
    battle.start();

    let interval = u64::from(battle.config().stuck.check_interval);
    let mut recoveries = Vec::new();
    for tick in 0..=(interval * 2) {
        let events = battle.tick();
        recoveries.extend(
            events
                .stuck_recoveries
                .into_iter()
                .filter(|r| r.unit == a)
                .map(|r| (tick, r)),
        );
    }

    assert_eq!(recoveries.len(), 1, "exactly one recovery: {recoveries:?}");
    let (tick, recovery) = recoveries[0];
    assert_eq!(tick, interval * 2);
    assert_eq!(recovery.previous_target, Some(b));
    // The only enemy is still the nearest one.
    assert_eq!(recovery.new_target, Some(b));
    assert_eq!(recovery.position, pos(0, 0));
    assert_eq!(battle.stuck_monitor().record(a).unwrap().stuck_timer, 0);
    assert_eq!(battle.unit(a).unwrap().behavior(), BehaviorKind::Move);
}

#[test]
fn stuck_recovery_switches_to_a_nearer_enemy() {
    let mut battle: Battle = two_team_battle();
    let a = battle
        .spawn_unit(
            UnitSpawn::new(0, melee_with_range(2), pos(0, 0))
                .with_mover(Box::new(DirectMover::blocked(fixed(1)))),
        )
        .unwrap();
    let far = immobile(&mut battle, 1, melee_with_range(2), pos(10, 0));
    battle.start();
    battle.tick();
    assert_eq!(battle.unit(a).unwrap().target(), Some(far));

    // A nearer enemy shows up; targeting keeps the valid target.
    let near = battle
        .spawn_unit(UnitSpawn::new(1, melee_with_range(2), pos(-6, 0)).without_mover())
        .unwrap();
    let events = battle.run_for(200);
    assert_eq!(battle.unit(a).unwrap().target(), Some(near));
    assert!(events
        .stuck_recoveries
        .iter()
        .any(|r| r.unit == a && r.previous_target == Some(far) && r.new_target == Some(near)));
}

// =========================================================================
// Artillery rounds outlive their targets
// =========================================================================

#[test]
fn projectile_retargets_after_its_target_dies() {
    let mut battle: Battle = two_team_battle();
    let artillery = immobile(
        &mut battle,
        0,
        UnitStats::for_archetype(Archetype::Artillery),
        pos(0, 0),
    );
    let first = immobile(&mut battle, 1, melee_with_range(2), pos(5, 0));
    let second = immobile(&mut battle, 1, melee_with_range(2), pos(6, 5));
    battle.start();

    let mut fired = None;
    for _ in 0..100 {
        if let Some(p) = spawned_projectile(&battle.tick()) {
            fired = Some(p);
            break;
        }
    }
    let projectile = fired.expect("artillery fired");
    assert_eq!(
        battle.projectiles().find(|p| p.id() == projectile).and_then(Projectile::target),
        Some(first)
    );

    assert!(battle.deal_damage(first, 1_000).unwrap());

    let window = u64::from(battle.config().projectile_retarget_interval);
    let mut retargeted = None;
    for tick in 0..window {
        let events = battle.tick();
        let hit = events.combat_events.iter().find_map(|e| match e {
            CombatEvent::ProjectileRetargeted { projectile: p, target } if *p == projectile => {
                Some(*target)
            }
            _ => None,
        });
        if hit.is_some() {
            retargeted = hit.map(|t| (tick, t));
            break;
        }
    }
    let (_, target) = retargeted.expect("retargeted within the window");
    assert_eq!(target, second);

    // The new target ends up taking the blast.
    let events = battle.run_for(120);
    assert!(events
        .damage_events
        .iter()
        .any(|d| d.target == second && d.attacker == Some(artillery)));
    assert!(battle.unit(first).is_none());
}

#[test]
fn orphaned_projectile_expires_silently() {
    let mut battle: Battle = two_team_battle();
    let artillery = immobile(
        &mut battle,
        0,
        UnitStats::for_archetype(Archetype::Artillery),
        pos(0, 0),
    );
    let only = immobile(&mut battle, 1, melee_with_range(2), pos(10, 0));
    battle.start();

    let mut projectile = None;
    for _ in 0..100 {
        if let Some(p) = spawned_projectile(&battle.tick()) {
            projectile = Some(p);
            break;
        }
    }
    let projectile = projectile.expect("artillery fired");
    battle.deal_damage(only, 1_000).unwrap();

    let lifespan = u64::from(ProjectileParams::default().lifespan);
    let events = battle.run_for(lifespan + 10);

    assert!(events
        .combat_events
        .contains(&CombatEvent::ProjectileExpired { projectile }));
    assert!(!events.combat_events.iter().any(|e| matches!(
        e,
        CombatEvent::ProjectileDetonated { .. } | CombatEvent::ProjectileRetargeted { .. }
    )));
    assert!(events
        .damage_events
        .iter()
        .all(|d| d.attacker != Some(artillery)));
    assert_eq!(battle.projectiles().count(), 0);
}

#[test]
fn stopping_the_battle_clears_projectiles() {
    let mut battle: Battle = two_team_battle();
    immobile(
        &mut battle,
        0,
        UnitStats::for_archetype(Archetype::Artillery),
        pos(0, 0),
    );
    immobile(&mut battle, 1, melee_with_range(2), pos(12, 0));
    battle.start();

    while battle.projectiles().count() == 0 {
        battle.tick();
        assert!(battle.current_tick() < 200, "artillery never fired");
    }
    battle.stop();
    battle.tick();
    assert_eq!(battle.projectiles().count(), 0);
}

// =========================================================================
// Whole battles
// =========================================================================

#[test]
fn mixed_battle_reaches_a_decision() {
    let mut battle: Battle = two_team_battle();
    for i in 0..3 {
        spawn(&mut battle, 0, Archetype::Melee, pos(0, i * 2));
        spawn(&mut battle, 0, Archetype::Ranged, pos(-3, i * 2));
        spawn(&mut battle, 1, Archetype::Melee, pos(14, i * 2));
    }
    spawn(&mut battle, 0, Archetype::Artillery, pos(-6, 2));
    battle.start();

    let winner = battle.run_until_decided(10_000);
    assert_eq!(winner, Some(0));
    assert_eq!(battle.registry().total_units(1), 0);
    battle.check_invariants().unwrap();

    // The dead are destroyed after the configured delay.
    battle.run_for(u64::from(battle.config().destroy_delay) + 1);
    assert!(battle.units().iter().all(|(_, u)| !u.is_dead()));
}

#[test]
fn three_way_battle_leaves_one_team() {
    let mut battle: Battle = skirmish_test_utils::fixtures::battle_with_teams(
        BattleConfig::default(),
        &["blue", "red", "green"],
    );
    spawn(&mut battle, 0, Archetype::Melee, pos(0, 0));
    spawn(&mut battle, 0, Archetype::Melee, pos(0, 2));
    spawn(&mut battle, 1, Archetype::Melee, pos(8, 0));
    spawn(&mut battle, 2, Archetype::Melee, pos(4, 8));
    battle.start();

    let mut defeated = Vec::new();
    for _ in 0..10_000 {
        defeated.extend(battle.tick().teams_defeated);
        if battle.winner().is_some() {
            break;
        }
    }
    assert_eq!(battle.surviving_teams().len(), 1);
    assert_eq!(defeated.len(), 2);
    let winner = battle.winner().unwrap();
    assert!(!defeated.contains(&winner));
}
