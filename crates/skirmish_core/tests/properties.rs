//! Property tests for targeting, behavior, damage and team bookkeeping.

use std::collections::BTreeSet;

use proptest::prelude::*;
use skirmish_core::prelude::*;
use skirmish_core::projectile::splash_victims;
use skirmish_test_utils::determinism::strategies::{
    arb_damage, arb_health, arb_placements, arb_position, Placement,
};
use skirmish_test_utils::fixtures::{battle_with_teams, fixed, pos, spawn, two_team_battle};

fn populate(placements: &[Placement]) -> Battle {
    let mut battle = battle_with_teams(BattleConfig::default(), &["blue", "red", "green"]);
    for p in placements {
        spawn(&mut battle, p.team, p.archetype, p.position);
    }
    battle
}

fn brute_force_nearest(battle: &Battle, source: UnitId) -> Option<Fixed> {
    let unit = battle.unit(source)?;
    battle
        .units()
        .iter()
        .filter(|(_, other)| other.is_enemy_of(unit.team()))
        .map(|(_, other)| unit.position().distance_squared(other.position()))
        .min()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// The chosen enemy is at minimum distance, and the choice is stable.
    #[test]
    fn nearest_enemy_is_closest_and_stable(placements in arb_placements(3, 24)) {
        let battle = populate(&placements);
        for id in battle.units().sorted_ids() {
            let chosen = battle.find_nearest_enemy(id);
            let best = brute_force_nearest(&battle, id);
            let source = battle.unit(id).unwrap();
            match (chosen, best) {
                (None, None) => {}
                (Some(enemy), Some(best)) => {
                    let enemy = battle.unit(enemy).unwrap();
                    prop_assert!(enemy.is_enemy_of(source.team()));
                    prop_assert_eq!(source.position().distance_squared(enemy.position()), best);
                }
                (chosen, best) => prop_assert!(false, "chosen {:?}, best {:?}", chosen, best),
            }
            prop_assert_eq!(battle.find_nearest_enemy(id), chosen);
        }
    }

    /// Any unit without a target is Idle after each evaluation.
    #[test]
    fn targetless_units_are_idle(placements in arb_placements(3, 16)) {
        let mut battle = populate(&placements);
        battle.start();
        for _ in 0..120 {
            battle.tick();
            for (_, unit) in battle.units().iter() {
                if !unit.is_dead() && unit.target().is_none() {
                    prop_assert_eq!(unit.behavior(), BehaviorKind::Idle);
                }
            }
        }
    }

    /// Health saturates at zero and the unit dies exactly when it gets there.
    #[test]
    fn damage_saturates_and_kills_at_zero(
        health in arb_health(),
        blows in proptest::collection::vec(arb_damage(), 1..20),
    ) {
        let mut battle: Battle = two_team_battle();
        let stats = UnitStats::for_archetype(Archetype::Melee).with_health(health);
        let target = battle
            .spawn_unit(UnitSpawn::new(0, stats, pos(0, 0)))
            .unwrap();

        let mut expected = health;
        let mut kills = 0;
        for blow in blows {
            let was_alive = expected > 0;
            expected = expected.saturating_sub(blow);
            let killed = battle.deal_damage(target, blow).unwrap();
            if killed {
                kills += 1;
                prop_assert!(was_alive);
            }
            let t = battle.unit(target).unwrap();
            if was_alive {
                prop_assert_eq!(t.health(), expected);
            }
            prop_assert_eq!(t.is_dead(), t.health() == 0);
        }
        prop_assert!(kills <= 1);
        prop_assert_eq!(kills == 1, battle.unit(target).unwrap().is_dead());
    }

    /// A blast damages each living enemy inside the radius exactly once.
    #[test]
    fn splash_hits_each_enemy_in_radius_once(
        enemies in proptest::collection::vec(arb_position(), 1..10),
        friends in proptest::collection::vec(arb_position(), 0..6),
    ) {
        let mut battle: Battle = two_team_battle();
        let artillery = battle
            .spawn_unit(
                UnitSpawn::new(0, UnitStats::for_archetype(Archetype::Artillery), pos(-30, 0))
                    .without_mover(),
            )
            .unwrap();
        let sturdy = UnitStats::for_archetype(Archetype::Melee)
            .with_health(100_000)
            .with_damage(0);
        let offset = |p: Vec2Fixed| Vec2Fixed::new(p.x / 4 - fixed(30), p.y / 4);
        let mut friend_ids = BTreeSet::new();
        for p in &friends {
            let id = battle
                .spawn_unit(UnitSpawn::new(0, sturdy, offset(*p)).without_mover())
                .unwrap();
            friend_ids.insert(id);
        }
        for p in &enemies {
            battle
                .spawn_unit(UnitSpawn::new(1, sturdy, offset(*p)).without_mover())
                .unwrap();
        }
        battle.start();

        let radius = ProjectileParams::default().explosion_radius;
        let mut checked = 0;
        for _ in 0..400 {
            let events = battle.tick();
            let blasts: Vec<_> = events
                .combat_events
                .iter()
                .filter_map(|e| match e {
                    CombatEvent::ProjectileDetonated { position, victims, .. } => {
                        Some((*position, victims.clone()))
                    }
                    _ => None,
                })
                .collect();
            if blasts.len() != 1 {
                continue;
            }
            let (center, victims) = &blasts[0];

            let mut hit: Vec<UnitId> = events
                .damage_events
                .iter()
                .filter(|d| d.attacker == Some(artillery))
                .map(|d| d.target)
                .collect();
            hit.sort_unstable();
            let unique: BTreeSet<_> = hit.iter().copied().collect();
            prop_assert_eq!(unique.len(), hit.len(), "a unit was hit twice");
            prop_assert_eq!(&hit, victims);
            prop_assert!(hit.iter().all(|id| !friend_ids.contains(id)));

            let expected = splash_victims(battle.units(), 0, *center, radius);
            prop_assert_eq!(&expected, victims);
            for (id, unit) in battle.units().iter() {
                let inside = unit.position().distance_squared(*center) <= radius * radius;
                if unit.team() == 1 && inside {
                    prop_assert!(unique.contains(id));
                }
            }
            checked += 1;
        }
        prop_assert!(checked > 0, "no detonation observed");
    }
}

// =========================================================================
// Deterministic properties
// =========================================================================

#[test]
fn dead_target_is_replaced_within_one_targeting_pass() {
    let mut battle: Battle = two_team_battle();
    let hunter = spawn(&mut battle, 0, Archetype::Melee, pos(0, 0));
    let prey = battle
        .spawn_unit(
            UnitSpawn::new(1, UnitStats::for_archetype(Archetype::Melee), pos(4, 0))
                .without_mover(),
        )
        .unwrap();
    let backup = battle
        .spawn_unit(
            UnitSpawn::new(1, UnitStats::for_archetype(Archetype::Melee), pos(-9, 0))
                .without_mover(),
        )
        .unwrap();
    battle.start();
    battle.run_for(5);
    assert_eq!(battle.unit(hunter).unwrap().target(), Some(prey));

    battle.deal_damage(prey, 10_000).unwrap();
    let interval = u64::from(battle.config().targeting_interval);
    for _ in 0..interval {
        battle.tick();
        assert_ne!(battle.unit(hunter).unwrap().target(), Some(prey));
    }
    assert_eq!(battle.unit(hunter).unwrap().target(), Some(backup));
}

#[test]
fn attack_cadence_respects_delay_and_cooldown() {
    let mut battle: Battle = two_team_battle();
    let stats = UnitStats::for_archetype(Archetype::Melee).with_timing(7, 13);
    let attacker = battle
        .spawn_unit(UnitSpawn::new(0, stats, pos(0, 0)))
        .unwrap();
    let dummy = battle
        .spawn_unit(
            UnitSpawn::new(
                1,
                UnitStats::for_archetype(Archetype::Melee)
                    .with_health(1_000_000)
                    .with_damage(0),
                pos(1, 0),
            )
            .without_mover(),
        )
        .unwrap();
    battle.start();

    let mut entered = None;
    let mut attacks = Vec::new();
    for tick in 0..200u32 {
        let events = battle.tick();
        if events
            .transitions
            .iter()
            .any(|t| t.unit == attacker && t.to == BehaviorKind::Attack)
        {
            entered = Some(tick);
        }
        for e in &events.combat_events {
            if let CombatEvent::AttackStarted { attacker: a, target, .. } = e {
                if *a == attacker {
                    assert_eq!(*target, dummy);
                    attacks.push(tick);
                }
            }
        }
    }

    let entered = entered.expect("entered Attack");
    assert!(attacks.len() > 5);
    assert!(attacks[0] - entered >= 7);
    assert!(attacks.windows(2).all(|w| w[1] - w[0] >= 13));
}

#[test]
fn team_defeat_is_reported_once() {
    let mut battle: Battle = two_team_battle();
    spawn(&mut battle, 0, Archetype::Melee, pos(-50, 0));
    let doomed: Vec<UnitId> = (0..5)
        .map(|i| spawn(&mut battle, 1, Archetype::Ranged, pos(50, i * 3)))
        .collect();
    battle.start();

    let mut defeated = Vec::new();
    for id in &doomed {
        battle.deal_damage(*id, 1_000).unwrap();
        // A second blow on the corpse changes nothing.
        battle.deal_damage(*id, 1_000).unwrap();
        defeated.extend(battle.run_for(3).teams_defeated);
        assert!(battle.registry().total_units(1) < doomed.len());
    }
    for _ in 0..10 {
        assert_eq!(battle.registry().total_units(1), 0);
        assert_eq!(battle.surviving_teams(), vec![0]);
        defeated.extend(battle.run_for(10).teams_defeated);
    }

    assert_eq!(defeated, vec![1]);
    assert_eq!(battle.winner(), Some(0));
}

#[test]
fn splash_spares_friends_and_distant_enemies() {
    let mut battle: Battle = two_team_battle();
    let near = spawn(&mut battle, 1, Archetype::Melee, pos(1, 0));
    let edge = spawn(&mut battle, 1, Archetype::Melee, pos(0, 2));
    spawn(&mut battle, 1, Archetype::Melee, pos(3, 0));
    spawn(&mut battle, 0, Archetype::Melee, pos(0, 1));

    let victims = splash_victims(battle.units(), 0, pos(0, 0), fixed(2));
    assert_eq!(victims, vec![near, edge]);
}
