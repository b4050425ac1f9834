//! Test fixtures and helpers.
//!
//! Pre-built battles and unit layouts for consistent testing.

use fixed::types::I32F32;
use skirmish_core::components::{Archetype, TeamId, UnitId, UnitStats};
use skirmish_core::config::BattleConfig;
use skirmish_core::math::Vec2Fixed;
use skirmish_core::registry::TeamSpec;
use skirmish_core::simulation::{Battle, UnitSpawn};
use skirmish_core::value::CellFamily;

/// Create a fixed-point number from an integer.
#[must_use]
pub fn fixed(n: i32) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a fixed-point number from a float (for tests only).
///
/// Note: In real simulation code, never use floats.
/// This is only for convenient test setup.
#[must_use]
pub fn fixed_f(n: f64) -> I32F32 {
    I32F32::from_num(n)
}

/// Create a position from integer coordinates.
#[must_use]
pub fn pos(x: i32, y: i32) -> Vec2Fixed {
    Vec2Fixed::from_ints(x, y)
}

/// Battle with teams `0` (blue) and `1` (red) and default config.
#[must_use]
pub fn two_team_battle<F: CellFamily>() -> Battle<F> {
    battle_with_teams(BattleConfig::default(), &["blue", "red"])
}

/// Battle with one team per color, indexed from zero.
///
/// # Panics
///
/// Never, team indices are unique.
#[must_use]
pub fn battle_with_teams<F: CellFamily>(config: BattleConfig, colors: &[&str]) -> Battle<F> {
    let mut battle = Battle::new(config);
    for (index, color) in (0..).zip(colors) {
        battle
            .add_team(TeamSpec::new(index, *color))
            .expect("fresh team index");
    }
    battle
}

/// Spawn a default-stats unit of `archetype`.
///
/// # Panics
///
/// Panics if `team` was never added.
pub fn spawn<F: CellFamily>(
    battle: &mut Battle<F>,
    team: TeamId,
    archetype: Archetype,
    position: Vec2Fixed,
) -> UnitId {
    spawn_with(battle, team, UnitStats::for_archetype(archetype), position)
}

/// Spawn a unit with explicit stats.
///
/// # Panics
///
/// Panics if `team` was never added.
pub fn spawn_with<F: CellFamily>(
    battle: &mut Battle<F>,
    team: TeamId,
    stats: UnitStats,
    position: Vec2Fixed,
) -> UnitId {
    battle
        .spawn_unit(UnitSpawn::new(team, stats, position))
        .expect("team exists")
}

/// Spawn `count` units in a vertical column at `x`, two units apart.
pub fn spawn_column<F: CellFamily>(
    battle: &mut Battle<F>,
    team: TeamId,
    archetype: Archetype,
    x: i32,
    count: i32,
) -> Vec<UnitId> {
    (0..count)
        .map(|i| spawn(battle, team, archetype, pos(x, i * 2)))
        .collect()
}

/// Two mirrored armies of melee, ranged and artillery columns.
///
/// Team 0 stands on the left, team 1 on the right, `gap` apart.
#[must_use]
pub fn mirrored_armies<F: CellFamily>(per_column: i32, gap: i32) -> Battle<F> {
    let mut battle = two_team_battle();
    let columns = [
        (0, Archetype::Melee),
        (-3, Archetype::Ranged),
        (-6, Archetype::Artillery),
    ];
    for (offset, archetype) in columns {
        spawn_column(&mut battle, 0, archetype, offset, per_column);
        spawn_column(&mut battle, 1, archetype, gap - offset, per_column);
    }
    battle
}

#[cfg(test)]
mod tests {
    use super::*;
    use skirmish_core::value::Direct;

    #[test]
    fn test_mirrored_armies_layout() {
        let battle: Battle<Direct> = mirrored_armies(3, 20);
        assert_eq!(battle.registry().total_units(0), 9);
        assert_eq!(battle.registry().total_units(1), 9);
        assert_eq!(
            battle
                .registry()
                .team(1)
                .map(|t| t.bucket(Archetype::Artillery).len()),
            Some(3)
        );
    }
}
