//! Determinism testing utilities.
//!
//! Provides a harness for verifying that a battle produces identical
//! results given identical inputs.
//!
//! # Testing Strategy
//!
//! Sources of non-determinism a battle must avoid:
//!
//! - **Floating-point math**: We use fixed-point arithmetic via
//!   [`skirmish_core::math::Fixed`] throughout.
//!
//! - **HashMap iteration order**: Rust's default hasher is randomized.
//!   Every pass iterates sorted unit handles.
//!
//! - **System randomness**: None. Spawn layouts are computed, not rolled.
//!
//! # Test Levels
//!
//! 1. **Unit tests**: Individual pass determinism (targeting, combat, etc.)
//! 2. **Property tests**: Random layouts must still produce deterministic outputs
//! 3. **Integration tests**: Full battles are reproducible
//! 4. **Parallel tests**: Running N battles on N threads all match

use std::thread;

use skirmish_core::simulation::Battle;
use skirmish_core::value::CellFamily;

/// Result of a determinism test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismResult {
    /// Whether all runs produced identical results.
    pub is_deterministic: bool,
    /// Hashes from each run.
    pub hashes: Vec<u64>,
    /// Number of ticks simulated.
    pub ticks: u64,
}

impl DeterminismResult {
    /// Get all unique hashes (should be 1 for a deterministic battle).
    #[must_use]
    pub fn unique_hashes(&self) -> Vec<u64> {
        let mut unique: Vec<u64> = self.hashes.clone();
        unique.sort_unstable();
        unique.dedup();
        unique
    }

    /// Assert that the battle was deterministic, with a detailed error message.
    ///
    /// # Panics
    ///
    /// Panics if the runs produced different hashes.
    pub fn assert_deterministic(&self) {
        if !self.is_deterministic {
            let unique = self.unique_hashes();
            panic!(
                "Battle is non-deterministic!\n\
                 Runs: {}\n\
                 Ticks: {}\n\
                 Unique hashes: {} (expected 1)\n\
                 All hashes: {:?}",
                self.hashes.len(),
                self.ticks,
                unique.len(),
                self.hashes
            );
        }
    }
}

/// Run a simulation multiple times and verify determinism.
///
/// # Arguments
///
/// * `runs` - Number of times to run the simulation
/// * `ticks` - Number of ticks to simulate per run
/// * `setup` - Function to create initial state
/// * `step` - Function to advance state by one tick
/// * `hash` - Function to compute state hash
///
/// # Example
///
/// ```
/// use skirmish_test_utils::determinism::verify_determinism;
///
/// let result = verify_determinism(3, 10, || 0u64, |n| *n += 2, |n| *n);
/// result.assert_deterministic();
/// assert_eq!(result.hashes, vec![20, 20, 20]);
/// ```
pub fn verify_determinism<S, Setup, Step, HashFn>(
    runs: usize,
    ticks: u64,
    setup: Setup,
    step: Step,
    hash: HashFn,
) -> DeterminismResult
where
    Setup: Fn() -> S,
    Step: Fn(&mut S),
    HashFn: Fn(&S) -> u64,
{
    let mut hashes = Vec::with_capacity(runs);

    for _ in 0..runs {
        let mut state = setup();

        for _ in 0..ticks {
            step(&mut state);
        }

        hashes.push(hash(&state));
    }

    let is_deterministic = hashes.windows(2).all(|w| w[0] == w[1]);

    DeterminismResult {
        is_deterministic,
        hashes,
        ticks,
    }
}

/// Run a battle `runs` times for `ticks` ticks and compare final hashes.
pub fn verify_battle_determinism<F, Setup>(runs: usize, ticks: u64, setup: Setup) -> DeterminismResult
where
    F: CellFamily,
    Setup: Fn() -> Battle<F>,
{
    verify_determinism(
        runs,
        ticks,
        setup,
        |battle| {
            battle.tick();
        },
        Battle::<F>::state_hash,
    )
}

/// Run `num_battles` battles on separate threads and collect final hashes.
///
/// Each battle is built inside its own thread, so the battle type itself
/// never crosses a thread boundary.
///
/// # Panics
///
/// Panics if a battle thread panics.
pub fn run_parallel_battles<F, Setup>(setup: Setup, num_battles: usize, ticks: u64) -> DeterminismResult
where
    F: CellFamily,
    Setup: Fn() -> Battle<F> + Sync,
{
    let setup = &setup;
    let hashes: Vec<u64> = thread::scope(|s| {
        let handles: Vec<_> = (0..num_battles)
            .map(|_| {
                s.spawn(move || {
                    let mut battle = setup();
                    battle.run_for(ticks);
                    battle.state_hash()
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| h.join().expect("battle thread panicked"))
            .collect()
    });

    DeterminismResult {
        is_deterministic: hashes.windows(2).all(|w| w[0] == w[1]),
        hashes,
        ticks,
    }
}

/// Compare two battles tick-by-tick, finding the first divergence.
///
/// # Returns
///
/// `None` if the battles stay identical, `Some(tick)` if they diverge
/// after that many ticks.
pub fn find_first_divergence<F, Setup>(setup: Setup, num_ticks: u64) -> Option<u64>
where
    F: CellFamily,
    Setup: Fn() -> Battle<F>,
{
    let mut a = setup();
    let mut b = setup();

    if a.state_hash() != b.state_hash() {
        return Some(0);
    }

    for tick in 1..=num_ticks {
        let events_a = a.tick();
        let events_b = b.tick();

        if events_a != events_b || a.state_hash() != b.state_hash() {
            return Some(tick);
        }
    }

    None
}

/// Proptest strategies for battle testing.
///
/// These strategies generate random but reproducible inputs for
/// property-based testing.
pub mod strategies {
    use proptest::prelude::*;
    use skirmish_core::components::{Archetype, TeamId};
    use skirmish_core::math::{Fixed, Vec2Fixed};

    /// Generate a coordinate on a small battlefield.
    ///
    /// Range: -30 to 30 in quarter-unit steps
    pub fn arb_coordinate() -> impl Strategy<Value = Fixed> {
        (-120i32..=120i32).prop_map(|q| Fixed::from_num(q) / 4)
    }

    /// Generate a battlefield position.
    pub fn arb_position() -> impl Strategy<Value = Vec2Fixed> {
        (arb_coordinate(), arb_coordinate()).prop_map(|(x, y)| Vec2Fixed::new(x, y))
    }

    /// Generate any archetype.
    pub fn arb_archetype() -> impl Strategy<Value = Archetype> {
        prop_oneof![
            Just(Archetype::Melee),
            Just(Archetype::Ranged),
            Just(Archetype::Artillery),
        ]
    }

    /// Generate health values (1-300).
    pub fn arb_health() -> impl Strategy<Value = u32> {
        1u32..300u32
    }

    /// Generate damage values (0-60).
    pub fn arb_damage() -> impl Strategy<Value = u32> {
        0u32..60u32
    }

    /// One unit placement.
    #[derive(Debug, Clone, Copy)]
    pub struct Placement {
        /// Owning team.
        pub team: TeamId,
        /// Unit archetype.
        pub archetype: Archetype,
        /// Spawn position.
        pub position: Vec2Fixed,
    }

    /// Generate a placement on one of `teams` teams.
    pub fn arb_placement(teams: TeamId) -> impl Strategy<Value = Placement> {
        (0..teams.max(1), arb_archetype(), arb_position()).prop_map(
            |(team, archetype, position)| Placement {
                team,
                archetype,
                position,
            },
        )
    }

    /// Generate up to `max_units` placements across `teams` teams.
    pub fn arb_placements(teams: TeamId, max_units: usize) -> impl Strategy<Value = Vec<Placement>> {
        proptest::collection::vec(arb_placement(teams), 1..max_units.max(2))
    }
}

#[cfg(test)]
mod tests {
    use super::strategies::*;
    use super::*;
    use crate::fixtures::{mirrored_armies, pos, spawn, two_team_battle};
    use proptest::prelude::*;
    use skirmish_core::components::Archetype;
    use skirmish_core::value::{Direct, Observed};

    fn artillery_duel() -> Battle<Direct> {
        let mut battle = two_team_battle();
        spawn(&mut battle, 0, Archetype::Artillery, pos(0, 0));
        spawn(&mut battle, 1, Archetype::Melee, pos(12, 1));
        spawn(&mut battle, 1, Archetype::Melee, pos(12, -1));
        battle.start();
        battle
    }

    #[test]
    fn test_verify_determinism_simple() {
        let result = verify_determinism(3, 100, || 0u64, |n| *n += 1, |n| *n);

        assert!(result.is_deterministic);
        assert_eq!(result.hashes, vec![100, 100, 100]);
    }

    #[test]
    fn test_empty_battle_determinism() {
        verify_battle_determinism(3, 100, two_team_battle::<Direct>).assert_deterministic();
    }

    #[test]
    fn test_mixed_army_determinism() {
        let result = verify_battle_determinism(3, 600, || {
            let mut battle: Battle<Direct> = mirrored_armies(4, 16);
            battle.start();
            battle
        });
        result.assert_deterministic();
    }

    #[test]
    fn test_projectile_battle_has_no_divergence() {
        assert_eq!(find_first_divergence(artillery_duel, 400), None);
    }

    #[test]
    fn test_parallel_battles_match() {
        run_parallel_battles(artillery_duel, 4, 300).assert_deterministic();
    }

    #[test]
    fn test_observed_family_matches_direct() {
        let direct = verify_battle_determinism(1, 500, || {
            let mut battle: Battle<Direct> = mirrored_armies(2, 14);
            battle.start();
            battle
        });
        let observed = verify_battle_determinism(1, 500, || {
            let mut battle: Battle<Observed> = mirrored_armies(2, 14);
            battle.start();
            battle
        });
        assert_eq!(direct.hashes, observed.hashes);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_random_layouts_are_deterministic(placements in arb_placements(3, 12)) {
            let setup = || {
                let mut battle: Battle<Direct> =
                    crate::fixtures::battle_with_teams(Default::default(), &["a", "b", "c"]);
                for p in &placements {
                    spawn(&mut battle, p.team, p.archetype, p.position);
                }
                battle.start();
                battle
            };
            prop_assert_eq!(find_first_divergence(setup, 200), None);
        }
    }
}
