//! Core battle loop.
//!
//! The battle runs at a fixed tick rate and advances every pass in a
//! fixed order. The registry, targeting engine and stuck monitor are
//! constructed once here and handed the shared [`World`] explicitly.
//!
//! # Determinism
//!
//! - No floating-point math (uses fixed-point via [`Fixed`](crate::math::Fixed))
//! - No randomness
//! - Every pass snapshots sorted unit handles and re-validates each one
//! - Same inputs always produce the same [`Battle::state_hash`]
//!
//! # Example
//!
//! ```
//! use skirmish_core::prelude::*;
//!
//! let mut battle: Battle = Battle::new(BattleConfig::default());
//! battle.add_team(TeamSpec::new(0, "blue")).unwrap();
//! battle.add_team(TeamSpec::new(1, "red")).unwrap();
//!
//! let stats = UnitStats::for_archetype(Archetype::Melee);
//! battle.spawn_unit(UnitSpawn::new(0, stats, Vec2Fixed::from_ints(0, 0))).unwrap();
//! battle.spawn_unit(UnitSpawn::new(1, stats.with_health(10), Vec2Fixed::from_ints(5, 0))).unwrap();
//!
//! battle.start();
//! let winner = battle.run_until_decided(2_000);
//! assert_eq!(winner, Some(0));
//! ```

use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::behavior::{self, Transition};
use crate::combat::{self, CombatEvent, DamageEvent};
use crate::components::{ProjectileId, TeamId, UnitId, UnitStats};
use crate::config::BattleConfig;
use crate::error::{BattleError, Result};
use crate::math::Vec2Fixed;
use crate::movement::{DirectMover, MovementProvider};
use crate::projectile::{self, Projectile};
use crate::registry::{TeamRegistry, TeamSpec};
use crate::scheduler::{DeferredAction, Scheduler};
use crate::stuck::{StuckMonitor, StuckRecovery};
use crate::targeting::{self, TargetingEngine};
use crate::telemetry::{NullSink, TelemetrySink};
use crate::unit::{Unit, UnitStorage};
use crate::value::{CellFamily, Direct};

/// Events generated during a battle tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickEvents {
    /// Damage applied this tick.
    pub damage_events: Vec<DamageEvent>,
    /// Attacks, shots and projectile lifecycle.
    pub combat_events: Vec<CombatEvent>,
    /// Behavior state changes.
    pub transitions: Vec<Transition>,
    /// Units that died this tick.
    pub deaths: Vec<UnitId>,
    /// Dead units whose handles were invalidated this tick.
    pub destroyed: Vec<UnitId>,
    /// Teams that lost their last unit this tick.
    pub teams_defeated: Vec<TeamId>,
    /// Forced stuck recoveries.
    pub stuck_recoveries: Vec<StuckRecovery>,
}

impl TickEvents {
    /// Append another tick's events.
    pub fn merge(&mut self, other: Self) {
        self.damage_events.extend(other.damage_events);
        self.combat_events.extend(other.combat_events);
        self.transitions.extend(other.transitions);
        self.deaths.extend(other.deaths);
        self.destroyed.extend(other.destroyed);
        self.teams_defeated.extend(other.teams_defeated);
        self.stuck_recoveries.extend(other.stuck_recoveries);
    }
}

/// Shared battle state handed to every pass.
pub struct World<F: CellFamily = Direct> {
    pub(crate) units: UnitStorage<F>,
    pub(crate) registry: TeamRegistry,
    pub(crate) projectiles: BTreeMap<ProjectileId, Projectile>,
    pub(crate) scheduler: Scheduler,
    pub(crate) config: BattleConfig,
    pub(crate) telemetry: Box<dyn TelemetrySink>,
    pub(crate) events: TickEvents,
    pub(crate) tick: u64,
    pub(crate) simulating: bool,
    next_projectile: ProjectileId,
}

impl<F: CellFamily> World<F> {
    fn new(config: BattleConfig) -> Self {
        Self {
            units: UnitStorage::new(),
            registry: TeamRegistry::new(),
            projectiles: BTreeMap::new(),
            scheduler: Scheduler::new(),
            config,
            telemetry: Box::new(NullSink),
            events: TickEvents::default(),
            tick: 0,
            simulating: false,
            next_projectile: 1,
        }
    }

    pub(crate) fn next_projectile_id(&mut self) -> ProjectileId {
        let id = self.next_projectile;
        self.next_projectile += 1;
        id
    }
}

impl<F: CellFamily> fmt::Debug for World<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("tick", &self.tick)
            .field("simulating", &self.simulating)
            .field("units", &self.units.len())
            .field("projectiles", &self.projectiles.len())
            .field("pending", &self.scheduler.len())
            .finish_non_exhaustive()
    }
}

/// Parameters for spawning a unit.
#[derive(Debug)]
pub struct UnitSpawn {
    /// Owning team.
    pub team: TeamId,
    /// Resolved stats.
    pub stats: UnitStats,
    /// Initial position.
    pub position: Vec2Fixed,
    /// Movement provider.
    pub mover: Option<Box<dyn MovementProvider>>,
}

impl UnitSpawn {
    /// Spawn with a [`DirectMover`] at the unit's move speed.
    #[must_use]
    pub fn new(team: TeamId, stats: UnitStats, position: Vec2Fixed) -> Self {
        Self {
            team,
            stats,
            position,
            mover: Some(Box::new(DirectMover::new(stats.combat.move_speed))),
        }
    }

    /// Builder method to use a custom movement provider.
    #[must_use]
    pub fn with_mover(mut self, mover: Box<dyn MovementProvider>) -> Self {
        self.mover = Some(mover);
        self
    }

    /// Builder method to spawn without a movement provider.
    #[must_use]
    pub fn without_mover(mut self) -> Self {
        self.mover = None;
        self
    }
}

/// A team battle.
///
/// # Tick order
///
/// 1. **Targeting** (when due) - nearest enemy for targetless units
/// 2. **Stuck monitor** (when due) - sees post-retarget state
/// 3. **Behavior** - Idle / Move / Attack updates, attacks
/// 4. **Movement** - providers integrate one tick
/// 5. **Projectiles** - flight, retargeting, detonation
/// 6. **Deferred actions** - destruction of the dead
///
/// Passes 1-4 only run while simulating.
#[derive(Debug)]
pub struct Battle<F: CellFamily = Direct> {
    world: World<F>,
    targeting: TargetingEngine,
    stuck: StuckMonitor,
}

impl<F: CellFamily> Battle<F> {
    /// Create an empty battle in the prep phase.
    #[must_use]
    pub fn new(config: BattleConfig) -> Self {
        Self {
            targeting: TargetingEngine::new(config.targeting_interval),
            stuck: StuckMonitor::new(config.stuck),
            world: World::new(config),
        }
    }

    /// Battle configuration.
    #[must_use]
    pub const fn config(&self) -> &BattleConfig {
        &self.world.config
    }

    /// Current tick number.
    #[must_use]
    pub const fn current_tick(&self) -> u64 {
        self.world.tick
    }

    /// Whether the battle has been started and not stopped.
    #[must_use]
    pub const fn is_simulating(&self) -> bool {
        self.world.simulating
    }

    /// Add a team.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::DuplicateTeam`] if the index is taken.
    pub fn add_team(&mut self, spec: TeamSpec) -> Result<()> {
        self.world.registry.add_team(spec)
    }

    /// Spawn a unit and register it with its team.
    ///
    /// Units spawned before [`start`](Self::start) wait with AI inactive;
    /// units spawned during the battle are active at once.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::TeamNotFound`] for an unknown team.
    pub fn spawn_unit(&mut self, spawn: UnitSpawn) -> Result<UnitId> {
        if self.world.registry.team(spawn.team).is_none() {
            return Err(BattleError::TeamNotFound(spawn.team));
        }
        let archetype = spawn.stats.archetype();
        let mut unit = Unit::new(spawn.team, spawn.stats, spawn.position, spawn.mover);
        unit.set_ai_active(self.world.simulating);
        let id = self.world.units.insert(unit);
        self.world.registry.register(id, spawn.team, archetype)?;
        Ok(id)
    }

    /// Leave the prep phase: activate every living unit and begin
    /// simulating.
    pub fn start(&mut self) {
        for id in self.world.units.sorted_ids() {
            if let Some(unit) = self.world.units.get_mut(id) {
                if !unit.is_dead() {
                    unit.set_ai_active(true);
                }
            }
        }
        self.world.simulating = true;
        tracing::info!(
            tick = self.world.tick,
            units = self.world.units.len(),
            teams = self.world.registry.teams().count(),
            "battle started"
        );
    }

    /// Stop simulating. Projectiles in flight are cleared on the next tick.
    pub fn stop(&mut self) {
        self.world.simulating = false;
        tracing::info!(tick = self.world.tick, "battle stopped");
    }

    /// Attach a telemetry sink, replacing any previous one.
    pub fn set_telemetry(&mut self, sink: Box<dyn TelemetrySink>) {
        self.world.telemetry = sink;
    }

    /// Advance the battle by one tick.
    pub fn tick(&mut self) -> TickEvents {
        if self.world.simulating {
            if self.targeting.is_due() {
                self.targeting.update_targets(&mut self.world);
            }
            if self.stuck.is_due() {
                let recoveries = self.stuck.check(&mut self.world);
                self.world.events.stuck_recoveries.extend(recoveries);
            }

            let ids = self.world.units.sorted_ids();
            for &id in &ids {
                behavior::update(&mut self.world, id);
            }
            for &id in &ids {
                if let Some(unit) = self.world.units.get_mut(id) {
                    if !unit.is_dead() {
                        unit.advance();
                    }
                }
            }
        }

        projectile::update_projectiles(&mut self.world);
        self.run_deferred();

        #[cfg(feature = "debug-validation")]
        if let Err(err) = self.check_invariants() {
            tracing::error!(tick = self.world.tick, %err, "battle invariant violated");
            debug_assert!(false, "battle invariant violated: {err}");
        }

        self.world.tick += 1;
        std::mem::take(&mut self.world.events)
    }

    fn run_deferred(&mut self) {
        for action in self.world.scheduler.drain_due(self.world.tick) {
            match action {
                DeferredAction::DestroyUnit(id) => {
                    if self.world.units.remove(id).is_some() {
                        tracing::debug!(tick = self.world.tick, unit = id, "unit destroyed");
                        self.world.events.destroyed.push(id);
                    }
                }
            }
        }
    }

    /// Run `ticks` ticks and return their merged events.
    pub fn run_for(&mut self, ticks: u64) -> TickEvents {
        let mut all = TickEvents::default();
        for _ in 0..ticks {
            all.merge(self.tick());
        }
        all
    }

    /// Tick until at most one team has units left, or `max_ticks` pass.
    ///
    /// Returns the winner, if exactly one team survives.
    pub fn run_until_decided(&mut self, max_ticks: u64) -> Option<TeamId> {
        for _ in 0..max_ticks {
            if self.surviving_teams().len() <= 1 {
                break;
            }
            self.tick();
        }
        self.winner()
    }

    /// Get a unit by handle. Dead units remain visible until destroyed.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> Option<&Unit<F>> {
        self.world.units.get(id)
    }

    /// Get a mutable unit, for attaching cell observers or repositioning.
    pub fn unit_mut(&mut self, id: UnitId) -> Option<&mut Unit<F>> {
        self.world.units.get_mut(id)
    }

    /// All units.
    #[must_use]
    pub fn units(&self) -> &UnitStorage<F> {
        &self.world.units
    }

    /// The team registry.
    #[must_use]
    pub fn registry(&self) -> &TeamRegistry {
        &self.world.registry
    }

    /// Projectiles in flight, in handle order.
    pub fn projectiles(&self) -> impl Iterator<Item = &Projectile> {
        self.world.projectiles.values()
    }

    /// The stuck monitor.
    #[must_use]
    pub fn stuck_monitor(&self) -> &StuckMonitor {
        &self.stuck
    }

    /// Nearest living enemy of `source`.
    #[must_use]
    pub fn find_nearest_enemy(&self, source: UnitId) -> Option<UnitId> {
        targeting::find_nearest_enemy(&self.world.units, &self.world.registry, source)
    }

    /// Assign a target, running the state transition it implies.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::UnitNotFound`] if `unit` does not exist.
    pub fn set_target(&mut self, unit: UnitId, target: Option<UnitId>) -> Result<()> {
        if !self.world.units.contains(unit) {
            return Err(BattleError::UnitNotFound(unit));
        }
        behavior::set_target(&mut self.world, unit, target);
        Ok(())
    }

    /// Apply external damage through the normal damage path.
    ///
    /// Events produced here are reported with the next tick. Returns
    /// `true` if the damage killed the unit.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::UnitNotFound`] if `unit` does not exist.
    pub fn deal_damage(&mut self, unit: UnitId, amount: u32) -> Result<bool> {
        if !self.world.units.contains(unit) {
            return Err(BattleError::UnitNotFound(unit));
        }
        Ok(combat::take_damage(&mut self.world, unit, amount, None))
    }

    /// Teams that still have living units, ascending.
    #[must_use]
    pub fn surviving_teams(&self) -> Vec<TeamId> {
        self.world.registry.teams_with_units()
    }

    /// The only surviving team, if exactly one remains.
    #[must_use]
    pub fn winner(&self) -> Option<TeamId> {
        match self.surviving_teams().as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }

    /// Check cross-structure bookkeeping: buckets against the membership
    /// index, and registration against unit liveness.
    ///
    /// # Errors
    ///
    /// Returns [`BattleError::InvalidState`] describing the first mismatch.
    pub fn check_invariants(&self) -> Result<()> {
        self.world.registry.validate()?;
        for (id, unit) in self.world.units.iter() {
            let registered = self.world.registry.team_of(*id);
            match (unit.is_dead(), registered) {
                (false, Some(team)) if team == unit.team() => {}
                (true, None) => {}
                (dead, team) => {
                    return Err(BattleError::InvalidState(format!(
                        "unit {id} (dead: {dead}) registered under {team:?}, owned by team {}",
                        unit.team()
                    )));
                }
            }
        }
        Ok(())
    }

    /// Hash of the full battle state, for determinism checks.
    #[must_use]
    pub fn state_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.world.tick.hash(&mut hasher);

        let ids = self.world.units.sorted_ids();
        ids.len().hash(&mut hasher);
        for id in ids {
            if let Some(unit) = self.world.units.get(id) {
                id.hash(&mut hasher);
                unit.team().hash(&mut hasher);
                unit.position().hash(&mut hasher);
                unit.facing().hash(&mut hasher);
                unit.health().hash(&mut hasher);
                unit.is_dead().hash(&mut hasher);
                unit.target().hash(&mut hasher);
                unit.behavior().hash(&mut hasher);
            }
        }

        self.world.projectiles.len().hash(&mut hasher);
        for p in self.world.projectiles.values() {
            p.id().hash(&mut hasher);
            p.position().hash(&mut hasher);
            p.direction().hash(&mut hasher);
            p.speed().hash(&mut hasher);
            p.target().hash(&mut hasher);
            p.elapsed().hash(&mut hasher);
        }

        hasher.finish()
    }

    #[cfg(test)]
    pub(crate) fn world_mut(&mut self) -> &mut World<F> {
        &mut self.world
    }
}

impl<F: CellFamily> Default for Battle<F> {
    fn default() -> Self {
        Self::new(BattleConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Archetype, BehaviorKind};
    use crate::math::Fixed;
    use crate::value::Observed;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn two_team_battle<F: CellFamily>() -> Battle<F> {
        let mut battle = Battle::new(BattleConfig::default());
        battle.add_team(TeamSpec::new(0, "blue")).unwrap();
        battle.add_team(TeamSpec::new(1, "red")).unwrap();
        battle
    }

    fn melee() -> UnitStats {
        UnitStats::for_archetype(Archetype::Melee)
    }

    #[test]
    fn test_tick_increments() {
        let mut battle: Battle = Battle::default();
        assert_eq!(battle.current_tick(), 0);
        battle.tick();
        battle.tick();
        assert_eq!(battle.current_tick(), 2);
    }

    #[test]
    fn test_spawn_requires_team() {
        let mut battle: Battle = Battle::default();
        let result = battle.spawn_unit(UnitSpawn::new(3, melee(), Vec2Fixed::ZERO));
        assert!(matches!(result, Err(BattleError::TeamNotFound(3))));
    }

    #[test]
    fn test_prep_phase_is_inert() {
        let mut battle: Battle = two_team_battle();
        let a = battle.spawn_unit(UnitSpawn::new(0, melee(), Vec2Fixed::ZERO)).unwrap();
        battle.spawn_unit(UnitSpawn::new(1, melee(), Vec2Fixed::from_ints(1, 0))).unwrap();

        battle.run_for(50);
        let unit = battle.unit(a).unwrap();
        assert!(!unit.is_ai_active());
        assert_eq!(unit.target(), None);
        assert_eq!(unit.behavior(), BehaviorKind::Idle);

        battle.start();
        battle.tick();
        assert!(battle.unit(a).unwrap().is_ai_active());
        assert!(battle.unit(a).unwrap().target().is_some());
    }

    #[test]
    fn test_unknown_unit_commands_fail() {
        let mut battle: Battle = two_team_battle();
        assert!(matches!(battle.set_target(9, None), Err(BattleError::UnitNotFound(9))));
        assert!(matches!(battle.deal_damage(9, 1), Err(BattleError::UnitNotFound(9))));
    }

    #[test]
    fn test_melee_duel_decides() {
        let mut battle: Battle = two_team_battle();
        battle.spawn_unit(UnitSpawn::new(0, melee(), Vec2Fixed::ZERO)).unwrap();
        battle
            .spawn_unit(UnitSpawn::new(1, melee().with_health(40), Vec2Fixed::from_ints(8, 0)))
            .unwrap();
        battle.start();

        assert_eq!(battle.run_until_decided(5_000), Some(0));
        assert_eq!(battle.surviving_teams(), vec![0]);
        battle.check_invariants().unwrap();
    }

    #[test]
    fn test_deterministic_hash() {
        fn run() -> u64 {
            let mut battle: Battle = two_team_battle();
            for i in 0..4 {
                battle
                    .spawn_unit(UnitSpawn::new(0, melee(), Vec2Fixed::from_ints(0, i * 2)))
                    .unwrap();
                let stats = UnitStats::for_archetype(Archetype::Ranged);
                battle
                    .spawn_unit(UnitSpawn::new(1, stats, Vec2Fixed::from_ints(12, i * 2)))
                    .unwrap();
            }
            battle.start();
            battle.run_for(300);
            battle.state_hash()
        }
        assert_eq!(run(), run());
    }

    #[test]
    fn test_families_produce_identical_battles() {
        fn run<F: CellFamily>() -> (u64, Option<TeamId>) {
            let mut battle: Battle<F> = two_team_battle();
            battle.spawn_unit(UnitSpawn::new(0, melee(), Vec2Fixed::ZERO)).unwrap();
            let art = UnitStats::for_archetype(Archetype::Artillery);
            battle
                .spawn_unit(UnitSpawn::new(1, art, Vec2Fixed::from_ints(14, 3)))
                .unwrap();
            battle.start();
            let winner = battle.run_until_decided(3_000);
            (battle.state_hash(), winner)
        }
        assert_eq!(run::<Direct>(), run::<Observed>());
    }

    #[test]
    fn test_observed_cells_report_changes() {
        let mut battle: Battle<Observed> = two_team_battle();
        let a = battle.spawn_unit(UnitSpawn::new(0, melee(), Vec2Fixed::ZERO)).unwrap();
        let b = battle
            .spawn_unit(UnitSpawn::new(1, melee(), Vec2Fixed::from_ints(1, 0)))
            .unwrap();

        let states = Rc::new(RefCell::new(Vec::new()));
        let health = Rc::new(RefCell::new(Vec::new()));
        {
            let sink = Rc::clone(&states);
            let unit = battle.unit_mut(a).unwrap();
            unit.behavior_cell_mut().subscribe(move |s| sink.borrow_mut().push(*s));
            let sink = Rc::clone(&health);
            battle
                .unit_mut(b)
                .unwrap()
                .health_cell_mut()
                .subscribe(move |hp| sink.borrow_mut().push(*hp));
        }

        battle.start();
        battle.run_for(40);

        assert_eq!(*states.borrow(), vec![BehaviorKind::Attack]);
        assert!(!health.borrow().is_empty());
        assert_eq!(health.borrow().last().copied(), Some(battle.unit(b).unwrap().health()));
    }

    #[test]
    fn test_telemetry_sink_receives_events() {
        #[derive(Default)]
        struct Counting {
            attacks: Rc<RefCell<u32>>,
            deaths: Rc<RefCell<u32>>,
        }
        impl TelemetrySink for Counting {
            fn record_attack(&mut self, _: u64, _: UnitId, _: UnitId) {
                *self.attacks.borrow_mut() += 1;
            }
            fn record_death(&mut self, _: u64, _: UnitId) {
                *self.deaths.borrow_mut() += 1;
            }
        }

        let sink = Counting::default();
        let attacks = Rc::clone(&sink.attacks);
        let deaths = Rc::clone(&sink.deaths);

        let mut battle: Battle = two_team_battle();
        battle.set_telemetry(Box::new(sink));
        battle.spawn_unit(UnitSpawn::new(0, melee(), Vec2Fixed::ZERO)).unwrap();
        battle
            .spawn_unit(UnitSpawn::new(1, melee().with_health(30), Vec2Fixed::from_ints(1, 0)))
            .unwrap();
        battle.start();
        battle.run_until_decided(1_000);

        assert!(*attacks.borrow() >= 2);
        assert_eq!(*deaths.borrow(), 1);
    }

    #[test]
    fn test_hysteresis_keeps_attacker_engaged() {
        let config = BattleConfig {
            attack_range_hysteresis: Fixed::ONE,
            ..BattleConfig::default()
        };
        let mut battle: Battle = Battle::new(config);
        battle.add_team(TeamSpec::new(0, "blue")).unwrap();
        battle.add_team(TeamSpec::new(1, "red")).unwrap();
        let range = Fixed::from_num(2);
        let a = battle
            .spawn_unit(UnitSpawn::new(0, melee().with_range(range), Vec2Fixed::ZERO))
            .unwrap();
        let b = battle
            .spawn_unit(
                UnitSpawn::new(1, melee().with_health(10_000), Vec2Fixed::from_ints(2, 0))
                    .without_mover(),
            )
            .unwrap();
        battle.start();
        battle.tick();
        assert_eq!(battle.unit(a).unwrap().behavior(), BehaviorKind::Attack);

        // Nudge the target just past base range but inside the margin.
        if let Some(target) = battle.unit_mut(b) {
            target.set_position(Vec2Fixed::new(Fixed::from_num(2.5), Fixed::ZERO));
        }
        battle.tick();
        assert_eq!(battle.unit(a).unwrap().behavior(), BehaviorKind::Attack);
    }
}
