//! Unit data definitions.
//!
//! Identifiers, archetypes and stat blocks. Stat blocks are read-only
//! once a unit is spawned; everything that changes during combat lives on
//! [`crate::unit::Unit`].

use serde::{Deserialize, Serialize};

use crate::math::{fixed_serde, option_fixed_serde, Fixed};

/// Unique identifier for units.
///
/// Assigned in spawn order and never reused within a battle, so a stale
/// handle can never alias a newer unit.
pub type UnitId = u64;

/// Primary team identifier.
pub type TeamId = u32;

/// Unique identifier for projectiles.
pub type ProjectileId = u64;

// ============================================================================
// Archetypes
// ============================================================================

/// A unit's combat role.
///
/// The declaration order is also the bucket iteration order used by the
/// targeting engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Archetype {
    /// Closes to contact and strikes directly.
    Melee,
    /// Fires a hit-scan shot; backs off when enemies get too close.
    Ranged,
    /// Lobs homing projectiles that explode with splash damage.
    Artillery,
}

impl Archetype {
    /// All archetypes in bucket order.
    pub const ALL: [Self; 3] = [Self::Melee, Self::Ranged, Self::Artillery];

    /// Short lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Melee => "melee",
            Self::Ranged => "ranged",
            Self::Artillery => "artillery",
        }
    }
}

/// Behavior state of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BehaviorKind {
    /// No target; stationary.
    #[default]
    Idle,
    /// Valid target out of attack range; closing in.
    Move,
    /// Valid target in range; attacking on a cadence.
    Attack,
}

// ============================================================================
// Stat blocks
// ============================================================================

/// Combat stats shared by all archetypes.
///
/// Durations are in ticks, speeds in world units per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatStats {
    /// Damage per attack (or per explosion, for artillery).
    pub damage: u32,
    /// Attack range in world units.
    #[serde(with = "fixed_serde")]
    pub attack_range: Fixed,
    /// Ticks between consecutive attacks.
    pub attack_cooldown: u32,
    /// Ticks before the first attack after entering Attack.
    pub initial_attack_delay: u32,
    /// Movement speed in world units per tick.
    #[serde(with = "fixed_serde")]
    pub move_speed: Fixed,
    /// Collision radius used by hit tests.
    #[serde(with = "fixed_serde")]
    pub body_radius: Fixed,
}

/// Ranged archetype extras.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangedStats {
    /// Enemies closer than this trigger a retreat.
    #[serde(with = "fixed_serde")]
    pub retreat_distance: Fixed,
    /// How far a single retreat order backs off.
    #[serde(with = "fixed_serde")]
    pub retreat_step: Fixed,
    /// Distance from the unit center to the fire point, along its facing.
    #[serde(with = "fixed_serde")]
    pub muzzle_offset: Fixed,
}

impl Default for RangedStats {
    fn default() -> Self {
        Self {
            retreat_distance: Fixed::from_num(3),
            retreat_step: Fixed::from_num(2),
            muzzle_offset: Fixed::from_num(0.6),
        }
    }
}

/// Projectile kinematics cached on an artillery unit and copied into
/// every round it fires.
///
/// Speeds are per tick, accelerations per tick², turn rates in radians
/// per tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectileParams {
    /// Launch speed.
    #[serde(with = "fixed_serde")]
    pub initial_speed: Fixed,
    /// Speed cap.
    #[serde(with = "fixed_serde")]
    pub max_speed: Fixed,
    /// Speed gained each homing tick.
    #[serde(with = "fixed_serde")]
    pub acceleration: Fixed,
    /// Turn rate when homing begins.
    #[serde(with = "fixed_serde")]
    pub initial_turn_rate: Fixed,
    /// Turn rate cap.
    #[serde(with = "fixed_serde")]
    pub max_turn_rate: Fixed,
    /// Turn rate gained each homing tick.
    #[serde(with = "fixed_serde")]
    pub turn_acceleration: Fixed,
    /// Ticks of straight flight before homing starts.
    pub straight_ticks: u32,
    /// Ticks before the round expires silently.
    pub lifespan: u32,
    /// Splash radius on detonation.
    #[serde(with = "fixed_serde")]
    pub explosion_radius: Fixed,
    /// Search radius when the original target is lost.
    #[serde(with = "fixed_serde")]
    pub retarget_radius: Fixed,
    /// Contact radius of the round itself.
    #[serde(with = "fixed_serde")]
    pub collision_radius: Fixed,
}

impl Default for ProjectileParams {
    fn default() -> Self {
        Self {
            initial_speed: Fixed::from_num(0.3),
            max_speed: Fixed::from_num(1),
            acceleration: Fixed::from_num(0.02),
            initial_turn_rate: Fixed::from_num(0.02),
            max_turn_rate: Fixed::from_num(0.2),
            turn_acceleration: Fixed::from_num(0.01),
            straight_ticks: 10,
            lifespan: 100,
            explosion_radius: Fixed::from_num(2.5),
            retarget_radius: Fixed::from_num(10),
            collision_radius: Fixed::from_num(0.3),
        }
    }
}

/// Archetype-specific attack equipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Loadout {
    /// Direct strike.
    Melee,
    /// Hit-scan shot with retreat behavior.
    Ranged(RangedStats),
    /// Homing projectile launcher.
    Artillery(ProjectileParams),
}

impl Loadout {
    /// Archetype this loadout belongs to.
    #[must_use]
    pub const fn archetype(&self) -> Archetype {
        match self {
            Self::Melee => Archetype::Melee,
            Self::Ranged(_) => Archetype::Ranged,
            Self::Artillery(_) => Archetype::Artillery,
        }
    }
}

/// Complete, resolved stat block for one unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitStats {
    /// Maximum health points.
    pub max_health: u32,
    /// Shared combat stats.
    pub combat: CombatStats,
    /// Archetype equipment.
    pub loadout: Loadout,
}

impl UnitStats {
    /// Documented defaults for an archetype.
    #[must_use]
    pub fn for_archetype(archetype: Archetype) -> Self {
        match archetype {
            Archetype::Melee => Self {
                max_health: 100,
                combat: CombatStats {
                    damage: 15,
                    attack_range: Fixed::from_num(1.5),
                    attack_cooldown: 20,
                    initial_attack_delay: 10,
                    move_speed: Fixed::from_num(0.25),
                    body_radius: Fixed::from_num(0.5),
                },
                loadout: Loadout::Melee,
            },
            Archetype::Ranged => Self {
                max_health: 70,
                combat: CombatStats {
                    damage: 10,
                    attack_range: Fixed::from_num(8),
                    attack_cooldown: 30,
                    initial_attack_delay: 10,
                    move_speed: Fixed::from_num(0.2),
                    body_radius: Fixed::from_num(0.5),
                },
                loadout: Loadout::Ranged(RangedStats::default()),
            },
            Archetype::Artillery => Self {
                max_health: 60,
                combat: CombatStats {
                    damage: 25,
                    attack_range: Fixed::from_num(15),
                    attack_cooldown: 60,
                    initial_attack_delay: 20,
                    move_speed: Fixed::from_num(0.15),
                    body_radius: Fixed::from_num(0.6),
                },
                loadout: Loadout::Artillery(ProjectileParams::default()),
            },
        }
    }

    /// Archetype of this stat block.
    #[must_use]
    pub const fn archetype(&self) -> Archetype {
        self.loadout.archetype()
    }

    /// Builder method to set damage.
    #[must_use]
    pub const fn with_damage(mut self, damage: u32) -> Self {
        self.combat.damage = damage;
        self
    }

    /// Builder method to set attack range.
    #[must_use]
    pub const fn with_range(mut self, range: Fixed) -> Self {
        self.combat.attack_range = range;
        self
    }

    /// Builder method to set attack timing.
    #[must_use]
    pub const fn with_timing(mut self, initial_attack_delay: u32, attack_cooldown: u32) -> Self {
        self.combat.initial_attack_delay = initial_attack_delay;
        self.combat.attack_cooldown = attack_cooldown;
        self
    }

    /// Builder method to set max health.
    #[must_use]
    pub const fn with_health(mut self, max_health: u32) -> Self {
        self.max_health = max_health;
        self
    }

    /// Builder method to set move speed.
    #[must_use]
    pub const fn with_speed(mut self, move_speed: Fixed) -> Self {
        self.combat.move_speed = move_speed;
        self
    }
}

// ============================================================================
// Templates
// ============================================================================

/// Data-driven unit definition with every stat optional.
///
/// Missing entries fall back to the archetype defaults from
/// [`UnitStats::for_archetype`] with a logged warning.
///
/// # Example RON
///
/// ```ron
/// UnitTemplate(
///     archetype: Artillery,
///     max_health: Some(80),
///     damage: Some(30),
///     attack_range: Some(18.0),
///     projectile: None, // falls back to default kinematics, with a warning
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitTemplate {
    /// Combat role.
    pub archetype: Archetype,
    /// Maximum health points.
    #[serde(default)]
    pub max_health: Option<u32>,
    /// Damage per attack.
    #[serde(default)]
    pub damage: Option<u32>,
    /// Attack range.
    #[serde(default, with = "option_fixed_serde")]
    pub attack_range: Option<Fixed>,
    /// Ticks between attacks.
    #[serde(default)]
    pub attack_cooldown: Option<u32>,
    /// Ticks before the first attack.
    #[serde(default)]
    pub initial_attack_delay: Option<u32>,
    /// Movement speed per tick.
    #[serde(default, with = "option_fixed_serde")]
    pub move_speed: Option<Fixed>,
    /// Collision radius.
    #[serde(default, with = "option_fixed_serde")]
    pub body_radius: Option<Fixed>,
    /// Ranged extras (ranged archetype only).
    #[serde(default)]
    pub ranged: Option<RangedStats>,
    /// Projectile kinematics (artillery archetype only).
    #[serde(default)]
    pub projectile: Option<ProjectileParams>,
}

impl UnitTemplate {
    /// Template with nothing set.
    #[must_use]
    pub const fn empty(archetype: Archetype) -> Self {
        Self {
            archetype,
            max_health: None,
            damage: None,
            attack_range: None,
            attack_cooldown: None,
            initial_attack_delay: None,
            move_speed: None,
            body_radius: None,
            ranged: None,
            projectile: None,
        }
    }

    /// Resolve into a complete stat block.
    ///
    /// Each missing stat is filled from the archetype default and reported
    /// with a `warn!`; resolution never fails.
    #[must_use]
    pub fn resolve(&self) -> UnitStats {
        let defaults = UnitStats::for_archetype(self.archetype);
        let archetype = self.archetype.name();

        fn pick<T: Copy + std::fmt::Debug>(
            archetype: &str,
            field: &str,
            value: Option<T>,
            fallback: T,
        ) -> T {
            value.unwrap_or_else(|| {
                tracing::warn!(archetype, field, ?fallback, "missing unit stat, using default");
                fallback
            })
        }

        let d = defaults.combat;
        let combat = CombatStats {
            damage: pick(archetype, "damage", self.damage, d.damage),
            attack_range: pick(archetype, "attack_range", self.attack_range, d.attack_range),
            attack_cooldown: pick(
                archetype,
                "attack_cooldown",
                self.attack_cooldown,
                d.attack_cooldown,
            ),
            initial_attack_delay: pick(
                archetype,
                "initial_attack_delay",
                self.initial_attack_delay,
                d.initial_attack_delay,
            ),
            move_speed: pick(archetype, "move_speed", self.move_speed, d.move_speed),
            body_radius: pick(archetype, "body_radius", self.body_radius, d.body_radius),
        };

        let loadout = match self.archetype {
            Archetype::Melee => Loadout::Melee,
            Archetype::Ranged => Loadout::Ranged(pick(
                archetype,
                "ranged",
                self.ranged,
                RangedStats::default(),
            )),
            Archetype::Artillery => Loadout::Artillery(pick(
                archetype,
                "projectile",
                self.projectile,
                ProjectileParams::default(),
            )),
        };

        UnitStats {
            max_health: pick(archetype, "max_health", self.max_health, defaults.max_health),
            combat,
            loadout,
        }
    }
}

impl From<UnitStats> for UnitTemplate {
    fn from(stats: UnitStats) -> Self {
        let (ranged, projectile) = match stats.loadout {
            Loadout::Melee => (None, None),
            Loadout::Ranged(r) => (Some(r), None),
            Loadout::Artillery(p) => (None, Some(p)),
        };
        Self {
            archetype: stats.archetype(),
            max_health: Some(stats.max_health),
            damage: Some(stats.combat.damage),
            attack_range: Some(stats.combat.attack_range),
            attack_cooldown: Some(stats.combat.attack_cooldown),
            initial_attack_delay: Some(stats.combat.initial_attack_delay),
            move_speed: Some(stats.combat.move_speed),
            body_radius: Some(stats.combat.body_radius),
            ranged,
            projectile,
        }
    }
}
