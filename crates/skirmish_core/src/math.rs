//! Fixed-point math utilities for deterministic simulation.
//!
//! All battle math uses fixed-point arithmetic so that two battles fed
//! the same inputs produce bit-identical results on any CPU. The
//! battlefield is planar: there is no height coordinate, and every
//! distance and range check works on `x`/`y` only.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = I32F32;

/// π as a fixed-point constant (`round(π · 2³²)` raw bits).
pub const PI: Fixed = Fixed::from_bits(13_493_037_705);

/// 2π.
pub const TAU: Fixed = Fixed::from_bits(26_986_075_410);

/// π/2.
pub const FRAC_PI_2: Fixed = Fixed::from_bits(6_746_518_852);

/// Fixed-point 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "fixed_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "fixed_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers.
///
/// Values are written as plain decimals so configuration and scenario
/// files stay hand-editable. Conversion happens once, at load time.
pub mod fixed_serde {
    use super::Fixed;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as a decimal.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_num::<f64>().serialize(serializer)
    }

    /// Deserialize a fixed-point number from a decimal.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let decimal = f64::deserialize(deserializer)?;
        Fixed::checked_from_num(decimal)
            .ok_or_else(|| D::Error::custom(format!("{decimal} is out of fixed-point range")))
    }
}

/// Serde support for `Option<Fixed>`.
///
/// Same decimal representation as [`fixed_serde`], with `None` preserved.
pub mod option_fixed_serde {
    use super::Fixed;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize an optional fixed-point number.
    pub fn serialize<S>(value: &Option<Fixed>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => serializer.serialize_some(&v.to_num::<f64>()),
            None => serializer.serialize_none(),
        }
    }

    /// Deserialize an optional fixed-point number.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Fixed>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<f64>::deserialize(deserializer)? {
            Some(decimal) => Fixed::checked_from_num(decimal)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("{decimal} is out of fixed-point range"))),
            None => Ok(None),
        }
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Unit vector along +X.
    pub const UNIT_X: Self = Self {
        x: Fixed::ONE,
        y: Fixed::ZERO,
    };

    /// Build a vector from integer coordinates.
    #[must_use]
    pub fn from_ints(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Check for the zero vector.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.x == Fixed::ZERO && self.y == Fixed::ZERO
    }

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x.saturating_sub(other.x);
        let dy = self.y.saturating_sub(other.y);
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }

    /// Planar Euclidean distance.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(self.distance_squared(other))
    }

    /// Squared length.
    #[must_use]
    pub fn length_squared(self) -> Fixed {
        self.x.saturating_mul(self.x).saturating_add(self.y.saturating_mul(self.y))
    }

    /// Length.
    #[must_use]
    pub fn length(self) -> Fixed {
        fixed_sqrt(self.length_squared())
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x
            .saturating_mul(other.x)
            .saturating_add(self.y.saturating_mul(other.y))
    }

    /// Perp-dot product. Positive when `other` lies counter-clockwise of `self`.
    #[must_use]
    pub fn cross(self, other: Self) -> Fixed {
        self.x
            .saturating_mul(other.y)
            .saturating_sub(self.y.saturating_mul(other.x))
    }

    /// Scale by a scalar.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x.saturating_mul(factor), self.y.saturating_mul(factor))
    }

    /// Normalize vector using fixed-point math.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len_sq = self.length_squared();

        if len_sq == Fixed::ZERO {
            return Self::ZERO;
        }

        let len = fixed_sqrt(len_sq);
        if len == Fixed::ZERO {
            return Self::ZERO;
        }

        Self::new(self.x / len, self.y / len)
    }

    /// Rotate counter-clockwise by `angle` radians.
    #[must_use]
    pub fn rotated(self, angle: Fixed) -> Self {
        let (sin, cos) = (fixed_sin(angle), fixed_cos(angle));
        Self::new(
            self.x * cos - self.y * sin,
            self.x * sin + self.y * cos,
        )
    }

    /// Turn the unit direction `self` toward the unit direction `desired`
    /// by at most `max_angle` radians.
    ///
    /// Snaps to `desired` when it is already within `max_angle`. The result
    /// is re-normalized so repeated turning does not drift in length.
    #[must_use]
    pub fn rotate_towards(self, desired: Self, max_angle: Fixed) -> Self {
        if desired.is_zero() {
            return self;
        }
        if self.is_zero() || max_angle >= PI {
            return desired;
        }
        if self.dot(desired) >= fixed_cos(max_angle) {
            return desired;
        }
        let signed = if self.cross(desired) < Fixed::ZERO {
            -max_angle
        } else {
            max_angle
        };
        self.rotated(signed).normalize()
    }
}

/// Computes the square root of a fixed-point number using binary search.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::ONE { value } else { Fixed::ONE };

    // 64 halvings cover the full integer range down to the last fractional bit.
    for _ in 0..64 {
        let mid = low + (high - low) / Fixed::from_num(2);
        if mid == low {
            break;
        }
        let mid_sq = mid.saturating_mul(mid);

        if mid_sq <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

/// Wrap an angle into `[-π, π]`.
fn wrap_angle(angle: Fixed) -> Fixed {
    let mut a = angle % TAU;
    if a > PI {
        a -= TAU;
    } else if a < -PI {
        a += TAU;
    }
    a
}

/// Fixed-point sine (Taylor series after folding into `[-π/2, π/2]`).
#[must_use]
pub fn fixed_sin(angle: Fixed) -> Fixed {
    let mut x = wrap_angle(angle);
    if x > FRAC_PI_2 {
        x = PI - x;
    } else if x < -FRAC_PI_2 {
        x = -PI - x;
    }

    let x2 = x * x;
    let mut term = x;
    let mut sum = x;
    // x - x³/3! + x⁵/5! - ... up to x¹³
    for n in 1..=6_i32 {
        let denom = Fixed::from_num((2 * n) * (2 * n + 1));
        term = -(term * x2) / denom;
        sum += term;
    }
    sum
}

/// Fixed-point cosine.
#[must_use]
pub fn fixed_cos(angle: Fixed) -> Fixed {
    fixed_sin(wrap_angle(angle) + FRAC_PI_2)
}

/// Distance along a ray to its first contact with a circle.
///
/// `direction` must be unit length. An origin inside the circle hits at
/// distance zero; circles behind the origin are missed.
#[must_use]
pub fn ray_circle_distance(
    origin: Vec2Fixed,
    direction: Vec2Fixed,
    center: Vec2Fixed,
    radius: Fixed,
) -> Option<Fixed> {
    let m = origin - center;
    let c = m.length_squared() - radius.saturating_mul(radius);
    if c <= Fixed::ZERO {
        return Some(Fixed::ZERO);
    }
    let b = m.dot(direction);
    if b > Fixed::ZERO {
        return None;
    }
    let discriminant = b.saturating_mul(b) - c;
    if discriminant < Fixed::ZERO {
        return None;
    }
    Some(-b - fixed_sqrt(discriminant))
}

/// Fraction in `[0, 1]` along `start → end` of the point closest to
/// `center`, if that point lies within `radius`.
#[must_use]
pub fn segment_circle_contact(
    start: Vec2Fixed,
    end: Vec2Fixed,
    center: Vec2Fixed,
    radius: Fixed,
) -> Option<Fixed> {
    let d = end - start;
    let len_sq = d.length_squared();
    let t = if len_sq == Fixed::ZERO {
        Fixed::ZERO
    } else {
        ((center - start).dot(d) / len_sq).clamp(Fixed::ZERO, Fixed::ONE)
    };
    let closest = start + d.scale(t);
    (closest.distance_squared(center) <= radius.saturating_mul(radius)).then_some(t)
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x.saturating_add(rhs.x),
            y: self.y.saturating_add(rhs.y),
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x.saturating_sub(rhs.x),
            y: self.y.saturating_sub(rhs.y),
        }
    }
}

impl std::ops::Neg for Vec2Fixed {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self {
            x: self.x.saturating_neg(),
            y: self.y.saturating_neg(),
        }
    }
}
