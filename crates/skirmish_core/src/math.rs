//! Fixed-point math utilities for deterministic simulation.
//!
//! All match simulation uses fixed-point arithmetic to ensure
//! deterministic behavior across platforms. Floating-point
//! operations can produce different results on different CPUs.
//!
//! Configuration files are authored with decimal numbers; those are
//! converted to [`Fixed`] exactly once, at load time, by [`decimal_serde`].

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = I32F32;

/// Pi as a fixed-point constant.
pub const FIXED_PI: Fixed = Fixed::from_bits(13_493_037_705);

/// Fixed-point 2D vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Vec2Fixed {
    /// X coordinate.
    #[serde(with = "decimal_serde")]
    pub x: Fixed,
    /// Y coordinate.
    #[serde(with = "decimal_serde")]
    pub y: Fixed,
}

/// Serde support for fixed-point numbers written as decimals.
///
/// Deserializes from any number and rejects values outside the
/// representable range instead of wrapping.
pub mod decimal_serde {
    use super::Fixed;
    use serde::{de, Deserialize, Deserializer, Serializer};

    /// Serialize a fixed-point number as a decimal.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(value.to_num::<f64>())
    }

    /// Deserialize a fixed-point number from a decimal.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = f64::deserialize(deserializer)?;
        Fixed::checked_from_num(raw)
            .ok_or_else(|| de::Error::custom(format!("number {raw} is out of fixed-point range")))
    }
}

impl Vec2Fixed {
    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Create a vector from integer coordinates.
    #[must_use]
    pub fn from_ints(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
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

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }

    /// Euclidean distance.
    #[must_use]
    pub fn distance(self, other: Self) -> Fixed {
        fixed_sqrt(self.distance_squared(other))
    }

    /// Dot product of two vectors.
    #[must_use]
    pub fn dot(self, other: Self) -> Fixed {
        self.x * other.x + self.y * other.y
    }

    /// Vector length.
    #[must_use]
    pub fn length(self) -> Fixed {
        fixed_sqrt(self.x.saturating_mul(self.x).saturating_add(self.y.saturating_mul(self.y)))
    }

    /// Scale by a scalar.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Counter-clockwise perpendicular.
    #[must_use]
    pub fn perpendicular(self) -> Self {
        Self::new(-self.y, self.x)
    }

    /// Rotate counter-clockwise by an angle in degrees.
    #[must_use]
    pub fn rotate_degrees(self, degrees: Fixed) -> Self {
        let (sin, cos) = sin_cos_degrees(degrees);
        Self::new(
            self.x * cos - self.y * sin,
            self.x * sin + self.y * cos,
        )
    }

    /// Linearly interpolate between two vectors.
    #[must_use]
    pub fn lerp(self, other: Self, t: Fixed) -> Self {
        Self {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Normalize vector using fixed-point math.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len = self.length();
        if len == Fixed::ZERO {
            return Self::ZERO;
        }

        Self::new(self.x / len, self.y / len)
    }

    /// Unit direction from `self` toward `other`, or `fallback` when they coincide.
    #[must_use]
    pub fn direction_to(self, other: Self, fallback: Self) -> Self {
        let dir = (other - self).normalize();
        if dir == Self::ZERO {
            fallback
        } else {
            dir
        }
    }
}

/// Computes the square root of a fixed-point number using binary search.
///
/// Searches over the raw bits, so perfect squares come out exact.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    // sqrt(bits / 2^32) * 2^32 == sqrt(bits * 2^32)
    let scaled = (value.to_bits() as u128) << 32;
    let mut low: u128 = 0;
    let mut high: u128 = 1 << 48;

    while low < high {
        let mid = (low + high + 1) / 2;
        if mid * mid <= scaled {
            low = mid;
        } else {
            high = mid - 1;
        }
    }

    Fixed::from_bits(low as i64)
}

/// Sine and cosine of an angle in degrees.
///
/// The angle is reduced to `[-90, 90]` and evaluated with a Taylor series,
/// which keeps the error below `1e-6` over the reduced interval.
#[must_use]
pub fn sin_cos_degrees(degrees: Fixed) -> (Fixed, Fixed) {
    let full = Fixed::from_num(360);
    let half = Fixed::from_num(180);
    let quarter = Fixed::from_num(90);

    let mut angle = degrees % full;
    if angle > half {
        angle -= full;
    } else if angle < -half {
        angle += full;
    }

    // sin(180 - a) = sin(a), cos(180 - a) = -cos(a)
    let mut cos_sign = Fixed::ONE;
    if angle > quarter {
        angle = half - angle;
        cos_sign = -Fixed::ONE;
    } else if angle < -quarter {
        angle = -half - angle;
        cos_sign = -Fixed::ONE;
    }

    let x = angle * FIXED_PI / half;
    let x2 = x * x;

    let mut sin = Fixed::ZERO;
    let mut term = x;
    let mut n = 1;
    for _ in 0..6 {
        sin += term;
        term = -term * x2 / Fixed::from_num((n + 1) * (n + 2));
        n += 2;
    }

    let mut cos = Fixed::ZERO;
    let mut term = Fixed::ONE;
    let mut n = 0;
    for _ in 0..6 {
        cos += term;
        term = -term * x2 / Fixed::from_num((n + 1) * (n + 2));
        n += 2;
    }

    (sin, cos * cos_sign)
}

/// Convert a millisecond duration to fixed-point seconds.
#[must_use]
pub fn ms_to_seconds(ms: u64) -> Fixed {
    Fixed::saturating_from_num(ms) / 1000
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

impl std::ops::Neg for Vec2Fixed {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y)
    }
}
