//! Fixed-point math utilities.
//!
//! Positions, ranges, speeds and resource stockpiles are fixed-point so that
//! two planners fed the same snapshot walk identical trees. Utility scores are
//! plain `f64` because they never feed back into simulated state.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulated quantities.
///
/// 32 integer bits, 32 fractional bits.
pub type Fixed = I32F32;

/// Build a [`Fixed`] from a thousandths-scaled integer (`1500` -> `1.5`).
///
/// Catalog data is authored in milli-units so RON files stay integral.
#[must_use]
pub fn from_milli(milli: u32) -> Fixed {
    Fixed::from_num(milli) / Fixed::from_num(1000)
}

/// Smallest whole number of frames `f` such that `rate * f >= amount`.
///
/// Returns `None` when `rate` is not positive and `amount` is.
#[must_use]
pub fn frames_to_accumulate(amount: Fixed, rate: Fixed) -> Option<u32> {
    if amount <= Fixed::ZERO {
        return Some(0);
    }
    if rate <= Fixed::ZERO {
        return None;
    }
    let frames = (amount / rate).ceil();
    Some(frames.to_num::<i64>().clamp(0, i64::from(u32::MAX)) as u32)
}

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
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

impl Vec2Fixed {
    /// Zero vector.
    pub const ZERO: Self = Self {
        x: Fixed::ZERO,
        y: Fixed::ZERO,
    };

    /// Create a new fixed-point vector.
    #[must_use]
    pub const fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }

    /// Create a vector from whole-number coordinates.
    #[must_use]
    pub fn from_ints(x: i32, y: i32) -> Self {
        Self::new(Fixed::from_num(x), Fixed::from_num(y))
    }

    /// Squared distance, for comparisons against a squared radius.
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

    /// Whether `other` lies within `radius` of this point (inclusive).
    #[must_use]
    pub fn within(self, other: Self, radius: Fixed) -> bool {
        self.distance_squared(other) <= radius.saturating_mul(radius)
    }

    /// Unit vector in the same direction, or zero for the zero vector.
    #[must_use]
    ///
    /// Components are first divided by the larger magnitude, so squaring
    /// never overflows.
    pub fn normalize(self) -> Self {
        let largest = self.x.saturating_abs().max(self.y.saturating_abs());
        if largest == Fixed::ZERO {
            return Self::ZERO;
        }
        let unit = Self::new(self.x / largest, self.y / largest);
        let len = fixed_sqrt(unit.x * unit.x + unit.y * unit.y);
        Self::new(unit.x / len, unit.y / len)
    }

    /// Scale both components, saturating at the fixed-point range.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x.saturating_mul(factor), self.y.saturating_mul(factor))
    }
}

/// Square root of a fixed-point number by bisection.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = value.max(Fixed::ONE);

    for _ in 0..48 {
        let mid = low + (high - low) / Fixed::from_num(2);
        if mid.saturating_mul(mid) <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

impl std::ops::Add for Vec2Fixed {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2Fixed {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}
