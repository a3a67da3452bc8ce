//! Fixed-point math utilities for deterministic simulation.
//!
//! All battle simulation uses fixed-point arithmetic to ensure
//! deterministic behavior across platforms. Floating-point
//! operations can produce different results on different CPUs.
//!
//! Positions are measured in cells: the center of cell `(x, y)` sits at
//! exactly `(x, y)`. Angles are measured in degrees in `[0, 360)`, with 0
//! pointing along +x and 90 along +y.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
/// Range: approximately -2,147,483,648 to 2,147,483,647
/// Precision: approximately 0.00000000023
pub type Fixed = I32F32;

/// A full turn in degrees.
pub const FULL_TURN: Fixed = Fixed::const_from_int(360);

/// Half a turn in degrees.
pub const HALF_TURN: Fixed = Fixed::const_from_int(180);

/// A grid cell coordinate on the planet surface.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Location {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Location {
    /// Create a new cell coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Offset this location by a delta.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// The cell center in world coordinates.
    #[must_use]
    pub fn center(self) -> Vec2Fixed {
        Vec2Fixed::new(Fixed::from_num(self.x), Fixed::from_num(self.y))
    }

    /// Chebyshev distance (number of king moves) to another cell.
    #[must_use]
    pub fn chebyshev(self, other: Self) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }
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

    /// Raw bit serialization for optional fixed-point numbers.
    pub mod option {
        use super::Fixed;
        use serde::{Deserialize, Deserializer, Serialize, Serializer};

        /// Serialize an optional fixed-point number as optional raw bits.
        pub fn serialize<S>(value: &Option<Fixed>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            value.map(Fixed::to_bits).serialize(serializer)
        }

        /// Deserialize an optional fixed-point number from optional raw bits.
        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Fixed>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let bits = Option::<i64>::deserialize(deserializer)?;
            Ok(bits.map(Fixed::from_bits))
        }
    }
}

/// Serde support for fixed-point numbers written as plain decimals.
///
/// Used by hand-edited RON data files where `1.5` is friendlier than the
/// raw bit pattern. The decimal is converted once at load time.
pub mod decimal_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serializer};

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
        let value = f64::deserialize(deserializer)?;
        Fixed::checked_from_num(value)
            .ok_or_else(|| serde::de::Error::custom(format!("{value} is out of fixed range")))
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

    /// Calculate squared distance (avoids sqrt for comparisons).
    #[must_use]
    pub fn distance_squared(self, other: Self) -> Fixed {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
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

    /// Length of the vector.
    #[must_use]
    pub fn length(self) -> Fixed {
        fixed_sqrt(self.dot(self))
    }

    /// Scale both components.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor)
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

    /// The cell whose area contains this point (floor of each axis).
    ///
    /// This is the footprint cell used for rendering buckets.
    #[must_use]
    pub fn footprint_cell(self) -> Location {
        Location::new(self.x.floor().to_num(), self.y.floor().to_num())
    }

    /// The cell whose center is nearest to this point.
    ///
    /// This is the cell used for pathfinding occupancy.
    #[must_use]
    pub fn nearest_cell(self) -> Location {
        Location::new(self.x.round().to_num(), self.y.round().to_num())
    }

    /// Bearing from this point toward another, in degrees.
    #[must_use]
    pub fn bearing_to(self, other: Self) -> Fixed {
        bearing_degrees(other.x - self.x, other.y - self.y)
    }
}

/// Computes the square root of a fixed-point number using binary search.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::from_num(1) {
        value
    } else {
        Fixed::from_num(1)
    };

    for _ in 0..48 {
        let mid = (low + high) / Fixed::from_num(2);
        let mid_sq = mid.saturating_mul(mid);

        if mid_sq <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    // Bisection never lands on `high`; perfect squares need the last step.
    let next = low + Fixed::DELTA;
    if next.saturating_mul(next) <= value {
        next
    } else {
        low
    }
}

/// Integer square root, rounded down.
#[must_use]
pub fn isqrt(value: u64) -> u64 {
    if value < 2 {
        return value;
    }
    let mut x = value;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + value / x) / 2;
    }
    x
}

/// Wrap an angle into `[0, 360)`.
#[must_use]
pub fn normalize_degrees(angle: Fixed) -> Fixed {
    let mut a = angle % FULL_TURN;
    if a < Fixed::ZERO {
        a += FULL_TURN;
    }
    a
}

/// Signed shortest rotation from `from` to `to`, in `(-180, 180]`.
#[must_use]
pub fn angle_difference(from: Fixed, to: Fixed) -> Fixed {
    let diff = normalize_degrees(to - from);
    if diff > HALF_TURN {
        diff - FULL_TURN
    } else {
        diff
    }
}

/// Polynomial arctangent for `z` in `[0, 1]`, in degrees.
///
/// `atan(z) ≈ 45z + z(1 - z)(14.02 + 3.799z)`, accurate to about 0.1°
/// and exact at 0 and 1.
fn atan_unit_degrees(z: Fixed) -> Fixed {
    let a = Fixed::from_num(1402) / Fixed::from_num(100);
    let b = Fixed::from_num(3799) / Fixed::from_num(1000);
    Fixed::from_num(45) * z + z * (Fixed::ONE - z) * (a + b * z)
}

/// Two-argument arctangent in degrees, in `[0, 360)`.
///
/// Returns zero for a zero vector. Axis-aligned and diagonal directions are
/// exact multiples of 45°.
#[must_use]
pub fn bearing_degrees(dx: Fixed, dy: Fixed) -> Fixed {
    if dx == Fixed::ZERO && dy == Fixed::ZERO {
        return Fixed::ZERO;
    }
    let ax = dx.abs();
    let ay = dy.abs();
    let base = if ax >= ay {
        atan_unit_degrees(ay / ax)
    } else {
        Fixed::from_num(90) - atan_unit_degrees(ax / ay)
    };
    let quadrant = match (dx >= Fixed::ZERO, dy >= Fixed::ZERO) {
        (true, true) => base,
        (false, true) => HALF_TURN - base,
        (false, false) => HALF_TURN + base,
        (true, false) => FULL_TURN - base,
    };
    normalize_degrees(quadrant)
}

/// Sine of an angle in degrees (Bhaskara I approximation).
#[must_use]
pub fn sin_degrees(angle: Fixed) -> Fixed {
    let a = normalize_degrees(angle);
    let (x, sign) = if a > HALF_TURN {
        (a - HALF_TURN, -Fixed::ONE)
    } else {
        (a, Fixed::ONE)
    };
    let p = x * (HALF_TURN - x);
    let denominator = Fixed::from_num(40500) - p;
    sign * Fixed::from_num(4) * p / denominator
}

/// Cosine of an angle in degrees.
#[must_use]
pub fn cos_degrees(angle: Fixed) -> Fixed {
    sin_degrees(angle + Fixed::from_num(90))
}

/// Unit vector pointing along `angle` degrees.
#[must_use]
pub fn direction_vector(angle: Fixed) -> Vec2Fixed {
    Vec2Fixed::new(cos_degrees(angle), sin_degrees(angle))
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

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Fixed, b: Fixed, tolerance: Fixed) -> bool {
        (a - b).abs() <= tolerance
    }

    #[test]
    fn test_vec2_distance() {
        let a = Vec2Fixed::from_ints(3, 0);
        let b = Vec2Fixed::from_ints(0, 4);
        assert_eq!(a.distance_squared(b), Fixed::from_num(25));
        assert!(close(a.distance(b), Fixed::from_num(5), Fixed::from_num(0.0001)));
    }

    #[test]
    fn test_cells_from_position() {
        let p = Vec2Fixed::new(Fixed::from_num(2.6), Fixed::from_num(-0.4));
        assert_eq!(p.footprint_cell(), Location::new(2, -1));
        assert_eq!(p.nearest_cell(), Location::new(3, 0));
    }

    #[test]
    fn test_bearing_exact_on_grid_directions() {
        let one = Fixed::ONE;
        let zero = Fixed::ZERO;
        assert_eq!(bearing_degrees(one, zero), Fixed::from_num(0));
        assert_eq!(bearing_degrees(one, one), Fixed::from_num(45));
        assert_eq!(bearing_degrees(zero, one), Fixed::from_num(90));
        assert_eq!(bearing_degrees(-one, one), Fixed::from_num(135));
        assert_eq!(bearing_degrees(-one, zero), Fixed::from_num(180));
        assert_eq!(bearing_degrees(-one, -one), Fixed::from_num(225));
        assert_eq!(bearing_degrees(zero, -one), Fixed::from_num(270));
        assert_eq!(bearing_degrees(one, -one), Fixed::from_num(315));
    }

    #[test]
    fn test_bearing_approximation() {
        // atan2(1, 2) = 26.565°
        let angle = bearing_degrees(Fixed::from_num(2), Fixed::ONE);
        assert!(close(angle, Fixed::from_num(26.565), Fixed::from_num(0.2)));
    }

    #[test]
    fn test_angle_difference_wraps() {
        let d = angle_difference(Fixed::from_num(350), Fixed::from_num(10));
        assert_eq!(d, Fixed::from_num(20));
        let d = angle_difference(Fixed::from_num(10), Fixed::from_num(350));
        assert_eq!(d, Fixed::from_num(-20));
    }

    #[test]
    fn test_sin_cos() {
        let tol = Fixed::from_num(0.002);
        assert!(close(sin_degrees(Fixed::from_num(90)), Fixed::ONE, tol));
        assert!(close(sin_degrees(Fixed::from_num(270)), -Fixed::ONE, tol));
        assert!(close(cos_degrees(Fixed::ZERO), Fixed::ONE, tol));
        assert!(close(cos_degrees(Fixed::from_num(180)), -Fixed::ONE, tol));
        assert!(close(sin_degrees(Fixed::from_num(30)), Fixed::from_num(0.5), tol));
    }

    #[test]
    fn test_sqrt_of_perfect_squares_is_exact() {
        for n in [1, 4, 9, 25, 144] {
            let root = fixed_sqrt(Fixed::from_num(n));
            assert_eq!(root * root, Fixed::from_num(n), "sqrt({n}) = {root}");
        }
        assert_eq!(Vec2Fixed::from_ints(8, 0).distance(Vec2Fixed::from_ints(9, 0)), Fixed::ONE);
    }

    #[test]
    fn test_isqrt() {
        assert_eq!(isqrt(0), 0);
        assert_eq!(isqrt(1), 1);
        assert_eq!(isqrt(2_000_000), 1414);
        assert_eq!(isqrt(1_000_000), 1000);
    }

    #[test]
    fn test_vec2_normalize() {
        let v = Vec2Fixed::from_ints(3, 4);
        let norm = v.normalize();
        let len_sq = norm.dot(norm);
        let epsilon = Fixed::ONE / Fixed::from_num(10000);
        assert!(
            (len_sq - Fixed::ONE).abs() < epsilon,
            "normalized vector length² should be ~1, got {:?}",
            len_sq
        );
    }
}
