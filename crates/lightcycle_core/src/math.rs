//! Fixed-point math and grid geometry.
//!
//! Kinematics (move accumulators, loot drift, AI scores) use fixed-point
//! arithmetic so that two simulations fed the same seed and inputs stay
//! bit-identical across platforms.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// 32 integer bits, 32 fractional bits.
pub type Fixed = I32F32;

/// Fixed-point 2D vector, in cell units.
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
/// Serializes as the raw bit representation (i64) to preserve exact
/// precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bits.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bits.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
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

    /// Vector pointing at the centre of a grid cell.
    #[must_use]
    pub fn from_cell(pos: GridPos) -> Self {
        Self::new(Fixed::from_num(pos.x), Fixed::from_num(pos.y))
    }

    /// Nearest grid cell.
    #[must_use]
    pub fn to_cell(self) -> GridPos {
        GridPos::new(self.x.round().to_num(), self.y.round().to_num())
    }

    /// Squared distance (avoids sqrt for comparisons).
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

    /// Scale both components.
    #[must_use]
    pub fn scale(self, factor: Fixed) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Normalize to unit length. The zero vector stays zero.
    #[must_use]
    pub fn normalize(self) -> Self {
        let len = fixed_sqrt(self.dot(self));
        if len == Fixed::ZERO {
            return Self::ZERO;
        }
        Self::new(self.x / len, self.y / len)
    }
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

/// Square root of a fixed-point number by binary search.
///
/// Deterministic and overflow-free; negative inputs yield zero.
#[must_use]
pub fn fixed_sqrt(value: Fixed) -> Fixed {
    if value <= Fixed::ZERO {
        return Fixed::ZERO;
    }

    let mut low = Fixed::ZERO;
    let mut high = if value > Fixed::ONE { value } else { Fixed::ONE };

    for _ in 0..48 {
        let mid = (low + high) / Fixed::from_num(2);
        if mid.saturating_mul(mid) <= value {
            low = mid;
        } else {
            high = mid;
        }
    }

    low
}

/// Convert a host-supplied float into [`Fixed`].
///
/// Non-finite input maps to zero; out-of-range input saturates.
#[must_use]
pub fn fixed_from_f32(value: f32) -> Fixed {
    if value.is_finite() {
        Fixed::saturating_from_num(value)
    } else {
        Fixed::ZERO
    }
}

/// Integer cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridPos {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl GridPos {
    /// Create a cell coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Neighbouring cell one step along `dir`.
    #[must_use]
    pub const fn step(self, dir: Direction) -> Self {
        let (dx, dy) = dir.delta();
        Self::new(self.x + dx, self.y + dy)
    }

    /// Cell `n` steps along `dir`.
    #[must_use]
    pub const fn step_n(self, dir: Direction, n: i32) -> Self {
        let (dx, dy) = dir.delta();
        Self::new(self.x + dx * n, self.y + dy * n)
    }

    /// Offset by an arbitrary delta.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Manhattan distance.
    #[must_use]
    pub const fn manhattan(self, other: Self) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }

    /// Squared Euclidean distance.
    #[must_use]
    pub const fn distance_squared(self, other: Self) -> i32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }
}

/// Cardinal heading. The discriminant is the classic `dirIndex`
/// (0 = up, clockwise).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    /// Towards row 0.
    #[default]
    Up = 0,
    /// Towards the last column.
    Right = 1,
    /// Towards the last row.
    Down = 2,
    /// Towards column 0.
    Left = 3,
}

impl Direction {
    /// All headings in index order.
    pub const ALL: [Self; 4] = [Self::Up, Self::Right, Self::Down, Self::Left];

    /// Heading for an index, wrapping modulo 4.
    #[must_use]
    pub const fn from_index(index: u8) -> Self {
        match index % 4 {
            0 => Self::Up,
            1 => Self::Right,
            2 => Self::Down,
            _ => Self::Left,
        }
    }

    /// Index of this heading (0..4).
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Unit step `(dx, dy)`; `y` grows downwards.
    #[must_use]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Right => (1, 0),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
        }
    }

    /// 90 degrees counter-clockwise.
    #[must_use]
    pub const fn turn_left(self) -> Self {
        Self::from_index(self.index() + 3)
    }

    /// 90 degrees clockwise.
    #[must_use]
    pub const fn turn_right(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    /// The 180 degree reversal.
    #[must_use]
    pub const fn opposite(self) -> Self {
        Self::from_index(self.index() + 2)
    }

    /// True when both headings lie on the same axis.
    #[must_use]
    pub const fn is_parallel(self, other: Self) -> bool {
        self.index() % 2 == other.index() % 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec2_distance_squared() {
        let a = Vec2Fixed::new(Fixed::from_num(3), Fixed::from_num(0));
        let b = Vec2Fixed::new(Fixed::from_num(0), Fixed::from_num(4));
        assert_eq!(a.distance_squared(b), Fixed::from_num(25));
    }

    #[test]
    fn test_fixed_sqrt() {
        let root = fixed_sqrt(Fixed::from_num(25));
        let epsilon = Fixed::ONE / Fixed::from_num(10000);
        assert!((root - Fixed::from_num(5)).abs() < epsilon);
        assert_eq!(fixed_sqrt(Fixed::from_num(-4)), Fixed::ZERO);
    }

    #[test]
    fn test_vec2_normalize() {
        let v = Vec2Fixed::new(Fixed::from_num(3), Fixed::from_num(4));
        let norm = v.normalize();
        let epsilon = Fixed::ONE / Fixed::from_num(10000);
        assert!((norm.dot(norm) - Fixed::ONE).abs() < epsilon);
        assert_eq!(Vec2Fixed::ZERO.normalize(), Vec2Fixed::ZERO);
    }

    #[test]
    fn test_fixed_from_f32() {
        assert_eq!(fixed_from_f32(1.5), Fixed::from_num(1.5));
        assert_eq!(fixed_from_f32(f32::NAN), Fixed::ZERO);
        assert_eq!(fixed_from_f32(f32::INFINITY), Fixed::ZERO);
        assert_eq!(fixed_from_f32(1e30), Fixed::MAX);
    }

    #[test]
    fn test_to_cell_rounds() {
        let v = Vec2Fixed::new(Fixed::from_num(2.6), Fixed::from_num(7.4));
        assert_eq!(v.to_cell(), GridPos::new(3, 7));
    }

    #[test]
    fn test_direction_turns() {
        assert_eq!(Direction::Up.turn_left(), Direction::Left);
        assert_eq!(Direction::Up.turn_right(), Direction::Right);
        assert_eq!(Direction::Left.turn_right(), Direction::Up);
        assert_eq!(Direction::Down.opposite(), Direction::Up);
        for dir in Direction::ALL {
            assert_eq!(dir.turn_left().turn_right(), dir);
            assert!(dir.is_parallel(dir.opposite()));
            assert!(!dir.is_parallel(dir.turn_left()));
        }
    }

    #[test]
    fn test_grid_pos_step() {
        let p = GridPos::new(5, 5);
        assert_eq!(p.step(Direction::Up), GridPos::new(5, 4));
        assert_eq!(p.step_n(Direction::Right, 3), GridPos::new(8, 5));
        assert_eq!(p.manhattan(GridPos::new(2, 9)), 7);
    }
}
