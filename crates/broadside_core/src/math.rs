//! Fixed-point math and grid coordinates.
//!
//! Combat rates are integer percentages and damage is an integer ratio.
//! Target scores are fixed-point so a seeded battle replays identically on
//! every platform.
//! Grid positions are plain integer cells.

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for all simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// Combat rate of a troop on terrain it has no affinity entry for, in percent.
pub const NEUTRAL_RATE: u32 = 100;

/// Integer division rounding halves up. A zero denominator is treated as one.
#[must_use]
pub fn round_div(numerator: u64, denominator: u64) -> u64 {
    let denominator = denominator.max(1);
    (numerator.saturating_mul(2).saturating_add(denominator)) / denominator.saturating_mul(2)
}

/// Integer ratio as a fixed-point number, truncated to the 32 fractional bits.
#[must_use]
pub fn ratio(numerator: u64, denominator: u64) -> Fixed {
    let denominator = denominator.max(1);
    let whole = Fixed::saturating_from_num(numerator / denominator);
    let frac_bits = (u128::from(numerator % denominator) << Fixed::FRAC_NBITS) / u128::from(denominator);
    whole.saturating_add(Fixed::from_bits(i64::try_from(frac_bits).unwrap_or(i64::MAX)))
}

/// Cell coordinate on the battle grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct GridPos {
    /// Column (0 = ally edge).
    pub x: i32,
    /// Row.
    pub y: i32,
}

/// Orthogonal neighbour offsets, in north/east/south/west order.
pub const ORTHOGONAL: [(i32, i32); 4] = [(0, -1), (1, 0), (0, 1), (-1, 0)];

impl GridPos {
    /// Create a new grid position.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance, used for ranges, search radii and the `close` target mode.
    #[must_use]
    pub const fn manhattan(self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Position offset by `(dx, dy)`.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// The four orthogonally adjacent positions (may be off-grid).
    pub fn neighbours(self) -> impl Iterator<Item = GridPos> {
        ORTHOGONAL.into_iter().map(move |(dx, dy)| self.offset(dx, dy))
    }

    /// Whether `other` is orthogonally adjacent.
    #[must_use]
    pub const fn is_adjacent(self, other: Self) -> bool {
        self.manhattan(other) == 1
    }
}

impl std::fmt::Display for GridPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
