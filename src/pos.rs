//! Buffer position newtype.
//!
//! All positions handled by the engine are zero-based character offsets
//! into the logical text. Keeping them in a dedicated newtype prevents
//! accidentally mixing buffer offsets with display columns or pixel
//! x-coordinates, which use plain integers.

use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// A zero-based character offset into a text buffer.
///
/// Positions are totally ordered and support offset arithmetic. Ranges
/// over positions are half-open: `[start, end)`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pos(pub usize);

impl Pos {
    /// The start of any buffer.
    pub const ZERO: Pos = Pos(0);

    /// Raw offset value.
    #[must_use]
    pub fn get(self) -> usize {
        self.0
    }

    /// Apply a signed character delta, as produced by an edit
    /// (`inserted - deleted`). Saturates at zero; callers only shift
    /// positions that are known to remain valid after the edit.
    #[must_use]
    pub fn offset(self, delta: i64) -> Pos {
        if delta >= 0 {
            Pos(self.0 + delta as usize)
        } else {
            Pos(self.0.saturating_sub(delta.unsigned_abs() as usize))
        }
    }

    /// Distance to an earlier position.
    #[must_use]
    pub fn distance_from(self, earlier: Pos) -> usize {
        self.0 - earlier.0
    }
}

impl From<usize> for Pos {
    fn from(v: usize) -> Self {
        Pos(v)
    }
}

impl Add<usize> for Pos {
    type Output = Pos;

    fn add(self, rhs: usize) -> Pos {
        Pos(self.0 + rhs)
    }
}

impl AddAssign<usize> for Pos {
    fn add_assign(&mut self, rhs: usize) {
        self.0 += rhs;
    }
}

impl Sub<usize> for Pos {
    type Output = Pos;

    fn sub(self, rhs: usize) -> Pos {
        Pos(self.0 - rhs)
    }
}

impl SubAssign<usize> for Pos {
    fn sub_assign(&mut self, rhs: usize) {
        self.0 -= rhs;
    }
}

impl Sub<Pos> for Pos {
    type Output = usize;

    fn sub(self, rhs: Pos) -> usize {
        self.0 - rhs.0
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
