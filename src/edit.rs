//! Edit notifications exchanged between buffer and display.

use crate::pos::Pos;

/// A single buffer mutation, reported after it has been applied.
///
/// The deleted text is carried by value: the incremental resync needs it
/// to reconstruct the pre-edit layout of the edited region, which no
/// longer exists in the buffer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Edit {
    /// Position where the change began.
    pub pos: Pos,
    /// Number of characters inserted at `pos`.
    pub inserted: usize,
    /// The text removed at `pos`, empty for pure insertions.
    pub deleted: String,
}

impl Edit {
    /// Number of characters deleted.
    #[must_use]
    pub fn n_deleted(&self) -> usize {
        self.deleted.chars().count()
    }

    /// Net character delta of the edit.
    #[must_use]
    pub fn char_delta(&self) -> i64 {
        self.inserted as i64 - self.n_deleted() as i64
    }

    /// End of the replaced span in pre-edit coordinates.
    #[must_use]
    pub fn deleted_end(&self) -> Pos {
        self.pos + self.n_deleted()
    }
}

/// Visual-line count of an about-to-be-deleted span, measured against the
/// pre-edit layout.
///
/// Produced by `WrapDisplay::measure_deleted_lines` before the buffer is
/// mutated and handed back into `WrapDisplay::apply` afterwards. Passing
/// the measurement as an explicit value (rather than stashing it in the
/// display) keeps the two-phase handshake visible in the caller's code.
///
/// The measurement deliberately does not resynchronize with the cached
/// line starts mid-scan: the length of the inserted text is not known yet
/// when it runs, so the deleted and inserted lines must later be counted
/// the same way or the two counts would disagree about where lines break.
/// The post-edit resync honors this by skipping its own short-circuit
/// when a measurement is supplied. This makes the two-phase path strictly
/// more expensive than the single-phase one; that is the documented
/// trade-off, not an oversight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PreDeleteMeasure {
    /// Visual lines spanned by the deleted text plus its wrap context.
    pub deleted_lines: usize,
}
