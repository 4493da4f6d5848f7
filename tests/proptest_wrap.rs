//! Property-based tests for the wrap layout engine.
//!
//! The central property: applying edits incrementally must leave the
//! display in exactly the state a from-scratch recompute produces. The
//! incremental path is an optimization, never a different answer.

use std::sync::Arc;

use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use softwrap::{
    GlyphMetrics, Pos, PositionKind, RopeBuffer, TextSource, WrapDisplay, WrapPolicy,
};

/// Per-glyph pixel widths, deliberately not fixed so a pixel margin
/// mandates the two-phase protocol.
struct NarrowWide;

impl GlyphMetrics for NarrowWide {
    fn width(&self, ch: char, _column: usize) -> u32 {
        4 + (ch as u32) % 5
    }
}

// ============================================================================
// Strategies
// ============================================================================

/// Text that exercises wrapping: words, long unbroken runs, tabs, and
/// blank lines.
fn wrappy_text() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop_oneof![
            4 => "[a-z]{1,8} ",
            2 => "[a-z]{1,8}\n",
            1 => "[a-z]{12,30}",
            1 => Just("\t".to_string()),
            1 => Just("\n".to_string()),
        ],
        0..40,
    )
    .prop_map(|parts| parts.concat())
}

#[derive(Clone, Debug)]
enum Op {
    Insert(usize, String),
    Delete(usize, usize),
    Replace(usize, usize, String),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (any::<usize>(), "[a-z \n\t]{0,20}").prop_map(|(p, s)| Op::Insert(p, s)),
        (any::<usize>(), 0usize..25).prop_map(|(p, n)| Op::Delete(p, n)),
        (any::<usize>(), 0usize..15, "[a-z ]{0,10}").prop_map(|(p, n, s)| Op::Replace(p, n, s)),
    ]
}

fn apply_op(buf: &mut RopeBuffer, op: &Op) -> softwrap::Edit {
    let len = buf.len().get();
    match op {
        Op::Insert(p, s) => buf.insert(Pos(p % (len + 1)), s),
        Op::Delete(p, n) => {
            let s = p % (len + 1);
            buf.delete(Pos(s), Pos((s + n).min(len)))
        }
        Op::Replace(p, n, s) => {
            let start = p % (len + 1);
            buf.replace(Pos(start), Pos((start + n).min(len)), s)
        }
    }
}

fn cache_of(disp: &WrapDisplay) -> Vec<Option<Pos>> {
    (0..disp.visible_row_count())
        .map(|r| disp.visible_line_start(r))
        .collect()
}

fn check_invariants(disp: &WrapDisplay) -> Result<(), TestCaseError> {
    let cache = cache_of(disp);
    let real: Vec<Pos> = cache.iter().copied().flatten().collect();
    for w in real.windows(2) {
        prop_assert!(w[0] < w[1], "cache not strictly increasing: {cache:?}");
    }
    let first_none = cache.iter().position(Option::is_none).unwrap_or(cache.len());
    prop_assert!(
        cache[first_none..].iter().all(Option::is_none),
        "blank-row markers not a suffix: {cache:?}"
    );
    if let Some(row0) = cache.first().copied().flatten() {
        prop_assert_eq!(row0, disp.first_visible_char(), "row 0 must equal the anchor");
    }
    Ok(())
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// After any edit sequence, the incrementally maintained cache equals
    /// a from-scratch recompute, and the global line count stays honest.
    #[test]
    fn incremental_equals_recompute(
        text in wrappy_text(),
        ops in prop::collection::vec(op(), 1..12),
        margin in 3usize..30,
        tab in 1usize..9,
        rows in 1usize..12,
    ) {
        let policy = WrapPolicy::columns(margin, tab).unwrap();
        let mut buf = RopeBuffer::from_str(&text);
        let mut disp = WrapDisplay::new(&buf, policy, rows);
        check_invariants(&disp)?;

        for o in &ops {
            let edit = apply_op(&mut buf, o);
            disp.apply(&buf, &edit, None);

            let mut scratch = disp.clone();
            scratch.recompute(&buf);
            prop_assert_eq!(cache_of(&disp), cache_of(&scratch), "edit {:?}", o);
            prop_assert_eq!(disp.last_visible_char(), scratch.last_visible_char());

            check_invariants(&disp)?;
            prop_assert_eq!(
                disp.buffer_line_count(),
                disp.count_lines(&buf, Pos::ZERO, buf.len(), true),
                "line count drifted after {:?}", o
            );
        }
    }

    /// Deletions give the same final layout whether the deleted lines are
    /// measured before the edit (two-phase) or reconstructed after it.
    #[test]
    fn premeasured_delete_equals_single_phase(
        text in wrappy_text(),
        p in any::<usize>(),
        n in 1usize..30,
        margin in 3usize..25,
        rows in 1usize..10,
    ) {
        let policy = WrapPolicy::columns(margin, 8).unwrap();
        let mut buf_a = RopeBuffer::from_str(&text);
        let mut buf_b = RopeBuffer::from_str(&text);
        let mut disp_a = WrapDisplay::new(&buf_a, policy.clone(), rows);
        let mut disp_b = WrapDisplay::new(&buf_b, policy, rows);

        let len = buf_a.len().get();
        let start = p % (len + 1);
        let end = (start + n).min(len);

        let edit = buf_a.delete(Pos(start), Pos(end));
        disp_a.apply(&buf_a, &edit, None);

        let pre = disp_b.measure_deleted_lines(&buf_b, Pos(start), end - start);
        let edit = buf_b.delete(Pos(start), Pos(end));
        disp_b.apply(&buf_b, &edit, Some(pre));

        prop_assert_eq!(cache_of(&disp_a), cache_of(&disp_b));
        prop_assert_eq!(disp_a.last_visible_char(), disp_b.last_visible_char());
        prop_assert_eq!(disp_a.buffer_line_count(), disp_b.buffer_line_count());
    }

    /// Same equality under the pixel margins that actually mandate the
    /// measure-first protocol: proportional glyph widths.
    #[test]
    fn premeasured_delete_equals_single_phase_in_pixels(
        text in wrappy_text(),
        p in any::<usize>(),
        n in 1usize..30,
        width in 20u32..160,
        rows in 1usize..10,
    ) {
        let policy = WrapPolicy::pixels(width, 8, Arc::new(NarrowWide)).unwrap();
        prop_assert!(policy.needs_premeasure());

        let mut buf_a = RopeBuffer::from_str(&text);
        let mut buf_b = RopeBuffer::from_str(&text);
        let mut disp_a = WrapDisplay::new(&buf_a, policy.clone(), rows);
        let mut disp_b = WrapDisplay::new(&buf_b, policy, rows);

        let len = buf_a.len().get();
        let start = p % (len + 1);
        let end = (start + n).min(len);

        let edit = buf_a.delete(Pos(start), Pos(end));
        disp_a.apply(&buf_a, &edit, None);

        let pre = disp_b.measure_deleted_lines(&buf_b, Pos(start), end - start);
        let edit = buf_b.delete(Pos(start), Pos(end));
        disp_b.apply(&buf_b, &edit, Some(pre));

        prop_assert_eq!(cache_of(&disp_a), cache_of(&disp_b));
        prop_assert_eq!(disp_a.last_visible_char(), disp_b.last_visible_char());
        prop_assert_eq!(disp_a.buffer_line_count(), disp_b.buffer_line_count());
    }

    /// Scrolling to an arbitrary line lands on the position a plain
    /// forward count from the buffer start produces, and the invariants
    /// survive the cache salvage.
    #[test]
    fn scroll_agrees_with_forward_count(
        text in wrappy_text(),
        target in 1usize..60,
        margin in 3usize..25,
        rows in 1usize..10,
    ) {
        let policy = WrapPolicy::columns(margin, 8).unwrap();
        let buf = RopeBuffer::from_str(&text);
        let mut disp = WrapDisplay::new(&buf, policy, rows);

        disp.scroll_to(&buf, target);
        check_invariants(&disp)?;

        let top = disp.top_line_num();
        prop_assert_eq!(
            disp.first_visible_char(),
            disp.forward_n_lines(&buf, Pos::ZERO, top - 1, true),
            "anchor disagrees with a forward count to line {}", top
        );

        // and back to the top
        disp.scroll_to(&buf, 1);
        prop_assert_eq!(disp.first_visible_char(), Pos::ZERO);
        check_invariants(&disp)?;
    }

    /// Every displayed position round-trips through (x, row) coordinates
    /// under cursor snapping.
    #[test]
    fn displayed_positions_round_trip(
        text in wrappy_text(),
        margin in 3usize..25,
        rows in 1usize..10,
    ) {
        let policy = WrapPolicy::columns(margin, 8).unwrap();
        let buf = RopeBuffer::from_str(&text);
        let disp = WrapDisplay::new(&buf, policy, rows);

        let last = disp.last_visible_char().get();
        for p in disp.first_visible_char().get()..=last.min(buf.len().get()) {
            let pos = Pos(p);
            if let Some((x, row)) = disp.position_to_xy(&buf, pos) {
                let back = disp.xy_to_position(&buf, x, row as i64, PositionKind::Cursor);
                prop_assert_eq!(back, pos, "round trip at {} (x={}, row={})", pos, x, row);
            }
        }
    }
}
