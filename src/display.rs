//! Viewport display state: line-start cache, incremental edit resync,
//! and coordinate mapping.
//!
//! A [`WrapDisplay`] owns the small piece of mutable state a text view
//! needs: one cached line-start position per visible row, the window
//! anchors (`first_char`, `last_char`, `top_line`), and the buffer-wide
//! visual line count. It never owns text; every operation borrows a
//! [`TextSource`].
//!
//! The cache invariants, which hold on return from every public method:
//!
//! - ignoring a trailing run of `None` (blank rows past the end of the
//!   buffer), cached positions are strictly increasing;
//! - `first_char` equals the row-0 entry whenever that entry is `Some`;
//! - `last_char` is the end of the last real visual line in the cache.
//!
//! [`WrapDisplay::apply`] maintains these incrementally, in time
//! proportional to the edited region. Whenever it cannot salvage the old
//! cache it falls back to a full recount from the nearest absolute
//! reference; speed is an optimization layered over an always-correct
//! recompute, never the other way around.

use crate::buffer::{CharBuffer, TextSource, count_newlines};
use crate::counter;
use crate::edit::{Edit, PreDeleteMeasure};
use crate::error::{Error, Result};
use crate::policy::WrapPolicy;
use crate::pos::Pos;

/// How to snap an x coordinate to a text position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PositionKind {
    /// Snap to the nearest insert-cursor position (character midpoints
    /// divide ownership).
    Cursor,
    /// Return the character cell containing the coordinate.
    Character,
}

/// Result of applying an edit to the display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Outcome {
    /// True if the window anchor moved and the whole view must repaint.
    pub scrolled: bool,
}

/// Extent of an edit's layout damage, in post-edit coordinates.
#[derive(Clone, Copy, Debug)]
struct WrapRange {
    mod_start: Pos,
    mod_end: Pos,
    lines_inserted: usize,
    lines_deleted: usize,
}

/// Soft-wrap layout state for one viewport over one buffer.
#[derive(Clone, Debug)]
pub struct WrapDisplay {
    policy: WrapPolicy,
    wrap: bool,
    /// Entry `i` is where visual row `i` begins; `None` marks a blank
    /// row past the end of the buffer. `None` entries form a suffix.
    line_starts: Vec<Option<Pos>>,
    first_char: Pos,
    last_char: Pos,
    /// 1-based visual line number of the top row.
    top_line: usize,
    /// 1-based absolute (unwrapped) line number of the top row, tracked
    /// only while enabled.
    abs_top_line: Option<usize>,
    /// Visual line breaks in the whole buffer, maintained incrementally.
    n_buffer_lines: usize,
}

impl WrapDisplay {
    /// Create a display in continuous-wrap mode, anchored at the buffer
    /// start, with `rows` visible rows.
    #[must_use]
    pub fn new(buf: &dyn TextSource, policy: WrapPolicy, rows: usize) -> Self {
        Self::build(buf, policy, rows, true)
    }

    /// Create a display with wrapping off: visual lines are exactly the
    /// buffer's real lines, and all counting uses plain newline scans.
    #[must_use]
    pub fn without_wrapping(buf: &dyn TextSource, policy: WrapPolicy, rows: usize) -> Self {
        Self::build(buf, policy, rows, false)
    }

    fn build(buf: &dyn TextSource, policy: WrapPolicy, rows: usize, wrap: bool) -> Self {
        let mut disp = Self {
            policy,
            wrap,
            line_starts: vec![None; rows],
            first_char: Pos::ZERO,
            last_char: Pos::ZERO,
            top_line: 1,
            abs_top_line: None,
            n_buffer_lines: 0,
        };
        disp.n_buffer_lines = disp.count_lines(buf, Pos::ZERO, buf.len(), true);
        disp.calc_line_starts(buf, 0, rows as i64 - 1);
        disp.calc_last_char(buf);
        disp
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Number of visible rows.
    #[must_use]
    pub fn visible_row_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Buffer position where visual row `row` begins, or `None` for a
    /// blank row (or a row outside the viewport).
    #[must_use]
    pub fn visible_line_start(&self, row: usize) -> Option<Pos> {
        self.line_starts.get(row).copied().flatten()
    }

    /// 1-based visual line number of the top row.
    #[must_use]
    pub fn top_line_num(&self) -> usize {
        self.top_line
    }

    /// First buffer position in the window.
    #[must_use]
    pub fn first_visible_char(&self) -> Pos {
        self.first_char
    }

    /// Position past the last displayed character.
    #[must_use]
    pub fn last_visible_char(&self) -> Pos {
        self.last_char
    }

    /// Visual line breaks in the whole buffer.
    #[must_use]
    pub fn buffer_line_count(&self) -> usize {
        self.n_buffer_lines
    }

    /// Current wrap policy.
    #[must_use]
    pub fn policy(&self) -> &WrapPolicy {
        &self.policy
    }

    /// True when continuous wrap is on.
    #[must_use]
    pub fn is_wrapped(&self) -> bool {
        self.wrap
    }

    /// True if rows with no corresponding buffer text are visible.
    #[must_use]
    pub fn empty_lines_visible(&self) -> bool {
        self.line_starts.last().is_some_and(|e| e.is_none())
    }

    /// Number of displayable characters on visual row `row`.
    ///
    /// Whitespace consumed as a wrap terminator is not displayable and
    /// is excluded; a row wrapped mid-word runs all the way to the next
    /// row's start.
    pub fn vis_line_length(&self, buf: &dyn TextSource, row: usize) -> Result<usize> {
        let rows = self.line_starts.len();
        if row >= rows {
            return Err(Error::RowOutOfRange { row, rows });
        }
        Ok(self.vis_line_length_unchecked(buf, row))
    }

    fn vis_line_length_unchecked(&self, buf: &dyn TextSource, row: usize) -> usize {
        let Some(line_start) = self.line_starts[row] else {
            return 0;
        };
        if row + 1 >= self.line_starts.len() {
            return self.last_char.get().saturating_sub(line_start.get());
        }
        let Some(next_start) = self.line_starts[row + 1] else {
            return self.last_char.get().saturating_sub(line_start.get());
        };
        if self.wrap_uses_character(buf, next_start - 1) {
            next_start - 1 - line_start
        } else {
            next_start - line_start
        }
    }

    /// Whether the visual line ending at `line_end_pos` is terminated by
    /// an actual character (a newline, or whitespace consumed as a wrap
    /// point) rather than broken mid-word.
    ///
    /// For the last character of the buffer it cannot be told whether a
    /// trailing space was used as a wrap point; this guesses that it was
    /// not, so exact accounting at the buffer end must not rely on it.
    #[must_use]
    pub fn wrap_uses_character(&self, buf: &dyn TextSource, line_end_pos: Pos) -> bool {
        if !self.wrap || line_end_pos == buf.len() {
            return true;
        }
        match buf.char_at(line_end_pos) {
            Some('\n') => true,
            Some('\t' | ' ') => line_end_pos + 1 != buf.len(),
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Wrap-aware counting (plain newline fast paths when wrap is off)
    // ------------------------------------------------------------------

    /// Visual lines between two positions.
    #[must_use]
    pub fn count_lines(
        &self,
        buf: &dyn TextSource,
        start: Pos,
        end: Pos,
        start_is_line_start: bool,
    ) -> usize {
        if !self.wrap {
            return buf.count_newlines(start, end);
        }
        counter::count(buf, &self.policy, start, end, usize::MAX, start_is_line_start).lines
    }

    /// Position `n_lines` visual lines forward of `start_pos`.
    #[must_use]
    pub fn forward_n_lines(
        &self,
        buf: &dyn TextSource,
        start_pos: Pos,
        n_lines: usize,
        start_is_line_start: bool,
    ) -> Pos {
        if !self.wrap {
            return plain_forward_n_lines(buf, start_pos, n_lines);
        }
        if n_lines == 0 {
            return start_pos;
        }
        counter::count(buf, &self.policy, start_pos, buf.len(), n_lines, start_is_line_start).pos
    }

    /// Start of the visual line `n_lines` lines above `start_pos`.
    #[must_use]
    pub fn count_backward_n_lines(
        &self,
        buf: &dyn TextSource,
        start_pos: Pos,
        n_lines: usize,
    ) -> Pos {
        if !self.wrap {
            return plain_backward_n_lines(buf, start_pos, n_lines);
        }

        let mut n = n_lines as i64;
        let mut pos = start_pos;
        loop {
            let line_start = buf.line_start(pos);
            let counted = counter::count(buf, &self.policy, line_start, pos, usize::MAX, true);
            if counted.lines as i64 > n {
                return self.forward_n_lines(buf, line_start, (counted.lines as i64 - n) as usize, true);
            }
            n -= counted.lines as i64;
            if line_start == Pos::ZERO {
                return Pos::ZERO;
            }
            pos = line_start - 1;
            n -= 1;
        }
    }

    /// Start of the visual line containing `pos`.
    #[must_use]
    pub fn start_of_line(&self, buf: &dyn TextSource, pos: Pos) -> Pos {
        if !self.wrap {
            return buf.line_start(pos);
        }
        counter::start_of_line(buf, &self.policy, pos)
    }

    /// End of the visual line containing `pos`.
    #[must_use]
    pub fn end_of_line(
        &self,
        buf: &dyn TextSource,
        pos: Pos,
        start_is_line_start: bool,
    ) -> Pos {
        if !self.wrap {
            return buf.line_end(pos);
        }
        counter::end_of_line(buf, &self.policy, pos, start_is_line_start)
    }

    fn find_line_end(
        &self,
        buf: &dyn TextSource,
        start_pos: Pos,
        start_is_line_start: bool,
    ) -> (Pos, Pos) {
        if !self.wrap {
            let end = buf.line_end(start_pos);
            return (end, (end + 1).min(buf.len()));
        }
        counter::find_line_end(buf, &self.policy, start_pos, start_is_line_start)
    }

    // ------------------------------------------------------------------
    // Cache maintenance
    // ------------------------------------------------------------------

    /// Recalculate cache entries `start_line..=end_line`, assuming the
    /// entry before `start_line` (or `first_char` for row 0) is correct.
    /// Out-of-range bounds are clamped.
    fn calc_line_starts(&mut self, buf: &dyn TextSource, start_line: i64, end_line: i64) {
        let n_vis = self.line_starts.len();
        if n_vis == 0 {
            return;
        }

        let end_line = end_line.clamp(0, n_vis as i64 - 1) as usize;
        let mut line = start_line.clamp(0, n_vis as i64 - 1) as usize;
        if line > end_line {
            return;
        }

        if line == 0 {
            self.line_starts[0] = Some(self.first_char);
            line = 1;
            if line > end_line {
                return;
            }
        }

        let Some(mut start_pos) = self.line_starts[line - 1] else {
            // already past the end of the text
            for entry in &mut self.line_starts[line..=end_line] {
                *entry = None;
            }
            return;
        };

        let buf_end = buf.len();
        while line <= end_line {
            let (line_end, next_start) = self.find_line_end(buf, start_pos, true);
            start_pos = next_start;
            if start_pos >= buf_end {
                /* If the buffer ends with a line break, store the buffer
                   length as the next start (instead of the blank-row
                   marker) so the cursor can legally sit on an empty
                   final line. */
                if self.line_starts[line - 1] != Some(buf_end) && line_end != next_start {
                    self.line_starts[line] = Some(buf_end);
                    line += 1;
                }
                break;
            }
            self.line_starts[line] = Some(start_pos);
            line += 1;
        }

        while line <= end_line {
            self.line_starts[line] = None;
            line += 1;
        }
    }

    /// Derive `last_char` from a complete, up-to-date cache.
    fn calc_last_char(&mut self, buf: &dyn TextSource) {
        let mut i = self.line_starts.len();
        while i > 1 && self.line_starts[i - 1].is_none() {
            i -= 1;
        }
        self.last_char = match i.checked_sub(1).and_then(|i| self.line_starts[i]) {
            Some(start) => self.end_of_line(buf, start, true),
            None => Pos::ZERO,
        };
    }

    /// Visual row displaying `pos`, or `None` if it is not on screen.
    #[must_use]
    pub fn pos_to_visible_row(&self, buf: &dyn TextSource, pos: Pos) -> Option<usize> {
        if pos < self.first_char {
            return None;
        }

        if pos > self.last_char {
            // Positions just past the text are legal when blank rows
            // are visible below it.
            if self.empty_lines_visible() {
                if self.last_char < buf.len() {
                    let row = self.pos_to_visible_row(buf, self.last_char)?;
                    debug_assert!(row < self.line_starts.len(), "cache inconsistent");
                    let row = row + 1;
                    return (row + 1 <= self.line_starts.len()).then_some(row);
                }
                let prev = Pos(self.last_char.get().saturating_sub(1));
                return self.pos_to_visible_row(buf, prev);
            }
            return None;
        }

        for i in (0..self.line_starts.len()).rev() {
            if let Some(start) = self.line_starts[i] {
                if pos >= start {
                    return Some(i);
                }
            }
        }

        None
    }

    // ------------------------------------------------------------------
    // Edit synchronization
    // ------------------------------------------------------------------

    /// Measure, against the current (pre-edit) layout, how many visual
    /// lines the impending deletion at `pos` spans. Required before the
    /// mutation whenever [`WrapPolicy::needs_premeasure`] is true; the
    /// result is passed to [`Self::apply`] after the mutation.
    ///
    /// Must be called with the buffer still in its pre-edit state. The
    /// scan never resynchronizes with the cached line starts — see
    /// [`PreDeleteMeasure`] for why that is a deliberate policy.
    #[must_use]
    pub fn measure_deleted_lines(
        &self,
        buf: &dyn TextSource,
        pos: Pos,
        n_deleted: usize,
    ) -> PreDeleteMeasure {
        let count_from = self.resync_anchor(buf, pos).1;

        let mut n_lines = 0usize;
        let mut line_start = count_from;
        loop {
            let r = counter::count(buf, &self.policy, line_start, buf.len(), 1, true);
            if r.pos >= buf.len() {
                if r.pos != r.line_end {
                    n_lines += 1;
                }
                break;
            }
            line_start = r.pos;

            n_lines += 1;
            if line_start > pos + n_deleted && buf.char_at(line_start - 1) == Some('\n') {
                break;
            }
        }

        PreDeleteMeasure {
            deleted_lines: n_lines,
        }
    }

    /// Apply an edit notification to the display.
    ///
    /// `buf` must already reflect the edit. `pre` carries the pre-delete
    /// measurement when the policy demands one (two-phase mode); passing
    /// `Some` disables the opportunistic mid-scan resync so the inserted
    /// and deleted lines are counted the same way.
    ///
    /// Runs in time proportional to the edited region, not the buffer.
    pub fn apply(
        &mut self,
        buf: &dyn TextSource,
        edit: &Edit,
        pre: Option<PreDeleteMeasure>,
    ) -> Outcome {
        let pos = edit.pos;
        let n_inserted = edit.inserted;
        let n_deleted = edit.n_deleted();
        let old_first_char = self.first_char;

        let scrolled;
        let lines_inserted;
        let lines_deleted;

        if self.wrap {
            let wr = self.find_wrap_range(buf, edit, pre);
            lines_inserted = wr.lines_inserted;
            lines_deleted = wr.lines_deleted;

            if n_inserted != 0 || n_deleted != 0 {
                let chars_inserted = wr.mod_end - wr.mod_start;
                let chars_deleted =
                    n_deleted + (pos - wr.mod_start) + (wr.mod_end - (pos + n_inserted));
                scrolled = self.update_line_starts(
                    buf,
                    wr.mod_start,
                    chars_inserted,
                    chars_deleted,
                    lines_inserted,
                    lines_deleted,
                );
            } else {
                scrolled = false;
            }
        } else {
            lines_inserted = if n_inserted == 0 {
                0
            } else {
                buf.count_newlines(pos, pos + n_inserted)
            };
            lines_deleted = count_newlines(&edit.deleted);

            scrolled = if n_inserted != 0 || n_deleted != 0 {
                self.update_line_starts(buf, pos, n_inserted, n_deleted, lines_inserted, lines_deleted)
            } else {
                false
            };
        }

        // Maintain the absolute (non-wrapped) top line number, if enabled.
        if self.abs_top_line.is_some() && (n_inserted != 0 || n_deleted != 0) {
            if pos + n_deleted < old_first_char {
                let delta = buf.count_newlines(pos, pos + n_inserted) as i64
                    - count_newlines(&edit.deleted) as i64;
                if let Some(abs) = self.abs_top_line.as_mut() {
                    *abs = (*abs as i64 + delta).max(1) as usize;
                }
            } else if pos < old_first_char {
                self.reset_abs_line_num(buf);
            }
        }

        self.n_buffer_lines = (self.n_buffer_lines as i64 + lines_inserted as i64
            - lines_deleted as i64)
            .max(0) as usize;

        Outcome { scrolled }
    }

    /// Shared prefix of `find_wrap_range` and `measure_deleted_lines`:
    /// where to start counting, and the visual row of that anchor when
    /// it came from the cache.
    fn resync_anchor(&self, buf: &dyn TextSource, pos: Pos) -> (usize, Pos) {
        let n_vis = self.line_starts.len();
        if n_vis > 0 && pos >= self.first_char && pos <= self.last_char {
            let mut i = n_vis - 1;
            while i > 0 {
                if let Some(start) = self.line_starts[i] {
                    if pos >= start {
                        break;
                    }
                }
                i -= 1;
            }
            if i > 0 {
                let vis_line_num = i - 1;
                let anchor = self.line_starts[vis_line_num]
                    .unwrap_or_else(|| buf.line_start(pos));
                return (vis_line_num, anchor);
            }
        }
        (0, buf.line_start(pos))
    }

    /// Find the extent of layout damage caused by an edit, and the
    /// visual line counts inserted and deleted over that range.
    ///
    /// Wrapping can move boundaries before and beyond the edit itself,
    /// so the scan starts one displayed line above and runs forward
    /// until a real newline, or until it resynchronizes with a
    /// surviving cache entry (single-phase mode only). The deleted-line
    /// count is obtained by splicing the deleted text back between its
    /// surviving context in a temporary buffer and laying that out.
    fn find_wrap_range(
        &self,
        buf: &dyn TextSource,
        edit: &Edit,
        pre: Option<PreDeleteMeasure>,
    ) -> WrapRange {
        let pos = edit.pos;
        let n_inserted = edit.inserted;
        let n_deleted = edit.n_deleted();
        let n_vis = self.line_starts.len();
        let suppress_resync = pre.is_some();

        let (mut vis_line_num, count_from) = self.resync_anchor(buf, pos);
        let mut count_from = count_from;

        let mut line_start = count_from;
        let mut mod_start = count_from;
        let mod_end;
        let count_to;
        let mut n_lines = 0usize;

        loop {
            // advance one visual line; a real newline or the buffer end
            // is far enough
            let r = counter::count(buf, &self.policy, line_start, buf.len(), 1, true);
            if r.pos >= buf.len() {
                count_to = buf.len();
                mod_end = count_to;
                if r.pos != r.line_end {
                    n_lines += 1;
                }
                break;
            }
            line_start = r.pos;

            n_lines += 1;
            if line_start > pos + n_inserted && buf.char_at(line_start - 1) == Some('\n') {
                count_to = line_start;
                mod_end = line_start;
                break;
            }

            /* In two-phase mode the deleted lines were counted without
               resynchronization, so the inserted lines must be too, or
               the two counts would disagree about where lines break. */
            if suppress_resync {
                continue;
            }

            if line_start <= pos {
                // resynchronized with an old entry before the edit: the
                // damaged range can begin later
                while vis_line_num < n_vis
                    && self.line_starts[vis_line_num].is_none_or(|s| s < line_start)
                {
                    vis_line_num += 1;
                }
                if vis_line_num < n_vis && self.line_starts[vis_line_num] == Some(line_start) {
                    count_from = line_start;
                    n_lines = 0;
                    if vis_line_num + 1 < n_vis {
                        if let Some(next) = self.line_starts[vis_line_num + 1] {
                            mod_start = pos.min(next - 1);
                        } else {
                            mod_start = count_from;
                        }
                    } else {
                        mod_start = count_from;
                    }
                } else {
                    mod_start = mod_start.min(line_start - 1);
                }
            } else if line_start > pos + n_inserted {
                // resynchronized beyond the edit: the damage ends here
                let adj_line_start = line_start.offset(n_deleted as i64 - n_inserted as i64);
                while vis_line_num < n_vis
                    && self.line_starts[vis_line_num].is_none_or(|s| s < adj_line_start)
                {
                    vis_line_num += 1;
                }
                if vis_line_num < n_vis
                    && self.line_starts[vis_line_num] == Some(adj_line_start)
                {
                    count_to = self.end_of_line(buf, line_start, true);
                    mod_end = line_start;
                    break;
                }
            }
        }

        let lines_inserted = n_lines;

        if let Some(measured) = pre {
            return WrapRange {
                mod_start,
                mod_end,
                lines_inserted,
                lines_deleted: measured.deleted_lines,
            };
        }

        /* Count the deleted lines over [count_from, count_to) as the
           text existed before the edit: the original context with the
           deleted text spliced back in place of the insertion. The
           extra context matters because wrapping moves outside the
           modified region. */
        let length = (pos - count_from) + n_deleted + (count_to.get().saturating_sub((pos + n_inserted).get()));

        let mut pre_edit = CharBuffer::new();
        if pos > count_from {
            pre_edit.push_str(&buf.slice_chars(count_from, pos));
        }
        if n_deleted != 0 {
            pre_edit.push_str(&edit.deleted);
        }
        if count_to > pos + n_inserted {
            pre_edit.push_str(&buf.slice_chars(pos + n_inserted, count_to));
        }

        let counted = counter::count(
            &pre_edit,
            &self.policy,
            Pos::ZERO,
            Pos(length),
            usize::MAX,
            true,
        );

        WrapRange {
            mod_start,
            mod_end,
            lines_inserted,
            lines_deleted: counted.lines,
        }
    }

    /// Update the cache, `top_line`, `first_char` and `last_char` for a
    /// change beginning at `pos`, salvaging as much of the old cache as
    /// possible. Returns true if the window anchor moved.
    fn update_line_starts(
        &mut self,
        buf: &dyn TextSource,
        pos: Pos,
        chars_inserted: usize,
        chars_deleted: usize,
        lines_inserted: usize,
        lines_deleted: usize,
    ) -> bool {
        let n_vis = self.line_starts.len();
        let char_delta = chars_inserted as i64 - chars_deleted as i64;
        let line_delta = lines_inserted as i64 - lines_deleted as i64;

        /* Entirely before the displayed text: nothing on screen changes,
           just shift the entries and anchors. */
        if pos + chars_deleted < self.first_char {
            self.top_line = (self.top_line as i64 + line_delta).max(1) as usize;
            for entry in &mut self.line_starts {
                match entry {
                    Some(p) => *p = p.offset(char_delta),
                    None => break,
                }
            }
            self.first_char = self.first_char.offset(char_delta);
            self.last_char = self.last_char.offset(char_delta);
            return false;
        }

        /* Began before the window but deleted into it: the anchor may be
           gone. Re-anchor on a surviving line if one exists, otherwise
           recount from the top line number or the buffer start. */
        if pos < self.first_char {
            let salvage = self
                .pos_to_visible_row(buf, pos + chars_deleted)
                .map(|r| r + 1)
                .filter(|&r| r < n_vis)
                .and_then(|r| self.line_starts[r].map(|s| (r, s)));

            if let Some((line_of_end, anchor)) = salvage {
                self.top_line = (self.top_line as i64 + line_delta).max(1) as usize;
                self.first_char =
                    self.count_backward_n_lines(buf, anchor.offset(char_delta), line_of_end);
            } else if self.top_line as i64 > self.n_buffer_lines as i64 + line_delta {
                self.top_line = 1;
                self.first_char = Pos::ZERO;
            } else {
                self.first_char = self.forward_n_lines(buf, Pos::ZERO, self.top_line - 1, true);
            }

            self.calc_line_starts(buf, 0, n_vis as i64 - 1);
            self.calc_last_char(buf);
            return true;
        }

        /* In the middle of the displayed text (the usual case): shift
           the entries after the changed area and recount only the
           exposed region. */
        if pos <= self.last_char {
            if let Some(line_of_pos) = self.pos_to_visible_row(buf, pos) {
                if line_delta == 0 {
                    for i in line_of_pos + 1..n_vis {
                        match self.line_starts[i] {
                            Some(p) => self.line_starts[i] = Some(p.offset(char_delta)),
                            None => break,
                        }
                    }
                } else if line_delta > 0 {
                    let ld = line_delta as usize;
                    for i in ((line_of_pos + ld + 1)..n_vis).rev() {
                        self.line_starts[i] = self.line_starts[i - ld].map(|p| p.offset(char_delta));
                    }
                } else {
                    let ld = line_delta.unsigned_abs() as usize;
                    for i in (line_of_pos + 1)..n_vis.saturating_sub(ld) {
                        self.line_starts[i] = self.line_starts[i + ld].map(|p| p.offset(char_delta));
                    }
                }

                // fill in the entries the shift exposed
                self.calc_line_starts(
                    buf,
                    line_of_pos as i64 + 1,
                    line_of_pos as i64 + lines_inserted as i64,
                );
                if line_delta < 0 {
                    self.calc_line_starts(buf, n_vis as i64 + line_delta, n_vis as i64);
                }

                self.calc_last_char(buf);
            }
            return false;
        }

        /* Past the displayed text, but landing in visible blank rows. */
        if self.empty_lines_visible() {
            if let Some(line_of_pos) = self.pos_to_visible_row(buf, pos) {
                self.calc_line_starts(
                    buf,
                    line_of_pos as i64,
                    line_of_pos as i64 + lines_inserted as i64,
                );
                self.calc_last_char(buf);
            }
        }

        // beyond the end and not visible: nothing to do
        false
    }

    // ------------------------------------------------------------------
    // Viewport operations
    // ------------------------------------------------------------------

    /// Resize the viewport to `new_rows` visible rows. Idempotent for an
    /// unchanged row count.
    pub fn on_resize(&mut self, buf: &dyn TextSource, new_rows: usize) {
        self.line_starts.resize(new_rows, None);
        self.calc_line_starts(buf, 0, new_rows as i64);
        self.calc_last_char(buf);
    }

    /// Install a new wrap policy (font change, margin change, wrap-mode
    /// toggle) and rebuild all derived state.
    pub fn on_wrap_policy_changed(&mut self, buf: &dyn TextSource, policy: WrapPolicy) {
        self.policy = policy;
        let old_first_char = self.first_char;

        self.n_buffer_lines = self.count_lines(buf, Pos::ZERO, buf.len(), true);
        self.first_char = self.start_of_line(buf, self.first_char);
        self.top_line = self.count_lines(buf, Pos::ZERO, self.first_char, true) + 1;
        self.offset_abs_line_num(buf, old_first_char);

        let rows = self.line_starts.len();
        self.calc_line_starts(buf, 0, rows as i64 - 1);
        self.calc_last_char(buf);
    }

    /// Scroll so that visual line `new_top_line` (1-based) is the top
    /// row, salvaging overlapping cache entries where possible.
    pub fn scroll_to(&mut self, buf: &dyn TextSource, new_top_line: usize) {
        let n_vis = self.line_starts.len();
        if n_vis == 0 {
            return;
        }
        let max_top = (self.n_buffer_lines as i64 - n_vis as i64 + 2).max(1) as usize;
        let new_top = new_top_line.clamp(1, max_top);

        let old_first_char = self.first_char;
        let old_top = self.top_line;
        let line_delta = new_top as i64 - old_top as i64;
        if line_delta == 0 {
            return;
        }

        /* New first_char from the nearest known reference: buffer start,
           buffer end, or an existing cache entry. */
        let last_line_num = old_top + n_vis.saturating_sub(1);
        if new_top < old_top && (new_top as i64) < -line_delta {
            self.first_char = self.forward_n_lines(buf, Pos::ZERO, new_top - 1, true);
        } else if new_top < old_top {
            self.first_char =
                self.count_backward_n_lines(buf, self.first_char, line_delta.unsigned_abs() as usize);
        } else if new_top < last_line_num {
            self.first_char = match self.line_starts.get(new_top - old_top).copied().flatten() {
                Some(p) => p,
                None => self.forward_n_lines(buf, Pos::ZERO, new_top - 1, true),
            };
        } else if new_top - last_line_num < self.n_buffer_lines.saturating_sub(new_top) {
            let from = self.line_starts[n_vis - 1].unwrap_or(self.last_char);
            self.first_char = self.forward_n_lines(buf, from, new_top - last_line_num, true);
        } else {
            self.first_char = self.count_backward_n_lines(
                buf,
                buf.len(),
                self.n_buffer_lines + 1 - new_top,
            );
        }

        // salvage overlapping entries, recount the rest
        if line_delta < 0 && line_delta.unsigned_abs() < n_vis as u64 {
            let ld = line_delta.unsigned_abs() as usize;
            for i in (ld..n_vis).rev() {
                self.line_starts[i] = self.line_starts[i - ld];
            }
            self.calc_line_starts(buf, 0, ld as i64);
        } else if line_delta > 0 && (line_delta as usize) < n_vis {
            let ld = line_delta as usize;
            for i in 0..n_vis - ld {
                self.line_starts[i] = self.line_starts[i + ld];
            }
            self.calc_line_starts(buf, (n_vis - ld) as i64, n_vis as i64 - 1);
        } else {
            self.calc_line_starts(buf, 0, n_vis as i64 - 1);
        }

        self.calc_last_char(buf);
        self.top_line = new_top;
        self.offset_abs_line_num(buf, old_first_char);
    }

    /// Discard and fully recompute the cache from the current
    /// `first_char`. The incremental path must always leave the display
    /// in the state this produces.
    pub fn recompute(&mut self, buf: &dyn TextSource) {
        let rows = self.line_starts.len();
        for entry in &mut self.line_starts {
            *entry = None;
        }
        self.calc_line_starts(buf, 0, rows as i64 - 1);
        self.calc_last_char(buf);
    }

    // ------------------------------------------------------------------
    // Absolute (non-wrapped) line numbers
    // ------------------------------------------------------------------

    /// Start tracking absolute line numbers (needed by
    /// [`Self::line_and_column`] in wrap mode). Cheap to leave disabled
    /// when only display-relative rows are needed.
    pub fn enable_absolute_lines(&mut self, buf: &dyn TextSource) {
        self.abs_top_line = Some(1);
        self.reset_abs_line_num(buf);
    }

    /// Stop tracking absolute line numbers.
    pub fn disable_absolute_lines(&mut self) {
        self.abs_top_line = None;
    }

    fn reset_abs_line_num(&mut self, buf: &dyn TextSource) {
        if self.abs_top_line.is_some() {
            self.abs_top_line = Some(1 + buf.count_newlines(Pos::ZERO, self.first_char));
        }
    }

    fn offset_abs_line_num(&mut self, buf: &dyn TextSource, old_first_char: Pos) {
        if let Some(abs) = self.abs_top_line {
            let new = if self.first_char < old_first_char {
                abs - buf.count_newlines(self.first_char, old_first_char)
            } else {
                abs + buf.count_newlines(old_first_char, self.first_char)
            };
            self.abs_top_line = Some(new);
        }
    }

    /// Absolute (line, column) of `pos`, if it can be determined.
    ///
    /// In wrap mode this requires absolute-line tracking to be enabled
    /// and `pos` to be displayed; the line is the unwrapped line number
    /// and the column is counted from the last real newline. Lines are
    /// 1-based, columns 0-based.
    #[must_use]
    pub fn line_and_column(&self, buf: &dyn TextSource, pos: Pos) -> Option<(usize, usize)> {
        let pos = pos.min(buf.len());
        if self.wrap {
            let abs = self.abs_top_line?;
            if pos < self.first_char || pos > self.last_char {
                return None;
            }
            let line = abs + buf.count_newlines(self.first_char, pos);
            let col = counter::count_disp_cols(buf, &self.policy, buf.line_start(pos), pos);
            return Some((line, col));
        }

        let row = self.pos_to_visible_row(buf, pos)?;
        let start = self.line_starts[row]?;
        let col = counter::count_disp_cols(buf, &self.policy, start, pos);
        Some((row + self.top_line, col))
    }

    // ------------------------------------------------------------------
    // Coordinate mapping
    // ------------------------------------------------------------------

    /// Map a buffer position to `(x, row)`, or `None` if it is not
    /// displayed. `x` is in columns for a column-margin policy and in
    /// pixels otherwise; `row` is the visual row index.
    ///
    /// One position past `last_char` is still mappable when trailing
    /// blank rows are visible.
    #[must_use]
    pub fn position_to_xy(&self, buf: &dyn TextSource, pos: Pos) -> Option<(u32, usize)> {
        let pos = pos.min(buf.len());
        if pos < self.first_char || (pos > self.last_char && !self.empty_lines_visible()) {
            return None;
        }

        let row = self.pos_to_visible_row(buf, pos)?;
        let Some(line_start) = self.line_starts[row] else {
            // first position on the first blank row
            return Some((0, row));
        };

        let line_len = self.vis_line_length_unchecked(buf, row);
        let span = (pos - line_start).min(line_len);

        let mut x = 0u32;
        let mut col = 0usize;
        let mut p = line_start;
        while p < line_start + span {
            if let Some(ch) = buf.char_at(p) {
                x += self.policy.x_advance(ch, col);
                col += self.policy.col_width(ch, col);
            }
            p += 1;
        }
        Some((x, row))
    }

    /// Map an `(x, row)` coordinate to the nearest text position. The
    /// row is clamped into the viewport; `kind` chooses between cursor
    /// snapping (midpoints) and character-cell lookup.
    #[must_use]
    pub fn xy_to_position(
        &self,
        buf: &dyn TextSource,
        x: u32,
        row: i64,
        kind: PositionKind,
    ) -> Pos {
        let n_vis = self.line_starts.len();
        if n_vis == 0 {
            return buf.len();
        }
        if row < 0 {
            return self.first_char;
        }
        let row = (row as usize).min(n_vis - 1);

        let Some(line_start) = self.line_starts[row] else {
            // blank row: the last position in the buffer
            return buf.len();
        };

        let line_len = self.vis_line_length_unchecked(buf, row);
        let mut x_step = 0u32;
        let mut col = 0usize;
        for i in 0..line_len {
            let Some(ch) = buf.char_at(line_start + i) else {
                break;
            };
            let advance = self.policy.x_advance(ch, col);
            let threshold = match kind {
                // half the advance, floored at 1: a one-unit advance
                // (column margins) must still claim its own left edge
                PositionKind::Cursor => (advance / 2).max(1),
                PositionKind::Character => advance,
            };
            if x < x_step + threshold {
                return line_start + i;
            }
            x_step += advance;
            col += self.policy.col_width(ch, col);
        }

        // past the end of the line
        line_start + line_len
    }
}

fn plain_forward_n_lines(buf: &dyn TextSource, start_pos: Pos, n_lines: usize) -> Pos {
    let len = buf.len();
    let mut p = start_pos;
    let mut remaining = n_lines;
    while remaining > 0 && p < len {
        if buf.char_at(p) == Some('\n') {
            remaining -= 1;
        }
        p += 1;
    }
    if remaining > 0 { len } else { p }
}

fn plain_backward_n_lines(buf: &dyn TextSource, start_pos: Pos, n_lines: usize) -> Pos {
    let mut p = start_pos.min(buf.len());
    let mut seen = 0usize;
    while p > Pos::ZERO {
        if buf.char_at(p - 1) == Some('\n') {
            seen += 1;
            if seen > n_lines {
                return p;
            }
        }
        p -= 1;
    }
    Pos::ZERO
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::RopeBuffer;

    fn cols(margin: usize, tab: usize) -> WrapPolicy {
        WrapPolicy::columns(margin, tab).unwrap()
    }

    fn starts(disp: &WrapDisplay) -> Vec<Option<usize>> {
        (0..disp.visible_row_count())
            .map(|r| disp.visible_line_start(r).map(Pos::get))
            .collect()
    }

    fn assert_monotonic(disp: &WrapDisplay) {
        let s = starts(disp);
        let real: Vec<usize> = s.iter().copied().flatten().collect();
        for w in real.windows(2) {
            assert!(w[0] < w[1], "cache not strictly increasing: {s:?}");
        }
        // None entries must form a suffix
        let first_none = s.iter().position(Option::is_none).unwrap_or(s.len());
        assert!(
            s[first_none..].iter().all(Option::is_none),
            "NoLine entries not a suffix: {s:?}"
        );
    }

    fn assert_anchors(disp: &WrapDisplay) {
        if let Some(first) = disp.visible_line_start(0) {
            assert_eq!(disp.first_visible_char(), first, "anchor consistency");
        }
    }

    #[test]
    fn test_initial_cache_short_buffer() {
        // Scenario D setup: buffer shorter than the viewport leaves a
        // NoLine suffix.
        let buf = RopeBuffer::from_str("one\ntwo\n");
        let disp = WrapDisplay::new(&buf, cols(20, 8), 5);
        assert_eq!(starts(&disp), vec![Some(0), Some(4), Some(8), None, None]);
        assert_eq!(disp.last_visible_char(), Pos(8));
        assert!(disp.empty_lines_visible());
        assert_monotonic(&disp);
        assert_anchors(&disp);
    }

    #[test]
    fn test_trailing_newline_yields_positionable_empty_line() {
        // "ab\n" ends with a break: the next start is the buffer length,
        // not a blank-row marker, so the cursor can sit on the empty
        // final line.
        let buf = RopeBuffer::from_str("ab\n");
        let disp = WrapDisplay::new(&buf, cols(20, 8), 3);
        assert_eq!(starts(&disp), vec![Some(0), Some(3), None]);
    }

    #[test]
    fn test_wraps_at_whitespace() {
        // Scenario A: margin 10 breaks after the space, rows [0..] and [11..].
        let buf = RopeBuffer::from_str("aaaaaaaaaa bbbbb\n");
        let disp = WrapDisplay::new(&buf, cols(10, 8), 4);
        assert_eq!(starts(&disp), vec![Some(0), Some(11), Some(17), None]);
        assert_eq!(disp.last_visible_char(), Pos(17));
        assert_monotonic(&disp);
    }

    #[test]
    fn test_insert_at_first_char_shifts_tail() {
        // Scenario B: one char at first_char with no line-count change
        // shifts rows 1.. by +1 and leaves row 0 alone.
        let mut buf = RopeBuffer::from_str("alpha\nbravo\ncharlie\ndelta\n");
        let mut disp = WrapDisplay::new(&buf, cols(20, 8), 4);
        let before = starts(&disp);
        assert_eq!(before, vec![Some(0), Some(6), Some(12), Some(20)]);

        let edit = buf.insert(Pos(0), "x");
        let out = disp.apply(&buf, &edit, None);
        assert!(!out.scrolled);
        assert_eq!(starts(&disp), vec![Some(0), Some(7), Some(13), Some(21)]);
        assert_monotonic(&disp);
        assert_anchors(&disp);
    }

    #[test]
    fn test_delete_whole_line_reveals_following_text() {
        // Scenario C: deleting a whole visual line (text + newline) from
        // mid-window shifts later entries left and pulls previously
        // off-screen text into view.
        let mut buf = RopeBuffer::from_str("aa\nbb\ncc\ndd\nee\nff\n");
        let mut disp = WrapDisplay::new(&buf, cols(20, 8), 3);
        assert_eq!(starts(&disp), vec![Some(0), Some(3), Some(6)]);
        assert_eq!(disp.last_visible_char(), Pos(8));

        // delete "bb\n"
        let edit = buf.delete(Pos(3), Pos(6));
        let out = disp.apply(&buf, &edit, None);
        assert!(!out.scrolled);
        assert_eq!(starts(&disp), vec![Some(0), Some(3), Some(6)]);
        assert_eq!(disp.last_visible_char(), Pos(8), "dd now ends the window");
        assert_eq!(buf.slice_chars(Pos(6), Pos(8)), "dd");
        assert_monotonic(&disp);
    }

    #[test]
    fn test_insert_into_trailing_blank_rows() {
        // Scenario D: appending at end-of-buffer converts the first
        // NoLine rows into real entries without touching earlier ones.
        let mut buf = RopeBuffer::from_str("one\n");
        let mut disp = WrapDisplay::new(&buf, cols(20, 8), 4);
        assert_eq!(starts(&disp), vec![Some(0), Some(4), None, None]);

        let edit = buf.insert(Pos(4), "two\nthree");
        let out = disp.apply(&buf, &edit, None);
        assert!(!out.scrolled);
        assert_eq!(starts(&disp), vec![Some(0), Some(4), Some(8), None]);
        assert_eq!(disp.last_visible_char(), Pos(13));
        assert_monotonic(&disp);
    }

    #[test]
    fn test_edit_before_window_shifts_everything() {
        let mut buf = RopeBuffer::from_str("l1\nl2\nl3\nl4\nl5\nl6\nl7\n");
        let mut disp = WrapDisplay::new(&buf, cols(20, 8), 3);
        disp.scroll_to(&buf, 4);
        assert_eq!(disp.top_line_num(), 4);
        assert_eq!(disp.first_visible_char(), Pos(9));

        // insert a line well before the window
        let edit = buf.insert(Pos(0), "l0\n");
        let out = disp.apply(&buf, &edit, None);
        assert!(!out.scrolled);
        assert_eq!(disp.top_line_num(), 5);
        assert_eq!(disp.first_visible_char(), Pos(12));
        assert_eq!(buf.slice_chars(Pos(12), Pos(14)), "l4");
        assert_monotonic(&disp);
        assert_anchors(&disp);
    }

    #[test]
    fn test_delete_across_window_start_scrolls() {
        let mut buf = RopeBuffer::from_str("l1\nl2\nl3\nl4\nl5\nl6\nl7\n");
        let mut disp = WrapDisplay::new(&buf, cols(20, 8), 3);
        disp.scroll_to(&buf, 4);
        assert_eq!(disp.first_visible_char(), Pos(9));

        // delete from inside line 2 through inside line 4
        let edit = buf.delete(Pos(4), Pos(10));
        let out = disp.apply(&buf, &edit, None);
        assert!(out.scrolled);
        assert_monotonic(&disp);
        assert_anchors(&disp);

        // incremental result must match a from-scratch recompute
        let mut scratch = disp.clone();
        scratch.recompute(&buf);
        assert_eq!(starts(&disp), starts(&scratch));
        assert_eq!(disp.last_visible_char(), scratch.last_visible_char());
    }

    #[test]
    fn test_incremental_matches_scratch_for_wrapped_edits() {
        let mut buf = RopeBuffer::from_str(
            "the quick brown fox jumps over the lazy dog\npack my box with five dozen liquor jugs\n",
        );
        let mut disp = WrapDisplay::new(&buf, cols(12, 8), 6);

        let edit = buf.insert(Pos(10), "extremely ");
        disp.apply(&buf, &edit, None);
        let mut scratch = disp.clone();
        scratch.recompute(&buf);
        assert_eq!(starts(&disp), starts(&scratch));
        assert_eq!(disp.last_visible_char(), scratch.last_visible_char());

        let edit = buf.delete(Pos(4), Pos(21));
        disp.apply(&buf, &edit, None);
        let mut scratch = disp.clone();
        scratch.recompute(&buf);
        assert_eq!(starts(&disp), starts(&scratch));
        assert_monotonic(&disp);
    }

    #[test]
    fn test_resize_is_idempotent() {
        let buf = RopeBuffer::from_str("one two three four five six\nseven\n");
        let mut disp = WrapDisplay::new(&buf, cols(10, 8), 4);
        let before = starts(&disp);
        let last = disp.last_visible_char();
        disp.on_resize(&buf, 4);
        assert_eq!(starts(&disp), before);
        assert_eq!(disp.last_visible_char(), last);

        disp.on_resize(&buf, 6);
        assert_eq!(disp.visible_row_count(), 6);
        assert_eq!(&starts(&disp)[..4], &before[..]);
        assert_monotonic(&disp);
    }

    #[test]
    fn test_scroll_down_and_back_up() {
        let buf = RopeBuffer::from_str("a1\na2\na3\na4\na5\na6\na7\na8\na9\n");
        let mut disp = WrapDisplay::new(&buf, cols(20, 8), 3);
        assert_eq!(disp.buffer_line_count(), 9);

        disp.scroll_to(&buf, 5);
        assert_eq!(disp.top_line_num(), 5);
        assert_eq!(disp.first_visible_char(), Pos(12));
        assert_monotonic(&disp);
        assert_anchors(&disp);

        disp.scroll_to(&buf, 1);
        assert_eq!(disp.top_line_num(), 1);
        assert_eq!(disp.first_visible_char(), Pos(0));
        assert_eq!(starts(&disp), vec![Some(0), Some(3), Some(6)]);
    }

    #[test]
    fn test_scroll_clamps_to_range() {
        let buf = RopeBuffer::from_str("a\nb\nc\n");
        let mut disp = WrapDisplay::new(&buf, cols(20, 8), 2);
        disp.scroll_to(&buf, 100);
        assert!(disp.top_line_num() <= 3);
        disp.scroll_to(&buf, 0);
        assert_eq!(disp.top_line_num(), 1);
    }

    #[test]
    fn test_position_to_xy_and_back() {
        let buf = RopeBuffer::from_str("ab\tcd\nxyz");
        let disp = WrapDisplay::new(&buf, cols(40, 4), 3);

        // 'c' sits at column 4 after the tab expands 2 -> 4
        assert_eq!(disp.position_to_xy(&buf, Pos(3)), Some((4, 0)));
        assert_eq!(disp.position_to_xy(&buf, Pos(7)), Some((1, 1)));

        for p in 0..buf.len().get() {
            let pos = Pos(p);
            if buf.char_at(pos) == Some('\n') {
                continue;
            }
            let (x, row) = disp.position_to_xy(&buf, pos).unwrap();
            let back = disp.xy_to_position(&buf, x, row as i64, PositionKind::Cursor);
            assert_eq!(back, pos, "round trip at {pos}");
        }
    }

    #[test]
    fn test_xy_to_position_clamps_and_snaps() {
        let buf = RopeBuffer::from_str("hello\nworld");
        let disp = WrapDisplay::new(&buf, cols(40, 8), 2);

        assert_eq!(disp.xy_to_position(&buf, 0, -1, PositionKind::Cursor), Pos(0));
        // past the end of a row returns the position after its last char
        assert_eq!(disp.xy_to_position(&buf, 99, 0, PositionKind::Cursor), Pos(5));
        // rows below the last are clamped
        assert_eq!(disp.xy_to_position(&buf, 0, 9, PositionKind::Cursor), Pos(6));
        // Character mode owns the whole cell, Cursor mode splits it
        assert_eq!(disp.xy_to_position(&buf, 0, 0, PositionKind::Character), Pos(0));
        assert_eq!(disp.xy_to_position(&buf, 1, 1, PositionKind::Cursor), Pos(7));
    }

    #[test]
    fn test_position_outside_window_not_displayed() {
        let buf = RopeBuffer::from_str("a1\na2\na3\na4\na5\na6\n");
        let mut disp = WrapDisplay::new(&buf, cols(20, 8), 2);
        disp.scroll_to(&buf, 3);
        assert_eq!(disp.position_to_xy(&buf, Pos(0)), None);
        assert!(disp.position_to_xy(&buf, Pos(7)).is_some());
        assert_eq!(disp.position_to_xy(&buf, Pos(15)), None);
    }

    #[test]
    fn test_line_and_column_with_absolute_tracking() {
        let mut buf = RopeBuffer::from_str("aaaaaaaaaa bbbbb\nsecond\nthird\n");
        let mut disp = WrapDisplay::new(&buf, cols(10, 8), 2);
        assert_eq!(disp.line_and_column(&buf, Pos(12)), None, "tracking off");

        disp.enable_absolute_lines(&buf);
        // 'b' at pos 12 is on wrapped row 1 but absolute line 1, col 12
        assert_eq!(disp.line_and_column(&buf, Pos(12)), Some((1, 12)));

        // scroll past the wrapped line: absolute numbering skips it
        disp.scroll_to(&buf, 3);
        let first = disp.first_visible_char();
        assert_eq!(buf.slice_chars(first, first + 6), "second");
        assert_eq!(disp.line_and_column(&buf, Pos(24)), Some((3, 0)));

        // an edit before the window keeps the absolute count in step
        let edit = buf.insert(Pos(0), "zero\n");
        disp.apply(&buf, &edit, None);
        assert_eq!(disp.line_and_column(&buf, disp.first_visible_char()), Some((3, 0)));
    }

    #[test]
    fn test_line_and_column_without_wrap() {
        let buf = RopeBuffer::from_str("ab\tc\ndef");
        let disp = WrapDisplay::without_wrapping(&buf, cols(40, 4), 3);
        assert_eq!(disp.line_and_column(&buf, Pos(3)), Some((1, 4)));
        assert_eq!(disp.line_and_column(&buf, Pos(6)), Some((2, 1)));
    }

    #[test]
    fn test_non_wrap_mode_uses_real_lines() {
        let mut buf = RopeBuffer::from_str("a long line that would wrap at ten\nshort\n");
        let mut disp = WrapDisplay::without_wrapping(&buf, cols(10, 8), 3);
        assert_eq!(starts(&disp), vec![Some(0), Some(35), Some(41)]);
        assert_eq!(disp.buffer_line_count(), 2);

        let edit = buf.insert(Pos(0), "pre\n");
        let out = disp.apply(&buf, &edit, None);
        assert!(!out.scrolled);
        assert_eq!(starts(&disp), vec![Some(0), Some(4), Some(39)]);
        assert_monotonic(&disp);
    }

    #[test]
    fn test_two_phase_premeasure_matches_single_phase() {
        // With a fixed-width pixel policy both protocols are legal and
        // must agree.
        use crate::policy::FixedMetrics;
        use std::sync::Arc;

        let text = "lorem ipsum dolor sit amet consectetur\nadipiscing elit sed do\n";
        let policy = || WrapPolicy::pixels(70, 8, Arc::new(FixedMetrics::new(7))).unwrap();

        let mut buf_a = RopeBuffer::from_str(text);
        let mut disp_a = WrapDisplay::new(&buf_a, policy(), 8);
        let mut buf_b = RopeBuffer::from_str(text);
        let mut disp_b = WrapDisplay::new(&buf_b, policy(), 8);
        assert_eq!(starts(&disp_a), starts(&disp_b));

        // single-phase
        let edit = buf_a.delete(Pos(6), Pos(18));
        disp_a.apply(&buf_a, &edit, None);

        // two-phase: measure before the mutation, pass the value through
        let pre = disp_b.measure_deleted_lines(&buf_b, Pos(6), 12);
        let edit = buf_b.delete(Pos(6), Pos(18));
        disp_b.apply(&buf_b, &edit, Some(pre));

        assert_eq!(starts(&disp_a), starts(&disp_b));
        assert_eq!(disp_a.last_visible_char(), disp_b.last_visible_char());
        assert_eq!(disp_a.buffer_line_count(), disp_b.buffer_line_count());
    }

    #[test]
    fn test_vis_line_length_excludes_wrap_terminator() {
        let buf = RopeBuffer::from_str("aaaaaaaaaa bbbbb\n");
        let disp = WrapDisplay::new(&buf, cols(10, 8), 3);
        // row 0 is "aaaaaaaaaa": ten chars, the space is invisible
        assert_eq!(disp.vis_line_length(&buf, 0).unwrap(), 10);
        assert_eq!(disp.vis_line_length(&buf, 1).unwrap(), 5);
        assert!(disp.vis_line_length(&buf, 7).is_err());
    }

    #[test]
    fn test_huge_paste_then_full_delete() {
        let mut buf = RopeBuffer::from_str("seed\n");
        let mut disp = WrapDisplay::new(&buf, cols(12, 8), 5);

        let paste = "word ".repeat(200);
        let edit = buf.insert(Pos(0), &paste);
        disp.apply(&buf, &edit, None);
        let mut scratch = disp.clone();
        scratch.recompute(&buf);
        assert_eq!(starts(&disp), starts(&scratch));

        let edit = buf.delete(Pos(0), buf.len());
        disp.apply(&buf, &edit, None);
        let mut scratch = disp.clone();
        scratch.recompute(&buf);
        assert_eq!(starts(&disp), starts(&scratch));
        assert_eq!(disp.buffer_line_count(), 0);
        assert_monotonic(&disp);
    }
}
