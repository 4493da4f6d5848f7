//! Forward wrap-counting scanner.
//!
//! [`count`] is the one routine that knows where visual lines begin and
//! end. Everything else in the engine — line-start cache maintenance,
//! coordinate mapping, scrolling, the incremental edit resync — is a thin
//! wrapper that calls it with different limits, instead of four or five
//! ad hoc scanners that would each have their own idea of where a line
//! breaks.

use crate::buffer::TextSource;
use crate::policy::{Margin, WrapPolicy};
use crate::pos::Pos;

/// Result of a forward counting scan.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CountResult {
    /// Position where counting ended. When counting lines, this is the
    /// start of the line `max_lines` lines beyond `start_pos`.
    pub pos: Pos,
    /// Number of visual line breaks counted.
    pub lines: usize,
    /// Start of the line in which counting ended.
    pub line_start: Pos,
    /// End position of the last line traversed.
    pub line_end: Pos,
}

/// Count forward from `start_pos` to either `max_pos` or `max_lines`,
/// whichever is reached first.
///
/// The scan deliberately continues beyond `max_pos` to the end of the
/// line containing it: characters after `max_pos` can still pull a word
/// wrap back before it, so stopping exactly at the limit would report a
/// boundary that the full layout would never produce.
///
/// A wrap point consumes exactly one whitespace character (tab or space)
/// as an invisible line terminator. A line with no whitespace breaks at
/// the margin, mid-word. Tabs expand relative to the current column.
///
/// `buf` may be a temporary copy rather than the live buffer; the resync
/// uses that to lay out pre-edit text that no longer exists.
#[must_use]
pub fn count(
    buf: &dyn TextSource,
    policy: &WrapPolicy,
    start_pos: Pos,
    max_pos: Pos,
    max_lines: usize,
    start_is_line_start: bool,
) -> CountResult {
    let (count_pixels, wrap_margin, max_width) = match policy.margin() {
        Margin::Columns(m) => (false, *m, u32::MAX),
        Margin::Pixels { width, .. } => (true, usize::MAX, *width),
    };

    let mut line_start = if start_is_line_start {
        start_pos
    } else {
        start_of_line(buf, policy, start_pos)
    };

    let buf_end = buf.len();
    let mut n_lines = 0usize;
    let mut col = 0usize;
    let mut width = 0u32;

    let mut p = line_start;
    while p < buf_end {
        let Some(ch) = buf.char_at(p) else { break };

        // A real newline counts a line and resets the accumulators;
        // anything else advances the column (and pixel) position.
        if ch == '\n' {
            if p >= max_pos {
                return CountResult {
                    pos: max_pos,
                    lines: n_lines,
                    line_start,
                    line_end: max_pos,
                };
            }

            n_lines += 1;

            if n_lines >= max_lines {
                return CountResult {
                    pos: p + 1,
                    lines: n_lines,
                    line_start: p + 1,
                    line_end: p,
                };
            }

            line_start = p + 1;
            col = 0;
            width = 0;
        } else {
            col += policy.col_width(ch, col);
            if count_pixels {
                width += policy.pixel_width(ch, col);
            }
        }

        // Past the margin: back up to the last whitespace on this line
        // and wrap there, or mid-word if there is none.
        if col > wrap_margin || width > max_width {
            let mut found_break = false;
            let mut break_at = p;
            let mut new_line_start = p.max(line_start + 1);

            let mut b = p;
            loop {
                let bch = buf.char_at(b);
                if bch == Some('\t') || bch == Some(' ') {
                    new_line_start = b + 1;
                    if count_pixels {
                        col = 0;
                        width = 0;
                        let mut i = b + 1;
                        while i < p + 1 {
                            if let Some(c) = buf.char_at(i) {
                                width += policy.pixel_width(c, col);
                            }
                            col += 1;
                            i += 1;
                        }
                    } else {
                        col = count_disp_cols(buf, policy, b + 1, p + 1);
                    }
                    found_break = true;
                    break_at = b;
                    break;
                }
                if b == line_start {
                    break;
                }
                b -= 1;
            }

            if !found_break {
                // no whitespace, just break at margin
                col = policy.col_width(ch, col);
                if count_pixels {
                    width = policy.pixel_width(ch, col);
                }
            }

            if p >= max_pos {
                let (lines, ls) = if max_pos < new_line_start {
                    (n_lines, line_start)
                } else {
                    (n_lines + 1, new_line_start)
                };
                return CountResult {
                    pos: max_pos,
                    lines,
                    line_start: ls,
                    line_end: max_pos,
                };
            }

            n_lines += 1;

            if n_lines >= max_lines {
                return if found_break {
                    CountResult {
                        pos: break_at + 1,
                        lines: n_lines,
                        line_start,
                        line_end: break_at,
                    }
                } else {
                    CountResult {
                        pos: p.max(line_start + 1),
                        lines: n_lines,
                        line_start,
                        line_end: p,
                    }
                };
            }

            line_start = new_line_start;
        }

        p += 1;
    }

    // reached end of buffer before reaching the position or line target
    CountResult {
        pos: buf_end,
        lines: n_lines,
        line_start,
        line_end: buf_end,
    }
}

/// Start of the visual line containing `pos`: the character after the
/// last wrap point, rather than after the last newline.
#[must_use]
pub fn start_of_line(buf: &dyn TextSource, policy: &WrapPolicy, pos: Pos) -> Pos {
    count(buf, policy, buf.line_start(pos), pos, usize::MAX, true).line_start
}

/// End of the visual line containing `pos`.
///
/// With wrapping, a line's end is the position past its last displayable
/// character; whitespace consumed as a wrap point is not displayable. A
/// line wrapped mid-word ends where the next line starts.
#[must_use]
pub fn end_of_line(
    buf: &dyn TextSource,
    policy: &WrapPolicy,
    pos: Pos,
    start_is_line_start: bool,
) -> Pos {
    if pos == buf.len() {
        return pos;
    }
    count(buf, policy, pos, buf.len(), 1, start_is_line_start).line_end
}

/// Both the end of the current visual line and the start of the next.
///
/// Deriving one from the other is error prone near the end of the buffer:
/// whether a trailing space is a wrap point or an ordinary character can
/// only be told by the scan that produced both values.
#[must_use]
pub fn find_line_end(
    buf: &dyn TextSource,
    policy: &WrapPolicy,
    start_pos: Pos,
    start_is_line_start: bool,
) -> (Pos, Pos) {
    let r = count(buf, policy, start_pos, buf.len(), 1, start_is_line_start);
    (r.line_end, r.pos)
}

/// Display columns spanned by `[from, to)`, counting from column zero
/// with tab expansion.
#[must_use]
pub fn count_disp_cols(buf: &dyn TextSource, policy: &WrapPolicy, from: Pos, to: Pos) -> usize {
    let mut col = 0usize;
    let mut p = from;
    while p < to {
        if let Some(ch) = buf.char_at(p) {
            col += policy.col_width(ch, col);
        }
        p += 1;
    }
    col
}
