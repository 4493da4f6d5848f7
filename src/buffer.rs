//! Text source abstraction and buffer collaborators.
//!
//! The layout engine never owns text. It reads characters through the
//! [`TextSource`] capability trait and receives mutations as [`Edit`]
//! records. Two implementations are provided:
//!
//! - [`RopeBuffer`]: rope-backed storage using the `ropey` crate, the
//!   collaborator a real editor would attach to a display.
//! - [`CharBuffer`]: a flat `Vec<char>` buffer. The engine uses it
//!   internally to reconstruct the pre-edit text of an edited region, and
//!   tests use it directly.
//!
//! All indices are character offsets, never bytes.

use crate::edit::Edit;
use crate::pos::Pos;
use ropey::Rope;

/// Read-only character access needed by the layout engine.
///
/// `line_start`/`line_end` work on real newlines only; wrapped
/// (visual) line boundaries are the engine's job, not the buffer's.
pub trait TextSource {
    /// Number of characters in the buffer.
    fn len(&self) -> Pos;

    /// Character at `pos`, or `None` past the end.
    fn char_at(&self, pos: Pos) -> Option<char>;

    /// True if the buffer holds no characters.
    fn is_empty(&self) -> bool {
        self.len() == Pos::ZERO
    }

    /// Start of the real (newline-delimited) line containing `pos`:
    /// the position just after the previous `'\n'`, or the buffer start.
    fn line_start(&self, pos: Pos) -> Pos {
        let mut p = pos.min(self.len());
        while p > Pos::ZERO {
            if self.char_at(p - 1) == Some('\n') {
                return p;
            }
            p -= 1;
        }
        Pos::ZERO
    }

    /// End of the real line containing `pos`: the position of the next
    /// `'\n'` at or after `pos`, or the buffer length.
    fn line_end(&self, pos: Pos) -> Pos {
        let len = self.len();
        let mut p = pos.min(len);
        while p < len {
            if self.char_at(p) == Some('\n') {
                return p;
            }
            p += 1;
        }
        len
    }

    /// Number of `'\n'` characters in `[start, end)`.
    fn count_newlines(&self, start: Pos, end: Pos) -> usize {
        let end = end.min(self.len());
        let mut n = 0;
        let mut p = start;
        while p < end {
            if self.char_at(p) == Some('\n') {
                n += 1;
            }
            p += 1;
        }
        n
    }

    /// Copy the characters in `[start, end)` into a `String`.
    fn slice_chars(&self, start: Pos, end: Pos) -> String {
        let end = end.min(self.len());
        let mut s = String::with_capacity(end.get().saturating_sub(start.get()));
        let mut p = start;
        while p < end {
            if let Some(ch) = self.char_at(p) {
                s.push(ch);
            }
            p += 1;
        }
        s
    }
}

/// Count `'\n'` characters in a string of deleted text.
#[must_use]
pub fn count_newlines(text: &str) -> usize {
    text.chars().filter(|&c| c == '\n').count()
}

/// Rope-backed text buffer.
///
/// Mutations return the [`Edit`] record the display's `apply` expects,
/// including the deleted text the incremental resync needs to
/// reconstruct the pre-edit layout.
#[derive(Clone, Debug, Default)]
pub struct RopeBuffer {
    rope: Rope,
}

impl RopeBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self { rope: Rope::new() }
    }

    /// Create a buffer from initial text.
    #[must_use]
    pub fn from_str(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
        }
    }

    /// Insert `text` at `pos` (clamped to the buffer length).
    pub fn insert(&mut self, pos: Pos, text: &str) -> Edit {
        let at = pos.get().min(self.rope.len_chars());
        self.rope.insert(at, text);
        Edit {
            pos: Pos(at),
            inserted: text.chars().count(),
            deleted: String::new(),
        }
    }

    /// Delete the characters in `[start, end)`.
    pub fn delete(&mut self, start: Pos, end: Pos) -> Edit {
        let len = self.rope.len_chars();
        let s = start.get().min(len);
        let e = end.get().min(len).max(s);
        let deleted: String = self.rope.slice(s..e).to_string();
        self.rope.remove(s..e);
        Edit {
            pos: Pos(s),
            inserted: 0,
            deleted,
        }
    }

    /// Replace the characters in `[start, end)` with `text`.
    pub fn replace(&mut self, start: Pos, end: Pos, text: &str) -> Edit {
        let len = self.rope.len_chars();
        let s = start.get().min(len);
        let e = end.get().min(len).max(s);
        let deleted: String = self.rope.slice(s..e).to_string();
        self.rope.remove(s..e);
        self.rope.insert(s, text);
        Edit {
            pos: Pos(s),
            inserted: text.chars().count(),
            deleted,
        }
    }

    /// Entire contents as a `String`.
    #[must_use]
    pub fn to_string(&self) -> String {
        self.rope.to_string()
    }
}

impl TextSource for RopeBuffer {
    fn len(&self) -> Pos {
        Pos(self.rope.len_chars())
    }

    fn char_at(&self, pos: Pos) -> Option<char> {
        if pos.get() < self.rope.len_chars() {
            Some(self.rope.char(pos.get()))
        } else {
            None
        }
    }

    fn line_start(&self, pos: Pos) -> Pos {
        let p = pos.get().min(self.rope.len_chars());
        let line = self.rope.char_to_line(p);
        Pos(self.rope.line_to_char(line))
    }

    fn line_end(&self, pos: Pos) -> Pos {
        let len = self.rope.len_chars();
        let p = pos.get().min(len);
        let line = self.rope.char_to_line(p);
        if line + 1 < self.rope.len_lines() {
            // line_to_char of the next line sits just past this line's '\n'
            Pos(self.rope.line_to_char(line + 1) - 1)
        } else {
            Pos(len)
        }
    }

    fn count_newlines(&self, start: Pos, end: Pos) -> usize {
        let len = self.rope.len_chars();
        let s = start.get().min(len);
        let e = end.get().min(len).max(s);
        self.rope.char_to_line(e) - self.rope.char_to_line(s)
    }

    fn slice_chars(&self, start: Pos, end: Pos) -> String {
        let len = self.rope.len_chars();
        let s = start.get().min(len);
        let e = end.get().min(len).max(s);
        self.rope.slice(s..e).to_string()
    }
}

/// Flat character buffer with O(1) indexing.
#[derive(Clone, Debug, Default)]
pub struct CharBuffer {
    chars: Vec<char>,
}

impl CharBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self { chars: Vec::new() }
    }

    /// Create a buffer from initial text.
    #[must_use]
    pub fn from_str(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
        }
    }

    /// Append text to the end.
    pub fn push_str(&mut self, text: &str) {
        self.chars.extend(text.chars());
    }
}

impl TextSource for CharBuffer {
    fn len(&self) -> Pos {
        Pos(self.chars.len())
    }

    fn char_at(&self, pos: Pos) -> Option<char> {
        self.chars.get(pos.get()).copied()
    }
}
