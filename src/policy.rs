//! Wrap policy: where visual lines are allowed to end.
//!
//! A [`WrapPolicy`] is immutable per recalculation. It fixes the tab
//! distance and the wrap margin, which is expressed either as a column
//! count or as a pixel width combined with a [`GlyphMetrics`] source for
//! per-character advances. Column margins are the cheap common case;
//! pixel margins exist for proportional rendering and are the only case
//! that forces the two-phase (pre-delete) measurement protocol.

use crate::error::{Error, Result};
use std::fmt;
use std::sync::Arc;
use unicode_width::UnicodeWidthChar;

/// Per-character pixel advances for pixel-margin wrapping.
///
/// `column` is the display column the character starts at, after tab
/// expansion; implementations may ignore it. Tabs are never passed here:
/// the policy expands them to columns first and charges the space
/// advance per column.
pub trait GlyphMetrics: Send + Sync {
    /// Pixel advance of `ch` when drawn starting at `column`.
    fn width(&self, ch: char, column: usize) -> u32;

    /// True if every character renders at one fixed advance per display
    /// column. Fixed metrics allow the deleted-line count of an edit to
    /// be reconstructed after the fact, so the single-phase resync stays
    /// usable even with a pixel margin.
    fn is_fixed(&self) -> bool {
        false
    }
}

/// Fixed-advance font: every display column is `cell_px` wide.
#[derive(Clone, Copy, Debug)]
pub struct FixedMetrics {
    cell_px: u32,
}

impl FixedMetrics {
    /// Create metrics with the given pixels-per-column advance.
    #[must_use]
    pub fn new(cell_px: u32) -> Self {
        Self { cell_px: cell_px.max(1) }
    }
}

impl GlyphMetrics for FixedMetrics {
    fn width(&self, ch: char, _column: usize) -> u32 {
        self.cell_px * glyph_cols(ch) as u32
    }

    fn is_fixed(&self) -> bool {
        true
    }
}

/// Terminal-style metrics: East Asian wide characters take two cells.
///
/// Not fixed-width in the sense of [`GlyphMetrics::is_fixed`] would allow,
/// strictly speaking, but every advance is derivable from the character
/// alone, so post-edit reconstruction is still exact.
#[derive(Clone, Copy, Debug)]
pub struct UnicodeMetrics {
    cell_px: u32,
}

impl UnicodeMetrics {
    /// Create metrics with the given pixels-per-cell advance.
    #[must_use]
    pub fn new(cell_px: u32) -> Self {
        Self { cell_px: cell_px.max(1) }
    }
}

impl GlyphMetrics for UnicodeMetrics {
    fn width(&self, ch: char, _column: usize) -> u32 {
        self.cell_px * glyph_cols(ch) as u32
    }

    fn is_fixed(&self) -> bool {
        true
    }
}

/// Display-column span of a single non-tab character.
#[must_use]
pub fn glyph_cols(ch: char) -> usize {
    if ch == '\n' {
        return 0;
    }
    UnicodeWidthChar::width(ch).unwrap_or(1).max(1)
}

/// Wrap margin: columns, or pixels with a width source.
#[derive(Clone)]
pub enum Margin {
    /// Break once a line exceeds this many display columns.
    Columns(usize),
    /// Break once a line exceeds this many pixels.
    Pixels {
        width: u32,
        metrics: Arc<dyn GlyphMetrics>,
    },
}

impl fmt::Debug for Margin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Columns(n) => f.debug_tuple("Columns").field(n).finish(),
            Self::Pixels { width, metrics } => f
                .debug_struct("Pixels")
                .field("width", width)
                .field("fixed", &metrics.is_fixed())
                .finish(),
        }
    }
}

/// Immutable per-recalculation wrap configuration.
#[derive(Clone, Debug)]
pub struct WrapPolicy {
    tab_dist: usize,
    margin: Margin,
}

impl WrapPolicy {
    /// Column-margin policy. `margin` and `tab_dist` must be nonzero.
    pub fn columns(margin: usize, tab_dist: usize) -> Result<Self> {
        if tab_dist == 0 {
            return Err(Error::InvalidTabDistance(tab_dist));
        }
        if margin == 0 {
            return Err(Error::InvalidMargin(margin));
        }
        Ok(Self {
            tab_dist,
            margin: Margin::Columns(margin),
        })
    }

    /// Pixel-margin policy. `width` and `tab_dist` must be nonzero.
    pub fn pixels(width: u32, tab_dist: usize, metrics: Arc<dyn GlyphMetrics>) -> Result<Self> {
        if tab_dist == 0 {
            return Err(Error::InvalidTabDistance(tab_dist));
        }
        if width == 0 {
            return Err(Error::InvalidMargin(width as usize));
        }
        Ok(Self {
            tab_dist,
            margin: Margin::Pixels { width, metrics },
        })
    }

    /// Tab distance in display columns.
    #[must_use]
    pub fn tab_dist(&self) -> usize {
        self.tab_dist
    }

    /// The configured margin.
    #[must_use]
    pub fn margin(&self) -> &Margin {
        &self.margin
    }

    /// Display-column width of `ch` when it starts at `column`.
    ///
    /// Tabs expand to the next multiple of the tab distance, relative to
    /// the current column, never a fixed span.
    #[must_use]
    pub fn col_width(&self, ch: char, column: usize) -> usize {
        if ch == '\t' {
            self.tab_dist - column % self.tab_dist
        } else {
            glyph_cols(ch)
        }
    }

    /// Pixel advance of `ch` at `column`. Only meaningful for pixel
    /// margins; column margins report zero.
    #[must_use]
    pub fn pixel_width(&self, ch: char, column: usize) -> u32 {
        match &self.margin {
            Margin::Columns(_) => 0,
            Margin::Pixels { metrics, .. } => {
                if ch == '\t' {
                    // charge the space advance once per expanded column
                    self.col_width(ch, column) as u32 * metrics.width(' ', column)
                } else {
                    metrics.width(ch, column)
                }
            }
        }
    }

    /// Horizontal advance of `ch` at `column` in the x-coordinate unit of
    /// this policy: columns for column margins, pixels otherwise.
    #[must_use]
    pub fn x_advance(&self, ch: char, column: usize) -> u32 {
        match &self.margin {
            Margin::Columns(_) => self.col_width(ch, column) as u32,
            Margin::Pixels { .. } => self.pixel_width(ch, column),
        }
    }

    /// True when edits require the pre-delete measurement pass.
    ///
    /// With a pixel margin over non-fixed metrics, the visual-line count
    /// of deleted text depends on rendering information that is gone
    /// once the buffer has been mutated, so it must be measured before
    /// the edit lands. Every other configuration can reconstruct it
    /// afterwards (usually more efficiently).
    #[must_use]
    pub fn needs_premeasure(&self) -> bool {
        match &self.margin {
            Margin::Columns(_) => false,
            Margin::Pixels { metrics, .. } => !metrics.is_fixed(),
        }
    }
}
