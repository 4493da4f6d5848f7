//! `softwrap` - Incremental soft-wrap line layout
//!
//! A continuous-wrap layout engine for text views: visual lines are
//! bounded by real newlines or computed wrap points, a per-row line-start
//! cache tracks the viewport, and edits update the cache incrementally in
//! time proportional to the changed region rather than the buffer.

// Crate-level lint configuration
#![warn(unsafe_code)]
#![allow(clippy::cast_possible_truncation)] // Intentional coordinate casts
#![allow(clippy::cast_sign_loss)] // Intentional after-range-check conversions
#![allow(clippy::cast_possible_wrap)] // Intentional signed-delta conversions
#![allow(clippy::module_name_repetitions)] // Allow buffer::RopeBuffer etc
#![allow(clippy::missing_errors_doc)] // Error conditions documented on the type
#![allow(clippy::missing_panics_doc)] // Non-test code propagates, never panics
#![allow(clippy::missing_const_for_fn)] // Many functions could be const, not critical
#![allow(clippy::doc_markdown)] // Allow technical names without backticks
#![allow(clippy::collapsible_if)] // Sometimes nested ifs are clearer
#![allow(clippy::cast_lossless)] // as casts are fine for primitive widening
#![allow(clippy::items_after_statements)] // Common pattern in tests
#![allow(clippy::inherent_to_string)] // to_string methods are convenient
#![allow(clippy::similar_names)] // line_start / line_starts are both apt

pub mod buffer;
pub mod counter;
pub mod display;
pub mod edit;
pub mod error;
pub mod policy;
pub mod pos;

// Re-export core types at crate root
pub use buffer::{CharBuffer, RopeBuffer, TextSource};
pub use counter::CountResult;
pub use display::{Outcome, PositionKind, WrapDisplay};
pub use edit::{Edit, PreDeleteMeasure};
pub use error::{Error, Result};
pub use policy::{FixedMetrics, GlyphMetrics, Margin, UnicodeMetrics, WrapPolicy};
pub use pos::Pos;
