//! Error types for softwrap.

use std::fmt;

/// Result type alias for softwrap operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for softwrap operations.
#[derive(Debug)]
pub enum Error {
    /// Tab distance must be at least one column.
    InvalidTabDistance(usize),
    /// Wrap margin must be at least one column or one pixel.
    InvalidMargin(usize),
    /// Requested visual row outside the viewport.
    RowOutOfRange { row: usize, rows: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTabDistance(d) => write!(f, "invalid tab distance: {d}"),
            Self::InvalidMargin(m) => write!(f, "invalid wrap margin: {m}"),
            Self::RowOutOfRange { row, rows } => {
                write!(f, "visual row {row} out of range for {rows}-row viewport")
            }
        }
    }
}

impl std::error::Error for Error {}
