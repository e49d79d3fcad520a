//! Core error type.
//!
//! Sub-crates define their own error enums and wrap `CoreError` as one
//! variant via `#[from]` where core validation can fail inside them.

use thiserror::Error;

/// Errors produced by `ev-core` constructors and parameter checks.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("polygon needs at least 3 points, got {0}")]
    DegeneratePolygon(usize),

    #[error("coordinate {index} is not finite: ({x}, {y})")]
    NonFiniteCoordinate { index: usize, x: f64, y: f64 },

    #[error("invalid run parameter `{field}`: {reason}")]
    InvalidParameter { field: &'static str, reason: String },
}

/// Shorthand result type for `ev-core`.
pub type CoreResult<T> = Result<T, CoreError>;
