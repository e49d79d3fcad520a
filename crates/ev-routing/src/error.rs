//! Routing error type.

use thiserror::Error;

/// Errors produced by `ev-routing`.
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("routing for journey {journey:?} loops back: {}", path.join(" → "))]
    Cycle { journey: String, path: Vec<String> },

    #[error("routing for journey {journey:?} is deeper than {depth} stages")]
    DepthExceeded { journey: String, depth: usize },

    #[error("cannot select from an empty variant set")]
    EmptyWeights,
}

pub type RoutingResult<T> = Result<T, RoutingError>;
