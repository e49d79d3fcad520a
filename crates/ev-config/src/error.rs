use thiserror::Error;

use ev_core::CoreError;

/// A configuration that must not be run.
///
/// Raised synchronously, before any run resource is allocated, and never
/// retried.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("at least one exit is required for simulation")]
    NoExits,

    #[error("{kind} {id:?} has invalid geometry: {source}")]
    Geometry {
        kind:   &'static str,
        id:     String,
        #[source]
        source: CoreError,
    },

    #[error("id {0:?} is used by more than one exit, distribution, or waypoint")]
    DuplicateId(String),

    #[error("distribution {id:?}: {reason}")]
    InvalidDistribution { id: String, reason: String },

    #[error("waypoint {id:?}: {reason}")]
    InvalidWaypoint { id: String, reason: String },

    #[error("journey id {0:?} is defined more than once")]
    DuplicateJourney(String),

    #[error("journey {0:?} has no stages")]
    EmptyJourney(String),

    #[error("journey {journey:?} references unknown stage {stage:?}")]
    UnknownStage { journey: String, stage: String },

    #[error("waypoint {0} not found in configuration")]
    UnknownRoutingWaypoint(String),

    #[error("routing at waypoint {waypoint:?} names unknown journey {journey:?}")]
    UnknownRoutingJourney { waypoint: String, journey: String },

    #[error("invalid target {target:?} in routing at waypoint {waypoint:?} for journey {journey:?}")]
    UnknownRoutingTarget { waypoint: String, journey: String, target: String },

    #[error(
        "percentage {percentage} for target {target:?} at waypoint {waypoint:?} \
         (journey {journey:?}) is outside (0, 100]"
    )]
    PercentageOutOfRange { waypoint: String, journey: String, target: String, percentage: f64 },

    #[error("percentages for waypoint {waypoint} in journey {journey} must sum to 100%, got {sum}%")]
    PercentageSum { waypoint: String, journey: String, sum: f64 },

    #[error(transparent)]
    Parameters(#[from] CoreError),
}

/// Errors produced while loading a configuration or scenario file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
