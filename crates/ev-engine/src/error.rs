use thiserror::Error;

use ev_core::{AgentId, JourneyId, Point, StageId};

/// Position sampling could not produce the requested positions.
#[derive(Debug, Error)]
pub enum SamplingError {
    #[error("sampling area has no room for agents (spacing {spacing} m, wall distance {wall_distance} m)")]
    EmptyArea { spacing: f64, wall_distance: f64 },

    #[error("only {placed} of {requested} agents fit into the area")]
    TooCrowded { placed: usize, requested: usize },
}

/// Errors raised by a dynamics engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cannot place agent at {position}: {reason}")]
    Placement { position: Point, reason: &'static str },

    #[error("unknown stage {0}")]
    UnknownStage(StageId),

    #[error("unknown journey {0}")]
    UnknownJourney(JourneyId),

    #[error("stage {stage} is not part of journey {journey}")]
    StageNotInJourney { journey: JourneyId, stage: StageId },

    #[error("journey needs at least one stage")]
    EmptyJourney,

    #[error("invalid stage geometry: {0}")]
    Geometry(String),

    #[error("non-finite state for agent {agent} at iteration {iteration}")]
    Numerical { agent: AgentId, iteration: u64 },

    #[error("engine creation failed: {0}")]
    Create(String),

    #[error(transparent)]
    Sampling(#[from] SamplingError),
}

pub type EngineResult<T> = Result<T, EngineError>;
