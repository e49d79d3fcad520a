use thiserror::Error;

use ev_core::RunId;
use ev_output::OutputError;
use ev_sim::{RunStage, SimError};

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Never submitted, or purged after the retention window.
    #[error("unknown simulation {0}")]
    UnknownRun(RunId),

    #[error("simulation {run} has not finished (stage {stage})")]
    NotReady { run: RunId, stage: RunStage },

    #[error("simulation {run} failed: {message}")]
    RunFailed { run: RunId, message: String },

    #[error("no trajectory available for seed {seed} of simulation {run}")]
    NoArtifact { run: RunId, seed: u64 },

    /// The request was rejected before it was queued.
    #[error("invalid request: {0}")]
    Invalid(#[from] SimError),

    #[error(transparent)]
    Output(#[from] OutputError),

    #[error("cannot start service pool: {0}")]
    Pool(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
