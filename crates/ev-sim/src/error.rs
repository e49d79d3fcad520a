use thiserror::Error;

use ev_config::ValidationError;
use ev_engine::EngineError;
use ev_flow::SpawnError;
use ev_output::OutputError;
use ev_routing::RoutingError;

use crate::batch::RunFailure;

#[derive(Debug, Error)]
pub enum SimError {
    #[error(
        "failed to place agents in distribution '{source_id}': {reason}. This usually means the spawn \
         area is too small or crowded. Consider: 1) making the distribution area larger, 2) reducing \
         the number of agents, 3) increasing the distance between agents, or 4) checking for \
         obstacles in the area"
    )]
    Placement { source_id: String, reason: String },

    #[error("no exit available for agents of distribution '{0}'")]
    NoExit(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] ValidationError),

    #[error("routing error: {0}")]
    Routing(#[from] RoutingError),

    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error("trajectory output error: {0}")]
    Output(#[from] OutputError),

    #[error("run panicked: {0}")]
    Panicked(String),
}

pub type SimResult<T> = Result<T, SimError>;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("All simulations failed")]
    AllRunsFailed { failures: Vec<RunFailure> },

    #[error("cannot start worker pool: {0}")]
    Pool(String),
}
