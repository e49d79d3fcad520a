use thiserror::Error;

use ev_engine::{EngineError, SamplingError};

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error(
        "failed to spawn agent for flow source '{source_id}' at time {time:.2}s: all {attempts} spawn \
         positions are blocked. The spawn area is too crowded or blocked by other agents. Consider: \
         1) increasing the spawn area size, 2) reducing the spawn rate, 3) adding more spawn \
         positions, or 4) checking for obstacles in the spawn area"
    )]
    Exhausted { source_id: String, time: f64, attempts: usize },

    #[error("flow source '{0}' has no journey variant and no exit to head for")]
    NoTarget(String),

    #[error("flow source '{source_id}': {error}")]
    Sampling {
        source_id: String,
        #[source]
        error:     SamplingError,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type SpawnResult<T> = Result<T, SpawnError>;
