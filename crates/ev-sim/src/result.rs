//! Run outcome types.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use ev_core::ModelType;
use ev_output::TrajectoryArtifact;

/// How a run ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvacuationStatus {
    /// Every agent reached an exit.
    Completed,
    /// `max_simulation_time` elapsed with agents remaining.
    TimeoutTime,
    /// The iteration backstop stopped the run with agents remaining.
    TimeoutIterations,
}

impl EvacuationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            EvacuationStatus::Completed => "completed",
            EvacuationStatus::TimeoutTime => "timeout_time",
            EvacuationStatus::TimeoutIterations => "timeout_iterations",
        }
    }

    #[inline]
    pub fn is_success(self) -> bool {
        self == EvacuationStatus::Completed
    }
}

impl fmt::Display for EvacuationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Everything a client may ask about a finished run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunMetrics {
    pub index:               usize,
    pub seed:                u64,
    pub status:              EvacuationStatus,
    pub success:             bool,
    pub message:             String,
    /// Wall-clock seconds spent in the step loop.
    pub execution_time:      f64,
    /// Simulated seconds when the run stopped.
    pub evacuation_time:     f64,
    pub iterations:          u64,
    /// Immediate agents plus flow agents actually spawned.
    pub total_agents:        u64,
    pub agents_evacuated:    u64,
    pub agents_remaining:    u64,
    /// Radius of every agent, keyed by agent id.
    pub agent_radii:         BTreeMap<u64, f64>,
    pub total_frames:        u64,
    pub geometry_wkt:        String,
    pub model_type:          ModelType,
    pub max_simulation_time: f64,
}

/// A successful run: its metrics and its trajectory file.
#[derive(Debug)]
pub struct RunResult {
    pub metrics:  RunMetrics,
    /// Deleted on drop unless kept.
    pub artifact: TrajectoryArtifact,
}

impl RunResult {
    #[inline]
    pub fn index(&self) -> usize {
        self.metrics.index
    }

    #[inline]
    pub fn seed(&self) -> u64 {
        self.metrics.seed
    }
}
