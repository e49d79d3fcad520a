//! What the service keeps per request.

use std::mem;

use rustc_hash::FxHashMap;
use serde::Serialize;
use tracing::debug;

use ev_core::RunId;
use ev_output::TrajectoryArtifact;
use ev_sim::{BatchError, BatchOutcome, RunMetrics};

/// A seed of the batch that produced no result.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FailedRun {
    pub index:   usize,
    pub seed:    u64,
    pub message: String,
}

/// Results of a finished request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RunResults {
    pub run_id:               RunId,
    /// Seed of the lowest-index successful run; its trajectory backs paging.
    pub primary_seed:         u64,
    pub primary:              RunMetrics,
    /// Every successful run, in index order.
    pub runs:                 Vec<RunMetrics>,
    pub failures:             Vec<FailedRun>,
    /// Seed of the first run to finish, in completion order.
    pub first_completed_seed: Option<u64>,
    pub requested:            usize,
    pub summary:              String,
}

impl RunResults {
    pub fn seeds(&self) -> Vec<u64> {
        self.runs.iter().map(|m| m.seed).collect()
    }
}

#[derive(Debug)]
pub(crate) struct FinishedJob {
    pub results:   RunResults,
    /// Retained trajectories keyed by seed.
    pub artifacts: FxHashMap<u64, TrajectoryArtifact>,
}

#[derive(Debug)]
pub(crate) enum JobRecord {
    Running,
    Finished(FinishedJob),
    Failed(String),
}

impl FinishedJob {
    /// Keep the primary run's artifact, and the others only if asked to.
    /// Dropped artifacts delete their files.
    pub fn from_outcome(run_id: RunId, mut outcome: BatchOutcome, keep_all: bool) -> Option<Self> {
        let summary = outcome.summary();
        let first_completed_seed = outcome
            .first_completed
            .and_then(|i| outcome.runs.iter().find(|r| r.index() == i).map(|r| r.seed()));
        let runs = mem::take(&mut outcome.runs);
        let primary_seed = runs.first()?.seed();

        let mut metrics = Vec::with_capacity(runs.len());
        let mut artifacts = FxHashMap::default();
        for result in runs {
            if keep_all || result.seed() == primary_seed {
                artifacts.insert(result.seed(), result.artifact);
            } else {
                debug!(%run_id, seed = result.seed(), "trajectory not retained");
            }
            metrics.push(result.metrics);
        }
        let failures = outcome
            .failures
            .iter()
            .map(|f| FailedRun { index: f.index, seed: f.seed, message: f.error.to_string() })
            .collect();
        let primary = metrics.first()?.clone();

        Some(Self {
            results: RunResults {
                run_id,
                primary_seed,
                primary,
                runs: metrics,
                failures,
                first_completed_seed,
                requested: outcome.requested,
                summary,
            },
            artifacts,
        })
    }
}

/// Message for a request whose batch produced nothing.  A single failed run
/// reports its own diagnostic.
pub(crate) fn failure_message(error: &BatchError) -> String {
    match error {
        BatchError::AllRunsFailed { failures } if failures.len() == 1 => failures[0].error.to_string(),
        other => other.to_string(),
    }
}
