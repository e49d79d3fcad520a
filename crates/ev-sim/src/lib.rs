//! `ev-sim`: runs evacuation scenarios.
//!
//! # Crate layout
//!
//! | Module           | Contents                                                   |
//! |------------------|------------------------------------------------------------|
//! | [`plan`]         | `ScenarioPlan` (validated scenario + resolved routing)     |
//! | [`orchestrator`] | `RunOrchestrator`, one seeded run end to end               |
//! | [`batch`]        | `run_batch`, `BatchOutcome`, `RunFailure`                  |
//! | [`progress`]     | `RunStage`, `ProgressStore`, `ProgressSink`, subscriptions |
//! | [`observer`]     | `RunObserver` hooks, `NoopObserver`                        |
//! | [`result`]       | `RunResult`, `RunMetrics`, `EvacuationStatus`              |
//! | [`error`]        | `SimError`, `BatchError`, `SimResult<T>`                   |
//!
//! # Run loop
//!
//! ```text
//! setup      create artifact and engine, register exits, waypoints, journeys
//! config     count expected agents
//! agents     place immediate distributions, prepare flow sources
//! simulation while elapsed < max_time and (agents active or flow pending):
//!              ① flow scheduler injects due agents
//!              ② engine.step()
//!              ③ every nth iteration: write a trajectory frame
//!              ④ every max(1, planned/100) iterations: report progress
//! finalization status, metrics, trajectory counts
//! ```
//!
//! Terminal stages (`completed`, `failed`) are published by whoever owns the
//! result once it is stored, through [`ProgressReporter::complete`] and
//! [`ProgressReporter::fail`].  A reader that sees `completed` can therefore
//! always fetch the results.

pub mod batch;
pub mod error;
pub mod observer;
pub mod orchestrator;
pub mod plan;
pub mod progress;
pub mod result;

#[cfg(test)]
mod tests;

pub use batch::{run_batch, worker_count, BatchOutcome, RunFailure, MAX_WORKERS};
pub use error::{BatchError, SimError, SimResult};
pub use observer::{NoopObserver, RunObserver};
pub use orchestrator::RunOrchestrator;
pub use plan::ScenarioPlan;
pub use progress::{
    simulation_progress, NoopProgress, ProgressEvent, ProgressReporter, ProgressSink,
    ProgressSnapshot, ProgressStore, ProgressSubscription, RunStage, NOT_FOUND_GRACE_POLLS,
};
pub use result::{EvacuationStatus, RunMetrics, RunResult};
