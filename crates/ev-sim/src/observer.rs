//! Run observer trait for data collection and diagnostics.

use ev_flow::SpawnEvent;

use crate::result::RunMetrics;

/// Callbacks invoked by [`RunOrchestrator`][crate::RunOrchestrator] at key
/// points of a run.
///
/// All methods have default no-op implementations so implementors only need
/// to override what they care about.
pub trait RunObserver {
    /// Called once after immediate agents are placed, before the first step.
    fn on_run_start(&mut self, _index: usize, _seed: u64, _expected_agents: u64) {}

    /// Called for every agent a flow source places.
    fn on_spawn(&mut self, _event: &SpawnEvent) {}

    /// Called after every engine step.
    fn on_step(&mut self, _iteration: u64, _time: f64, _active: usize) {}

    /// Called after a trajectory frame was written.
    fn on_frame(&mut self, _frame: u64, _time: f64) {}

    /// Called once with the final metrics of a successful run.
    fn on_run_end(&mut self, _metrics: &RunMetrics) {}
}

/// A [`RunObserver`] that does nothing.
pub struct NoopObserver;

impl RunObserver for NoopObserver {}
