//! Multi-run coordinator.
//!
//! Runs `number_of_simulations` seeds of one plan on a bounded rayon pool.
//! Each run is its own failure domain: an error or panic is recorded for
//! that run and its siblings carry on.
//!
//! ```text
//! workers  = min(R, available_parallelism, MAX_WORKERS)
//! seed(i)  = base_seed + i
//! outcome  = successes sorted by index, failures, first run to complete
//! error    = only when no run succeeded
//! ```

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread;

use tracing::{error, info};

use ev_engine::EngineFactory;

use crate::progress::{NoopProgress, ProgressSink, RunStage};
use crate::result::RunResult;
use crate::{BatchError, RunOrchestrator, ScenarioPlan, SimError, SimResult};

/// Hard cap on concurrent runs per batch.
pub const MAX_WORKERS: usize = 8;

/// Workers used for a batch of `runs`.
pub fn worker_count(runs: usize) -> usize {
    let cpus = thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    runs.min(cpus).min(MAX_WORKERS).max(1)
}

/// A run that did not produce a result.
#[derive(Debug)]
pub struct RunFailure {
    pub index: usize,
    pub seed:  u64,
    pub error: SimError,
}

/// Everything a batch produced.
#[derive(Debug)]
pub struct BatchOutcome {
    /// Successful runs, sorted by index.
    pub runs:            Vec<RunResult>,
    pub failures:        Vec<RunFailure>,
    /// Index of the first run to finish successfully, in completion order.
    pub first_completed: Option<usize>,
    pub requested:       usize,
}

impl BatchOutcome {
    /// The successful run with the lowest index.
    pub fn primary(&self) -> Option<&RunResult> {
        self.runs.first()
    }

    pub fn succeeded(&self) -> usize {
        self.runs.len()
    }

    /// Seeds of the successful runs, in index order.
    pub fn seeds(&self) -> Vec<u64> {
        self.runs.iter().map(RunResult::seed).collect()
    }

    /// Message for the terminal progress update.
    pub fn summary(&self) -> String {
        format!("Completed {}/{} simulations successfully", self.succeeded(), self.requested)
    }

    fn collect(
        mut runs: Vec<RunResult>,
        mut failures: Vec<RunFailure>,
        first_completed: Option<usize>,
        requested: usize,
    ) -> Result<Self, BatchError> {
        if runs.is_empty() {
            failures.sort_by_key(|f| f.index);
            return Err(BatchError::AllRunsFailed { failures });
        }
        runs.sort_by_key(RunResult::index);
        failures.sort_by_key(|f| f.index);
        Ok(Self { runs, failures, first_completed, requested })
    }
}

/// Run every seed of `plan`.
///
/// A single-run batch executes on the calling thread and reports its
/// detailed progress to `sink`.  Larger batches report one step per finished
/// run (`30 + 60 · k / R`).  Neither reports a terminal stage.
pub fn run_batch<F: EngineFactory>(
    plan: &ScenarioPlan,
    factory: &F,
    sink: &dyn ProgressSink,
) -> Result<BatchOutcome, BatchError> {
    let runs = plan.runs().max(1);

    if runs == 1 {
        let orchestrator = RunOrchestrator::new(plan, factory, 0);
        let seed = orchestrator.seed();
        return match guarded(0, || orchestrator.execute(sink)) {
            Ok(result) => BatchOutcome::collect(vec![result], Vec::new(), Some(0), 1),
            Err(error) => {
                error!(run = 0, seed, %error, "run failed");
                BatchOutcome::collect(Vec::new(), vec![RunFailure { index: 0, seed, error }], None, 1)
            }
        };
    }

    let workers = worker_count(runs);
    info!(runs, workers, base_seed = plan.params.base_seed, "starting batch");
    sink.report(RunStage::Setup, 0.0, "Initializing simulation...");
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("ev-run-{i}"))
        .build()
        .map_err(|e| BatchError::Pool(e.to_string()))?;
    sink.report(RunStage::Simulation, 30.0, &format!("Starting {runs} parallel simulations..."));

    let mut results = Vec::with_capacity(runs);
    let mut failures = Vec::new();
    let mut first_completed = None;

    pool.in_place_scope(|scope| {
        let (tx, rx) = mpsc::channel();
        for index in 0..runs {
            let tx = tx.clone();
            scope.spawn(move |_| {
                let result = guarded(index, || RunOrchestrator::new(plan, factory, index).execute(&NoopProgress));
                // The receiver lives until every run has reported.
                let _ = tx.send((index, result));
            });
        }
        drop(tx);

        for (done, (index, result)) in rx.iter().enumerate() {
            let done = done + 1;
            let progress = 30.0 + 60.0 * done as f64 / runs as f64;
            let seed = plan.params.seed_for(index);
            match result {
                Ok(result) => {
                    first_completed.get_or_insert(index);
                    results.push(result);
                    sink.report(
                        RunStage::Simulation,
                        progress,
                        &format!("Completed {done}/{runs} simulations (latest: seed {seed})"),
                    );
                }
                Err(error) => {
                    error!(run = index, seed, %error, "run failed");
                    failures.push(RunFailure { index, seed, error });
                    sink.report(
                        RunStage::Simulation,
                        progress,
                        &format!("Completed {done}/{runs} simulations ({} failed)", failures.len()),
                    );
                }
            }
        }
    });

    sink.report(RunStage::Finalization, 90.0, "Collecting results...");
    info!(succeeded = results.len(), failed = failures.len(), "batch finished");
    BatchOutcome::collect(results, failures, first_completed, runs)
}

/// Run `f`, turning a panic into [`SimError::Panicked`].
fn guarded<T>(index: usize, f: impl FnOnce() -> SimResult<T>) -> SimResult<T> {
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_owned());
        error!(run = index, %message, "run panicked");
        Err(SimError::Panicked(message))
    })
}
