//! `SimulationService`: a registry of submitted requests.
//!
//! Every request gets a [`RunId`] and a progress record at submission time.
//! Its batch runs on the service's own pool, so callers never block on a
//! simulation.  Terminal records are purged once the retention window has
//! elapsed; purging happens lazily on every lookup and can be triggered
//! explicitly with [`SimulationService::purge_expired`].

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, error, info};

use ev_config::Scenario;
use ev_core::RunId;
use ev_engine::EngineFactory;
use ev_output::{PageQuery, TrajectoryInfo, TrajectoryPage, TrajectoryReader};
use ev_routing::{CyclePolicy, Resolver};
use ev_sim::{
    run_batch, ProgressReporter, ProgressSnapshot, ProgressStore, ProgressSubscription, RunStage,
    ScenarioPlan,
};

use crate::record::{failure_message, FinishedJob, JobRecord};
use crate::{RunResults, ServiceError, ServiceResult};

/// How long terminal records are kept.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(300);

/// Requests executed concurrently.
pub const SERVICE_WORKERS: usize = 4;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ServiceConfig {
    pub workers:      usize,
    pub retention:    Duration,
    pub cycle_policy: CyclePolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            workers:      SERVICE_WORKERS,
            retention:    DEFAULT_RETENTION,
            cycle_policy: CyclePolicy::Reject,
        }
    }
}

type Jobs = Arc<RwLock<FxHashMap<RunId, JobRecord>>>;

pub struct SimulationService<F: EngineFactory + 'static> {
    factory:   Arc<F>,
    pool:      rayon::ThreadPool,
    resolver:  Resolver,
    retention: Duration,
    progress:  ProgressStore,
    jobs:      Jobs,
}

impl<F: EngineFactory + 'static> SimulationService<F> {
    pub fn new(factory: F) -> ServiceResult<Self> {
        Self::with_config(factory, ServiceConfig::default())
    }

    pub fn with_config(factory: F, config: ServiceConfig) -> ServiceResult<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers.max(1))
            .thread_name(|i| format!("ev-service-{i}"))
            .build()
            .map_err(|e| ServiceError::Pool(e.to_string()))?;
        Ok(Self {
            factory: Arc::new(factory),
            pool,
            resolver: Resolver::new(config.cycle_policy),
            retention: config.retention,
            progress: ProgressStore::new(),
            jobs: Arc::default(),
        })
    }

    // ── Submission ────────────────────────────────────────────────────────

    /// Validate `scenario`, resolve its routing and queue it.
    ///
    /// Configuration and routing errors are returned here; nothing is
    /// registered for a rejected request.
    pub fn submit(&self, scenario: &Scenario) -> ServiceResult<RunId> {
        let plan = ScenarioPlan::from_scenario(scenario, &self.resolver)?;
        Ok(self.submit_plan(plan))
    }

    /// Queue an already resolved plan.
    pub fn submit_plan(&self, plan: ScenarioPlan) -> RunId {
        self.purge_expired();
        let run_id = RunId::new_v4();
        self.jobs.write().insert(run_id, JobRecord::Running);
        self.progress.open(run_id, "Simulation queued...");
        info!(%run_id, runs = plan.runs(), "simulation queued");

        let reporter = ProgressReporter::new(self.progress.clone(), run_id);
        let factory = Arc::clone(&self.factory);
        let jobs = Arc::clone(&self.jobs);
        self.pool.spawn(move || execute(run_id, &plan, factory.as_ref(), &reporter, &jobs));
        run_id
    }

    // ── Lookups ───────────────────────────────────────────────────────────

    pub fn progress(&self, run_id: RunId) -> Option<ProgressSnapshot> {
        self.purge_expired();
        self.progress.get(run_id)
    }

    pub fn subscribe(&self, run_id: RunId) -> ProgressSubscription {
        self.purge_expired();
        self.progress.subscribe(run_id)
    }

    /// Results of a completed request.
    pub fn results(&self, run_id: RunId) -> ServiceResult<RunResults> {
        self.purge_expired();
        match self.jobs.read().get(&run_id) {
            Some(JobRecord::Finished(job)) => Ok(job.results.clone()),
            Some(JobRecord::Failed(message)) => Err(ServiceError::RunFailed { run: run_id, message: message.clone() }),
            Some(JobRecord::Running) => Err(self.not_ready(run_id)),
            None => Err(ServiceError::UnknownRun(run_id)),
        }
    }

    /// Seeds of the successful runs of a completed request.
    pub fn seeds(&self, run_id: RunId) -> ServiceResult<Vec<u64>> {
        self.results(run_id).map(|r| r.seeds())
    }

    /// One page of the primary run's trajectory.
    pub fn trajectory_page(&self, run_id: RunId, query: &PageQuery) -> ServiceResult<TrajectoryPage> {
        self.with_primary(run_id, |reader| Ok(reader.page(query)?))
    }

    /// Frame, agent and row counts of the primary run's trajectory.
    pub fn trajectory_info(&self, run_id: RunId) -> ServiceResult<TrajectoryInfo> {
        self.with_primary(run_id, |reader| Ok(reader.info()?))
    }

    /// Claim the trajectory of `seed`.  The file is no longer managed by the
    /// service and survives purging; the caller owns it.
    pub fn take_artifact(&self, run_id: RunId, seed: u64) -> ServiceResult<PathBuf> {
        self.purge_expired();
        let artifact = match self.jobs.write().get_mut(&run_id) {
            Some(JobRecord::Finished(job)) => job
                .artifacts
                .remove(&seed)
                .ok_or(ServiceError::NoArtifact { run: run_id, seed })?,
            Some(JobRecord::Failed(message)) => {
                return Err(ServiceError::RunFailed { run: run_id, message: message.clone() });
            }
            Some(JobRecord::Running) => return Err(self.not_ready(run_id)),
            None => return Err(ServiceError::UnknownRun(run_id)),
        };
        let path = artifact.keep()?;
        info!(%run_id, seed, path = %path.display(), "trajectory claimed");
        Ok(path)
    }

    // ── Retention ─────────────────────────────────────────────────────────

    /// Drop every terminal record older than the retention window.  Returns
    /// how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now())
    }

    /// [`purge_expired`](Self::purge_expired) with an explicit clock.
    pub fn purge_expired_at(&self, now: Instant) -> usize {
        let expired = self.progress.expired(self.retention, now);
        if expired.is_empty() {
            return 0;
        }
        let mut jobs = self.jobs.write();
        for run_id in &expired {
            // Dropping the record deletes its remaining artifacts.
            jobs.remove(run_id);
            self.progress.remove(*run_id);
            debug!(%run_id, "simulation record purged");
        }
        expired.len()
    }

    /// Requests currently known to the service.
    pub fn len(&self) -> usize {
        self.jobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ── Helpers ───────────────────────────────────────────────────────────

    fn not_ready(&self, run_id: RunId) -> ServiceError {
        let stage = self.progress.get(run_id).map_or(RunStage::Queued, |s| s.stage);
        ServiceError::NotReady { run: run_id, stage }
    }

    fn with_primary<T>(
        &self,
        run_id: RunId,
        f: impl FnOnce(&TrajectoryReader) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        self.purge_expired();
        let jobs = self.jobs.read();
        match jobs.get(&run_id) {
            Some(JobRecord::Finished(job)) => {
                let seed = job.results.primary_seed;
                let artifact = job.artifacts.get(&seed).ok_or(ServiceError::NoArtifact { run: run_id, seed })?;
                f(&artifact.reader()?)
            }
            Some(JobRecord::Failed(message)) => Err(ServiceError::RunFailed { run: run_id, message: message.clone() }),
            Some(JobRecord::Running) => Err(self.not_ready(run_id)),
            None => Err(ServiceError::UnknownRun(run_id)),
        }
    }
}

/// Body of one pool job.  Stores the outcome, then publishes the terminal
/// progress update.
fn execute<F: EngineFactory>(
    run_id: RunId,
    plan: &ScenarioPlan,
    factory: &F,
    reporter: &ProgressReporter,
    jobs: &Jobs,
) {
    info!(%run_id, "simulation started");
    match run_batch(plan, factory, reporter) {
        Ok(outcome) => {
            let summary = outcome.summary();
            match FinishedJob::from_outcome(run_id, outcome, plan.params.keep_artifacts) {
                Some(job) => {
                    jobs.write().insert(run_id, JobRecord::Finished(job));
                    info!(%run_id, %summary, "simulation completed");
                    reporter.complete(&summary);
                }
                None => {
                    let message = "All simulations failed".to_owned();
                    jobs.write().insert(run_id, JobRecord::Failed(message.clone()));
                    reporter.fail(&message);
                }
            }
        }
        Err(e) => {
            let message = failure_message(&e);
            error!(%run_id, error = %message, "simulation failed");
            jobs.write().insert(run_id, JobRecord::Failed(message.clone()));
            reporter.fail(&message);
        }
    }
}
