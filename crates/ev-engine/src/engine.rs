//! Engine traits.
//!
//! # Lifecycle
//!
//! ```text
//! factory.create(walkable, model, dt, seed)
//!   → add_exit_stage / add_waypoint_stage   (ids handed out in call order)
//!   → add_journey(&[stage ids])             (fixed transitions in list order)
//!   → add_agent(...) *                      (before and between steps)
//!   → step() *
//! ```
//!
//! One engine instance belongs to exactly one run and is driven from one
//! thread, so the engine trait only needs `Send`.  Factories are shared by
//! every worker of a batch and must be `Send + Sync`.

use ev_core::{AgentId, JourneyId, ModelParameters, Point, Polygon, StageId};

use crate::agent::{AgentParameters, AgentSample};
use crate::sampling::{self, SampleCount, SamplingSpec};
use crate::{EngineResult, SamplingError};

/// Pedestrian dynamics for a single run.
pub trait DynamicsEngine: Send {
    /// Register an exit.  Agents whose current stage is an exit leave the
    /// simulation once they are inside its polygon.
    fn add_exit_stage(&mut self, area: &Polygon) -> EngineResult<StageId>;

    /// Register a waypoint.  Agents move on once within `radius` of `center`.
    fn add_waypoint_stage(&mut self, center: Point, radius: f64) -> EngineResult<StageId>;

    /// Register a journey visiting `stages` in order.
    fn add_journey(&mut self, stages: &[StageId]) -> EngineResult<JourneyId>;

    /// Add one agent.  Rejects positions outside the walkable area or
    /// overlapping an existing agent with [`crate::EngineError::Placement`].
    fn add_agent(&mut self, params: &AgentParameters) -> EngineResult<AgentId>;

    /// Advance the simulation by one time step.
    fn step(&mut self) -> EngineResult<()>;

    /// Simulated seconds since the first step.
    fn elapsed_time(&self) -> f64;

    /// Agents still in the simulation.
    fn active_agent_count(&self) -> usize;

    /// Completed `step()` calls.
    fn iteration_count(&self) -> u64;

    /// Step length in seconds.
    fn time_step(&self) -> f64;

    /// Current state of every active agent, ordered by id.
    fn agent_samples(&self) -> Vec<AgentSample>;

    /// The area agents may occupy.
    fn walkable_area(&self) -> &Polygon;

    /// Candidate positions inside `area` ∩ walkable area.
    fn sample_positions(
        &self,
        area: &Polygon,
        spec: &SamplingSpec,
        seed: u64,
    ) -> Result<Vec<Point>, SamplingError> {
        let regions = [area, self.walkable_area()];
        match spec.count {
            SampleCount::Number(n) => sampling::distribute_by_number(&regions, n, spec, seed),
            SampleCount::UntilFilled => sampling::distribute_until_filled(&regions, spec, seed),
        }
    }
}

/// Creates one engine per run.
pub trait EngineFactory: Send + Sync {
    type Engine: DynamicsEngine;

    fn create(
        &self,
        walkable: &Polygon,
        model: &ModelParameters,
        time_step: f64,
        seed: u64,
    ) -> EngineResult<Self::Engine>;
}
