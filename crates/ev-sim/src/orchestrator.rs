//! `RunOrchestrator`: one seeded run from engine creation to metrics.

use std::collections::BTreeMap;
use std::time::Instant;

use tracing::{debug, info, warn};

use ev_config::{Distribution, StageRef};
use ev_core::{JourneyId, SimRng, StageId};
use ev_engine::{
    AgentParameters, DynamicsEngine, EngineError, EngineFactory, SamplingError, IMMEDIATE_SAMPLING,
};
use ev_flow::{nearest_exit, ExitTarget, FlowScheduler, SpawnError, SpawnSource, VariantTarget};
use ev_output::{SqliteTrajectoryWriter, TrajectoryArtifact, TrajectoryWriter};
use ev_routing::allocate_static;

use crate::observer::{NoopObserver, RunObserver};
use crate::progress::{simulation_progress, ProgressSink, RunStage};
use crate::result::{EvacuationStatus, RunMetrics, RunResult};
use crate::{ScenarioPlan, SimError, SimResult};

/// Spread of the desired speed of routed immediate agents around `v0`.
const SPEED_STD_DEV: f64 = 0.26;
const MIN_SPEED: f64 = 0.1;
const MAX_SPEED: f64 = 2.0;

/// Stream offset of the per-distribution speed generators.
const SPEED_STREAM: u64 = 0x5eed_0000;

/// Slack on time comparisons against `max_simulation_time`.
const TIME_EPSILON: f64 = 1e-9;

/// Iteration cap for a run planned at `planned` ticks: 10% over, plus one.
/// Saturates for tiny time steps.
pub(crate) fn iteration_backstop(planned: u64) -> u64 {
    planned.saturating_add(planned / 10).saturating_add(1)
}

// ── Engine routes ─────────────────────────────────────────────────────────────

/// Engine handles for everything the configuration names.
struct EngineRoutes {
    /// One direct journey per exit, in exit order.
    exits:    Vec<ExitTarget>,
    /// `(journey, first stage)` per routing variant, `None` for a variant
    /// without engine stages.
    variants: Vec<Option<(JourneyId, StageId)>>,
}

impl EngineRoutes {
    fn register<E: DynamicsEngine + ?Sized>(engine: &mut E, plan: &ScenarioPlan) -> SimResult<Self> {
        let config = &plan.config;
        let exit_stages = config
            .exits
            .iter()
            .map(|e| engine.add_exit_stage(&e.area))
            .collect::<Result<Vec<_>, _>>()?;
        let waypoint_stages = config
            .waypoints
            .iter()
            .map(|w| engine.add_waypoint_stage(w.center, w.radius))
            .collect::<Result<Vec<_>, _>>()?;

        let mut exits = Vec::with_capacity(config.exits.len());
        for (exit, &stage) in config.exits.iter().zip(&exit_stages) {
            let journey = engine.add_journey(&[stage])?;
            exits.push(ExitTarget { area: exit.area.clone(), journey, stage });
        }

        let mut variants = Vec::with_capacity(plan.routing.variants().len());
        for variant in plan.routing.variants() {
            let stages: Vec<StageId> = variant
                .engine_stages()
                .filter_map(|s| match s {
                    StageRef::Exit(i) => Some(exit_stages[i]),
                    StageRef::Waypoint(i) => Some(waypoint_stages[i]),
                    StageRef::Distribution(_) => None,
                })
                .collect();
            let route = match stages.first() {
                Some(&first) => Some((engine.add_journey(&stages)?, first)),
                None => None,
            };
            variants.push(route);
        }
        debug!(exits = exits.len(), variants = variants.len(), "engine routes registered");
        Ok(Self { exits, variants })
    }

    /// Variants agents of source `dist` may follow.
    fn targets(&self, plan: &ScenarioPlan, dist: usize) -> Vec<VariantTarget> {
        let variants = plan.routing.variants();
        plan.routing
            .source_variant_indices(dist)
            .iter()
            .filter_map(|&v| {
                self.variants[v].map(|(journey, stage)| VariantTarget {
                    variant: v,
                    journey,
                    stage,
                    weight: variants[v].probability_weight,
                })
            })
            .collect()
    }
}

// ── RunOrchestrator ───────────────────────────────────────────────────────────

/// Drives one run of a [`ScenarioPlan`] with one seed.
pub struct RunOrchestrator<'a, F: EngineFactory> {
    plan:    &'a ScenarioPlan,
    factory: &'a F,
    index:   usize,
    seed:    u64,
}

impl<'a, F: EngineFactory> RunOrchestrator<'a, F> {
    /// Run `index` of the plan's batch, seeded with `base_seed + index`.
    pub fn new(plan: &'a ScenarioPlan, factory: &'a F, index: usize) -> Self {
        Self { plan, factory, index, seed: plan.params.seed_for(index) }
    }

    #[inline]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn execute(&self, sink: &dyn ProgressSink) -> SimResult<RunResult> {
        self.execute_observed(sink, &mut NoopObserver)
    }

    /// Run to completion, reporting progress up to the finalization stage.
    pub fn execute_observed(
        &self,
        sink: &dyn ProgressSink,
        observer: &mut dyn RunObserver,
    ) -> SimResult<RunResult> {
        let plan = self.plan;
        let params = &plan.params;
        info!(run = self.index, seed = self.seed, "run starting");

        // ── Setup ─────────────────────────────────────────────────────────
        sink.report(RunStage::Setup, 0.0, "Initializing simulation...");
        let artifact = TrajectoryArtifact::create_in(&params.artifact_root())?;
        let mut writer = SqliteTrajectoryWriter::create(artifact.path())?;

        sink.report(RunStage::Setup, 5.0, "Creating simulation model...");
        let mut engine = self.factory.create(&plan.walkable, &params.model, params.time_step, self.seed)?;

        sink.report(RunStage::Setup, 10.0, "Loading configuration...");
        let routes = EngineRoutes::register(&mut engine, plan)?;

        // ── Config ────────────────────────────────────────────────────────
        sink.report(RunStage::Config, 15.0, "Validating configuration...");
        let expected = plan.expected_agents();
        sink.report(RunStage::Config, 20.0, &format!("Initializing {expected} agents..."));

        // ── Agents ────────────────────────────────────────────────────────
        let mut radii = BTreeMap::new();
        let mut sources = Vec::new();
        let mut immediate = 0u64;
        for (index, dist) in plan.sources().iter().enumerate() {
            let targets = routes.targets(plan, index);
            if dist.is_flow() {
                match SpawnSource::prepare(index, dist, targets, &engine, self.dist_seed(index), index as u64) {
                    Ok(source) => sources.push(source),
                    Err(SpawnError::Sampling { error: SamplingError::EmptyArea { .. }, .. }) => {
                        warn!(source = %dist.id, "flow distribution has no room inside the walkable area, skipped");
                    }
                    Err(e) => return Err(e.into()),
                }
            } else {
                immediate += self.place_immediate(&mut engine, &routes, index, dist, targets, &mut radii)?;
            }
        }
        let mut scheduler = FlowScheduler::new(sources, routes.exits.clone(), self.seed);
        let expected_total = immediate + scheduler.total_expected();
        sink.report(RunStage::Agents, 30.0, &format!("Initialized {immediate} agents"));
        observer.on_run_start(self.index, self.seed, expected_total);

        // ── Simulation ────────────────────────────────────────────────────
        sink.report(RunStage::Simulation, 30.0, "Starting simulation...");
        writer.write_geometry(&plan.walkable.to_wkt())?;
        writer.write_frame(engine.elapsed_time(), &engine.agent_samples())?;

        let planned = params.planned_ticks();
        let backstop = iteration_backstop(planned);
        let progress_every = (planned / 100).max(1);
        let frame_every = params.output_every_nth_frame.max(1);
        let max_time = params.max_simulation_time;
        let mut last_progress = 30.0;
        let started = Instant::now();

        loop {
            let now = engine.elapsed_time();
            if now + TIME_EPSILON >= max_time || engine.iteration_count() >= backstop {
                break;
            }
            if engine.active_agent_count() == 0 && scheduler.pending(now) == 0 {
                break;
            }

            for event in scheduler.tick(&mut engine, now)? {
                radii.insert(event.agent.0, event.radius);
                observer.on_spawn(&event);
            }
            engine.step()?;

            let iteration = engine.iteration_count();
            let time = engine.elapsed_time();
            let active = engine.active_agent_count();
            observer.on_step(iteration, time, active);

            if iteration % frame_every == 0 {
                let frame = writer.write_frame(time, &engine.agent_samples())?;
                observer.on_frame(frame, time);
            }
            if iteration % progress_every == 0 {
                let spawned = immediate + scheduler.spawned_total();
                let evacuated = spawned.saturating_sub(active as u64);
                last_progress = simulation_progress(time, max_time, evacuated, expected_total, last_progress);
                let mut message = format!("Time: {time:.1}s, Agents: {active}/{expected_total}");
                if !scheduler.is_empty() {
                    message.push_str(&format!(
                        ", Spawned: {}/{}",
                        scheduler.spawned_total(),
                        scheduler.total_expected()
                    ));
                }
                sink.report(RunStage::Simulation, last_progress, &message);
            }
        }
        let execution_time = started.elapsed().as_secs_f64();

        // ── Finalization ──────────────────────────────────────────────────
        sink.report(RunStage::Finalization, 90.0, "Calculating results...");
        let remaining = engine.active_agent_count() as u64;
        let elapsed = engine.elapsed_time();
        let total_agents = immediate + scheduler.spawned_total();
        let (status, message) = if remaining == 0 {
            (EvacuationStatus::Completed, "All agents successfully evacuated".to_owned())
        } else if elapsed + TIME_EPSILON >= max_time {
            (
                EvacuationStatus::TimeoutTime,
                format!("Simulation stopped at time limit ({max_time}s) with {remaining} agents remaining"),
            )
        } else {
            (
                EvacuationStatus::TimeoutIterations,
                format!("Simulation stopped at iteration limit with {remaining} agents remaining"),
            )
        };

        sink.report(RunStage::Finalization, 95.0, "Extracting trajectory data...");
        writer.close()?;
        let total_frames = artifact.reader()?.total_frames()?;

        let metrics = RunMetrics {
            index: self.index,
            seed: self.seed,
            status,
            success: status.is_success(),
            message,
            execution_time,
            evacuation_time: elapsed,
            iterations: engine.iteration_count(),
            total_agents,
            agents_evacuated: total_agents.saturating_sub(remaining),
            agents_remaining: remaining,
            agent_radii: radii,
            total_frames,
            geometry_wkt: plan.walkable.to_wkt(),
            model_type: params.model.model_type,
            max_simulation_time: max_time,
        };
        info!(
            run = self.index,
            seed = self.seed,
            status = %metrics.status,
            evacuated = metrics.agents_evacuated,
            remaining,
            time = elapsed,
            "run finished"
        );
        observer.on_run_end(&metrics);
        Ok(RunResult { metrics, artifact })
    }

    fn dist_seed(&self, index: usize) -> u64 {
        self.seed.wrapping_add(index as u64)
    }

    /// Place the agents of an immediate distribution.  Returns how many were
    /// added; `0` if the distribution lies outside the walkable area.
    fn place_immediate<E: DynamicsEngine + ?Sized>(
        &self,
        engine: &mut E,
        routes: &EngineRoutes,
        index: usize,
        dist: &Distribution,
        targets: Vec<VariantTarget>,
        radii: &mut BTreeMap<u64, f64>,
    ) -> SimResult<u64> {
        let spec = IMMEDIATE_SAMPLING.with_count(dist.number as usize);
        let positions = match engine.sample_positions(&dist.area, &spec, self.dist_seed(index)) {
            Ok(positions) => positions,
            Err(SamplingError::EmptyArea { .. }) => {
                warn!(source = %dist.id, "distribution has no room inside the walkable area, skipped");
                return Ok(0);
            }
            Err(e) => {
                return Err(SimError::Placement { source_id: dist.id.clone(), reason: e.to_string() });
            }
        };

        // Variant for each position: the first counts[0] positions take
        // variant 0, and so on.
        let assignments: Vec<Option<VariantTarget>> = if targets.is_empty() {
            vec![None; positions.len()]
        } else {
            let weights: Vec<f64> = targets.iter().map(|t| t.weight).collect();
            allocate_static(positions.len(), &weights)
                .into_iter()
                .zip(&targets)
                .flat_map(|(count, &target)| std::iter::repeat_n(Some(target), count))
                .collect()
        };

        let mut speeds = SimRng::derive(self.seed, SPEED_STREAM + index as u64);
        for (&position, assignment) in positions.iter().zip(assignments) {
            let (journey, stage, v0) = match assignment {
                Some(t) => {
                    let v0 = speeds.normal(dist.v0, SPEED_STD_DEV).clamp(MIN_SPEED, MAX_SPEED);
                    (t.journey, t.stage, v0)
                }
                None => {
                    let exit = nearest_exit(&routes.exits, position)
                        .ok_or_else(|| SimError::NoExit(dist.id.clone()))?;
                    (exit.journey, exit.stage, dist.v0)
                }
            };
            let params = AgentParameters { position, radius: dist.radius, v0, journey, stage };
            let agent = engine.add_agent(&params).map_err(|e| match e {
                EngineError::Placement { .. } => {
                    SimError::Placement { source_id: dist.id.clone(), reason: e.to_string() }
                }
                other => SimError::Engine(other),
            })?;
            radii.insert(agent.0, dist.radius);
        }
        debug!(source = %dist.id, agents = positions.len(), routed = !targets.is_empty(), "immediate agents placed");
        Ok(positions.len() as u64)
    }
}
