//! Tests for ev-sim.

#[cfg(test)]
mod helpers {
    use std::path::Path;
    use std::sync::Arc;

    use parking_lot::Mutex;
    use serde_json::{json, Value};

    use ev_config::Scenario;
    use ev_core::{AgentId, JourneyId, ModelParameters, Point, Polygon, StageId};
    use ev_engine::{
        AgentParameters, AgentSample, DynamicsEngine, EngineError, EngineFactory, EngineResult,
    };
    use ev_routing::{CyclePolicy, Resolver};

    use crate::{ProgressSink, RunStage, ScenarioPlan};

    // ── Engine double ─────────────────────────────────────────────────────

    /// Everything the scripted engines of one factory were asked to do.
    #[derive(Default)]
    pub struct EngineLog {
        pub journeys: Vec<Vec<StageId>>,
        pub agents:   Vec<AgentParameters>,
    }

    /// Engine double: agents leave `evacuate_after` steps after being added.
    #[derive(Clone, Default)]
    pub struct ScriptedFactory {
        pub evacuate_after: u64,
        /// Elapsed time never advances.
        pub stall:          bool,
        pub reject_all:     bool,
        pub fail_create:    bool,
        /// Seeds whose engine fails at step 3.
        pub fail_seeds:     Vec<u64>,
        /// Seeds whose engine panics at step 3.
        pub panic_seeds:    Vec<u64>,
        pub log:            Arc<Mutex<EngineLog>>,
    }

    impl ScriptedFactory {
        pub fn evacuating_after(steps: u64) -> Self {
            Self { evacuate_after: steps, ..Self::default() }
        }
    }

    pub struct ScriptedEngine {
        walkable:  Polygon,
        dt:        f64,
        iteration: u64,
        stages:    u32,
        journeys:  u32,
        next_id:   u64,
        agents:    Vec<(AgentId, Point, u64)>,
        fail:      bool,
        panic:     bool,
        script:    ScriptedFactory,
    }

    impl EngineFactory for ScriptedFactory {
        type Engine = ScriptedEngine;

        fn create(
            &self,
            walkable: &Polygon,
            _model: &ModelParameters,
            time_step: f64,
            seed: u64,
        ) -> EngineResult<ScriptedEngine> {
            if self.fail_create {
                return Err(EngineError::Create("scripted failure".into()));
            }
            Ok(ScriptedEngine {
                walkable:  walkable.clone(),
                dt:        time_step,
                iteration: 0,
                stages:    0,
                journeys:  0,
                next_id:   0,
                agents:    Vec::new(),
                fail:      self.fail_seeds.contains(&seed),
                panic:     self.panic_seeds.contains(&seed),
                script:    self.clone(),
            })
        }
    }

    impl DynamicsEngine for ScriptedEngine {
        fn add_exit_stage(&mut self, _area: &Polygon) -> EngineResult<StageId> {
            self.stages += 1;
            Ok(StageId(self.stages - 1))
        }

        fn add_waypoint_stage(&mut self, _center: Point, _radius: f64) -> EngineResult<StageId> {
            self.stages += 1;
            Ok(StageId(self.stages - 1))
        }

        fn add_journey(&mut self, stages: &[StageId]) -> EngineResult<JourneyId> {
            self.script.log.lock().journeys.push(stages.to_vec());
            self.journeys += 1;
            Ok(JourneyId(self.journeys - 1))
        }

        fn add_agent(&mut self, params: &AgentParameters) -> EngineResult<AgentId> {
            if self.script.reject_all {
                return Err(EngineError::Placement { position: params.position, reason: "scripted" });
            }
            self.script.log.lock().agents.push(*params);
            let id = AgentId(self.next_id);
            self.next_id += 1;
            self.agents.push((id, params.position, self.iteration));
            Ok(id)
        }

        fn step(&mut self) -> EngineResult<()> {
            if self.iteration == 3 {
                if self.panic {
                    panic!("scripted panic");
                }
                if self.fail {
                    return Err(EngineError::Numerical { agent: AgentId(0), iteration: 3 });
                }
            }
            self.iteration += 1;
            let (now, after) = (self.iteration, self.script.evacuate_after);
            self.agents.retain(|&(_, _, added)| now - added < after);
            Ok(())
        }

        fn elapsed_time(&self) -> f64 {
            if self.script.stall { 0.0 } else { self.iteration as f64 * self.dt }
        }

        fn active_agent_count(&self) -> usize {
            self.agents.len()
        }

        fn iteration_count(&self) -> u64 {
            self.iteration
        }

        fn time_step(&self) -> f64 {
            self.dt
        }

        fn agent_samples(&self) -> Vec<AgentSample> {
            self.agents
                .iter()
                .map(|&(id, position, _)| AgentSample { id, position, orientation: Point::new(1.0, 0.0) })
                .collect()
        }

        fn walkable_area(&self) -> &Polygon {
            &self.walkable
        }
    }

    // ── Progress recorder ─────────────────────────────────────────────────

    #[derive(Default)]
    pub struct RecordingSink(pub Mutex<Vec<(RunStage, f64, String)>>);

    impl ProgressSink for RecordingSink {
        fn report(&self, stage: RunStage, progress: f64, message: &str) {
            self.0.lock().push((stage, progress, message.to_owned()));
        }
    }

    // ── Scenarios ─────────────────────────────────────────────────────────

    /// 20 m × 10 m room, `exit_a` bottom right, `exit_b` top right.
    pub fn scenario(config: Value, parameters: Value, artifacts: &Path) -> Scenario {
        let mut parameters = parameters;
        parameters["artifact_dir"] = json!(artifacts);
        serde_json::from_value(json!({
            "walkable_area": [[0, 0], [20, 0], [20, 10], [0, 10]],
            "config": config,
            "parameters": parameters,
        }))
        .unwrap()
    }

    pub fn exits() -> Value {
        json!({
            "exit_a": { "coordinates": [[19, 0], [20, 0], [20, 2], [19, 2]] },
            "exit_b": { "coordinates": [[19, 8], [20, 8], [20, 10], [19, 10]] }
        })
    }

    /// One immediate distribution of `n` agents, no journeys.
    pub fn immediate(n: u32) -> Value {
        json!({
            "exits": exits(),
            "distributions": {
                "dist_0": { "coordinates": [[0, 0], [4, 0], [4, 10], [0, 10]],
                            "parameters": { "number": n, "v0": 1.3 } }
            }
        })
    }

    /// One flow distribution releasing `n` agents over `[start, end]`.
    pub fn flow(n: u32, start: f64, end: f64) -> Value {
        json!({
            "exits": exits(),
            "distributions": {
                "gate": { "coordinates": [[0, 0], [4, 0], [4, 10], [0, 10]],
                          "parameters": { "number": n, "use_flow_spawning": true,
                                          "flow_start_time": start, "flow_end_time": end } }
            }
        })
    }

    /// `dist_0` → `wp_0`, which sends 70 % to `exit_a` and 30 % to `exit_b`.
    pub fn branching(n: u32) -> Value {
        json!({
            "exits": exits(),
            "distributions": {
                "dist_0": { "coordinates": [[0, 0], [4, 0], [4, 10], [0, 10]],
                            "parameters": { "number": n, "v0": 1.3 } }
            },
            "waypoints": { "wp_0": { "center": [10, 5], "radius": 0.5 } },
            "journeys": [ { "id": "j0", "stages": ["dist_0", "wp_0", "exit_a"] } ],
            "waypoint_routing": {
                "wp_0": { "j0": { "destinations": [
                    { "target": "exit_a", "percentage": 70 },
                    { "target": "exit_b", "percentage": 30 }
                ] } }
            }
        })
    }

    pub fn plan(config: Value, parameters: Value, artifacts: &Path) -> ScenarioPlan {
        let scenario = scenario(config, parameters, artifacts);
        ScenarioPlan::from_scenario(&scenario, &Resolver::new(CyclePolicy::Reject)).unwrap()
    }

    pub fn artifact_files(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .is_ok_and(|e| e.file_name().to_string_lossy().starts_with("ev_trajectory_"))
            })
            .count()
    }
}

// ── Progress channel ──────────────────────────────────────────────────────────

#[cfg(test)]
mod progress_tests {
    use std::time::{Duration, Instant};

    use ev_core::RunId;

    use crate::{
        simulation_progress, ProgressEvent, ProgressReporter, ProgressSink, ProgressStore, RunStage,
        NOT_FOUND_GRACE_POLLS,
    };

    #[test]
    fn progress_formula() {
        assert_eq!(simulation_progress(0.0, 300.0, 0, 10, 30.0), 30.0);
        assert_eq!(simulation_progress(150.0, 300.0, 0, 10, 30.0), 60.0);
        // Agent share is scaled by 0.8.
        assert!((simulation_progress(10.0, 300.0, 10, 10, 30.0) - 78.0).abs() < 1e-9);
        assert_eq!(simulation_progress(300.0, 300.0, 10, 10, 30.0), 90.0);
        assert_eq!(simulation_progress(0.0, 300.0, 0, 10, 55.0), 55.0);
        assert_eq!(simulation_progress(30.0, 300.0, 0, 0, 30.0), 36.0);
    }

    #[test]
    fn updates_never_go_backwards() {
        let store = ProgressStore::new();
        let run = RunId::new_v4();
        store.open(run, "Simulation queued...");
        assert!(store.update(run, RunStage::Setup, 20.0, "a"));
        assert!(store.update(run, RunStage::Config, 10.0, "b"));
        let s = store.get(run).unwrap();
        assert_eq!((s.stage, s.progress, s.sequence), (RunStage::Config, 20.0, 2));
        assert_eq!(s.message, "b");
    }

    #[test]
    fn terminal_stages_absorb() {
        let store = ProgressStore::new();
        let run = RunId::new_v4();
        store.open(run, "queued");
        let reporter = ProgressReporter::new(store.clone(), run);
        reporter.report(RunStage::Simulation, 45.0, "running");
        reporter.fail(&"engine exploded");

        let s = store.get(run).unwrap();
        assert_eq!(s.stage, RunStage::Failed);
        assert_eq!(s.progress, 45.0);
        assert_eq!(s.message, "Simulation failed: engine exploded");
        assert!(s.finished_at.is_some());

        reporter.complete("too late");
        assert!(!store.update(run, RunStage::Simulation, 99.0, "ignored"));
        assert_eq!(store.get(run).unwrap().stage, RunStage::Failed);
    }

    #[test]
    fn unknown_runs_are_not_created_by_updates() {
        let store = ProgressStore::new();
        assert!(!store.update(RunId::new_v4(), RunStage::Setup, 5.0, "x"));
        assert!(store.is_empty());
    }

    #[test]
    fn expiry_counts_from_the_terminal_update() {
        let store = ProgressStore::new();
        let (done, running) = (RunId::new_v4(), RunId::new_v4());
        store.open(done, "q");
        store.open(running, "q");
        ProgressReporter::new(store.clone(), done).complete("ok");

        let later = Instant::now() + Duration::from_secs(301);
        assert_eq!(store.expired(Duration::from_secs(300), later), vec![done]);
        assert!(store.expired(Duration::from_secs(300), Instant::now()).is_empty());
        store.remove(done);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn subscription_lifecycle() {
        let store = ProgressStore::new();
        let run = RunId::new_v4();
        store.open(run, "queued");
        let reporter = ProgressReporter::new(store.clone(), run);
        let mut sub = store.subscribe(run);

        assert!(matches!(sub.poll(), Some(ProgressEvent::Connected(s)) if s.stage == RunStage::Queued));
        assert_eq!(sub.poll(), Some(ProgressEvent::Heartbeat));

        reporter.report(RunStage::Setup, 5.0, "setup");
        reporter.report(RunStage::Config, 15.0, "config");
        // Intermediate snapshots may be skipped.
        assert!(matches!(sub.poll(), Some(ProgressEvent::Update(s)) if s.stage == RunStage::Config));
        assert_eq!(sub.poll(), Some(ProgressEvent::Heartbeat));

        reporter.complete("done");
        assert!(matches!(sub.poll(), Some(ProgressEvent::Update(s)) if s.progress == 100.0));
        assert_eq!(sub.poll(), Some(ProgressEvent::Closing));
        assert_eq!(sub.poll(), None);
        assert!(sub.is_closed());
    }

    #[test]
    fn subscribing_to_a_finished_run_closes_after_connect() {
        let store = ProgressStore::new();
        let run = RunId::new_v4();
        store.open(run, "queued");
        ProgressReporter::new(store.clone(), run).complete("done");
        let mut sub = store.subscribe(run);
        assert!(matches!(sub.poll(), Some(ProgressEvent::Connected(_))));
        assert_eq!(sub.poll(), Some(ProgressEvent::Closing));
        assert_eq!(sub.poll(), None);
    }

    #[test]
    fn unknown_run_yields_not_found_after_the_grace() {
        let store = ProgressStore::new();
        let mut sub = store.subscribe(RunId::new_v4());
        for _ in 0..NOT_FOUND_GRACE_POLLS {
            assert_eq!(sub.poll(), Some(ProgressEvent::Heartbeat));
        }
        assert_eq!(sub.poll(), Some(ProgressEvent::NotFound));
        assert_eq!(sub.poll(), None);
        assert!(sub.is_closed());
    }

    #[test]
    fn early_subscriber_connects_once_the_run_opens() {
        let store = ProgressStore::new();
        let run = RunId::new_v4();
        let mut sub = store.subscribe(run);
        assert_eq!(sub.poll(), Some(ProgressEvent::Heartbeat));
        assert_eq!(sub.poll(), Some(ProgressEvent::Heartbeat));

        store.open(run, "queued");
        assert!(matches!(sub.poll(), Some(ProgressEvent::Connected(s)) if s.stage == RunStage::Queued));
        assert_eq!(sub.poll(), Some(ProgressEvent::Heartbeat));
        assert!(!sub.is_closed());
    }

    #[test]
    fn snapshot_serialises_lowercase_stage() {
        let store = ProgressStore::new();
        let run = RunId::new_v4();
        store.open(run, "Simulation queued...");
        let json = serde_json::to_value(store.get(run).unwrap()).unwrap();
        assert_eq!(json["stage"], "queued");
        assert!(json.get("finished_at").is_none());
    }
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod orchestrator_tests {
    use serde_json::json;

    use ev_core::{JourneyId, StageId};
    use ev_engine::{EngineError, KinematicFactory};
    use ev_flow::{SpawnError, SpawnEvent};
    use ev_output::PageQuery;

    use super::helpers::{
        artifact_files, branching, flow, immediate, plan, RecordingSink, ScriptedFactory,
    };
    use crate::orchestrator::iteration_backstop;
    use crate::{
        EvacuationStatus, NoopProgress, RunObserver, RunOrchestrator, RunStage, SimError,
    };

    #[derive(Default)]
    struct Recorder {
        spawns: Vec<SpawnEvent>,
        frames: Vec<u64>,
        steps:  u64,
    }

    impl RunObserver for Recorder {
        fn on_spawn(&mut self, event: &SpawnEvent) {
            self.spawns.push(*event);
        }

        fn on_step(&mut self, _iteration: u64, _time: f64, _active: usize) {
            self.steps += 1;
        }

        fn on_frame(&mut self, frame: u64, _time: f64) {
            self.frames.push(frame);
        }
    }

    #[test]
    fn run_completes_when_everyone_leaves() {
        let dir = tempfile::tempdir().unwrap();
        let p = plan(immediate(5), json!({"max_simulation_time": 10.0, "time_step": 0.05}), dir.path());
        let factory = ScriptedFactory::evacuating_after(10);
        let sink = RecordingSink::default();

        let result = RunOrchestrator::new(&p, &factory, 0).execute(&sink).unwrap();
        let m = &result.metrics;
        assert_eq!(m.status, EvacuationStatus::Completed);
        assert!(m.success);
        assert_eq!(m.message, "All agents successfully evacuated");
        assert_eq!((m.total_agents, m.agents_evacuated, m.agents_remaining), (5, 5, 0));
        assert_eq!(m.iterations, 10);
        assert!((m.evacuation_time - 0.5).abs() < 1e-9);
        assert_eq!(m.seed, 420);
        assert_eq!(m.agent_radii.len(), 5);
        // Frames at iterations 0, 4 and 8.
        assert_eq!(m.total_frames, 3);
        assert!(m.geometry_wkt.starts_with("POLYGON"));
        assert_eq!(result.artifact.reader().unwrap().total_frames().unwrap(), 3);

        let reports = sink.0.lock();
        assert_eq!(reports[0], (RunStage::Setup, 0.0, "Initializing simulation...".to_owned()));
        assert!(reports.iter().any(|r| r.0 == RunStage::Agents && r.2 == "Initialized 5 agents"));
        assert_eq!(reports.last().unwrap().0, RunStage::Finalization);
        assert_eq!(reports.last().unwrap().1, 95.0);
        assert!(reports.windows(2).all(|w| w[0].1 <= w[1].1));
        assert!(reports.iter().all(|r| !r.0.is_terminal()));
    }

    #[test]
    fn time_limit_is_a_timeout_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = plan(immediate(5), json!({"max_simulation_time": 1.0, "time_step": 0.1}), dir.path());
        let factory = ScriptedFactory::evacuating_after(1_000);
        let m = RunOrchestrator::new(&p, &factory, 0).execute(&NoopProgress).unwrap().metrics;
        assert_eq!(m.status, EvacuationStatus::TimeoutTime);
        assert!(!m.success);
        assert_eq!(m.agents_remaining, 5);
        assert_eq!(m.iterations, 10);
        assert!(m.message.contains("time limit (1s) with 5 agents remaining"), "{}", m.message);
    }

    #[test]
    fn stalled_clock_hits_the_iteration_backstop() {
        let dir = tempfile::tempdir().unwrap();
        let p = plan(immediate(2), json!({"max_simulation_time": 1.0, "time_step": 0.1}), dir.path());
        let factory = ScriptedFactory { stall: true, ..ScriptedFactory::evacuating_after(1_000) };
        let m = RunOrchestrator::new(&p, &factory, 0).execute(&NoopProgress).unwrap().metrics;
        assert_eq!(m.status, EvacuationStatus::TimeoutIterations);
        // planned 10 + 10 / 10 + 1
        assert_eq!(m.iterations, 12);
    }

    #[test]
    fn backstop_saturates_for_huge_plans() {
        assert_eq!(iteration_backstop(10), 12);
        assert_eq!(iteration_backstop(0), 1);
        assert_eq!(iteration_backstop(u64::MAX), u64::MAX);
        assert_eq!(iteration_backstop(u64::MAX - 5), u64::MAX);
    }

    #[test]
    fn tiny_time_step_does_not_overflow_the_backstop() {
        let dir = tempfile::tempdir().unwrap();
        let p = plan(immediate(2), json!({"max_simulation_time": 1.0e300, "time_step": 1.0e-300}), dir.path());
        let m = RunOrchestrator::new(&p, &ScriptedFactory::evacuating_after(3), 0)
            .execute(&NoopProgress)
            .unwrap()
            .metrics;
        assert_eq!(m.status, EvacuationStatus::Completed);
        assert_eq!(m.iterations, 3);
    }

    #[test]
    fn flow_agents_arrive_on_schedule() {
        let dir = tempfile::tempdir().unwrap();
        let p = plan(flow(4, 0.0, 1.0), json!({"max_simulation_time": 10.0, "time_step": 0.1}), dir.path());
        let factory = ScriptedFactory::evacuating_after(5);
        let mut recorder = Recorder::default();

        let m = RunOrchestrator::new(&p, &factory, 0)
            .execute_observed(&NoopProgress, &mut recorder)
            .unwrap()
            .metrics;
        assert_eq!(m.status, EvacuationStatus::Completed);
        assert_eq!(m.total_agents, 4);
        assert_eq!(recorder.spawns.len(), 4);
        for (i, e) in recorder.spawns.iter().enumerate() {
            let scheduled = i as f64 * 0.25;
            assert!(e.time + 1e-9 >= scheduled && e.time < scheduled + 0.1 + 1e-9, "spawn {i} at {}", e.time);
            assert!(e.variant.is_none());
        }
        assert_eq!(recorder.steps, m.iterations);
        assert_eq!(recorder.frames.len() as u64 + 1, m.total_frames);
    }

    #[test]
    fn blocked_flow_source_fails_the_run_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let p = plan(flow(4, 0.0, 1.0), json!({"max_simulation_time": 10.0, "time_step": 0.1}), dir.path());
        let factory = ScriptedFactory { reject_all: true, ..ScriptedFactory::evacuating_after(5) };
        match RunOrchestrator::new(&p, &factory, 0).execute(&NoopProgress) {
            Err(SimError::Spawn(SpawnError::Exhausted { source_id, .. })) => assert_eq!(source_id, "gate"),
            other => panic!("expected exhaustion, got {other:?}"),
        }
        assert_eq!(artifact_files(dir.path()), 0);
    }

    #[test]
    fn crowded_distribution_is_a_placement_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = json!({
            "exits": super::helpers::exits(),
            "distributions": {
                "tiny": { "coordinates": [[5, 5], [6, 5], [6, 6], [5, 6]], "parameters": { "number": 40 } }
            }
        });
        let p = plan(config, json!({}), dir.path());
        let err = RunOrchestrator::new(&p, &ScriptedFactory::evacuating_after(1), 0)
            .execute(&NoopProgress)
            .unwrap_err();
        assert!(matches!(err, SimError::Placement { .. }));
        assert!(err.to_string().contains("making the distribution area larger"));
    }

    #[test]
    fn engine_refusing_an_immediate_agent_is_a_placement_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = plan(immediate(3), json!({}), dir.path());
        let factory = ScriptedFactory { reject_all: true, ..ScriptedFactory::evacuating_after(1) };
        let err = RunOrchestrator::new(&p, &factory, 0).execute(&NoopProgress).unwrap_err();
        match &err {
            SimError::Placement { source_id, reason } => {
                assert_eq!(source_id, "dist_0");
                assert!(reason.contains("scripted"), "{reason}");
            }
            other => panic!("expected placement error, got {other:?}"),
        }
        assert!(err.to_string().contains("making the distribution area larger"));
        assert_eq!(artifact_files(dir.path()), 0);
    }

    #[test]
    fn distribution_outside_the_room_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = json!({
            "exits": super::helpers::exits(),
            "distributions": {
                "inside":  { "coordinates": [[0, 0], [4, 0], [4, 10], [0, 10]], "parameters": { "number": 3 } },
                "outside": { "coordinates": [[50, 50], [52, 50], [52, 52], [50, 52]], "parameters": { "number": 3 } }
            }
        });
        let p = plan(config, json!({"max_simulation_time": 5.0, "time_step": 0.1}), dir.path());
        let m = RunOrchestrator::new(&p, &ScriptedFactory::evacuating_after(3), 0)
            .execute(&NoopProgress)
            .unwrap()
            .metrics;
        assert_eq!(m.total_agents, 3);
    }

    #[test]
    fn routed_agents_follow_static_allocation() {
        let dir = tempfile::tempdir().unwrap();
        let p = plan(branching(20), json!({"max_simulation_time": 5.0, "time_step": 0.1}), dir.path());
        let factory = ScriptedFactory::evacuating_after(3);
        RunOrchestrator::new(&p, &factory, 0).execute(&NoopProgress).unwrap();

        let log = factory.log.lock();
        // Direct exit journeys first, then one journey per variant.
        assert_eq!(log.journeys, vec![
            vec![StageId(0)],
            vec![StageId(1)],
            vec![StageId(2), StageId(0)],
            vec![StageId(2), StageId(1)],
        ]);
        let on = |j: u32| log.agents.iter().filter(|a| a.journey == JourneyId(j)).count();
        assert_eq!((on(2), on(3)), (14, 6));
        assert!(log.agents.iter().all(|a| a.stage == StageId(2)));
        assert!(log.agents.iter().all(|a| (0.1..=2.0).contains(&a.v0)));
        assert!(log.agents.iter().any(|a| a.v0 != 1.3));
    }

    #[test]
    fn unrouted_agents_take_the_nearest_exit() {
        let dir = tempfile::tempdir().unwrap();
        let config = json!({
            "exits": super::helpers::exits(),
            "distributions": {
                "low":  { "coordinates": [[16, 0], [18, 0], [18, 2], [16, 2]], "parameters": { "number": 2 } },
                "high": { "coordinates": [[16, 8], [18, 8], [18, 10], [16, 10]], "parameters": { "number": 2 } }
            }
        });
        let p = plan(config, json!({"max_simulation_time": 5.0, "time_step": 0.1}), dir.path());
        let factory = ScriptedFactory::evacuating_after(3);
        RunOrchestrator::new(&p, &factory, 0).execute(&NoopProgress).unwrap();

        let log = factory.log.lock();
        let journeys: Vec<u32> = log.agents.iter().map(|a| a.journey.0).collect();
        assert_eq!(journeys, vec![0, 0, 1, 1]);
        assert!(log.agents.iter().all(|a| a.v0 == 1.2));
    }

    #[test]
    fn implicit_source_covers_the_room() {
        let dir = tempfile::tempdir().unwrap();
        let p = plan(json!({ "exits": super::helpers::exits() }), json!({"max_simulation_time": 1.0}), dir.path());
        assert!(p.uses_implicit_source());
        let m = RunOrchestrator::new(&p, &ScriptedFactory::evacuating_after(2), 0)
            .execute(&NoopProgress)
            .unwrap()
            .metrics;
        assert_eq!(m.total_agents, 100);
    }

    #[test]
    fn factory_errors_surface() {
        let dir = tempfile::tempdir().unwrap();
        let p = plan(immediate(1), json!({}), dir.path());
        let factory = ScriptedFactory { fail_create: true, ..ScriptedFactory::default() };
        assert!(matches!(
            RunOrchestrator::new(&p, &factory, 0).execute(&NoopProgress),
            Err(SimError::Engine(EngineError::Create(_)))
        ));
        assert_eq!(artifact_files(dir.path()), 0);
    }

    #[test]
    fn kinematic_engine_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let config = json!({
            "exits": { "east": { "coordinates": [[9, 1], [10, 1], [10, 3], [9, 3]] } },
            "distributions": {
                "west": { "coordinates": [[0, 0], [3, 0], [3, 4], [0, 4]], "parameters": { "number": 10 } }
            }
        });
        let mut parameters = json!({"max_simulation_time": 60.0, "time_step": 0.05});
        parameters["artifact_dir"] = json!(dir.path());
        let scenario: ev_config::Scenario = serde_json::from_value(json!({
            "walkable_area": [[0, 0], [10, 0], [10, 4], [0, 4]],
            "config": config,
            "parameters": parameters,
        }))
        .unwrap();
        let p = crate::ScenarioPlan::from_scenario(&scenario, &ev_routing::Resolver::default()).unwrap();

        let result = RunOrchestrator::new(&p, &KinematicFactory, 0).execute(&NoopProgress).unwrap();
        assert_eq!(result.metrics.status, EvacuationStatus::Completed, "{}", result.metrics.message);
        assert_eq!(result.metrics.total_agents, 10);

        let reader = result.artifact.reader().unwrap();
        let info = reader.info().unwrap();
        assert_eq!(info.total_frames, result.metrics.total_frames);
        assert_eq!(info.agent_count, 10);
        let page = reader.page(&PageQuery::default()).unwrap();
        assert_eq!(page.frames[0].agents.len(), 10);
    }
}

// ── Batch ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod batch_tests {
    use serde_json::json;

    use ev_core::RunId;
    use ev_engine::EngineError;

    use super::helpers::{artifact_files, immediate, plan, ScriptedFactory};
    use crate::{
        run_batch, worker_count, BatchError, NoopProgress, ProgressReporter, ProgressStore, RunStage,
        SimError, MAX_WORKERS,
    };

    fn params(runs: u32) -> serde_json::Value {
        json!({"max_simulation_time": 5.0, "time_step": 0.1, "number_of_simulations": runs})
    }

    #[test]
    fn workers_are_bounded() {
        assert_eq!(worker_count(1), 1);
        assert!(worker_count(100) <= MAX_WORKERS);
        assert!(worker_count(0) >= 1);
    }

    #[test]
    fn one_failed_seed_does_not_sink_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let p = plan(immediate(3), params(4), dir.path());
        let factory = ScriptedFactory { fail_seeds: vec![422], ..ScriptedFactory::evacuating_after(5) };
        let store = ProgressStore::new();
        let run = RunId::new_v4();
        store.open(run, "Simulation queued...");
        let reporter = ProgressReporter::new(store.clone(), run);

        let outcome = run_batch(&p, &factory, &reporter).unwrap();
        assert_eq!(outcome.runs.iter().map(|r| r.index()).collect::<Vec<_>>(), vec![0, 1, 3]);
        assert_eq!(outcome.seeds(), vec![420, 421, 423]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!((outcome.failures[0].index, outcome.failures[0].seed), (2, 422));
        assert!(matches!(outcome.failures[0].error, SimError::Engine(EngineError::Numerical { .. })));
        assert_eq!(outcome.primary().unwrap().index(), 0);
        assert!(matches!(outcome.first_completed, Some(0 | 1 | 3)));
        assert_eq!(outcome.summary(), "Completed 3/4 simulations successfully");

        let s = store.get(run).unwrap();
        assert_eq!((s.stage, s.progress), (RunStage::Finalization, 90.0));
        reporter.complete(&outcome.summary());
        assert_eq!(store.get(run).unwrap().progress, 100.0);

        // Only the surviving runs still hold artifacts.
        assert_eq!(artifact_files(dir.path()), 3);
        drop(outcome);
        assert_eq!(artifact_files(dir.path()), 0);
    }

    #[test]
    fn panicking_run_is_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let p = plan(immediate(2), params(2), dir.path());
        let factory = ScriptedFactory { panic_seeds: vec![421], ..ScriptedFactory::evacuating_after(5) };
        let outcome = run_batch(&p, &factory, &NoopProgress).unwrap();
        assert_eq!(outcome.succeeded(), 1);
        match &outcome.failures[0].error {
            SimError::Panicked(message) => assert!(message.contains("scripted panic")),
            other => panic!("expected a panic failure, got {other:?}"),
        }
    }

    #[test]
    fn all_failed_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let p = plan(immediate(2), params(3), dir.path());
        let factory = ScriptedFactory { fail_create: true, ..ScriptedFactory::default() };
        match run_batch(&p, &factory, &NoopProgress) {
            Err(e @ BatchError::AllRunsFailed { .. }) => {
                assert_eq!(e.to_string(), "All simulations failed");
                let BatchError::AllRunsFailed { failures } = e else { unreachable!() };
                assert_eq!(failures.iter().map(|f| f.index).collect::<Vec<_>>(), vec![0, 1, 2]);
            }
            other => panic!("expected AllRunsFailed, got {other:?}"),
        }
    }

    #[test]
    fn single_run_reports_detailed_progress() {
        let dir = tempfile::tempdir().unwrap();
        let p = plan(immediate(2), params(1), dir.path());
        let store = ProgressStore::new();
        let run = RunId::new_v4();
        store.open(run, "queued");
        let reporter = ProgressReporter::new(store.clone(), run);

        let outcome = run_batch(&p, &ScriptedFactory::evacuating_after(2), &reporter).unwrap();
        assert_eq!(outcome.first_completed, Some(0));
        let s = store.get(run).unwrap();
        assert_eq!((s.stage, s.progress), (RunStage::Finalization, 95.0));
        assert_eq!(s.message, "Extracting trajectory data...");
    }

    #[test]
    fn single_run_failure_is_all_failed() {
        let dir = tempfile::tempdir().unwrap();
        let p = plan(immediate(2), params(1), dir.path());
        let factory = ScriptedFactory { fail_create: true, ..ScriptedFactory::default() };
        assert!(matches!(
            run_batch(&p, &factory, &NoopProgress),
            Err(BatchError::AllRunsFailed { failures }) if failures.len() == 1
        ));
    }
}
