//! `FlowScheduler`: ticks every flow source once per simulation step.

use tracing::{debug, error, warn};

use ev_core::{AgentId, JourneyId, Point, SimRng, StageId};
use ev_engine::{AgentParameters, DynamicsEngine, EngineError};
use ev_routing::select_weighted;

use crate::source::{nearest_exit, ExitTarget, SpawnSource};
use crate::{SpawnError, SpawnResult};

/// Stream offset of the per-source selection generators, kept clear of the
/// pool-shuffle streams the orchestrator derives from the same seed.
const SELECTION_STREAM: u64 = 0x5e1e_c700;

/// One agent placed by a flow source.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SpawnEvent {
    /// Index into the scheduler's sources.
    pub source:   usize,
    pub agent:    AgentId,
    pub position: Point,
    pub radius:   f64,
    pub journey:  JourneyId,
    pub stage:    StageId,
    /// Variant index, `None` for nearest-exit assignment.
    pub variant:  Option<usize>,
    /// Simulated time of the tick that placed the agent.
    pub time:     f64,
}

/// Where the next agent of a source heads for.
#[derive(Copy, Clone)]
enum Assignment {
    Variant { variant: usize, journey: JourneyId, stage: StageId },
    NearestExit,
}

pub struct FlowScheduler {
    sources: Vec<SpawnSource>,
    exits:   Vec<ExitTarget>,
    rngs:    Vec<SimRng>,
    /// Sources already reported as missing their window.
    missed:  Vec<bool>,
}

impl FlowScheduler {
    pub fn new(sources: Vec<SpawnSource>, exits: Vec<ExitTarget>, seed: u64) -> Self {
        let rngs = (0..sources.len() as u64)
            .map(|i| SimRng::derive(seed, SELECTION_STREAM + i))
            .collect();
        let missed = vec![false; sources.len()];
        Self { sources, exits, rngs, missed }
    }

    #[inline]
    pub fn sources(&self) -> &[SpawnSource] {
        &self.sources
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Agents all sources will release over the run.
    pub fn total_expected(&self) -> u64 {
        self.sources.iter().map(|s| u64::from(s.total)).sum()
    }

    pub fn spawned_total(&self) -> u64 {
        self.sources.iter().map(|s| u64::from(s.spawned)).sum()
    }

    /// Agents that may still appear at or after `now`.  Sources whose window
    /// has closed count as done.
    pub fn pending(&self, now: f64) -> u64 {
        self.sources.iter().map(|s| u64::from(s.remaining(now))).sum()
    }

    /// Place every agent due at `now`, in source order.
    ///
    /// Fails with [`SpawnError::Exhausted`] if a due agent fits nowhere in
    /// its source's pool.  Engine errors other than a rejected placement are
    /// passed through unchanged.
    pub fn tick<E: DynamicsEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        now: f64,
    ) -> SpawnResult<Vec<SpawnEvent>> {
        let mut events = Vec::new();
        for index in 0..self.sources.len() {
            while self.sources[index].is_due(now) {
                let event = self.spawn_one(engine, index, now)?;
                self.sources[index].spawned += 1;
                events.push(event);
            }
            if !self.missed[index] && self.sources[index].is_missed(now) {
                self.missed[index] = true;
                let source = &self.sources[index];
                warn!(
                    source = %source.id,
                    spawned = source.spawned,
                    total = source.total,
                    "flow window closed before every agent was spawned"
                );
            }
        }
        Ok(events)
    }

    fn spawn_one<E: DynamicsEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        index: usize,
        now: f64,
    ) -> SpawnResult<SpawnEvent> {
        let assignment = self.assign(index)?;
        let source = &self.sources[index];
        let pool = source.candidates.len();

        for offset in 0..pool {
            let position = source.candidates[(source.spawned as usize + offset) % pool];
            let (journey, stage, variant) = match assignment {
                Assignment::Variant { variant, journey, stage } => (journey, stage, Some(variant)),
                Assignment::NearestExit => {
                    let exit = nearest_exit(&self.exits, position)
                        .ok_or_else(|| SpawnError::NoTarget(source.id.clone()))?;
                    (exit.journey, exit.stage, None)
                }
            };
            let params = AgentParameters { position, radius: source.radius, v0: source.v0, journey, stage };

            match engine.add_agent(&params) {
                Ok(agent) => {
                    debug!(source = %source.id, %agent, %position, time = now, "flow agent spawned");
                    return Ok(SpawnEvent {
                        source: index,
                        agent,
                        position,
                        radius: source.radius,
                        journey,
                        stage,
                        variant,
                        time: now,
                    });
                }
                Err(EngineError::Placement { reason, .. }) => {
                    debug!(source = %source.id, %position, reason, "spawn position rejected");
                }
                Err(e) => return Err(e.into()),
            }
        }

        error!(source = %source.id, time = now, attempts = pool, "flow source exhausted its spawn positions");
        Err(SpawnError::Exhausted { source_id: source.id.clone(), time: now, attempts: pool })
    }

    /// Draw the variant for the next agent of `index`, once per agent.
    fn assign(&mut self, index: usize) -> SpawnResult<Assignment> {
        let source = &self.sources[index];
        if source.variants.is_empty() {
            return Ok(Assignment::NearestExit);
        }
        let weights: Vec<f64> = source.variants.iter().map(|v| v.weight).collect();
        let pick = select_weighted(&weights, &mut self.rngs[index])
            .map_err(|_| SpawnError::NoTarget(source.id.clone()))?;
        let target = source.variants[pick];
        Ok(Assignment::Variant { variant: target.variant, journey: target.journey, stage: target.stage })
    }
}
