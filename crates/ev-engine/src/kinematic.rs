//! Reference engine: a collision-free speed stepper.
//!
//! # Update rule (per agent, synchronous over all agents)
//!
//! ```text
//! e0        = unit vector towards the current stage target
//! e         = normalise(e0 + Σ_j  a · exp(−gap_ij / D) · (x_i − x_j) / |x_i − x_j|)
//! headway   = min over agents ahead in a lane of width r_i + r_j of (dist − r_i − r_j)
//! speed     = clamp(headway / T, 0, v0)
//! x_i(t+dt) = x_i + speed · e · dt        (rejected if it leaves the walkable area)
//! ```
//!
//! `a` = `strength_neighbor_repulsion`, `D` = `range_neighbor_repulsion`,
//! `T` = `time_gap`.  Neighbours are looked up in an R-tree rebuilt once per
//! step.  Other model types run on the same stepper; their extra parameters
//! are ignored.
//!
//! # Stages
//!
//! A waypoint counts as reached within its radius; the agent then heads for
//! the next stage of its journey.  An exit counts as reached when the agent
//! is inside the exit polygon, and the agent is removed.  An agent whose
//! journey ends at a waypoint stays there.

use rstar::{PointDistance, RTree, RTreeObject, AABB};
use tracing::{debug, warn};

use ev_core::{AgentId, JourneyId, ModelParameters, ModelType, Point, Polygon, SimRng, StageId};

use crate::agent::{AgentParameters, AgentSample};
use crate::engine::{DynamicsEngine, EngineFactory};
use crate::{EngineError, EngineResult};

/// Neighbours further than this (centre to centre) are ignored.
const NEIGHBOR_CUTOFF: f64 = 3.0;

/// Heading noise (radians) that breaks perfectly symmetric standoffs.
const HEADING_JITTER: f64 = 0.02;

// ── R-tree entry ──────────────────────────────────────────────────────────────

/// An agent's position and its slot in `KinematicEngine::agents`.
#[derive(Clone)]
struct AgentEntry {
    point: [f64; 2],
    slot:  usize,
}

impl RTreeObject for AgentEntry {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.point)
    }
}

impl PointDistance for AgentEntry {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.point[0] - point[0];
        let dy = self.point[1] - point[1];
        dx * dx + dy * dy
    }
}

// ── Stage and agent state ─────────────────────────────────────────────────────

#[derive(Clone, Debug)]
enum Stage {
    Exit { area: Polygon, target: Point },
    Waypoint { center: Point, radius: f64 },
}

impl Stage {
    fn target(&self) -> Point {
        match self {
            Stage::Exit { target, .. } => *target,
            Stage::Waypoint { center, .. } => *center,
        }
    }
}

#[derive(Clone, Debug)]
struct AgentState {
    id:          AgentId,
    position:    Point,
    orientation: Point,
    radius:      f64,
    v0:          f64,
    journey:     JourneyId,
    /// Index into the journey's stage list.
    leg:         usize,
}

// ── KinematicEngine ───────────────────────────────────────────────────────────

pub struct KinematicEngine {
    walkable:   Polygon,
    model:      ModelParameters,
    dt:         f64,
    rng:        SimRng,
    stages:     Vec<Stage>,
    journeys:   Vec<Vec<StageId>>,
    /// Active agents in ascending id order.
    agents:     Vec<AgentState>,
    next_agent: u64,
    iteration:  u64,
}

impl KinematicEngine {
    pub fn new(walkable: Polygon, model: ModelParameters, dt: f64, seed: u64) -> Self {
        Self {
            walkable,
            model,
            dt,
            rng: SimRng::new(seed),
            stages: Vec::new(),
            journeys: Vec::new(),
            agents: Vec::new(),
            next_agent: 0,
            iteration: 0,
        }
    }

    fn stage(&self, id: StageId) -> EngineResult<&Stage> {
        self.stages.get(id.index()).ok_or(EngineError::UnknownStage(id))
    }

    fn index(&self) -> RTree<AgentEntry> {
        RTree::bulk_load(
            self.agents
                .iter()
                .enumerate()
                .map(|(slot, a)| AgentEntry { point: a.position.as_array(), slot })
                .collect(),
        )
    }

    fn current_stage(&self, agent: &AgentState) -> &Stage {
        let stage = self.journeys[agent.journey.index()][agent.leg];
        &self.stages[stage.index()]
    }

    /// Heading and speed for agent `slot` from the state at the start of the step.
    fn velocity(&mut self, slot: usize, index: &RTree<AgentEntry>) -> (Point, f64) {
        let me = &self.agents[slot];
        let target = self.current_stage(me).target();
        let e0 = (target - me.position).normalized().unwrap_or(me.orientation);

        let strength = self.model.strength_neighbor_repulsion;
        let range = self.model.range_neighbor_repulsion.max(f64::EPSILON);
        let mut push = Point::default();
        let mut neighbours = Vec::new();
        for entry in index.locate_within_distance(me.position.as_array(), NEIGHBOR_CUTOFF * NEIGHBOR_CUTOFF) {
            if entry.slot == slot {
                continue;
            }
            let other = &self.agents[entry.slot];
            let offset = me.position - other.position;
            let dist = offset.norm();
            if let Some(away) = offset.normalized() {
                let gap = dist - me.radius - other.radius;
                push = push + away * (strength * (-gap / range).exp());
            }
            neighbours.push(entry.slot);
        }

        let mut heading = (e0 + push).normalized().unwrap_or(e0);
        let jitter = self.rng.gen_range(-HEADING_JITTER..=HEADING_JITTER);
        heading = rotate(heading, jitter);

        let me = &self.agents[slot];
        let mut headway = f64::INFINITY;
        for other in neighbours.into_iter().map(|s| &self.agents[s]) {
            let rel = other.position - me.position;
            let ahead = rel.dot(heading);
            if ahead <= 0.0 {
                continue;
            }
            let lateral = (rel.x * heading.y - rel.y * heading.x).abs();
            let contact = me.radius + other.radius;
            if lateral < contact {
                headway = headway.min(rel.norm() - contact);
            }
        }
        let time_gap = self.model.time_gap.max(f64::EPSILON);
        let speed = (headway / time_gap).clamp(0.0, me.v0);
        (heading, speed)
    }

    /// Move from `from` by `delta`, sliding along a wall if the full move
    /// would leave the walkable area.
    fn constrained_move(&self, from: Point, delta: Point, radius: f64) -> Point {
        let start_clearance = self.walkable.boundary_distance(from);
        let ok = |p: Point| {
            self.walkable.contains(p) && {
                let clearance = self.walkable.boundary_distance(p);
                clearance >= radius || clearance >= start_clearance
            }
        };
        [delta, Point::new(delta.x, 0.0), Point::new(0.0, delta.y)]
            .into_iter()
            .map(|d| from + d)
            .find(|&p| ok(p))
            .unwrap_or(from)
    }
}

fn rotate(v: Point, angle: f64) -> Point {
    let (s, c) = angle.sin_cos();
    Point::new(v.x * c - v.y * s, v.x * s + v.y * c)
}

impl DynamicsEngine for KinematicEngine {
    fn add_exit_stage(&mut self, area: &Polygon) -> EngineResult<StageId> {
        let id = StageId::try_from(self.stages.len()).map_err(|e| EngineError::Geometry(e.to_string()))?;
        self.stages.push(Stage::Exit { area: area.clone(), target: area.centroid() });
        Ok(id)
    }

    fn add_waypoint_stage(&mut self, center: Point, radius: f64) -> EngineResult<StageId> {
        if !center.is_finite() || !(radius > 0.0) {
            return Err(EngineError::Geometry(format!("waypoint at {center} with radius {radius}")));
        }
        let id = StageId::try_from(self.stages.len()).map_err(|e| EngineError::Geometry(e.to_string()))?;
        self.stages.push(Stage::Waypoint { center, radius });
        Ok(id)
    }

    fn add_journey(&mut self, stages: &[StageId]) -> EngineResult<JourneyId> {
        if stages.is_empty() {
            return Err(EngineError::EmptyJourney);
        }
        for &s in stages {
            self.stage(s)?;
        }
        let id = JourneyId::try_from(self.journeys.len()).map_err(|e| EngineError::Create(e.to_string()))?;
        self.journeys.push(stages.to_vec());
        Ok(id)
    }

    fn add_agent(&mut self, params: &AgentParameters) -> EngineResult<AgentId> {
        let journey = self
            .journeys
            .get(params.journey.index())
            .ok_or(EngineError::UnknownJourney(params.journey))?;
        let leg = journey
            .iter()
            .position(|&s| s == params.stage)
            .ok_or(EngineError::StageNotInJourney { journey: params.journey, stage: params.stage })?;

        let p = params.position;
        let placement = |reason| EngineError::Placement { position: p, reason };
        if !p.is_finite() || !self.walkable.contains(p) {
            return Err(placement("outside the walkable area"));
        }
        if self.walkable.boundary_distance(p) < params.radius {
            return Err(placement("overlaps a wall"));
        }
        if self.agents.iter().any(|a| a.position.distance(p) < a.radius + params.radius) {
            return Err(placement("overlaps another agent"));
        }

        let id = AgentId(self.next_agent);
        self.next_agent += 1;

        let target = self.stages[journey[leg].index()].target();
        self.agents.push(AgentState {
            id,
            position:    p,
            orientation: (target - p).normalized().unwrap_or(Point::new(1.0, 0.0)),
            radius:      params.radius,
            v0:          params.v0,
            journey:     params.journey,
            leg,
        });
        Ok(id)
    }

    fn step(&mut self) -> EngineResult<()> {
        let index = self.index();
        let mut moves = Vec::with_capacity(self.agents.len());
        for slot in 0..self.agents.len() {
            moves.push(self.velocity(slot, &index));
        }

        for (slot, (heading, speed)) in moves.into_iter().enumerate() {
            let a = &self.agents[slot];
            let next = self.constrained_move(a.position, heading * (speed * self.dt), a.radius);
            if !next.is_finite() {
                return Err(EngineError::Numerical { agent: a.id, iteration: self.iteration });
            }
            let a = &mut self.agents[slot];
            a.position = next;
            a.orientation = heading;
        }

        // Stage progression and exits.
        let mut exited = 0usize;
        let journeys = &self.journeys;
        let stages = &self.stages;
        self.agents.retain_mut(|a| {
            let legs = &journeys[a.journey.index()];
            match &stages[legs[a.leg].index()] {
                Stage::Exit { area, .. } => {
                    if area.contains(a.position) {
                        exited += 1;
                        return false;
                    }
                }
                Stage::Waypoint { center, radius } => {
                    if a.position.distance(*center) <= *radius && a.leg + 1 < legs.len() {
                        a.leg += 1;
                    }
                }
            }
            true
        });

        self.iteration += 1;
        if exited > 0 {
            debug!(iteration = self.iteration, exited, remaining = self.agents.len(), "agents left through exits");
        }
        Ok(())
    }

    fn elapsed_time(&self) -> f64 {
        self.iteration as f64 * self.dt
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
            .map(|a| AgentSample { id: a.id, position: a.position, orientation: a.orientation })
            .collect()
    }

    fn walkable_area(&self) -> &Polygon {
        &self.walkable
    }
}

// ── KinematicFactory ──────────────────────────────────────────────────────────

/// Creates a [`KinematicEngine`] per run.
#[derive(Copy, Clone, Debug, Default)]
pub struct KinematicFactory;

impl EngineFactory for KinematicFactory {
    type Engine = KinematicEngine;

    fn create(
        &self,
        walkable: &Polygon,
        model: &ModelParameters,
        time_step: f64,
        seed: u64,
    ) -> EngineResult<KinematicEngine> {
        if !(time_step.is_finite() && time_step > 0.0) {
            return Err(EngineError::Create(format!("time step must be > 0, got {time_step}")));
        }
        if !matches!(model.model_type, ModelType::CollisionFreeSpeedModel | ModelType::CollisionFreeSpeedModelV2) {
            warn!(model = model.model_type.name(), "model runs on the collision-free speed stepper");
        }
        Ok(KinematicEngine::new(walkable.clone(), model.clone(), time_step, seed))
    }
}
