//! Per-source spawn state.

use ev_config::{Distribution, FlowWindow};
use ev_core::{JourneyId, Point, Polygon, SimRng, StageId};
use ev_engine::{DynamicsEngine, FLOW_SAMPLING};

use crate::{SpawnError, SpawnResult};

/// Slack on `now ≥ next_spawn_time` so accumulated step rounding
/// (`100 × 0.01 ≠ 1.0`) does not postpone a spawn by a whole tick.
pub(crate) const SCHEDULE_EPSILON: f64 = 1e-9;

/// One journey variant a spawned agent may follow, already registered with
/// the engine.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VariantTarget {
    /// Index into the run's `RoutingPlan::variants()`.
    pub variant: usize,
    pub journey: JourneyId,
    /// First stage of the variant after the spawn area.
    pub stage:   StageId,
    pub weight:  f64,
}

/// A direct journey to one exit, used when a source has no variants.
#[derive(Clone, Debug, PartialEq)]
pub struct ExitTarget {
    pub area:    Polygon,
    pub journey: JourneyId,
    pub stage:   StageId,
}

/// Nearest exit to `p` by distance to the exit polygon.  Ties go to the
/// earlier exit.
pub fn nearest_exit(exits: &[ExitTarget], p: Point) -> Option<&ExitTarget> {
    exits
        .iter()
        .map(|e| (e, e.area.distance(p)))
        .fold(None, |best: Option<(&ExitTarget, f64)>, (e, d)| match best {
            Some((_, bd)) if bd <= d => best,
            _ => Some((e, d)),
        })
        .map(|(e, _)| e)
}

/// A flow distribution and how far it has got.
#[derive(Clone, Debug)]
pub struct SpawnSource {
    pub id:           String,
    /// Index of the distribution in the validated configuration.
    pub distribution: usize,
    pub window:       FlowWindow,
    pub total:        u32,
    pub spawned:      u32,
    pub radius:       f64,
    pub v0:           f64,
    /// Reusable candidate positions, already shuffled.
    pub candidates:   Vec<Point>,
    /// Empty when agents should head for the nearest exit.
    pub variants:     Vec<VariantTarget>,
}

impl SpawnSource {
    /// Build the source for `dist` and fill its candidate pool from the
    /// engine's walkable area.
    ///
    /// The pool is sampled "until filled" and shuffled with a generator
    /// derived from `seed` and `stream`, so two sources never share an order.
    pub fn prepare<E: DynamicsEngine + ?Sized>(
        index: usize,
        dist: &Distribution,
        variants: Vec<VariantTarget>,
        engine: &E,
        seed: u64,
        stream: u64,
    ) -> SpawnResult<Self> {
        let window = dist.flow.unwrap_or_else(|| FlowWindow::new(0.0, 0.0));
        let mut candidates = engine
            .sample_positions(&dist.area, &FLOW_SAMPLING, seed)
            .map_err(|error| SpawnError::Sampling { source_id: dist.id.clone(), error })?;
        SimRng::derive(seed, stream).shuffle(&mut candidates);

        Ok(Self {
            id: dist.id.clone(),
            distribution: index,
            window,
            total: dist.number,
            spawned: 0,
            radius: dist.radius,
            v0: dist.v0,
            candidates,
            variants,
        })
    }

    /// Seconds between consecutive spawns.
    #[inline]
    pub fn interval(&self) -> f64 {
        self.window.interval(self.total)
    }

    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.spawned >= self.total
    }

    /// Scheduled time of the next agent, `None` once every agent is out.
    pub fn next_spawn_time(&self) -> Option<f64> {
        (!self.is_exhausted())
            .then(|| self.window.start + f64::from(self.spawned) * self.interval())
    }

    /// `true` if an agent should be placed at `now`.
    pub fn is_due(&self, now: f64) -> bool {
        self.window.contains(now)
            && self
                .next_spawn_time()
                .is_some_and(|t| now + SCHEDULE_EPSILON >= t)
    }

    /// `true` if the window has closed with agents still unspawned.
    pub fn is_missed(&self, now: f64) -> bool {
        !self.is_exhausted() && now > self.window.end
    }

    /// Agents still to come, `0` once the window has closed.
    pub fn remaining(&self, now: f64) -> u32 {
        if now > self.window.end { 0 } else { self.total - self.spawned.min(self.total) }
    }
}
