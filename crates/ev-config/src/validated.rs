//! Validated configuration: ids resolved to indices, coordinates to polygons.
//!
//! Indices are positions in the `Vec`s of [`ValidatedConfig`], which keep the
//! key order of the input file.  Every `StageRef` held here is guaranteed to
//! point at an existing entry.

use indexmap::IndexMap;

use ev_core::{Point, Polygon};

/// Smallest flow window the scheduler will accept, in seconds.
pub const MIN_FLOW_WINDOW: f64 = 0.1;

// ── StageRef ──────────────────────────────────────────────────────────────────

/// A journey stage, resolved once at validation time.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageRef {
    Distribution(usize),
    Waypoint(usize),
    Exit(usize),
}

impl StageRef {
    #[inline]
    pub fn waypoint(self) -> Option<usize> {
        match self {
            StageRef::Waypoint(i) => Some(i),
            _ => None,
        }
    }
}

// ── Stages and sources ────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct Exit {
    pub id:   String,
    pub area: Polygon,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Waypoint {
    pub id:     String,
    pub center: Point,
    pub radius: f64,
}

/// Time window `[start, end]` over which a flow source injects its agents.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FlowWindow {
    pub start: f64,
    pub end:   f64,
}

impl FlowWindow {
    /// Normalise a requested window: `start ≥ 0`, `end ≥ start + MIN_FLOW_WINDOW`.
    pub fn new(start: f64, end: f64) -> Self {
        let start = start.max(0.0);
        Self { start, end: end.max(start + MIN_FLOW_WINDOW) }
    }

    #[inline]
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Seconds between consecutive spawns for `total` agents.
    #[inline]
    pub fn interval(&self, total: u32) -> f64 {
        self.duration() / f64::from(total.max(1))
    }

    #[inline]
    pub fn contains(&self, t: f64) -> bool {
        self.start <= t && t <= self.end
    }
}

/// A spawn source: where agents appear and with which parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct Distribution {
    pub id:     String,
    pub area:   Polygon,
    pub number: u32,
    pub radius: f64,
    pub v0:     f64,
    /// `Some` for flow sources, `None` for agents placed before the first step.
    pub flow:   Option<FlowWindow>,
}

impl Distribution {
    /// Id of the implicit source used when a configuration declares none.
    pub const IMPLICIT_ID: &'static str = "walkable_area";

    /// The implicit source: the whole walkable area, 100 agents.
    pub fn covering(area: Polygon) -> Self {
        Self {
            id:     Self::IMPLICIT_ID.to_owned(),
            area,
            number: 100,
            radius: 0.2,
            v0:     1.2,
            flow:   None,
        }
    }

    #[inline]
    pub fn is_flow(&self) -> bool {
        self.flow.is_some()
    }
}

// ── Journeys and routing ──────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub struct Journey {
    pub id:     String,
    pub stages: Vec<StageRef>,
}

impl Journey {
    /// Distributions named anywhere in the stage list.
    pub fn distributions(&self) -> impl Iterator<Item = usize> + '_ {
        self.stages.iter().filter_map(|s| match *s {
            StageRef::Distribution(i) => Some(i),
            _ => None,
        })
    }

    /// Waypoints named in the stage list, in order.
    pub fn waypoints(&self) -> impl Iterator<Item = usize> + '_ {
        self.stages.iter().filter_map(|s| s.waypoint())
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Destination {
    /// Always a `Waypoint` or an `Exit`.
    pub target:     StageRef,
    pub percentage: f64,
}

/// Non-empty branching rule; percentages sum to 100 within tolerance.
#[derive(Clone, Debug, PartialEq)]
pub struct RoutingRule {
    pub destinations: Vec<Destination>,
}

// ── ValidatedConfig ───────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Default)]
pub struct ValidatedConfig {
    pub exits:         Vec<Exit>,
    pub distributions: Vec<Distribution>,
    pub waypoints:     Vec<Waypoint>,
    pub journeys:      Vec<Journey>,
    /// `(journey index, waypoint index) → rule`, in file order.
    pub rules:         IndexMap<(usize, usize), RoutingRule>,
}

impl ValidatedConfig {
    /// Rule owned by `waypoint` for `journey`, if any.
    #[inline]
    pub fn rule(&self, journey: usize, waypoint: usize) -> Option<&RoutingRule> {
        self.rules.get(&(journey, waypoint))
    }

    /// `true` if any journey has at least one routing rule.
    pub fn has_routing(&self) -> bool {
        !self.rules.is_empty()
    }

    /// All rules belonging to `journey`, keyed by owning waypoint.
    pub fn rules_for(&self, journey: usize) -> impl Iterator<Item = (usize, &RoutingRule)> + '_ {
        self.rules
            .iter()
            .filter(move |((j, _), _)| *j == journey)
            .map(|((_, wp), rule)| (*wp, rule))
    }
}
