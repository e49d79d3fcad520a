//! Journey-routing resolver.
//!
//! # Walk
//!
//! Depth-first from every initial waypoint, carrying the path so far, the set
//! of waypoints on it, and the accumulated weight.  Destinations are visited
//! in rule order, so variant order (and naming) is a pure function of the
//! configuration.
//!
//! # Cycles
//!
//! A destination that is already on the current path is a cycle.  Under
//! [`CyclePolicy::Reject`] the whole journey fails with
//! [`RoutingError::Cycle`]; under [`CyclePolicy::Truncate`] the path stops at
//! the current waypoint and a [`CycleTruncation`] is recorded.  Either way the
//! walk never recurses more than `max_depth` waypoints deep.

use rustc_hash::FxHashSet;
use tracing::{debug, warn};

use ev_config::{Journey, StageRef, ValidatedConfig};

use crate::variant::{CycleTruncation, JourneyVariant, Resolution};
use crate::{RoutingError, RoutingResult};

/// Longest waypoint chain a single variant may contain.
pub const MAX_ROUTING_DEPTH: usize = 64;

/// What to do when a routing rule points back at a waypoint already on the
/// current path.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum CyclePolicy {
    /// Fail resolution with [`RoutingError::Cycle`].
    #[default]
    Reject,
    /// End the path at the current waypoint and report the truncation.
    Truncate,
}

// ── Resolver ──────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug)]
pub struct Resolver {
    pub policy:    CyclePolicy,
    pub max_depth: usize,
}

impl Default for Resolver {
    fn default() -> Self {
        Self { policy: CyclePolicy::default(), max_depth: MAX_ROUTING_DEPTH }
    }
}

impl Resolver {
    pub fn new(policy: CyclePolicy) -> Self {
        Self { policy, ..Self::default() }
    }

    /// Expand journey `journey` of `config` into its weighted variants.
    ///
    /// A journey without routing, without a spawn source, or without an
    /// initial waypoint resolves to its base stage list at weight 100.
    pub fn resolve_journey(&self, config: &ValidatedConfig, journey: usize) -> RoutingResult<Resolution> {
        let spec = &config.journeys[journey];
        let origin = spec.distributions().next();

        let initial = initial_waypoints(config, journey, spec);
        if origin.is_none() || initial.is_empty() {
            return Ok(Resolution {
                variants:    vec![make_variant(spec, journey, 0, origin, spec.stages.clone(), 100.0)],
                truncations: Vec::new(),
            });
        }

        let mut walk = Walk {
            resolver:    self,
            config,
            journey,
            paths:       Vec::new(),
            truncations: Vec::new(),
        };
        let start_weight = 100.0 / initial.len() as f64;
        for &wp in &initial {
            // Base stages up to the initial waypoint stay in front of the path.
            let mut path: Vec<StageRef> = spec
                .stages
                .iter()
                .copied()
                .take_while(|s| *s != StageRef::Waypoint(wp))
                .collect();
            let mut on_path = FxHashSet::default();
            walk.expand(wp, &mut path, &mut on_path, start_weight)?;
        }

        let variants: Vec<JourneyVariant> = walk
            .paths
            .into_iter()
            .enumerate()
            .map(|(n, (stages, weight))| make_variant(spec, journey, n, origin, stages, weight))
            .collect();

        debug!(
            journey = %spec.id,
            variants = variants.len(),
            truncations = walk.truncations.len(),
            "journey resolved"
        );
        Ok(Resolution { variants, truncations: walk.truncations })
    }
}

/// Waypoints of the journey that own a rule for it and are never a target of
/// one of its rules, in stage order.
fn initial_waypoints(config: &ValidatedConfig, journey: usize, spec: &Journey) -> Vec<usize> {
    if !config.has_routing() {
        return Vec::new();
    }
    let targets: FxHashSet<usize> = config
        .rules_for(journey)
        .flat_map(|(_, rule)| rule.destinations.iter().filter_map(|d| d.target.waypoint()))
        .collect();

    let mut initial = Vec::new();
    for wp in spec.waypoints() {
        if config.rule(journey, wp).is_some() && !targets.contains(&wp) && !initial.contains(&wp) {
            initial.push(wp);
        }
    }
    initial
}

fn make_variant(
    spec: &Journey,
    journey: usize,
    n: usize,
    origin: Option<usize>,
    stages: Vec<StageRef>,
    probability_weight: f64,
) -> JourneyVariant {
    JourneyVariant {
        id: format!("{}_variant_{n}", spec.id),
        journey,
        origin,
        stages,
        probability_weight,
    }
}

// ── Walk ──────────────────────────────────────────────────────────────────────

struct Walk<'a> {
    resolver:    &'a Resolver,
    config:      &'a ValidatedConfig,
    journey:     usize,
    paths:       Vec<(Vec<StageRef>, f64)>,
    truncations: Vec<CycleTruncation>,
}

impl Walk<'_> {
    fn expand(
        &mut self,
        node: usize,
        path: &mut Vec<StageRef>,
        on_path: &mut FxHashSet<usize>,
        weight: f64,
    ) -> RoutingResult<()> {
        path.push(StageRef::Waypoint(node));
        on_path.insert(node);
        if on_path.len() > self.resolver.max_depth {
            return Err(RoutingError::DepthExceeded {
                journey: self.journey_id().to_owned(),
                depth:   self.resolver.max_depth,
            });
        }

        let config = self.config;
        match config.rule(self.journey, node) {
            None => {
                warn!(
                    journey = %self.journey_id(),
                    waypoint = %config.waypoints[node].id,
                    "variant ends at a waypoint without routing"
                );
                self.paths.push((path.clone(), weight));
            }
            Some(rule) => {
                for d in &rule.destinations {
                    let w = weight * d.percentage / 100.0;
                    match d.target.waypoint() {
                        None => {
                            let mut full = path.clone();
                            full.push(d.target);
                            self.paths.push((full, w));
                        }
                        Some(next) if on_path.contains(&next) => self.on_cycle(path, next, w)?,
                        Some(next) => self.expand(next, path, on_path, w)?,
                    }
                }
            }
        }

        path.pop();
        on_path.remove(&node);
        Ok(())
    }

    fn on_cycle(&mut self, path: &[StageRef], next: usize, weight: f64) -> RoutingResult<()> {
        let mut labels: Vec<String> = path
            .iter()
            .filter_map(|s| s.waypoint())
            .map(|wp| self.config.waypoints[wp].id.clone())
            .collect();
        labels.push(self.config.waypoints[next].id.clone());

        match self.resolver.policy {
            CyclePolicy::Reject => Err(RoutingError::Cycle {
                journey: self.journey_id().to_owned(),
                path:    labels,
            }),
            CyclePolicy::Truncate => {
                warn!(
                    journey = %self.journey_id(),
                    path = %labels.join(" → "),
                    weight,
                    "routing cycle truncated"
                );
                self.truncations.push(CycleTruncation {
                    journey: self.journey_id().to_owned(),
                    path:    labels,
                    weight,
                });
                self.paths.push((path.to_vec(), weight));
                Ok(())
            }
        }
    }

    fn journey_id(&self) -> &str {
        &self.config.journeys[self.journey].id
    }
}
