//! Synchronous configuration checks.
//!
//! [`validate`] walks the raw schema once, in file order, and either returns a
//! fully resolved [`ValidatedConfig`] or the first problem found.  Nothing
//! here allocates run resources, so a rejected configuration costs nothing.

use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use tracing::debug;

use ev_core::{Polygon, RunParameters};

use crate::schema::{DistributionSpec, Scenario, SimulationConfig, WaypointSpec};
use crate::validated::{
    Destination, Distribution, Exit, FlowWindow, Journey, RoutingRule, StageRef,
    ValidatedConfig, Waypoint,
};
use crate::ValidationError;

/// Allowed deviation of a rule's percentage sum from 100.
pub const PERCENTAGE_TOLERANCE: f64 = 0.1;

/// Validate `config` and resolve every id into a [`StageRef`].
pub fn validate(config: &SimulationConfig) -> Result<ValidatedConfig, ValidationError> {
    if config.exits.is_empty() {
        return Err(ValidationError::NoExits);
    }

    let mut ids: FxHashMap<&str, StageRef> = FxHashMap::default();

    // ── Stages and sources ────────────────────────────────────────────────
    let mut exits = Vec::with_capacity(config.exits.len());
    for (i, (id, spec)) in config.exits.iter().enumerate() {
        claim(&mut ids, id, StageRef::Exit(i))?;
        let area = polygon("exit", id, spec.coordinates.clone())?;
        exits.push(Exit { id: id.clone(), area });
    }

    let mut distributions = Vec::with_capacity(config.distributions.len());
    for (i, (id, spec)) in config.distributions.iter().enumerate() {
        claim(&mut ids, id, StageRef::Distribution(i))?;
        distributions.push(distribution(id, spec)?);
    }

    let mut waypoints = Vec::with_capacity(config.waypoints.len());
    for (i, (id, spec)) in config.waypoints.iter().enumerate() {
        claim(&mut ids, id, StageRef::Waypoint(i))?;
        waypoints.push(waypoint(id, spec)?);
    }

    // ── Journeys ──────────────────────────────────────────────────────────
    let mut journey_index: IndexMap<&str, usize> = IndexMap::with_capacity(config.journeys.len());
    let mut journeys = Vec::with_capacity(config.journeys.len());
    for spec in &config.journeys {
        if journey_index.insert(spec.id.as_str(), journeys.len()).is_some() {
            return Err(ValidationError::DuplicateJourney(spec.id.clone()));
        }
        if spec.stages.is_empty() {
            return Err(ValidationError::EmptyJourney(spec.id.clone()));
        }
        let stages = spec
            .stages
            .iter()
            .map(|s| {
                ids.get(s.as_str()).copied().ok_or_else(|| ValidationError::UnknownStage {
                    journey: spec.id.clone(),
                    stage:   s.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        journeys.push(Journey { id: spec.id.clone(), stages });
    }

    // ── Routing rules ─────────────────────────────────────────────────────
    let mut rules = IndexMap::new();
    for (wp_id, per_journey) in &config.waypoint_routing {
        let Some(&StageRef::Waypoint(wp)) = ids.get(wp_id.as_str()) else {
            return Err(ValidationError::UnknownRoutingWaypoint(wp_id.clone()));
        };
        for (journey_id, spec) in per_journey {
            let Some(&journey) = journey_index.get(journey_id.as_str()) else {
                return Err(ValidationError::UnknownRoutingJourney {
                    waypoint: wp_id.clone(),
                    journey:  journey_id.clone(),
                });
            };
            // An empty destination list is the same as no rule.
            if spec.destinations.is_empty() {
                continue;
            }

            let mut destinations = Vec::with_capacity(spec.destinations.len());
            for d in &spec.destinations {
                let target = match ids.get(d.target.as_str()) {
                    Some(&t) if !matches!(t, StageRef::Distribution(_)) => t,
                    _ => {
                        return Err(ValidationError::UnknownRoutingTarget {
                            waypoint: wp_id.clone(),
                            journey:  journey_id.clone(),
                            target:   d.target.clone(),
                        });
                    }
                };
                // A 0% branch could never be taken.
                if !(d.percentage > 0.0 && d.percentage <= 100.0) {
                    return Err(ValidationError::PercentageOutOfRange {
                        waypoint:   wp_id.clone(),
                        journey:    journey_id.clone(),
                        target:     d.target.clone(),
                        percentage: d.percentage,
                    });
                }
                destinations.push(Destination { target, percentage: d.percentage });
            }

            let sum: f64 = destinations.iter().map(|d| d.percentage).sum();
            if (sum - 100.0).abs() > PERCENTAGE_TOLERANCE {
                return Err(ValidationError::PercentageSum {
                    waypoint: wp_id.clone(),
                    journey:  journey_id.clone(),
                    sum,
                });
            }
            rules.insert((journey, wp), RoutingRule { destinations });
        }
    }

    debug!(
        exits = exits.len(),
        distributions = distributions.len(),
        waypoints = waypoints.len(),
        journeys = journeys.len(),
        rules = rules.len(),
        "configuration validated"
    );

    Ok(ValidatedConfig { exits, distributions, waypoints, journeys, rules })
}

impl Scenario {
    /// Walkable area with obstacles as holes.
    pub fn walkable_polygon(&self) -> Result<Polygon, ValidationError> {
        Polygon::with_holes(self.walkable_area.clone(), self.obstacles.clone()).map_err(|source| {
            ValidationError::Geometry { kind: "walkable area", id: String::new(), source }
        })
    }

    /// Validate geometry, configuration, and run parameters together.
    pub fn validate(&self) -> Result<(Polygon, ValidatedConfig, RunParameters), ValidationError> {
        self.parameters.validate()?;
        let walkable = self.walkable_polygon()?;
        let config = validate(&self.config)?;
        Ok((walkable, config, self.parameters.clone()))
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn claim<'a>(
    ids: &mut FxHashMap<&'a str, StageRef>,
    id: &'a str,
    stage: StageRef,
) -> Result<(), ValidationError> {
    match ids.insert(id, stage) {
        Some(_) => Err(ValidationError::DuplicateId(id.to_owned())),
        None => Ok(()),
    }
}

fn polygon(kind: &'static str, id: &str, ring: Vec<ev_core::Point>) -> Result<Polygon, ValidationError> {
    Polygon::new(ring).map_err(|source| ValidationError::Geometry { kind, id: id.to_owned(), source })
}

fn distribution(id: &str, spec: &DistributionSpec) -> Result<Distribution, ValidationError> {
    let area = polygon("distribution", id, spec.coordinates.clone())?;
    let p = &spec.parameters;
    let invalid = |reason: String| ValidationError::InvalidDistribution { id: id.to_owned(), reason };

    if p.number == 0 {
        return Err(invalid("invalid agent count: 0".to_owned()));
    }
    if !(p.radius.is_finite() && p.radius > 0.0) {
        return Err(invalid(format!("radius must be > 0, got {}", p.radius)));
    }
    if !(p.v0.is_finite() && p.v0 > 0.0) {
        return Err(invalid(format!("v0 must be > 0, got {}", p.v0)));
    }

    let flow = if p.use_flow_spawning {
        if !(p.flow_start_time.is_finite() && p.flow_start_time >= 0.0) {
            return Err(invalid(format!("flow_start_time must be ≥ 0, got {}", p.flow_start_time)));
        }
        if !(p.flow_end_time.is_finite() && p.flow_end_time > p.flow_start_time) {
            return Err(invalid(format!(
                "flow_end_time ({}) must be after flow_start_time ({})",
                p.flow_end_time, p.flow_start_time
            )));
        }
        Some(FlowWindow::new(p.flow_start_time, p.flow_end_time))
    } else {
        None
    };

    Ok(Distribution {
        id: id.to_owned(),
        area,
        number: p.number,
        radius: p.radius,
        v0: p.v0,
        flow,
    })
}

fn waypoint(id: &str, spec: &WaypointSpec) -> Result<Waypoint, ValidationError> {
    if !spec.center.is_finite() {
        return Err(ValidationError::InvalidWaypoint {
            id:     id.to_owned(),
            reason: format!("center {} is not finite", spec.center),
        });
    }
    if !(spec.radius.is_finite() && spec.radius > 0.0) {
        return Err(ValidationError::InvalidWaypoint {
            id:     id.to_owned(),
            reason: format!("radius must be > 0, got {}", spec.radius),
        });
    }
    Ok(Waypoint { id: id.to_owned(), center: spec.center, radius: spec.radius })
}
