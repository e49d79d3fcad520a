//! Input schema, exactly as it appears in a configuration file.
//!
//! ```json
//! {
//!   "exits":         { "exit_0": { "coordinates": [[9,0],[10,0],[10,4],[9,4]] } },
//!   "distributions": { "dist_0": { "coordinates": [[0,0],[3,0],[3,4],[0,4]],
//!                                  "parameters": { "number": 50, "v0": 1.3 } } },
//!   "waypoints":     { "wp_0":   { "center": [5, 2], "radius": 0.5 } },
//!   "journeys":      [ { "id": "j0", "stages": ["dist_0", "wp_0", "exit_0"] } ],
//!   "waypoint_routing": {
//!     "wp_0": { "j0": { "destinations": [ { "target": "exit_0", "percentage": 100 } ] } }
//!   }
//! }
//! ```
//!
//! Only `exits` is required.  Ids are free-form strings and must be unique
//! across exits, distributions, and waypoints, because journeys reference all
//! three kinds through one `stages` list.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use ev_core::{Point, RunParameters};

// ── Stages and sources ────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExitSpec {
    pub coordinates: Vec<Point>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistributionSpec {
    pub coordinates: Vec<Point>,
    #[serde(default)]
    pub parameters: DistributionParameters,
}

/// Agent parameters for one distribution (spawn source).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionParameters {
    /// Agents to place (immediately) or to inject over the flow window.
    pub number:            u32,
    /// Agent radius in metres.
    pub radius:            f64,
    /// Desired walking speed in m/s.
    pub v0:                f64,
    pub use_flow_spawning: bool,
    pub flow_start_time:   f64,
    pub flow_end_time:     f64,
}

impl Default for DistributionParameters {
    fn default() -> Self {
        Self {
            number:            10,
            radius:            0.2,
            v0:                1.2,
            use_flow_spawning: false,
            flow_start_time:   0.0,
            flow_end_time:     10.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WaypointSpec {
    pub center: Point,
    pub radius: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JourneySpec {
    pub id:     String,
    pub stages: Vec<String>,
}

// ── Routing ───────────────────────────────────────────────────────────────────

/// Branching rule owned by one waypoint for one journey.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
pub struct RoutingSpec {
    #[serde(default)]
    pub destinations: Vec<DestinationSpec>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DestinationSpec {
    pub target:     String,
    pub percentage: f64,
}

// ── SimulationConfig ──────────────────────────────────────────────────────────

/// One evacuation scenario's stages, sources, journeys, and routing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub exits: IndexMap<String, ExitSpec>,

    #[serde(default)]
    pub distributions: IndexMap<String, DistributionSpec>,

    #[serde(default)]
    pub waypoints: IndexMap<String, WaypointSpec>,

    #[serde(default)]
    pub journeys: Vec<JourneySpec>,

    /// `waypoint id → journey id → rule`.
    #[serde(default)]
    pub waypoint_routing: IndexMap<String, IndexMap<String, RoutingSpec>>,
}

impl SimulationConfig {
    /// Sum of `number` over every declared distribution.
    pub fn declared_agents(&self) -> u64 {
        self.distributions.values().map(|d| u64::from(d.parameters.number)).sum()
    }
}

// ── Scenario ──────────────────────────────────────────────────────────────────

/// A self-contained run request: geometry, configuration, and parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Exterior ring of the walkable area.
    pub walkable_area: Vec<Point>,

    /// Obstacles cut out of the walkable area.
    #[serde(default)]
    pub obstacles: Vec<Vec<Point>>,

    pub config: SimulationConfig,

    #[serde(default)]
    pub parameters: RunParameters,
}
