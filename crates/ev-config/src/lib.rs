//! `ev-config`: scenario configuration for the evacuation run orchestrator.
//!
//! # Crate layout
//!
//! | Module         | Contents                                                     |
//! |----------------|--------------------------------------------------------------|
//! | [`schema`]     | serde input structs (`SimulationConfig`, `Scenario`, …)      |
//! | [`validated`]  | `ValidatedConfig`, `StageRef`, resolved exits/sources/rules  |
//! | [`validate`]   | `validate`, the synchronous pre-run checks                   |
//! | [`loader`]     | `load_config_path`, `load_config_reader`, `load_scenario_*`  |
//! | [`error`]      | `ConfigError`, `ValidationError`                             |
//!
//! # Two-phase model
//!
//! ```text
//! JSON ──serde──▶ SimulationConfig ──validate()──▶ ValidatedConfig
//!                 (string ids, raw coordinates)      (indices, polygons, StageRef)
//! ```
//!
//! Everything downstream (routing, spawning, orchestration) consumes only the
//! validated form, so unknown ids and bad percentages can never reach a run.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;
pub mod validated;


pub use error::{ConfigError, ConfigResult, ValidationError};
pub use loader::{load_config_path, load_config_reader, load_scenario_path, load_scenario_reader};
pub use schema::{
    DestinationSpec, DistributionParameters, DistributionSpec, ExitSpec, JourneySpec,
    RoutingSpec, Scenario, SimulationConfig, WaypointSpec,
};
pub use validate::{validate, PERCENTAGE_TOLERANCE};
pub use validated::{
    Destination, Distribution, Exit, FlowWindow, Journey, RoutingRule, StageRef,
    ValidatedConfig, Waypoint,
};
