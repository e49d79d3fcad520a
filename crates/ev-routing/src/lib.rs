//! `ev-routing`: expands percentage-weighted waypoint routing into concrete
//! journey variants and allocates agents across them.
//!
//! # Crate layout
//!
//! | Module         | Contents                                                  |
//! |----------------|-----------------------------------------------------------|
//! | [`variant`]    | `JourneyVariant`, `CycleTruncation`, `Resolution`         |
//! | [`resolver`]   | `Resolver`, `CyclePolicy`, `MAX_ROUTING_DEPTH`            |
//! | [`plan`]       | `RoutingPlan` (variants grouped by spawn source)          |
//! | [`allocate`]   | `allocate_static`, `select_weighted`                      |
//! | [`error`]      | `RoutingError`, `RoutingResult<T>`                        |
//!
//! # Expansion (summary)
//!
//! ```text
//! initial waypoints = waypoints of the journey that own a rule for it
//!                     and are never a rule target within it
//! weight(child)     = weight(parent) × percentage / 100
//! path ends         at an exit, or at a waypoint without a rule
//! ```
//!
//! Each of the `k` initial waypoints starts at `100 / k`, so a journey's
//! variants sum to 100 unless a cycle was truncated.

pub mod allocate;
pub mod error;
pub mod plan;
pub mod resolver;
pub mod variant;


pub use allocate::{allocate_static, select_weighted};
pub use error::{RoutingError, RoutingResult};
pub use plan::RoutingPlan;
pub use resolver::{CyclePolicy, Resolver, MAX_ROUTING_DEPTH};
pub use variant::{CycleTruncation, JourneyVariant, Resolution};
