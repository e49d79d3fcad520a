//! `ev-core`: foundational types for the evacuation run orchestrator.
//!
//! This crate is a dependency of every other `ev-*` crate.  It intentionally
//! has no `ev-*` dependencies and minimal external ones (`rand`, `serde`,
//! `thiserror`, and `uuid` for run identifiers).
//!
//! # What lives here
//!
//! | Module          | Contents                                                   |
//! |-----------------|------------------------------------------------------------|
//! | [`ids`]         | `AgentId`, `StageId`, `JourneyId`, `RunId`                 |
//! | [`geo`]         | `Point`, `Polygon` (with holes), WKT rendering             |
//! | [`rng`]         | `SimRng` (per-run, per-source)                             |
//! | [`params`]      | `RunParameters`, `ModelParameters`, `ModelType`            |
//! | [`error`]       | `CoreError`, `CoreResult`                                  |

pub mod error;
pub mod geo;
pub mod ids;
pub mod params;
pub mod rng;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use error::{CoreError, CoreResult};
pub use geo::{Point, Polygon};
pub use ids::{AgentId, JourneyId, RunId, StageId};
pub use params::{ModelParameters, ModelType, RunParameters};
pub use rng::SimRng;
