//! `ev-service`: keeps track of submitted simulation requests.
//!
//! # Crate layout
//!
//! | Module      | Contents                                              |
//! |-------------|-------------------------------------------------------|
//! | [`service`] | `SimulationService`, `ServiceConfig`                  |
//! | [`record`]  | `RunResults`, `FailedRun`, per-request job records    |
//! | [`error`]   | `ServiceError`, `ServiceResult<T>`                    |
//!
//! # Request lifecycle
//!
//! ```text
//! submit ──validate + resolve routing──► queued ──pool──► run_batch
//!                                                     ├─ Ok  → store results → completed
//!                                                     └─ Err → store message → failed
//! terminal + retention elapsed ──purge──► record, progress and artifacts dropped
//! ```
//!
//! Results are stored before the terminal progress update is published, so a
//! client that observes `completed` can always fetch them.

pub mod error;
pub mod record;
pub mod service;


pub use error::{ServiceError, ServiceResult};
pub use record::{FailedRun, RunResults};
pub use service::{ServiceConfig, SimulationService, DEFAULT_RETENTION, SERVICE_WORKERS};
