//! `ev-flow`: injects agents from flow sources while a run is stepping.
//!
//! # Crate layout
//!
//! | Module         | Contents                                                  |
//! |----------------|-----------------------------------------------------------|
//! | [`source`]     | `SpawnSource`, `VariantTarget`, `ExitTarget`              |
//! | [`scheduler`]  | `FlowScheduler`, `SpawnEvent`                             |
//! | [`error`]      | `SpawnError`, `SpawnResult<T>`                            |
//!
//! # Schedule model (summary)
//!
//! A source releases `total` agents evenly over its window `[start, end]`:
//!
//! ```text
//! interval        = (end - start) / total
//! next_spawn_time = start + spawned × interval
//! due(now)        ⇔ start ≤ now ≤ end  ∧  spawned < total  ∧  now ≥ next_spawn_time
//! ```
//!
//! Each tick the scheduler visits sources in declaration order and keeps
//! placing agents while a source is due, so a step longer than the interval
//! still releases every agent scheduled inside it.  Candidate positions are
//! tried in rotating order from `spawned mod pool`; a source that cannot
//! place an agent anywhere in its pool fails the run.

pub mod error;
pub mod scheduler;
pub mod source;


pub use error::{SpawnError, SpawnResult};
pub use scheduler::{FlowScheduler, SpawnEvent};
pub use source::{nearest_exit, ExitTarget, SpawnSource, VariantTarget};
