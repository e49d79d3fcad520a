//! `ev-output`: trajectory artifacts for evacuation runs.
//!
//! A run writes one SQLite file through [`SqliteTrajectoryWriter`]; the file
//! is owned by a [`TrajectoryArtifact`] and deleted when the artifact drops,
//! unless it was kept.  [`TrajectoryReader`] pages through a finished file.
//!
//! | Module        | Contents                                                   |
//! |---------------|------------------------------------------------------------|
//! | [`row`]       | `AgentPosition`, `Frame`                                   |
//! | [`writer`]    | `TrajectoryWriter` trait                                   |
//! | [`sqlite`]    | `SqliteTrajectoryWriter`                                   |
//! | [`reader`]    | `TrajectoryReader`, `TrajectoryInfo`, `PageQuery`, `TrajectoryPage` |
//! | [`artifact`]  | `TrajectoryArtifact`                                       |
//! | [`error`]     | `OutputError`, `OutputResult<T>`                           |
//!
//! # File layout
//!
//! ```text
//! geometry        (wkt TEXT)
//! frames          (frame INTEGER PRIMARY KEY, time REAL)
//! trajectory_data (frame, id, pos_x, pos_y, ori_x, ori_y)   index (frame, id)
//! ```
//!
//! Frames are numbered from 0 without gaps and get a `frames` row even when
//! no agent is left, so the frame count never needs a scan of
//! `trajectory_data`.

pub mod artifact;
pub mod error;
pub mod reader;
pub mod row;
pub mod sqlite;
pub mod writer;


pub use artifact::TrajectoryArtifact;
pub use error::{OutputError, OutputResult};
pub use reader::{PageQuery, TrajectoryInfo, TrajectoryPage, TrajectoryReader, DEFAULT_CHUNK_SIZE};
pub use row::{AgentPosition, Frame};
pub use sqlite::SqliteTrajectoryWriter;
pub use writer::TrajectoryWriter;
