//! Ownership of a trajectory file.

use std::path::{Path, PathBuf};

use tempfile::TempPath;

use crate::{OutputError, OutputResult, TrajectoryReader};

/// A trajectory file that is deleted when dropped unless [`keep`]
/// (Self::keep) claims it.
#[derive(Debug)]
pub struct TrajectoryArtifact {
    path: TempPath,
}

impl TrajectoryArtifact {
    /// Reserve a fresh `ev_trajectory_*.sqlite` file inside `dir`.
    pub fn create_in(dir: &Path) -> OutputResult<Self> {
        let file = tempfile::Builder::new()
            .prefix("ev_trajectory_")
            .suffix(".sqlite")
            .tempfile_in(dir)?;
        Ok(Self { path: file.into_temp_path() })
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn reader(&self) -> OutputResult<TrajectoryReader> {
        TrajectoryReader::open(&self.path)
    }

    /// Stop tracking the file and return its path.  The caller now owns it.
    pub fn keep(self) -> OutputResult<PathBuf> {
        self.path.keep().map_err(|e| OutputError::Io(e.error))
    }
}
