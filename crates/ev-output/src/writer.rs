//! The `TrajectoryWriter` trait.

use ev_engine::AgentSample;

use crate::OutputResult;

/// Sink for the frames of one run.
///
/// The orchestrator calls `write_geometry` once, then `write_frame` for
/// every recorded step, then `finish`.
pub trait TrajectoryWriter {
    /// Store the walkable area as WKT.
    fn write_geometry(&mut self, wkt: &str) -> OutputResult<()>;

    /// Append the next frame and return its number.  Frames are numbered
    /// from 0 in call order.
    fn write_frame(&mut self, time: f64, samples: &[AgentSample]) -> OutputResult<u64>;

    /// Frames written so far.
    fn frames_written(&self) -> u64;

    /// Flush everything to disk.  Idempotent.
    fn finish(&mut self) -> OutputResult<()>;
}
