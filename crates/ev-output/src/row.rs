//! Plain data types read back from a trajectory file.

use serde::Serialize;

/// One agent in one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AgentPosition {
    pub agent_id: u64,
    pub x:        f64,
    pub y:        f64,
    pub ori_x:    f64,
    pub ori_y:    f64,
}

/// All agents recorded in one frame, ordered by id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub frame:  u64,
    /// Simulated time of the frame in seconds.
    pub time:   f64,
    pub agents: Vec<AgentPosition>,
}
