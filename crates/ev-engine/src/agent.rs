use ev_core::{AgentId, JourneyId, Point, StageId};

/// Everything an engine needs to add one agent.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AgentParameters {
    pub position: Point,
    pub radius:   f64,
    /// Desired speed in m/s.
    pub v0:       f64,
    pub journey:  JourneyId,
    /// First stage the agent heads for; must belong to `journey`.
    pub stage:    StageId,
}

/// One agent's state as recorded in a trajectory frame.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AgentSample {
    pub id:          AgentId,
    pub position:    Point,
    /// Unit heading.
    pub orientation: Point,
}
