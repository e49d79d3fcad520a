use ev_config::StageRef;

/// One fully resolved path through a journey's branching rules.
#[derive(Clone, Debug, PartialEq)]
pub struct JourneyVariant {
    /// `"{journey id}_variant_{n}"`, `n` counting from 0 within the journey.
    pub id:                 String,
    /// Index of the journey this variant was derived from.
    pub journey:            usize,
    /// Spawn source the path starts from, when the journey names one.
    pub origin:             Option<usize>,
    /// Full stage sequence, distributions included.
    pub stages:             Vec<StageRef>,
    /// Share of the journey's agents, in `(0, 100]`.
    pub probability_weight: f64,
}

impl JourneyVariant {
    /// Stages the dynamics engine tracks (waypoints and exits, in order).
    pub fn engine_stages(&self) -> impl Iterator<Item = StageRef> + '_ {
        self.stages.iter().copied().filter(|s| !matches!(s, StageRef::Distribution(_)))
    }
}

/// A path cut short because it revisited a waypoint.
///
/// The kept variant ends at the last waypoint before the loop, so agents on
/// it never reach an exit.  `weight` is the probability mass routed onto it.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleTruncation {
    pub journey: String,
    /// Stage ids up to and including the waypoint that loops back.
    pub path:    Vec<String>,
    pub weight:  f64,
}

/// Output of resolving one journey.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Resolution {
    pub variants:    Vec<JourneyVariant>,
    pub truncations: Vec<CycleTruncation>,
}
