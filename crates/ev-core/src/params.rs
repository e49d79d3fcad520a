//! Run parameters.
//!
//! Loaded from the `parameters` block of a scenario file (or built in code)
//! and duplicated into every run of a multi-run batch.  Defaults mirror the
//! values evacuation studies are usually started with.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

/// Hard upper bound on seeds per batch.
pub const MAX_SIMULATIONS: u32 = 10;

// ── ModelType ─────────────────────────────────────────────────────────────────

/// Pedestrian movement model requested from the dynamics engine.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelType {
    #[default]
    CollisionFreeSpeedModel,
    CollisionFreeSpeedModelV2,
    GeneralizedCentrifugalForceModel,
    SocialForceModel,
    AnticipationVelocityModel,
}

impl ModelType {
    pub fn name(self) -> &'static str {
        match self {
            ModelType::CollisionFreeSpeedModel => "CollisionFreeSpeedModel",
            ModelType::CollisionFreeSpeedModelV2 => "CollisionFreeSpeedModelV2",
            ModelType::GeneralizedCentrifugalForceModel => "GeneralizedCentrifugalForceModel",
            ModelType::SocialForceModel => "SocialForceModel",
            ModelType::AnticipationVelocityModel => "AnticipationVelocityModel",
        }
    }
}

// ── ModelParameters ───────────────────────────────────────────────────────────

/// Tuning passed through to the dynamics engine.
///
/// Only the collision-free speed model fields exist here.  The other
/// `model_type`s run on the same stepper (with a warning), and agent speed and
/// radius come from each distribution, so force-model tuning keys in older
/// scenario files are ignored on load.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelParameters {
    pub model_type: ModelType,

    pub strength_neighbor_repulsion: f64,
    pub range_neighbor_repulsion:    f64,
    /// Time gap (s) the speed model keeps to the agent ahead.
    pub time_gap:                    f64,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            model_type:                  ModelType::default(),
            strength_neighbor_repulsion: 2.6,
            range_neighbor_repulsion:    0.1,
            time_gap:                    1.0,
        }
    }
}

// ── RunParameters ─────────────────────────────────────────────────────────────

/// Per-request run configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunParameters {
    /// Simulated-time limit in seconds.  Reaching it with agents left is a
    /// `timeout_time` outcome, not a failure.
    pub max_simulation_time: f64,

    /// Engine step length in seconds.
    pub time_step: f64,

    /// Seed of run index 0; run `i` of a batch uses `base_seed + i`.
    pub base_seed: u64,

    /// Seeds per request, `1..=MAX_SIMULATIONS`.
    pub number_of_simulations: u32,

    /// Keep every seed's trajectory artifact (not just the primary one) until
    /// the retention window expires or the caller claims it.
    pub keep_artifacts: bool,

    /// Record a trajectory frame every N engine iterations.
    pub output_every_nth_frame: u64,

    /// Directory for run scratch space and artifacts.  `None` uses the
    /// platform temp directory.
    pub artifact_dir: Option<PathBuf>,

    pub model: ModelParameters,
}

impl Default for RunParameters {
    fn default() -> Self {
        Self {
            max_simulation_time:    300.0,
            time_step:              0.01,
            base_seed:              420,
            number_of_simulations:  1,
            keep_artifacts:         false,
            output_every_nth_frame: 4,
            artifact_dir:           None,
            model:                  ModelParameters::default(),
        }
    }
}

impl RunParameters {
    /// Reject values no run could be started with.
    pub fn validate(&self) -> CoreResult<()> {
        if !(self.max_simulation_time.is_finite() && self.max_simulation_time > 0.0) {
            return Err(invalid("max_simulation_time", format!("must be > 0, got {}", self.max_simulation_time)));
        }
        if !(self.time_step.is_finite() && self.time_step > 0.0) {
            return Err(invalid("time_step", format!("must be > 0, got {}", self.time_step)));
        }
        if !(1..=MAX_SIMULATIONS).contains(&self.number_of_simulations) {
            return Err(invalid(
                "number_of_simulations",
                format!("must be in 1..={MAX_SIMULATIONS}, got {}", self.number_of_simulations),
            ));
        }
        if self.output_every_nth_frame == 0 {
            return Err(invalid("output_every_nth_frame", "must be at least 1".to_owned()));
        }
        Ok(())
    }

    /// Ticks needed to cover `max_simulation_time` at `time_step`.
    pub fn planned_ticks(&self) -> u64 {
        (self.max_simulation_time / self.time_step).ceil().max(1.0) as u64
    }

    /// Seed for run `index` of a batch.
    #[inline]
    pub fn seed_for(&self, index: usize) -> u64 {
        self.base_seed.wrapping_add(index as u64)
    }

    /// Directory for scratch files and artifacts.
    pub fn artifact_root(&self) -> PathBuf {
        self.artifact_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

fn invalid(field: &'static str, reason: String) -> CoreError {
    CoreError::InvalidParameter { field, reason }
}
