//! `ev-engine`: the dynamics-engine capability consumed by the orchestrator.
//!
//! The orchestrator never moves pedestrians itself.  It registers stages,
//! journeys, and agents with a [`DynamicsEngine`] and calls `step()`.  Any
//! pedestrian model can be plugged in through [`EngineFactory`]; this crate
//! ships [`KinematicEngine`], a collision-free speed stepper that is good
//! enough for end-to-end runs and tests.
//!
//! # Crate layout
//!
//! | Module         | Contents                                                  |
//! |----------------|-----------------------------------------------------------|
//! | [`engine`]     | `DynamicsEngine`, `EngineFactory` traits                  |
//! | [`agent`]      | `AgentParameters`, `AgentSample`                          |
//! | [`kinematic`]  | `KinematicEngine`, `KinematicFactory`                     |
//! | [`sampling`]   | `distribute_by_number`, `distribute_until_filled`         |
//! | [`error`]      | `EngineError`, `SamplingError`, `EngineResult<T>`         |

pub mod agent;
pub mod engine;
pub mod error;
pub mod kinematic;
pub mod sampling;


pub use agent::{AgentParameters, AgentSample};
pub use engine::{DynamicsEngine, EngineFactory};
pub use error::{EngineError, EngineResult, SamplingError};
pub use kinematic::{KinematicEngine, KinematicFactory};
pub use sampling::{
    distribute_by_number, distribute_until_filled, SampleCount, SamplingSpec,
    FLOW_SAMPLING, IMMEDIATE_SAMPLING,
};
