// rover_core/src/prelude.rs

// --- Core Abstractions (The main contracts of the library) ---
pub use crate::decision::{Decision, DecisionPolicy};
pub use crate::perception::PerceptionPipeline;
pub use crate::rover::Rover;

// --- Core Data Structures (The "nouns" of the library) ---
pub use crate::config::RoverConfig;
pub use crate::error::RoverError;
pub use crate::mapping::{MapChannel, WorldMap};
pub use crate::perception::classifier::{ClassifiedMask, ColorThreshold};
pub use crate::state::{Commands, Mode, PositionHistory, RoverState, SampleSearchState};
pub use crate::types::{Pose, PolarObservation, RoverCentricPoint, Telemetry, WorldPoint};
