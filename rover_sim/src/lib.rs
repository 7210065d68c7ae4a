// rover_sim/src/lib.rs

// Headless harness around rover_core: scenario loading, camera sources,
// vehicle kinematics and the mission loop.
pub mod cli;
pub mod config;
pub mod error;
pub mod frames;
pub mod kinematics;
pub mod simulation;
