// rover_core/src/lib.rs

// This file defines the public modules of the perception/decision library.
pub mod config;
pub mod decision;
pub mod error;
pub mod geometry;
pub mod mapping;
pub mod perception;
pub mod prelude;
pub mod rover;
pub mod state;
pub mod types;
