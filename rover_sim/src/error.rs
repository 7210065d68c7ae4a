// rover_sim/src/error.rs

use rover_core::error::RoverError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of the simulation harness. Everything here happens while loading
/// a scenario or writing output; ticking the rover itself cannot fail.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("scenario file not found: {0}")]
    ScenarioNotFound(PathBuf),

    #[error("failed to load scenario: {0}")]
    Config(#[from] figment::Error),

    #[error("invalid scenario: {0}")]
    InvalidScenario(String),

    #[error("no PNG frames found under {0}")]
    NoFrames(PathBuf),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Walk(#[from] walkdir::Error),

    #[error(transparent)]
    Rover(#[from] RoverError),

    #[error("failed to serialize scenario: {0}")]
    Serialize(#[from] toml::ser::Error),
}
