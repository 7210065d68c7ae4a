// rover_sim/src/config.rs

use crate::error::SimError;
use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};
use rover_core::config::RoverConfig;
use rover_core::types::Pose;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// =========================================================================
// == Top-Level Configuration ==
// =========================================================================

/// # ScenarioConfig
/// Everything needed for one headless mission. This struct is the root of the
/// data parsed from a `scenario.toml` file; missing sections fall back to
/// [`Default`], so an empty file is a runnable scenario.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)] // Fail if the TOML has fields not in our struct
pub struct ScenarioConfig {
    #[serde(default)] // Use default if the [simulation] section is missing
    pub simulation: SimulationSection,

    #[serde(default)]
    pub start: StartPose,

    #[serde(default)]
    pub vehicle: VehicleConfig,

    #[serde(default)]
    pub camera: CameraConfig,

    #[serde(default)]
    pub world: WorldConfig,

    /// Passed through to the rover untouched.
    #[serde(default)]
    pub rover: RoverConfig,
}

impl ScenarioConfig {
    /// Loads a scenario file layered over the defaults.
    pub fn load(path: &Path) -> Result<Self, SimError> {
        if !path.is_file() {
            return Err(SimError::ScenarioNotFound(path.to_path_buf()));
        }
        Self::extract(Self::layered().merge(Toml::file(path)))
    }

    /// Same as [`Self::load`], from an in-memory TOML document.
    pub fn from_toml_str(toml: &str) -> Result<Self, SimError> {
        Self::extract(Self::layered().merge(Toml::string(toml)))
    }

    fn layered() -> Figment {
        Figment::from(Serialized::defaults(ScenarioConfig::default()))
    }

    fn extract(figment: Figment) -> Result<Self, SimError> {
        let config: ScenarioConfig = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        let invalid = |msg: &str| Err(SimError::InvalidScenario(msg.to_string()));

        if !(self.simulation.tick_hz > 0.0) {
            return invalid("simulation.tick_hz must be positive");
        }
        if !(self.simulation.duration_seconds >= 0.0) {
            return invalid("simulation.duration_seconds must be non-negative");
        }
        if !(0.0..=1.0).contains(&self.simulation.frame_drop_rate) {
            return invalid("simulation.frame_drop_rate must be within [0, 1]");
        }
        if !(self.vehicle.wheelbase > 0.0) {
            return invalid("vehicle.wheelbase must be positive");
        }
        if !(self.vehicle.max_speed > 0.0) {
            return invalid("vehicle.max_speed must be positive");
        }
        if !(self.vehicle.pivot_gain >= 0.0) {
            return invalid("vehicle.pivot_gain must be non-negative");
        }
        self.rover.validate()?;
        Ok(())
    }

    /// Seconds of mission time per tick.
    pub fn tick_seconds(&self) -> f64 {
        1.0 / self.simulation.tick_hz
    }

    /// Number of ticks covering `duration_seconds`.
    pub fn total_ticks(&self) -> usize {
        (self.simulation.duration_seconds * self.simulation.tick_hz).ceil() as usize
    }

    /// The rover config with the mission seed filled in when the rover has none.
    pub fn seeded_rover(&self) -> RoverConfig {
        let mut rover = self.rover.clone();
        rover.seed = rover.seed.or(self.simulation.seed);
        rover
    }

    pub fn to_toml(&self) -> Result<String, SimError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// =========================================================================
// == Configuration Sub-Structs ==
// These map directly to the sections in a scenario.toml file.
// =========================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SimulationSection {
    /// Optional seed for every pseudo-random source, for determinism.
    pub seed: Option<u64>,
    /// Mission length in seconds of simulated time.
    pub duration_seconds: f64,
    /// Camera frames (and decision ticks) per simulated second.
    pub tick_hz: f64,
    /// Log a progress line every this many ticks; 0 disables it.
    pub progress_every: usize,
    /// Probability that a camera frame is lost in transit.
    pub frame_drop_rate: f64,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            seed: None,
            duration_seconds: 120.0,
            tick_hz: 10.0,
            progress_every: 100,
            frame_drop_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StartPose {
    /// World position in map cells.
    pub position: [f64; 2],
    pub yaw_deg: f64,
}

impl Default for StartPose {
    fn default() -> Self {
        Self {
            position: [100.0, 100.0],
            yaw_deg: 0.0,
        }
    }
}

impl StartPose {
    pub fn to_pose(&self) -> Pose {
        Pose::new(self.position[0], self.position[1], self.yaw_deg)
    }
}

/// Parameters of the kinematic vehicle the commands are integrated on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct VehicleConfig {
    /// Axle separation, map cells.
    pub wheelbase: f64,
    /// Acceleration per unit of throttle, cells/s^2.
    pub throttle_accel: f64,
    /// Deceleration per unit of brake, cells/s^2.
    pub brake_decel: f64,
    /// Rolling resistance applied while coasting, cells/s^2.
    pub rolling_drag: f64,
    /// Hard speed cap in either direction, cells/s.
    pub max_speed: f64,
    /// Turn rate at a standstill, deg/s per degree of steer.
    pub pivot_gain: f64,
    /// Distance at which the rover reports being near a sample.
    pub pickup_radius: f64,
    /// How long a pickup holds the rover in place, seconds.
    pub pickup_seconds: f64,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            wheelbase: 1.5,
            throttle_accel: 5.0,
            brake_decel: 8.0,
            rolling_drag: 0.3,
            max_speed: 5.0,
            pivot_gain: 2.0,
            pickup_radius: 1.0,
            pickup_seconds: 2.0,
        }
    }
}

/// Where camera frames come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")] // e.g. source = "synthetic"
pub enum CameraConfig {
    /// The same PNG every tick.
    Png { path: PathBuf },
    /// Every PNG under a directory, replayed in file-name order and looped.
    Directory { path: PathBuf },
    /// The arena rendered from the rover's pose.
    Synthetic(SyntheticCameraConfig),
}

impl Default for CameraConfig {
    fn default() -> Self {
        CameraConfig::Synthetic(SyntheticCameraConfig::default())
    }
}

/// A flat sandy arena seen through the perception camera geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SyntheticCameraConfig {
    pub width: u32,
    pub height: u32,
    /// Standard deviation of per-channel color noise.
    pub noise_stddev: f64,
    /// Radius of the rock drawn at each sample, map cells.
    pub rock_radius: f64,
}

impl Default for SyntheticCameraConfig {
    fn default() -> Self {
        Self {
            width: 320,
            height: 160,
            noise_stddev: 8.0,
            rock_radius: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct WorldConfig {
    /// Rock samples lying in the world, map cells.
    pub samples: Vec<[f64; 2]>,
    /// Optional grayscale PNG, bright = navigable, used to score the map.
    pub ground_truth: Option<PathBuf>,
}
