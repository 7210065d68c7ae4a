// rover_core/src/config.rs

use crate::error::RoverError;
use crate::geometry::Quad;
use crate::mapping::MapChannel;
use crate::perception::classifier::ColorThreshold;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

// =========================================================================
// == Top-Level Configuration ==
// =========================================================================

/// # RoverConfig
/// Every tunable of the perception/decision stack. `Default` reproduces the
/// empirically tuned values, so an empty TOML table is a valid config.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)] // Fail if the TOML has fields not in our struct
pub struct RoverConfig {
    /// Seed for the decision policy's recovery-steer generator.
    /// `None` seeds from the OS.
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub drive: DriveConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub sample: SampleConfig,

    #[serde(default)]
    pub perception: PerceptionConfig,
}

impl RoverConfig {
    /// Checks cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), RoverError> {
        let invalid = |msg: &str| Err(RoverError::InvalidConfig(msg.to_string()));

        if self.history.window_seconds == 0 {
            return invalid("history.window_seconds must be at least 1");
        }
        if !(self.history.tolerance >= 0.0) {
            return invalid("history.tolerance must be non-negative");
        }
        if !(self.drive.steer_limit_deg > 0.0) {
            return invalid("drive.steer_limit_deg must be positive");
        }
        if self.drive.brake_set < 0.0 {
            return invalid("drive.brake_set must be non-negative");
        }
        if !(self.perception.scale > 0.0) {
            return invalid("perception.scale must be positive");
        }
        if self.perception.world_size == 0 {
            return invalid("perception.world_size must be positive");
        }
        if self.sample.search_timeout < 0.0 || self.sample.cooldown < 0.0 {
            return invalid("sample timeouts must be non-negative");
        }
        Ok(())
    }
}

// =========================================================================
// == Configuration Sub-Structs ==
// =========================================================================

/// Throttle, brake and steering set points for normal terrain navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DriveConfig {
    /// Navigable pixel count below which a forward-moving rover stops.
    pub stop_forward: usize,
    /// Navigable pixel count at or above which a stopped rover drives off.
    pub go_forward: usize,
    pub max_vel: f64,
    pub throttle_set: f64,
    pub brake_set: f64,
    /// Symmetric steering clip, degrees.
    pub steer_limit_deg: f64,
    /// Speeds above this still count as moving while in `stop` mode.
    pub stopped_velocity: f64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            stop_forward: 50,
            go_forward: 500,
            max_vel: 2.2,
            throttle_set: 0.2,
            brake_set: 10.0,
            steer_limit_deg: 15.0,
            stopped_velocity: 0.2,
        }
    }
}

/// Stuck and rounds detection over the per-second position history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct HistoryConfig {
    /// Length of the history ring, one slot per elapsed second.
    pub window_seconds: usize,
    /// Max per-axis drift, in map cells, for the rover to count as stuck.
    pub tolerance: f64,
    /// Steering command issued when stuck.
    pub stuck_steer_deg: f64,
    /// Rounds recovery draws steer uniformly from `[-range, range]`.
    pub rounds_steer_range: i32,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            window_seconds: 7,
            tolerance: 0.05,
            stuck_steer_deg: -15.0,
            rounds_steer_range: 10,
        }
    }
}

/// Rock sample pursuit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SampleConfig {
    /// Seconds a pursuit may last before it is abandoned.
    pub search_timeout: f64,
    /// Seconds after an abandoned pursuit during which sightings are ignored.
    pub cooldown: f64,
    /// Heading errors beyond this many degrees drive the rover in reverse.
    pub reverse_yaw_error_deg: f64,
    /// Sightings within this many cells of a collected sample are ignored.
    pub collected_radius: f64,
    /// Fewest rock pixels that count as a sighting.
    pub min_rock_pixels: usize,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            search_timeout: 30.0,
            cooldown: 45.0,
            reverse_yaw_error_deg: 140.0,
            collected_radius: 1.0,
            min_rock_pixels: 1,
        }
    }
}

/// Camera geometry, color thresholds and map parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct PerceptionConfig {
    /// Nominal camera resolution; fixes the destination quad.
    pub frame_width: u32,
    pub frame_height: u32,
    /// Ground-plane footprint of a 1x1 grid cell in the raw camera image.
    pub source_quad: [[f64; 2]; 4],
    /// Half the side of the destination square, in pixels.
    pub dest_half_size: f64,
    /// Gap between the destination square and the bottom edge, in pixels.
    pub dest_bottom_offset: f64,
    /// Rectified pixels per world cell.
    pub scale: f64,
    /// Side of the square world map, in cells.
    pub world_size: usize,
    pub terrain_threshold: ColorThreshold,
    pub rock_threshold: ColorThreshold,
    /// Map layer that receives the navigable-terrain mask. Defaults to
    /// `obstacle` for compatibility with recorded maps; `navigable` is correct.
    pub terrain_layer: MapChannel,
    /// Skip map updates when |pitch| or |roll| exceeds this many degrees.
    pub max_tilt_deg: Option<f64>,
}

impl Default for PerceptionConfig {
    fn default() -> Self {
        Self {
            frame_width: 320,
            frame_height: 160,
            source_quad: [[14.0, 140.0], [301.0, 140.0], [200.0, 96.0], [118.0, 96.0]],
            dest_half_size: 5.0,
            dest_bottom_offset: 5.0,
            scale: 10.0,
            world_size: 200,
            terrain_threshold: ColorThreshold::NAVIGABLE_TERRAIN,
            rock_threshold: ColorThreshold::ROCK_SAMPLE,
            terrain_layer: MapChannel::Obstacle,
            max_tilt_deg: None,
        }
    }
}

impl PerceptionConfig {
    pub fn source(&self) -> Quad {
        self.source_quad.map(|[x, y]| Point2::new(x, y))
    }

    /// A square of side `2 * dest_half_size` centered horizontally, its lower
    /// edge `dest_bottom_offset` pixels above the bottom of the frame. Corner
    /// order matches [`Self::source`]: bottom-left, bottom-right, top-right, top-left.
    pub fn destination(&self) -> Quad {
        let half = self.dest_half_size;
        let center_x = self.frame_width as f64 / 2.0;
        let bottom_y = self.frame_height as f64 - self.dest_bottom_offset;
        let top_y = bottom_y - 2.0 * half;
        [
            Point2::new(center_x - half, bottom_y),
            Point2::new(center_x + half, bottom_y),
            Point2::new(center_x + half, top_y),
            Point2::new(center_x - half, top_y),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_defaults_match_tuned_constants() {
        let cfg = RoverConfig::default();
        assert_eq!(cfg.drive.stop_forward, 50);
        assert_eq!(cfg.drive.go_forward, 500);
        assert_abs_diff_eq!(cfg.drive.throttle_set, 0.2);
        assert_abs_diff_eq!(cfg.drive.brake_set, 10.0);
        assert_eq!(cfg.history.window_seconds, 7);
        assert_abs_diff_eq!(cfg.sample.search_timeout, 30.0);
        assert_abs_diff_eq!(cfg.sample.cooldown, 45.0);
        assert_eq!(cfg.perception.world_size, 200);
        assert_eq!(cfg.perception.terrain_layer, MapChannel::Obstacle);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_destination_square_sits_above_bottom_center() {
        let dest = PerceptionConfig::default().destination();
        assert_abs_diff_eq!(dest[0].x, 155.0);
        assert_abs_diff_eq!(dest[0].y, 155.0);
        assert_abs_diff_eq!(dest[2].x, 165.0);
        assert_abs_diff_eq!(dest[2].y, 145.0);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut cfg = RoverConfig::default();
        cfg.history.window_seconds = 0;
        assert!(matches!(cfg.validate(), Err(RoverError::InvalidConfig(_))));

        let mut cfg = RoverConfig::default();
        cfg.perception.scale = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = RoverConfig::default();
        cfg.history.tolerance = f64::NAN;
        assert!(cfg.validate().is_err());
    }
}
