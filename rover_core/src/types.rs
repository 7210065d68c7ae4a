// rover_core/src/types.rs

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

// --- Core Type Aliases ---

/// A point in the rover-centric frame: origin at the ground-contact point,
/// `x` forward, `y` positive to the left. Units are rectified-image pixels.
pub type RoverCentricPoint = Point2<f64>;

/// Vehicle pose as reported by the simulator each tick. Angles are in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    /// World-frame position, in map cells.
    pub position: Point2<f64>,
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
    /// Signed longitudinal speed.
    pub velocity: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, yaw: f64) -> Self {
        Self {
            position: Point2::new(x, y),
            yaw,
            ..Default::default()
        }
    }

    pub fn with_velocity(mut self, velocity: f64) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn x(&self) -> f64 {
        self.position.x
    }

    pub fn y(&self) -> f64 {
        self.position.y
    }
}

/// Everything the collaborator delivers besides the camera frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Telemetry {
    pub pose: Pose,
    /// The rover is within pickup range of a sample.
    pub near_sample: bool,
    /// A pickup is already in progress.
    pub picking_up: bool,
    /// Elapsed mission time in seconds (monotonic).
    pub total_time: f64,
}

/// One navigable (or rock) pixel expressed as range and bearing from the rover.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolarObservation {
    pub distance: f64,
    /// Radians from the forward axis, in (-pi, pi].
    pub angle: f64,
}

/// An integer cell of the world map, always inside the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorldPoint {
    pub x: usize,
    pub y: usize,
}
