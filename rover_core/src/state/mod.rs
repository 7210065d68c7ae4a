// rover_core/src/state/mod.rs

mod history;

pub use history::{HistorySample, PositionHistory, SENTINEL};

use crate::config::{DriveConfig, RoverConfig, SampleConfig};
use crate::error::RoverError;
use crate::mapping::WorldMap;
use crate::perception::{RockSighting, VisionImage};
use crate::types::{PolarObservation, Pose, Telemetry};
use nalgebra::Point2;
use std::fmt;

/// Top-level driving mode of the decision policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Forward,
    Stop,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Forward => write!(f, "forward"),
            Mode::Stop => write!(f, "stop"),
        }
    }
}

/// The actuator commands produced each tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Commands {
    /// Signed, unitless. Negative drives in reverse.
    pub throttle: f64,
    /// Unitless, non-negative.
    pub brake: f64,
    /// Degrees, positive to the left.
    pub steer: f64,
    /// Edge trigger: the collaborator must consume it.
    pub send_pickup: bool,
}

/// An active approach to a rock sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleSearchState {
    /// Target position in world cells.
    pub position: Point2<f64>,
    /// World-frame bearing from the rover to the target, radians.
    pub angle: f64,
    /// Distance from the rover to the target, world cells.
    pub distance: f64,
    pub start_time: f64,
    pub timeout: f64,
}

impl SampleSearchState {
    pub fn new(position: Point2<f64>, pose: &Pose, start_time: f64, timeout: f64) -> Self {
        let mut state = Self {
            position,
            angle: 0.0,
            distance: 0.0,
            start_time,
            timeout,
        };
        state.refresh(pose);
        state
    }

    /// Recomputes bearing and distance from the current pose.
    pub fn refresh(&mut self, pose: &Pose) {
        let offset = self.position - pose.position;
        self.distance = offset.norm();
        self.angle = offset.y.atan2(offset.x);
    }

    pub fn expired(&self, total_time: f64) -> bool {
        self.start_time + self.timeout < total_time
    }
}

/// # RoverState
/// The single mutable record threaded through every tick. Perception fills in
/// the observation fields, the decision policy reads them and writes
/// [`Commands`]. One owner, no interior mutability.
#[derive(Debug, Clone)]
pub struct RoverState {
    // --- Telemetry (overwritten every tick) ---
    pub pose: Pose,
    pub total_time: f64,
    pub near_sample: bool,
    pub picking_up: bool,

    // --- Perception output ---
    /// Polar summary of navigable terrain. `None` until perception has run once.
    pub nav_polar: Option<Vec<PolarObservation>>,
    pub rock_sighting: Option<RockSighting>,
    /// Latest classified masks, kept for display.
    pub vision: Option<VisionImage>,
    pub world_map: WorldMap,

    // --- Decision bookkeeping ---
    pub mode: Mode,
    pub history: PositionHistory,
    pub sample_search: Option<SampleSearchState>,
    /// Sightings are ignored until this mission time after a pursuit times out.
    pub sample_ignore_until: Option<f64>,
    pub collected_samples: Vec<Point2<f64>>,

    // --- Tunables ---
    pub drive: DriveConfig,
    pub sample: SampleConfig,

    // --- Output ---
    pub commands: Commands,
}

impl RoverState {
    pub fn new(config: &RoverConfig) -> Result<Self, RoverError> {
        Ok(Self {
            pose: Pose::default(),
            total_time: 0.0,
            near_sample: false,
            picking_up: false,
            nav_polar: None,
            rock_sighting: None,
            vision: None,
            world_map: WorldMap::new(config.perception.world_size)?,
            mode: Mode::Forward,
            history: PositionHistory::new(config.history.window_seconds)?,
            sample_search: None,
            sample_ignore_until: None,
            collected_samples: Vec::new(),
            drive: config.drive.clone(),
            sample: config.sample.clone(),
            commands: Commands::default(),
        })
    }

    /// Copies this tick's telemetry in. Commands and bookkeeping are kept.
    pub fn apply_telemetry(&mut self, telemetry: &Telemetry) {
        self.pose = telemetry.pose;
        self.total_time = telemetry.total_time;
        self.near_sample = telemetry.near_sample;
        self.picking_up = telemetry.picking_up;
    }

    /// Number of navigable pixels in the latest summary (zero if none).
    pub fn nav_count(&self) -> usize {
        self.nav_polar.as_ref().map_or(0, Vec::len)
    }

    /// Hands the pickup trigger to the caller and clears it.
    pub fn take_pickup(&mut self) -> bool {
        std::mem::take(&mut self.commands.send_pickup)
    }
}
