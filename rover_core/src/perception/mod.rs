// rover_core/src/perception/mod.rs

//! Camera frame in, world map and terrain summary out.
//!
//! Once per tick the pipeline
//! 1. rectifies the frame to a top-down view,
//! 2. thresholds it into navigable-terrain and rock masks,
//! 3. projects both masks into the world and accumulates them on the map,
//! 4. stores the polar summary of navigable terrain for the decision policy.

pub mod classifier;

use crate::config::PerceptionConfig;
use crate::error::RoverError;
use crate::geometry::{
    mask_to_rover_frame, rectify, rotate_and_translate, rover_to_world, to_polar, wrap_degrees,
    PerspectiveTransform,
};
use crate::mapping::MapChannel;
use crate::state::RoverState;
use crate::types::{Pose, RoverCentricPoint};
use classifier::{classify, ClassifiedMask};
use image::{Rgb, RgbImage};
use nalgebra::Point2;
use tracing::{debug, trace};

/// The classified masks of the latest tick, kept for display.
#[derive(Debug, Clone, PartialEq)]
pub struct VisionImage {
    pub terrain: ClassifiedMask,
    pub rock: ClassifiedMask,
}

impl VisionImage {
    pub fn empty(height: u32, width: u32) -> Self {
        Self {
            terrain: ClassifiedMask::empty(height, width),
            rock: ClassifiedMask::empty(height, width),
        }
    }

    /// Red = navigable terrain, green = rock.
    pub fn to_rgb_image(&self) -> RgbImage {
        let level = |on: bool| if on { 255 } else { 0 };
        RgbImage::from_fn(self.terrain.width(), self.terrain.height(), |x, y| {
            Rgb([level(self.terrain.get(y, x)), level(self.rock.get(y, x)), 0])
        })
    }
}

/// Where the rock pixels of this tick put a sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RockSighting {
    pub pixel_count: usize,
    /// Mean world position of the rock pixels, unrounded.
    pub world_position: Point2<f64>,
    /// Mean rover-centric range, rectified pixels.
    pub distance: f64,
    /// Mean rover-centric bearing, radians.
    pub angle: f64,
}

/// Owns the fixed camera geometry; stateless between ticks.
#[derive(Debug, Clone)]
pub struct PerceptionPipeline {
    config: PerceptionConfig,
    transform: PerspectiveTransform,
}

impl PerceptionPipeline {
    pub fn new(config: PerceptionConfig) -> Result<Self, RoverError> {
        if !(config.scale > 0.0) {
            return Err(RoverError::InvalidConfig("perception.scale must be positive".into()));
        }
        let transform = PerspectiveTransform::from_quads(&config.source(), &config.destination())?;
        Ok(Self { config, transform })
    }

    pub fn config(&self) -> &PerceptionConfig {
        &self.config
    }

    pub fn transform(&self) -> &PerspectiveTransform {
        &self.transform
    }

    /// Rectifies `frame` and thresholds it into terrain and rock masks.
    pub fn classify_frame(&self, frame: &RgbImage) -> VisionImage {
        let warped = rectify(frame, &self.transform);
        VisionImage {
            terrain: classify(&warped, &self.config.terrain_threshold),
            rock: classify(&warped, &self.config.rock_threshold),
        }
    }

    /// Runs one perception tick against `state`, whose telemetry must already be current.
    ///
    /// A missing or empty frame produces empty masks and no terrain summary,
    /// so the policy falls back to driving straight. The map is left untouched.
    pub fn step(&self, state: &mut RoverState, frame: Option<&RgbImage>) {
        let frame = frame.filter(|f| f.width() > 0 && f.height() > 0);
        let Some(frame) = frame else {
            debug!("no camera frame this tick");
            state.vision = Some(VisionImage::empty(
                self.config.frame_height,
                self.config.frame_width,
            ));
            state.nav_polar = None;
            state.rock_sighting = None;
            return;
        };

        let vision = self.classify_frame(frame);
        let terrain_px = mask_to_rover_frame(&vision.terrain);
        let rock_px = mask_to_rover_frame(&vision.rock);
        let pose = state.pose;

        if self.is_level(&pose) {
            let world_size = state.world_map.size();
            let terrain_cells = rotate_and_translate(
                &terrain_px,
                pose.yaw,
                pose.position,
                self.config.scale,
                world_size,
            );
            let rock_cells =
                rotate_and_translate(&rock_px, pose.yaw, pose.position, self.config.scale, world_size);
            state
                .world_map
                .accumulate(&terrain_cells, self.config.terrain_layer);
            state.world_map.accumulate(&rock_cells, MapChannel::Rock);
        } else {
            trace!(pitch = pose.pitch, roll = pose.roll, "rover tilted, map not updated");
        }

        let min_rock_pixels = state.sample.min_rock_pixels.max(1);
        state.rock_sighting = if rock_px.len() >= min_rock_pixels {
            Some(self.summarize_rocks(&rock_px, &pose))
        } else {
            None
        };

        debug!(
            terrain = terrain_px.len(),
            rock = rock_px.len(),
            "classified frame"
        );
        state.nav_polar = Some(to_polar(&terrain_px));
        state.vision = Some(vision);
    }

    fn is_level(&self, pose: &Pose) -> bool {
        match self.config.max_tilt_deg {
            Some(limit) => {
                wrap_degrees(pose.pitch).abs() <= limit && wrap_degrees(pose.roll).abs() <= limit
            }
            None => true,
        }
    }

    /// `rock_px` must not be empty.
    fn summarize_rocks(&self, rock_px: &[RoverCentricPoint], pose: &Pose) -> RockSighting {
        let n = rock_px.len() as f64;
        let world = rover_to_world(rock_px, pose.yaw, pose.position, self.config.scale);
        let world_sum = world
            .iter()
            .fold(nalgebra::Vector2::zeros(), |acc, p| acc + p.coords);
        let polar = to_polar(rock_px);
        RockSighting {
            pixel_count: rock_px.len(),
            world_position: Point2::from(world_sum / n),
            distance: polar.iter().map(|p| p.distance).sum::<f64>() / n,
            angle: polar.iter().map(|p| p.angle).sum::<f64>() / n,
        }
    }
}
