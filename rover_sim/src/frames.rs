// rover_sim/src/frames.rs

//! Camera frame sources. The harness asks for one frame per tick; where the
//! pixels come from is a scenario choice.

use crate::config::{CameraConfig, SyntheticCameraConfig};
use crate::error::SimError;
use image::{Rgb, RgbImage};
use nalgebra::{Matrix3, Point2, Rotation2, Vector3};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use rover_core::config::PerceptionConfig;
use rover_core::geometry::PerspectiveTransform;
use rover_core::types::Pose;
use std::path::Path;
use tracing::info;
use walkdir::WalkDir;

const SKY: [u8; 3] = [70, 90, 130];
const SAND: [u8; 3] = [215, 195, 180];
const ROCK: [u8; 3] = [160, 140, 30];
/// Too dark to pass for terrain, too blue to pass for rock, blended or not.
const WALL: [u8; 3] = [60, 50, 80];

/// What the camera is looking at this tick.
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
    pub pose: Pose,
    /// Samples still lying in the world.
    pub samples: &'a [Point2<f64>],
}

/// Produces the camera frame for the next tick. `None` is a dropped frame.
pub trait FrameSource {
    fn next_frame(&mut self, scene: &Scene<'_>) -> Option<RgbImage>;
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self, scene: &Scene<'_>) -> Option<RgbImage> {
        (**self).next_frame(scene)
    }
}

/// Builds the frame source a scenario asks for. A synthetic camera looks
/// through the same ground geometry `perception` rectifies with.
pub fn open(
    camera: &CameraConfig,
    perception: &PerceptionConfig,
    rng: ChaCha8Rng,
) -> Result<Box<dyn FrameSource>, SimError> {
    Ok(match camera {
        CameraConfig::Png { path } => Box::new(StillFrame::load(path)?),
        CameraConfig::Directory { path } => Box::new(FrameSequence::load(path)?),
        CameraConfig::Synthetic(synthetic) => {
            Box::new(SyntheticCamera::new(synthetic, perception, rng)?)
        }
    })
}

/// Repeats one image forever.
#[derive(Debug, Clone)]
pub struct StillFrame {
    frame: RgbImage,
}

impl StillFrame {
    pub fn new(frame: RgbImage) -> Self {
        Self { frame }
    }

    pub fn load(path: &Path) -> Result<Self, SimError> {
        let frame = image::open(path)?.to_rgb8();
        info!(?path, width = frame.width(), height = frame.height(), "loaded still frame");
        Ok(Self::new(frame))
    }
}

impl FrameSource for StillFrame {
    fn next_frame(&mut self, _scene: &Scene<'_>) -> Option<RgbImage> {
        Some(self.frame.clone())
    }
}

/// Replays a recorded run. Frames are decoded up front and looped.
#[derive(Debug, Clone)]
pub struct FrameSequence {
    frames: Vec<RgbImage>,
    cursor: usize,
}

impl FrameSequence {
    pub fn new(frames: Vec<RgbImage>) -> Self {
        Self { frames, cursor: 0 }
    }

    /// Reads every `.png` under `dir`, sorted by file name.
    pub fn load(dir: &Path) -> Result<Self, SimError> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry?;
            let is_png = entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("png"));
            if entry.file_type().is_file() && is_png {
                paths.push(entry.into_path());
            }
        }
        if paths.is_empty() {
            return Err(SimError::NoFrames(dir.to_path_buf()));
        }

        let frames = paths
            .iter()
            .map(|p| Ok(image::open(p)?.to_rgb8()))
            .collect::<Result<Vec<_>, SimError>>()?;
        info!(?dir, count = frames.len(), "loaded frame sequence");
        Ok(Self::new(frames))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl FrameSource for FrameSequence {
    fn next_frame(&mut self, _scene: &Scene<'_>) -> Option<RgbImage> {
        if self.frames.is_empty() {
            return None;
        }
        let frame = self.frames[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.frames.len();
        Some(frame)
    }
}

/// Sub-pixel grid used to test a pixel's footprint against rocks.
const FOOTPRINT_GRID: usize = 3;

/// The ground a raw camera pixel looks at, in rover-centric rectified pixels.
#[derive(Debug, Clone)]
struct GroundPixel {
    center: Point2<f64>,
    /// Points spread over the pixel's area. Far from the camera one pixel
    /// covers whole cells, so a rock anywhere under it shows.
    footprint: Vec<Point2<f64>>,
}

/// Renders the arena as seen from the rover: sand on the ground, sky above
/// the horizon, a dark wall past the arena edge and a rock at every sample,
/// plus Gaussian color noise drawn fresh every frame.
///
/// Each pixel shows the ground point the perception homography sends it to,
/// so rectifying a frame puts what it shows back where it lies in the world.
#[derive(Debug, Clone)]
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    /// Row-major; `None` at and above the horizon.
    ground: Vec<Option<GroundPixel>>,
    /// Farthest ground the camera sees, map cells.
    view_range: f64,
    scale: f64,
    arena_size: f64,
    rock_radius: f64,
    noise: Option<Normal<f64>>,
    rng: ChaCha8Rng,
}

impl SyntheticCamera {
    pub fn new(
        config: &SyntheticCameraConfig,
        perception: &PerceptionConfig,
        rng: ChaCha8Rng,
    ) -> Result<Self, SimError> {
        let noise = if config.noise_stddev > 0.0 {
            let dist = Normal::new(0.0, config.noise_stddev)
                .map_err(|e| SimError::InvalidScenario(format!("camera noise: {e}")))?;
            Some(dist)
        } else {
            None
        };
        let transform =
            PerspectiveTransform::from_quads(&perception.source(), &perception.destination())?;
        let projector = GroundProjector::new(&transform, perception, config.width, config.height);
        let ground: Vec<Option<GroundPixel>> = (0..config.height)
            .flat_map(|v| (0..config.width).map(move |u| (u, v)))
            .map(|(u, v)| projector.pixel(u, v))
            .collect();
        let view_range = ground
            .iter()
            .flatten()
            .flat_map(|pixel| pixel.footprint.iter().chain([&pixel.center]))
            .map(|p| p.coords.norm())
            .fold(0.0, f64::max)
            / perception.scale;

        Ok(Self {
            width: config.width,
            height: config.height,
            ground,
            view_range,
            scale: perception.scale,
            arena_size: perception.world_size as f64,
            rock_radius: config.rock_radius,
            noise,
            rng,
        })
    }

    /// `rocks` are the samples close enough to be in view.
    fn base_color(
        &self,
        index: usize,
        pose: &Pose,
        rotation: &Rotation2<f64>,
        rocks: &[Point2<f64>],
    ) -> [u8; 3] {
        let Some(pixel) = &self.ground[index] else {
            return SKY;
        };
        let to_world = |p: &Point2<f64>| pose.position + rotation * p.coords / self.scale;

        let center = to_world(&pixel.center);
        let max = self.arena_size - 1.0;
        if !((0.0..=max).contains(&center.x) && (0.0..=max).contains(&center.y)) {
            return WALL;
        }
        if rocks.is_empty() {
            return SAND;
        }
        let on_rock = pixel.footprint.iter().map(to_world).any(|world| {
            rocks
                .iter()
                .any(|rock| (rock - world).norm() <= self.rock_radius)
        });
        if on_rock {
            ROCK
        } else {
            SAND
        }
    }
}

/// Maps raw frame positions onto the rover-centric ground plane.
struct GroundProjector<'a> {
    matrix: &'a Matrix3<f64>,
    /// Sign of the homogeneous scale on the ground side of the horizon.
    ground_side: f64,
    rows: f64,
    half_width: f64,
}

impl<'a> GroundProjector<'a> {
    fn new(
        transform: &'a PerspectiveTransform,
        perception: &PerceptionConfig,
        width: u32,
        height: u32,
    ) -> Self {
        let matrix = transform.matrix();
        // The source quad lies on the ground.
        let [bottom_left, bottom_right, ..] = perception.source_quad;
        let ground_side = (matrix
            * Vector3::new(
                (bottom_left[0] + bottom_right[0]) / 2.0,
                (bottom_left[1] + bottom_right[1]) / 2.0,
                1.0,
            ))
        .z
        .signum();
        Self {
            matrix,
            ground_side,
            rows: height as f64,
            half_width: width as f64 / 2.0,
        }
    }

    /// `None` past the horizon or behind the rover.
    fn project(&self, u: f64, v: f64) -> Option<Point2<f64>> {
        let p = self.matrix * Vector3::new(u, v, 1.0);
        if p.z * self.ground_side <= 1e-12 {
            return None;
        }
        let forward = self.rows - p.y / p.z;
        let left = self.half_width - p.x / p.z;
        (forward > 0.0).then(|| Point2::new(forward, left))
    }

    fn pixel(&self, u: u32, v: u32) -> Option<GroundPixel> {
        let (u, v) = (u as f64, v as f64);
        let center = self.project(u, v)?;
        let offset = |i: usize| (i as f64 + 0.5) / FOOTPRINT_GRID as f64 - 0.5;
        let footprint = (0..FOOTPRINT_GRID)
            .flat_map(|i| (0..FOOTPRINT_GRID).map(move |j| (offset(i), offset(j))))
            .filter_map(|(du, dv)| self.project(u + du, v + dv))
            .collect();
        Some(GroundPixel { center, footprint })
    }
}

impl FrameSource for SyntheticCamera {
    fn next_frame(&mut self, scene: &Scene<'_>) -> Option<RgbImage> {
        let rotation = Rotation2::new(scene.pose.yaw.to_radians());
        let reach = self.view_range + self.rock_radius;
        let rocks: Vec<Point2<f64>> = scene
            .samples
            .iter()
            .filter(|sample| (*sample - scene.pose.position).norm() <= reach)
            .copied()
            .collect();

        let mut frame = RgbImage::new(self.width, self.height);
        for y in 0..self.height {
            for x in 0..self.width {
                let index = (y * self.width + x) as usize;
                let base = self.base_color(index, &scene.pose, &rotation, &rocks);
                let pixel = match &self.noise {
                    Some(noise) => base.map(|c| {
                        (c as f64 + noise.sample(&mut self.rng)).round().clamp(0.0, 255.0) as u8
                    }),
                    None => base,
                };
                frame.put_pixel(x, y, Rgb(pixel));
            }
        }
        Some(frame)
    }
}

/// Drops each frame with probability `drop_rate`, standing in for a flaky link.
pub struct Lossy<S> {
    inner: S,
    drop_rate: f64,
    rng: ChaCha8Rng,
}

impl<S: FrameSource> Lossy<S> {
    pub fn new(inner: S, drop_rate: f64, rng: ChaCha8Rng) -> Self {
        Self {
            inner,
            drop_rate: drop_rate.clamp(0.0, 1.0),
            rng,
        }
    }
}

impl<S: FrameSource> FrameSource for Lossy<S> {
    fn next_frame(&mut self, scene: &Scene<'_>) -> Option<RgbImage> {
        let frame = self.inner.next_frame(scene);
        if self.rng.gen_bool(self.drop_rate) {
            None
        } else {
            frame
        }
    }
}
