// rover_sim/src/simulation.rs

//! The mission loop: camera frame and telemetry in, commands out, vehicle
//! advanced, repeat. The harness also plays the part of the sample arm.

use crate::config::ScenarioConfig;
use crate::error::SimError;
use crate::frames::{self, FrameSource, Lossy, Scene};
use crate::kinematics::KinematicRover;
use image::RgbImage;
use nalgebra::{DMatrix, Point2};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rover_core::decision::Decision;
use rover_core::mapping::MapCoverage;
use rover_core::rover::{Rover, TickOutput};
use rover_core::types::Telemetry;
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// What a finished (or interrupted) mission achieved.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MissionSummary {
    pub ticks: usize,
    pub mission_time: f64,
    /// Path length driven, in map cells.
    pub distance: f64,
    pub pickups: usize,
    pub stuck_events: usize,
    pub rounds_events: usize,
    pub pursuit_timeouts: usize,
    pub dropped_frames: usize,
    /// Cells observed on the terrain layer.
    pub mapped_cells: usize,
    /// Only when the scenario supplies a ground-truth map.
    pub coverage: Option<MapCoverage>,
}

impl fmt::Display for MissionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ticks ({:.1} s), {:.1} cells driven, {} samples collected, {} stuck, {} rounds, {} pursuit timeouts, {} cells mapped",
            self.ticks,
            self.mission_time,
            self.distance,
            self.pickups,
            self.stuck_events,
            self.rounds_events,
            self.pursuit_timeouts,
            self.mapped_cells,
        )?;
        if let Some(coverage) = self.coverage {
            write!(
                f,
                ", {:.1}% mapped at {:.1}% fidelity",
                coverage.mapped_fraction * 100.0,
                coverage.fidelity * 100.0
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct ActivePickup {
    sample: usize,
    done_at: f64,
}

pub struct Simulation {
    config: ScenarioConfig,
    rover: Rover,
    vehicle: KinematicRover,
    camera: Box<dyn FrameSource>,
    samples: Vec<Point2<f64>>,
    pickup: Option<ActivePickup>,
    ground_truth: Option<DMatrix<bool>>,
    summary: MissionSummary,
}

impl Simulation {
    /// Builds the camera and ground truth the scenario names, then the mission.
    pub fn from_config(config: ScenarioConfig) -> Result<Self, SimError> {
        let mut rng = match config.simulation.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let camera = frames::open(
            &config.camera,
            &config.rover.perception,
            ChaCha8Rng::seed_from_u64(rng.gen()),
        )?;
        let drop_rate = config.simulation.frame_drop_rate;
        let camera: Box<dyn FrameSource> = if drop_rate > 0.0 {
            Box::new(Lossy::new(camera, drop_rate, ChaCha8Rng::seed_from_u64(rng.gen())))
        } else {
            camera
        };

        let ground_truth = match &config.world.ground_truth {
            Some(path) => Some(load_ground_truth(path, config.rover.perception.world_size)?),
            None => None,
        };
        Self::new(config, camera, ground_truth)
    }

    pub fn new(
        config: ScenarioConfig,
        camera: Box<dyn FrameSource>,
        ground_truth: Option<DMatrix<bool>>,
    ) -> Result<Self, SimError> {
        config.validate()?;
        let rover = Rover::new(&config.seeded_rover())?;
        let vehicle = KinematicRover::new(
            config.vehicle.clone(),
            config.start.to_pose(),
            config.rover.perception.world_size as f64,
        );
        let samples = config
            .world
            .samples
            .iter()
            .map(|&[x, y]| Point2::new(x, y))
            .collect();
        Ok(Self {
            config,
            rover,
            vehicle,
            camera,
            samples,
            pickup: None,
            ground_truth,
            summary: MissionSummary::default(),
        })
    }

    /// Runs `ticks` ticks, or the scenario's full duration when `None`.
    pub fn run(&mut self, ticks: Option<usize>) -> MissionSummary {
        let ticks = ticks.unwrap_or_else(|| self.config.total_ticks());
        let progress_every = self.config.simulation.progress_every;
        info!(ticks, samples = self.samples.len(), "mission started");

        for _ in 0..ticks {
            self.step();
            if progress_every > 0 && self.summary.ticks % progress_every == 0 {
                let pose = self.vehicle.pose();
                info!(
                    tick = self.summary.ticks,
                    t = self.clock(),
                    x = pose.x(),
                    y = pose.y(),
                    yaw = pose.yaw,
                    mode = %self.rover.state().mode,
                    "progress"
                );
            }
        }

        let summary = self.summary();
        info!(%summary, "mission finished");
        summary
    }

    /// One tick: camera, rover, vehicle.
    pub fn step(&mut self) -> TickOutput {
        let dt = self.config.tick_seconds();
        let scene = Scene {
            pose: self.vehicle.pose(),
            samples: &self.samples,
        };
        let frame = self.camera.next_frame(&scene);
        if frame.is_none() {
            self.summary.dropped_frames += 1;
        }

        let telemetry = self.telemetry();
        let out = self.rover.tick(frame.as_ref(), &telemetry);
        match out.decision {
            Decision::Stuck => self.summary.stuck_events += 1,
            Decision::Rounds { .. } => self.summary.rounds_events += 1,
            Decision::PursuitTimedOut => self.summary.pursuit_timeouts += 1,
            _ => {}
        }

        if out.commands.send_pickup {
            self.start_pickup();
        }
        if self.pickup.is_some() {
            self.vehicle.halt();
        } else {
            self.vehicle.step(&out.commands, dt);
        }

        self.summary.ticks += 1;
        self.finish_pickup();
        out
    }

    /// Mission time of the next tick. Derived from the tick count so it never drifts.
    pub fn clock(&self) -> f64 {
        self.summary.ticks as f64 * self.config.tick_seconds()
    }

    pub fn summary(&self) -> MissionSummary {
        let map = &self.rover.state().world_map;
        let layer = self.config.rover.perception.terrain_layer;
        MissionSummary {
            mission_time: self.clock(),
            distance: self.vehicle.odometer(),
            mapped_cells: map.observed_cells(layer),
            coverage: self.ground_truth.as_ref().map(|gt| map.coverage(layer, gt)),
            ..self.summary
        }
    }

    pub fn rover(&self) -> &Rover {
        &self.rover
    }

    pub fn vehicle(&self) -> &KinematicRover {
        &self.vehicle
    }

    /// Samples still lying in the world.
    pub fn remaining_samples(&self) -> &[Point2<f64>] {
        &self.samples
    }

    /// Writes `world_map.png`, plus `vision.png` once a frame has been seen and
    /// `ground_truth.png` when the scenario has one.
    pub fn write_snapshots(&self, dir: &Path) -> Result<(), SimError> {
        std::fs::create_dir_all(dir)?;
        let state = self.rover.state();
        state.world_map.to_rgb_image().save(dir.join("world_map.png"))?;
        if let Some(vision) = &state.vision {
            vision.to_rgb_image().save(dir.join("vision.png"))?;
        }
        if let Some(truth) = &self.ground_truth {
            ground_truth_image(truth).save(dir.join("ground_truth.png"))?;
        }
        info!(?dir, "snapshots written");
        Ok(())
    }

    fn telemetry(&self) -> Telemetry {
        let pose = self.vehicle.pose();
        Telemetry {
            pose,
            near_sample: self.nearest_sample(pose.position).is_some(),
            picking_up: self.pickup.is_some(),
            total_time: self.clock(),
        }
    }

    fn nearest_sample(&self, position: Point2<f64>) -> Option<usize> {
        let radius = self.config.vehicle.pickup_radius;
        self.samples
            .iter()
            .enumerate()
            .map(|(i, s)| (i, (s - position).norm()))
            .filter(|&(_, d)| d <= radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }

    fn start_pickup(&mut self) {
        if self.pickup.is_some() {
            return;
        }
        let Some(sample) = self.nearest_sample(self.vehicle.pose().position) else {
            warn!("pickup requested with no sample in reach");
            return;
        };
        let done_at = self.clock() + self.config.vehicle.pickup_seconds;
        debug!(sample, done_at, "arm lowered");
        self.pickup = Some(ActivePickup { sample, done_at });
    }

    fn finish_pickup(&mut self) {
        let Some(pickup) = self.pickup else {
            return;
        };
        if self.clock() + 1e-9 < pickup.done_at {
            return;
        }
        let position = self.samples.swap_remove(pickup.sample);
        self.summary.pickups += 1;
        self.pickup = None;
        info!(x = position.x, y = position.y, "sample collected");
    }
}

/// Reads a grayscale navigability PNG, bright = navigable. The image must be
/// `world_size` square; row 0 is the top (largest `y`) of the world.
pub fn load_ground_truth(path: &Path, world_size: usize) -> Result<DMatrix<bool>, SimError> {
    let image = image::open(path)?.to_luma8();
    ground_truth_from_image(&image, world_size)
}

fn ground_truth_from_image(
    image: &image::GrayImage,
    world_size: usize,
) -> Result<DMatrix<bool>, SimError> {
    let (width, height) = image.dimensions();
    if width as usize != world_size || height as usize != world_size {
        return Err(SimError::InvalidScenario(format!(
            "ground truth is {width}x{height}, world is {world_size}x{world_size}"
        )));
    }
    Ok(DMatrix::from_fn(world_size, world_size, |y, x| {
        image.get_pixel(x as u32, (world_size - 1 - y) as u32)[0] > 127
    }))
}

/// Renders a ground-truth grid the same way the world map is drawn, for
/// side-by-side comparison.
pub fn ground_truth_image(truth: &DMatrix<bool>) -> RgbImage {
    let size = truth.nrows() as u32;
    RgbImage::from_fn(size, size, |col, row| {
        let y = (size - 1 - row) as usize;
        let v = if truth[(y, col as usize)] { 255 } else { 0 };
        image::Rgb([v, v, v])
    })
}
