// rover_core/src/mapping/mod.rs

use crate::error::RoverError;
use crate::types::WorldPoint;
use image::{Rgb, RgbImage};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

// --- Map Data Structures ---

/// The semantic layers of the [`WorldMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MapChannel {
    Obstacle,
    Rock,
    Navigable,
}

impl MapChannel {
    pub const ALL: [MapChannel; 3] = [MapChannel::Obstacle, MapChannel::Rock, MapChannel::Navigable];

    fn index(self) -> usize {
        match self {
            MapChannel::Obstacle => 0,
            MapChannel::Rock => 1,
            MapChannel::Navigable => 2,
        }
    }
}

/// How well a map layer agrees with a ground-truth navigability grid.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MapCoverage {
    /// Share of ground-truth navigable cells the layer has marked.
    pub mapped_fraction: f64,
    /// Share of marked cells that are navigable in the ground truth.
    pub fidelity: f64,
}

/// The persistent occupancy grid: one counter per cell per [`MapChannel`].
///
/// Counters only ever grow. They are read as relative confidence, never
/// normalized and never reset during a mission. Cells are addressed as
/// `(x, y)` in world cells; storage is row-major by `y`.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldMap {
    size: usize,
    layers: [DMatrix<u32>; 3],
}

impl WorldMap {
    pub fn new(size: usize) -> Result<Self, RoverError> {
        if size == 0 {
            return Err(RoverError::InvalidConfig("world map size must be positive".into()));
        }
        let layer = DMatrix::zeros(size, size);
        Ok(Self {
            size,
            layers: [layer.clone(), layer.clone(), layer],
        })
    }

    /// Side length of the square grid, in cells.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Adds one observation to each cell in `cells` on `channel`.
    ///
    /// Cells must come from [`crate::geometry::rotate_and_translate`], which
    /// already clips them into the grid. Repeated cells count repeatedly.
    pub fn accumulate(&mut self, cells: &[WorldPoint], channel: MapChannel) {
        let layer = &mut self.layers[channel.index()];
        for cell in cells {
            let count = &mut layer[(cell.y, cell.x)];
            *count = count.saturating_add(1);
        }
    }

    pub fn get(&self, channel: MapChannel, x: usize, y: usize) -> u32 {
        self.layers[channel.index()][(y, x)]
    }

    pub fn layer(&self, channel: MapChannel) -> &DMatrix<u32> {
        &self.layers[channel.index()]
    }

    /// Number of cells with at least one observation on `channel`.
    pub fn observed_cells(&self, channel: MapChannel) -> usize {
        self.layer(channel).iter().filter(|&&c| c > 0).count()
    }

    /// Scores `channel` against a `size x size` ground-truth grid, indexed `(y, x)`.
    pub fn coverage(&self, channel: MapChannel, ground_truth: &DMatrix<bool>) -> MapCoverage {
        if ground_truth.shape() != (self.size, self.size) {
            return MapCoverage::default();
        }

        let layer = self.layer(channel);
        let mut truth_cells = 0usize;
        let mut marked_cells = 0usize;
        let mut agreeing = 0usize;
        for (count, &truth) in layer.iter().zip(ground_truth.iter()) {
            let marked = *count > 0;
            truth_cells += truth as usize;
            marked_cells += marked as usize;
            agreeing += (marked && truth) as usize;
        }

        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        MapCoverage {
            mapped_fraction: ratio(agreeing, truth_cells),
            fidelity: ratio(agreeing, marked_cells),
        }
    }

    /// Renders the map for display: red = obstacle, green = rock, blue =
    /// navigable, each saturating at 255. World `y` points up the image.
    pub fn to_rgb_image(&self) -> RgbImage {
        let size = self.size as u32;
        RgbImage::from_fn(size, size, |col, row| {
            let x = col as usize;
            let y = self.size - 1 - row as usize;
            let level = |c: MapChannel| self.get(c, x, y).min(u8::MAX as u32) as u8;
            Rgb([
                level(MapChannel::Obstacle),
                level(MapChannel::Rock),
                level(MapChannel::Navigable),
            ])
        })
    }
}
