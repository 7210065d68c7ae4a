// rover_core/src/perception/classifier.rs

use image::{GrayImage, Luma, RgbImage};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// An RGB box: a pixel is selected iff every channel is strictly above
/// `lower` and at most `upper`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ColorThreshold {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl ColorThreshold {
    /// Bright sand. The upper bound is the full range, so only `lower` bites.
    pub const NAVIGABLE_TERRAIN: Self = Self {
        lower: [160, 160, 160],
        upper: [255, 255, 255],
    };

    /// Yellow-ish rock samples.
    pub const ROCK_SAMPLE: Self = Self {
        lower: [100, 0, 0],
        upper: [180, 180, 70],
    };

    pub fn contains(&self, rgb: [u8; 3]) -> bool {
        rgb.iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .all(|(&v, (&lo, &hi))| v > lo && v <= hi)
    }
}

/// A per-pixel boolean selection, indexed `(row, col)` like the image it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedMask {
    data: DMatrix<bool>,
}

impl ClassifiedMask {
    pub fn from_matrix(data: DMatrix<bool>) -> Self {
        Self { data }
    }

    /// An all-false mask of the given extent.
    pub fn empty(height: u32, width: u32) -> Self {
        Self {
            data: DMatrix::from_element(height as usize, width as usize, false),
        }
    }

    pub fn height(&self) -> u32 {
        self.data.nrows() as u32
    }

    pub fn width(&self) -> u32 {
        self.data.ncols() as u32
    }

    pub fn get(&self, row: u32, col: u32) -> bool {
        self.data[(row as usize, col as usize)]
    }

    /// Number of selected pixels.
    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    /// `(row, col)` of every selected pixel.
    pub fn set_pixels(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        let nrows = self.data.nrows();
        // Storage is column-major.
        self.data
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v)
            .map(move |(i, _)| (i % nrows, i / nrows))
    }

    /// 0/255 grayscale rendering, for overlays.
    pub fn to_gray_image(&self) -> GrayImage {
        GrayImage::from_fn(self.width(), self.height(), |x, y| {
            Luma([if self.get(y, x) { 255 } else { 0 }])
        })
    }
}

/// Selects the pixels of `frame` inside `threshold`.
pub fn classify(frame: &RgbImage, threshold: &ColorThreshold) -> ClassifiedMask {
    let (width, height) = frame.dimensions();
    let data = DMatrix::from_fn(height as usize, width as usize, |row, col| {
        threshold.contains(frame.get_pixel(col as u32, row as u32).0)
    });
    ClassifiedMask { data }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_navigable_threshold_sample_pixels() {
        let t = ColorThreshold::NAVIGABLE_TERRAIN;
        assert!(t.contains([200, 200, 200]));
        assert!(!t.contains([100, 100, 100]));
        // Upper bound is inclusive.
        assert!(t.contains([255, 255, 255]));
        // Lower bound is exclusive.
        assert!(!t.contains([160, 200, 200]));
        assert!(t.contains([161, 161, 161]));
    }

    #[test]
    fn test_rock_threshold_requires_all_channels() {
        let t = ColorThreshold::ROCK_SAMPLE;
        assert!(t.contains([150, 130, 20]));
        // Blue above the cap.
        assert!(!t.contains([150, 130, 71]));
        // Blue must still be strictly above zero.
        assert!(!t.contains([150, 130, 0]));
        // Red at the lower bound is rejected.
        assert!(!t.contains([100, 130, 20]));
    }

    #[test]
    fn test_classify_marks_matching_pixels() {
        let mut frame = RgbImage::from_pixel(4, 3, Rgb([50, 50, 50]));
        frame.put_pixel(1, 2, Rgb([200, 200, 200]));
        frame.put_pixel(3, 0, Rgb([255, 255, 255]));

        let mask = classify(&frame, &ColorThreshold::NAVIGABLE_TERRAIN);
        assert_eq!((mask.height(), mask.width()), (3, 4));
        assert_eq!(mask.count(), 2);
        assert!(mask.get(2, 1));
        assert!(mask.get(0, 3));

        let mut pixels: Vec<_> = mask.set_pixels().collect();
        pixels.sort();
        assert_eq!(pixels, vec![(0, 3), (2, 1)]);
    }

    #[test]
    fn test_empty_frame_gives_empty_mask() {
        let mask = classify(&RgbImage::new(0, 0), &ColorThreshold::NAVIGABLE_TERRAIN);
        assert_eq!(mask.count(), 0);
        assert_eq!(mask.set_pixels().count(), 0);
    }

    #[test]
    fn test_gray_image_export() {
        let mut data = DMatrix::from_element(2, 3, false);
        data[(1, 2)] = true;
        let gray = ClassifiedMask::from_matrix(data).to_gray_image();
        assert_eq!(gray.dimensions(), (3, 2));
        assert_eq!(gray.get_pixel(2, 1).0, [255]);
        assert_eq!(gray.get_pixel(0, 0).0, [0]);
    }
}
