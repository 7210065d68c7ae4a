// rover_core/src/geometry/perspective.rs

use crate::error::RoverError;
use image::{Rgb, RgbImage};
use nalgebra::{Matrix3, Point2, SMatrix, SVector, Vector3};

/// Four image points, in corresponding order between source and destination.
pub type Quad = [Point2<f64>; 4];

/// Homogeneous weights closer to zero than this are treated as points at infinity.
const W_EPSILON: f64 = 1e-12;

/// Source samples this close outside the frame still count as inside.
const EDGE_TOLERANCE: f64 = 1e-6;

/// A projective (homography) transform between two image planes.
#[derive(Debug, Clone, PartialEq)]
pub struct PerspectiveTransform {
    /// Maps source pixels to destination pixels.
    forward: Matrix3<f64>,
    /// Maps destination pixels back to source pixels; used for warping.
    inverse: Matrix3<f64>,
}

impl PerspectiveTransform {
    /// Solves for the homography taking each `source[i]` onto `dest[i]`.
    ///
    /// With `h33` fixed to 1, every correspondence contributes two rows of an
    /// 8x8 linear system in the remaining coefficients.
    pub fn from_quads(source: &Quad, dest: &Quad) -> Result<Self, RoverError> {
        let mut a = SMatrix::<f64, 8, 8>::zeros();
        let mut b = SVector::<f64, 8>::zeros();

        for (i, (s, d)) in source.iter().zip(dest.iter()).enumerate() {
            let (x, y) = (s.x, s.y);
            let (u, v) = (d.x, d.y);
            let r = 2 * i;
            a.row_mut(r)
                .copy_from_slice(&[x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y]);
            a.row_mut(r + 1)
                .copy_from_slice(&[0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y]);
            b[r] = u;
            b[r + 1] = v;
        }

        let h = a
            .lu()
            .solve(&b)
            .ok_or(RoverError::DegenerateQuad("point correspondences are collinear"))?;

        let forward = Matrix3::new(h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0);
        let inverse = forward
            .try_inverse()
            .ok_or(RoverError::DegenerateQuad("homography is not invertible"))?;

        Ok(Self { forward, inverse })
    }

    /// Projects a source-plane point into the destination plane.
    /// Returns `None` for points that map to infinity.
    pub fn apply(&self, point: &Point2<f64>) -> Option<Point2<f64>> {
        project(&self.forward, point)
    }

    /// Projects a destination-plane point back into the source plane.
    pub fn apply_inverse(&self, point: &Point2<f64>) -> Option<Point2<f64>> {
        project(&self.inverse, point)
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.forward
    }
}

fn project(m: &Matrix3<f64>, point: &Point2<f64>) -> Option<Point2<f64>> {
    let p = m * Vector3::new(point.x, point.y, 1.0);
    if p.z.abs() < W_EPSILON {
        return None;
    }
    Some(Point2::new(p.x / p.z, p.y / p.z))
}

/// Warps `frame` through `transform`, producing a top-down view of the same size.
///
/// Each output pixel is sampled bilinearly from the source location it maps
/// back to; pixels whose source lies outside the frame are black.
pub fn rectify(frame: &RgbImage, transform: &PerspectiveTransform) -> RgbImage {
    let (width, height) = frame.dimensions();
    let mut warped = RgbImage::new(width, height);
    if width == 0 || height == 0 {
        return warped;
    }

    let max_x = (width - 1) as f64;
    let max_y = (height - 1) as f64;

    for (u, v, out) in warped.enumerate_pixels_mut() {
        let Some(src) = transform.apply_inverse(&Point2::new(u as f64, v as f64)) else {
            continue;
        };
        let in_x = (-EDGE_TOLERANCE..=max_x + EDGE_TOLERANCE).contains(&src.x);
        let in_y = (-EDGE_TOLERANCE..=max_y + EDGE_TOLERANCE).contains(&src.y);
        if !(in_x && in_y) {
            continue;
        }
        *out = sample_bilinear(frame, src.x.clamp(0.0, max_x), src.y.clamp(0.0, max_y));
    }

    warped
}

/// `x`/`y` must already be inside the frame.
fn sample_bilinear(frame: &RgbImage, x: f64, y: f64) -> Rgb<u8> {
    let (width, height) = frame.dimensions();
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let p00 = frame.get_pixel(x0, y0);
    let p10 = frame.get_pixel(x1, y0);
    let p01 = frame.get_pixel(x0, y1);
    let p11 = frame.get_pixel(x1, y1);

    let mut out = [0u8; 3];
    for (c, channel) in out.iter_mut().enumerate() {
        let top = p00[c] as f64 * (1.0 - fx) + p10[c] as f64 * fx;
        let bottom = p01[c] as f64 * (1.0 - fx) + p11[c] as f64 * fx;
        *channel = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}
