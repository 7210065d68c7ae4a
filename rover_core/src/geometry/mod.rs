// rover_core/src/geometry/mod.rs

//! Pure coordinate math shared by perception and mapping.
//!
//! Three frames are involved:
//! - image: origin top-left, `row` increasing downward, `col` to the right;
//! - rover-centric: origin at the bottom-center of the rectified image, `x`
//!   forward (up the image), `y` to the left;
//! - world: the fixed grid underlying the [`WorldMap`](crate::mapping::WorldMap),
//!   with rover-centric pixels shrunk by `scale` into cells.

mod perspective;

pub use perspective::{rectify, PerspectiveTransform, Quad};

use crate::perception::classifier::ClassifiedMask;
use crate::types::{PolarObservation, RoverCentricPoint, WorldPoint};
use nalgebra::{Point2, Rotation2};

/// Converts every set pixel of `mask` into rover-centric coordinates.
///
/// A pixel at image row `r`, column `c` of an `H x W` mask becomes
/// `x = H - r`, `y = W/2 - c`. The output order is unspecified.
pub fn mask_to_rover_frame(mask: &ClassifiedMask) -> Vec<RoverCentricPoint> {
    let height = mask.height() as f64;
    let half_width = mask.width() as f64 / 2.0;
    mask.set_pixels()
        .map(|(row, col)| Point2::new(height - row as f64, half_width - col as f64))
        .collect()
}

/// Range and bearing of each rover-centric point.
pub fn to_polar(points: &[RoverCentricPoint]) -> Vec<PolarObservation> {
    points
        .iter()
        .map(|p| PolarObservation {
            distance: p.x.hypot(p.y),
            angle: p.y.atan2(p.x),
        })
        .collect()
}

/// Rotates rover-centric points by `yaw_deg`, shrinks them by `scale` and
/// moves them to `origin`. The result is continuous; see
/// [`rotate_and_translate`] for the grid-snapped version.
pub fn rover_to_world(
    points: &[RoverCentricPoint],
    yaw_deg: f64,
    origin: Point2<f64>,
    scale: f64,
) -> Vec<Point2<f64>> {
    let rotation = Rotation2::new(yaw_deg.to_radians());
    points
        .iter()
        .map(|p| origin + (rotation * p.coords) / scale)
        .collect()
}

/// Rounds a continuous world position to the nearest cell and clips it into
/// `[0, grid_size - 1]` on both axes. Non-finite input lands on cell 0.
pub fn snap_to_grid(point: &Point2<f64>, grid_size: usize) -> WorldPoint {
    let max = grid_size.saturating_sub(1) as f64;
    let snap = |v: f64| {
        if v.is_finite() {
            v.round().clamp(0.0, max) as usize
        } else {
            0
        }
    };
    WorldPoint {
        x: snap(point.x),
        y: snap(point.y),
    }
}

/// Maps rover-centric points into world cells.
///
/// Every returned point lies inside a `grid_size x grid_size` grid: points
/// that would fall off the map are clipped to its border, never dropped.
pub fn rotate_and_translate(
    points: &[RoverCentricPoint],
    yaw_deg: f64,
    origin: Point2<f64>,
    scale: f64,
    grid_size: usize,
) -> Vec<WorldPoint> {
    rover_to_world(points, yaw_deg, origin, scale)
        .iter()
        .map(|p| snap_to_grid(p, grid_size))
        .collect()
}

/// Wraps an angle in degrees into `(-180, 180]`.
pub fn wrap_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Converts a bearing in radians to a compass-style heading in `[0, 360)` degrees.
pub fn heading_degrees(bearing_rad: f64) -> f64 {
    bearing_rad.to_degrees().rem_euclid(360.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use nalgebra::DMatrix;
    use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

    const EPS: f64 = 1e-9;

    #[test]
    fn test_mask_to_rover_frame_uses_bottom_center_origin() {
        // 4 rows x 6 cols; set the bottom-left and top-center pixels.
        let mut data = DMatrix::from_element(4, 6, false);
        data[(3, 0)] = true;
        data[(0, 3)] = true;
        let mask = ClassifiedMask::from_matrix(data);

        let mut points = mask_to_rover_frame(&mask);
        points.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap());

        assert_eq!(points.len(), 2);
        // row 3 -> x = 4 - 3 = 1, col 0 -> y = 3 - 0 = 3
        assert_abs_diff_eq!(points[0].x, 1.0, epsilon = EPS);
        assert_abs_diff_eq!(points[0].y, 3.0, epsilon = EPS);
        // row 0 -> x = 4, col 3 -> y = 0
        assert_abs_diff_eq!(points[1].x, 4.0, epsilon = EPS);
        assert_abs_diff_eq!(points[1].y, 0.0, epsilon = EPS);
    }

    #[test]
    fn test_empty_mask_yields_no_points() {
        let mask = ClassifiedMask::empty(160, 320);
        assert!(mask_to_rover_frame(&mask).is_empty());
        assert!(to_polar(&[]).is_empty());
    }

    #[test]
    fn test_to_polar_distance_and_angle() {
        let polar = to_polar(&[
            Point2::new(3.0, 4.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 2.0),
            Point2::new(-1.0, 0.0),
        ]);
        assert_abs_diff_eq!(polar[0].distance, 5.0, epsilon = EPS);
        assert_abs_diff_eq!(polar[1].angle, FRAC_PI_4, epsilon = EPS);
        assert_abs_diff_eq!(polar[2].angle, FRAC_PI_2, epsilon = EPS);
        // Straight behind is +pi, never -pi.
        assert_abs_diff_eq!(polar[3].angle, PI, epsilon = EPS);
    }

    #[test]
    fn test_rotate_and_translate_identity_yaw() {
        let cells = rotate_and_translate(&[Point2::new(20.0, -10.0)], 0.0, Point2::new(100.0, 50.0), 10.0, 200);
        assert_eq!(cells, vec![WorldPoint { x: 102, y: 49 }]);
    }

    #[test]
    fn test_rotate_and_translate_quarter_turn() {
        // Facing +y: forward pixels move up the world y axis.
        let cells = rotate_and_translate(&[Point2::new(30.0, 0.0)], 90.0, Point2::new(10.0, 10.0), 10.0, 200);
        assert_eq!(cells, vec![WorldPoint { x: 10, y: 13 }]);
    }

    #[test]
    fn test_rotate_and_translate_rounds_to_nearest() {
        // 0.6 cells forward of 10.0 -> 10.6 -> 11, not truncated to 10.
        let cells = rotate_and_translate(&[Point2::new(6.0, 0.0)], 0.0, Point2::new(10.0, 10.0), 10.0, 200);
        assert_eq!(cells[0].x, 11);
    }

    #[test]
    fn test_rotate_and_translate_clips_to_border() {
        let cells = rotate_and_translate(
            &[Point2::new(10_000.0, 10_000.0), Point2::new(-10_000.0, -10_000.0)],
            0.0,
            Point2::new(100.0, 100.0),
            10.0,
            200,
        );
        assert_eq!(cells[0], WorldPoint { x: 199, y: 199 });
        assert_eq!(cells[1], WorldPoint { x: 0, y: 0 });
    }

    #[test]
    fn test_snap_to_grid_non_finite() {
        let cell = snap_to_grid(&Point2::new(f64::NAN, f64::INFINITY), 200);
        assert_eq!(cell, WorldPoint { x: 0, y: 0 });
    }

    #[test]
    fn test_wrap_degrees() {
        assert_abs_diff_eq!(wrap_degrees(190.0), -170.0, epsilon = EPS);
        assert_abs_diff_eq!(wrap_degrees(-190.0), 170.0, epsilon = EPS);
        assert_abs_diff_eq!(wrap_degrees(180.0), 180.0, epsilon = EPS);
        assert_abs_diff_eq!(wrap_degrees(-180.0), 180.0, epsilon = EPS);
        assert_abs_diff_eq!(wrap_degrees(720.0 + 15.0), 15.0, epsilon = EPS);
    }

    #[test]
    fn test_heading_degrees_is_non_negative() {
        assert_abs_diff_eq!(heading_degrees(-FRAC_PI_2), 270.0, epsilon = EPS);
        assert_abs_diff_eq!(heading_degrees(FRAC_PI_4), 45.0, epsilon = EPS);
    }
}
