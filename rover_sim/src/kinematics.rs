// rover_sim/src/kinematics.rs

use crate::config::VehicleConfig;
use nalgebra::Point2;
use rover_core::state::Commands;
use rover_core::types::Pose;

/// Below this speed, cells/s, the rover counts as standing still.
const STANDSTILL_SPEED: f64 = 1e-3;

/// Kinematic bicycle model for the rover.
/// State: world position, yaw (degrees, counter-clockwise from +x) and signed
/// longitudinal speed. Controls are the decision policy's [`Commands`]:
/// throttle accelerates, brake decelerates toward zero without reversing,
/// steer turns the front axle (degrees, positive to the left).
///
/// x_dot = v cos(yaw), y_dot = v sin(yaw), yaw_dot = v tan(steer) / L
///
/// At a standstill the wheels skid-steer instead: yaw_dot = steer * pivot_gain,
/// with no translation.
#[derive(Debug, Clone)]
pub struct KinematicRover {
    config: VehicleConfig,
    pose: Pose,
    /// Side length of the square arena, in cells. The rover is kept inside.
    arena_size: f64,
    odometer: f64,
}

impl KinematicRover {
    pub fn new(config: VehicleConfig, start: Pose, arena_size: f64) -> Self {
        let mut rover = Self {
            config,
            pose: start,
            arena_size,
            odometer: 0.0,
        };
        rover.pose.yaw = rover.pose.yaw.rem_euclid(360.0);
        rover.pose.position = rover.clamp_to_arena(rover.pose.position.x, rover.pose.position.y);
        rover
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Total path length driven so far.
    pub fn odometer(&self) -> f64 {
        self.odometer
    }

    /// Holds the rover still, e.g. while the arm is picking up a sample.
    pub fn halt(&mut self) {
        self.pose.velocity = 0.0;
    }

    /// Advances the vehicle by `dt` seconds under `commands` (explicit Euler).
    pub fn step(&mut self, commands: &Commands, dt: f64) {
        let v = self.pose.velocity;
        let drive = commands.throttle * self.config.throttle_accel;
        let resist = commands.brake.max(0.0) * self.config.brake_decel
            + if commands.throttle == 0.0 {
                self.config.rolling_drag
            } else {
                0.0
            };

        let mut next_v = v + drive * dt;
        // Resistance pulls toward zero but never through it.
        let slowed = next_v.abs() - resist * dt;
        next_v = if slowed <= 0.0 { 0.0 } else { next_v.signum() * slowed };
        next_v = next_v.clamp(-self.config.max_speed, self.config.max_speed);

        let yaw_rad = self.pose.yaw.to_radians();
        let yaw_rate = if next_v.abs() < STANDSTILL_SPEED {
            commands.steer * self.config.pivot_gain
        } else {
            let steer_rad = commands.steer.to_radians();
            (next_v * steer_rad.tan() / self.config.wheelbase).to_degrees()
        };

        let x = self.pose.position.x + next_v * yaw_rad.cos() * dt;
        let y = self.pose.position.y + next_v * yaw_rad.sin() * dt;
        let clamped = self.clamp_to_arena(x, y);
        // Against the arena wall only the speed along the wall survives.
        let mut along_wall = 1.0;
        if clamped.x != x {
            along_wall *= yaw_rad.sin().abs();
        }
        if clamped.y != y {
            along_wall *= yaw_rad.cos().abs();
        }

        self.odometer += (clamped - self.pose.position).norm();
        self.pose.position = clamped;
        self.pose.yaw = (self.pose.yaw + yaw_rate * dt).rem_euclid(360.0);
        self.pose.velocity = next_v * along_wall;
    }

    fn clamp_to_arena(&self, x: f64, y: f64) -> Point2<f64> {
        let max = (self.arena_size - 1.0).max(0.0);
        Point2::new(x.clamp(0.0, max), y.clamp(0.0, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn rover() -> KinematicRover {
        KinematicRover::new(VehicleConfig::default(), Pose::new(50.0, 50.0, 0.0), 200.0)
    }

    fn commands(throttle: f64, brake: f64, steer: f64) -> Commands {
        Commands {
            throttle,
            brake,
            steer,
            send_pickup: false,
        }
    }

    #[test]
    fn test_throttle_drives_straight_along_yaw() {
        let mut r = rover();
        for _ in 0..10 {
            r.step(&commands(0.2, 0.0, 0.0), 0.1);
        }
        let pose = r.pose();
        // 0.2 * 5 = 1 cell/s^2 for 1 s.
        assert_abs_diff_eq!(pose.velocity, 1.0, epsilon = 1e-9);
        assert!(pose.x() > 50.0);
        assert_abs_diff_eq!(pose.y(), 50.0, epsilon = 1e-9);
        assert_abs_diff_eq!(r.odometer(), pose.x() - 50.0, epsilon = 1e-9);
    }

    #[test]
    fn test_brake_stops_exactly_at_zero() {
        let mut r = rover();
        r.pose.velocity = 1.0;
        r.step(&commands(0.0, 10.0, 0.0), 0.1);
        assert_eq!(r.pose().velocity, 0.0);
        r.step(&commands(0.0, 10.0, 0.0), 0.1);
        assert_eq!(r.pose().velocity, 0.0);
    }

    #[test]
    fn test_reverse_throttle_backs_up() {
        let mut r = rover();
        r.step(&commands(-0.2, 0.0, 0.0), 1.0);
        assert!(r.pose().velocity < 0.0);
        assert!(r.pose().x() < 50.0);
    }

    #[test]
    fn test_left_steer_turns_counter_clockwise() {
        let mut r = rover();
        r.pose.velocity = 1.0;
        r.step(&commands(0.2, 0.0, 15.0), 0.5);
        let yaw = r.pose().yaw;
        assert!(yaw > 0.0 && yaw < 90.0, "yaw {yaw}");

        let mut r = rover();
        r.pose.velocity = 1.0;
        r.step(&commands(0.2, 0.0, -15.0), 0.5);
        assert!(r.pose().yaw > 270.0);
    }

    #[test]
    fn test_stopped_rover_turns_in_place() {
        let mut r = rover();
        r.step(&commands(0.0, 0.0, -15.0), 1.0);
        let pose = r.pose();
        // Full right lock at 2 deg/s per degree of steer.
        assert_abs_diff_eq!(pose.yaw, 330.0, epsilon = 1e-9);
        assert_eq!(pose.position, Point2::new(50.0, 50.0));
        assert_eq!(pose.velocity, 0.0);
        assert_abs_diff_eq!(r.odometer(), 0.0);

        // Brakes on and wheels straight: nothing moves.
        r.step(&commands(0.0, 10.0, 0.0), 1.0);
        assert_abs_diff_eq!(r.pose().yaw, 330.0, epsilon = 1e-9);
    }

    #[test]
    fn test_pivot_hands_over_to_bicycle_once_rolling() {
        let mut r = rover();
        // Throttle gets the wheels rolling within the step, so no pivot.
        r.step(&commands(0.2, 0.0, 15.0), 0.1);
        let rolling_yaw = r.pose().yaw;
        assert!(rolling_yaw > 0.0 && rolling_yaw < 1.0, "yaw {rolling_yaw}");
    }

    #[test]
    fn test_wall_stops_the_rover() {
        let mut r = KinematicRover::new(VehicleConfig::default(), Pose::new(198.5, 10.0, 0.0), 200.0);
        r.pose.velocity = 4.0;
        r.step(&commands(0.2, 0.0, 0.0), 1.0);
        assert_abs_diff_eq!(r.pose().x(), 199.0);
        assert_abs_diff_eq!(r.pose().velocity, 0.0);
    }

    #[test]
    fn test_glancing_wall_contact_slides_along_it() {
        let mut r = KinematicRover::new(VehicleConfig::default(), Pose::new(199.0, 100.0, 300.0), 200.0);
        r.pose.velocity = 2.0;
        r.step(&commands(0.0, 0.0, 0.0), 0.1);
        let pose = r.pose();
        assert_abs_diff_eq!(pose.x(), 199.0);
        assert!(pose.y() < 100.0);
        // 60 degrees off the wall normal keeps sin(60) of the speed.
        let coasting = 2.0 - 0.3 * 0.1;
        assert_abs_diff_eq!(pose.velocity, coasting * 60f64.to_radians().sin(), epsilon = 1e-9);
    }
}
