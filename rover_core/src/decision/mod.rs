// rover_core/src/decision/mod.rs

//! The finite-state controller that turns [`RoverState`] into commands.
//!
//! Each tick runs, in order, and stops at the first step that claims the tick:
//! 1. history update and stuck check,
//! 2. rounds (circling) check,
//! 3. sample pursuit, if a target is active,
//! 4. forward/stop terrain navigation,
//! 5. opportunistic pickup.

mod pursuit;

use crate::config::{HistoryConfig, RoverConfig};
use crate::state::{HistorySample, Mode, RoverState};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{debug, trace, warn};

/// Which branch of the policy produced this tick's commands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    /// Position has not changed over the whole history window.
    Stuck,
    /// Steering has been pinned to one extreme over the whole window.
    Rounds { steer: f64 },
    PursuitTimedOut,
    Pursuing,
    PickedUp,
    /// No terrain summary yet: drive straight ahead.
    Blind,
    /// Normal terrain navigation; carries the mode after the tick.
    Navigate(Mode),
}

/// The decision policy. Generic over its random source so tests can run
/// it deterministically under a fixed seed.
#[derive(Debug, Clone)]
pub struct DecisionPolicy<R = ChaCha8Rng> {
    history: HistoryConfig,
    rng: R,
}

impl DecisionPolicy<ChaCha8Rng> {
    /// Seeds from `config.seed`, or from the OS when unset.
    pub fn from_config(config: &RoverConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self::with_rng(config.history.clone(), rng)
    }

    pub fn seeded(history: HistoryConfig, seed: u64) -> Self {
        Self::with_rng(history, ChaCha8Rng::seed_from_u64(seed))
    }
}

impl<R: Rng> DecisionPolicy<R> {
    pub fn with_rng(history: HistoryConfig, rng: R) -> Self {
        Self { history, rng }
    }

    /// Runs one decision tick, writing `state.commands` and `state.mode`.
    pub fn decide(&mut self, state: &mut RoverState) -> Decision {
        let decision = self.decide_inner(state);
        trace!(
            ?decision,
            throttle = state.commands.throttle,
            brake = state.commands.brake,
            steer = state.commands.steer,
            "decision"
        );
        decision
    }

    fn decide_inner(&mut self, state: &mut RoverState) -> Decision {
        if self.check_stuck(state) {
            return Decision::Stuck;
        }
        if let Some(steer) = self.check_rounds(state) {
            return Decision::Rounds { steer };
        }

        pursuit::acquire_target(state);
        if let Some(decision) = pursuit::pursue(state) {
            return decision;
        }

        let decision = navigate(state);

        if state.near_sample && state.pose.velocity == 0.0 && !state.picking_up {
            state.commands.send_pickup = true;
        }
        decision
    }

    /// Records this second's position and reports whether it matches the
    /// whole window. On a match the rover is put into recovery.
    fn check_stuck(&mut self, state: &mut RoverState) -> bool {
        let (x, y) = (state.pose.x(), state.pose.y());
        let slot = state.history.push(
            state.total_time,
            HistorySample {
                x,
                y,
                steer: state.commands.steer,
            },
        );

        if !state.history.all_near(x, y, self.history.tolerance) {
            return false;
        }

        warn!(x, y, "rover is stuck, turning to get rolling");
        state.commands.throttle = 0.0;
        state.commands.brake = 0.0;
        state.commands.steer = self.history.stuck_steer_deg;
        // Keeps the same window from re-triggering right after the turn.
        state.history.invalidate(slot);
        set_mode(state, Mode::Stop);
        true
    }

    fn check_rounds(&mut self, state: &mut RoverState) -> Option<f64> {
        if !state.history.steer_saturated(state.drive.steer_limit_deg) {
            return None;
        }
        let range = self.history.rounds_steer_range.abs();
        let steer = self.rng.gen_range(-range..=range) as f64;
        warn!(steer, "going in rounds, breaking the circle");
        state.commands.steer = steer;
        Some(steer)
    }
}

/// Forward/stop navigation on the navigable-terrain summary.
fn navigate(state: &mut RoverState) -> Decision {
    let Some(angles) = state.nav_polar.as_ref() else {
        state.commands.throttle = state.drive.throttle_set;
        state.commands.brake = 0.0;
        state.commands.steer = 0.0;
        return Decision::Blind;
    };

    let count = angles.len();
    let limit = state.drive.steer_limit_deg;
    let mean_steer = mean_degrees(angles.iter().map(|p| p.angle)).clamp(-limit, limit);
    let drive = state.drive.clone();
    let velocity = state.pose.velocity;

    match state.mode {
        Mode::Forward => {
            if count >= drive.stop_forward {
                state.commands.throttle = if velocity < drive.max_vel {
                    drive.throttle_set
                } else {
                    0.0
                };
                state.commands.brake = 0.0;
                state.commands.steer = mean_steer;
            } else {
                state.commands.throttle = 0.0;
                state.commands.brake = drive.brake_set;
                state.commands.steer = 0.0;
                set_mode(state, Mode::Stop);
            }
        }
        Mode::Stop => {
            if velocity > drive.stopped_velocity {
                state.commands.throttle = 0.0;
                state.commands.brake = drive.brake_set;
                state.commands.steer = 0.0;
            } else {
                // Two independent checks, not an if/else.
                if count < drive.go_forward {
                    state.commands.throttle = 0.0;
                    state.commands.brake = 0.0;
                    state.commands.steer = -limit;
                }
                if count >= drive.go_forward {
                    state.commands.throttle = drive.throttle_set;
                    state.commands.brake = 0.0;
                    state.commands.steer = mean_steer;
                    set_mode(state, Mode::Forward);
                }
            }
        }
    }

    Decision::Navigate(state.mode)
}

/// Mean of radian angles, in degrees. Zero for an empty set.
fn mean_degrees(angles: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = angles.fold((0.0, 0usize), |(s, n), a| (s + a.to_degrees(), n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

fn set_mode(state: &mut RoverState, mode: Mode) {
    if state.mode != mode {
        debug!(from = %state.mode, to = %mode, "mode change");
        state.mode = mode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PolarObservation, Pose};
    use approx::assert_abs_diff_eq;

    fn policy() -> DecisionPolicy {
        DecisionPolicy::seeded(HistoryConfig::default(), 7)
    }

    fn state() -> RoverState {
        RoverState::new(&RoverConfig::default()).unwrap()
    }

    /// `count` navigable pixels all at `angle_deg`.
    fn terrain(count: usize, angle_deg: f64) -> Option<Vec<PolarObservation>> {
        Some(vec![
            PolarObservation {
                distance: 50.0,
                angle: angle_deg.to_radians(),
            };
            count
        ])
    }

    /// Moves the rover one cell per tick so stuck detection stays quiet.
    fn tick_moving(policy: &mut DecisionPolicy, state: &mut RoverState, t: f64) -> Decision {
        state.total_time = t;
        state.pose.position.x = 10.0 + t;
        policy.decide(state)
    }

    #[test]
    fn test_blind_rover_drives_straight() {
        let mut p = policy();
        let mut s = state();
        s.commands.steer = 5.0;
        assert_eq!(tick_moving(&mut p, &mut s, 0.0), Decision::Blind);
        assert_abs_diff_eq!(s.commands.throttle, 0.2);
        assert_abs_diff_eq!(s.commands.steer, 0.0);
        assert_abs_diff_eq!(s.commands.brake, 0.0);
    }

    #[test]
    fn test_forward_keeps_going_at_threshold() {
        let mut p = policy();
        let mut s = state();
        s.nav_polar = terrain(50, 10.0);
        assert_eq!(tick_moving(&mut p, &mut s, 0.0), Decision::Navigate(Mode::Forward));
        assert_abs_diff_eq!(s.commands.throttle, 0.2);
        assert_abs_diff_eq!(s.commands.steer, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_forward_stops_below_threshold() {
        let mut p = policy();
        let mut s = state();
        s.nav_polar = terrain(49, 10.0);
        assert_eq!(tick_moving(&mut p, &mut s, 0.0), Decision::Navigate(Mode::Stop));
        assert_eq!(s.mode, Mode::Stop);
        assert_abs_diff_eq!(s.commands.brake, 10.0);
        assert_abs_diff_eq!(s.commands.throttle, 0.0);
        assert_abs_diff_eq!(s.commands.steer, 0.0);
    }

    #[test]
    fn test_forward_coasts_at_max_velocity_and_clips_steer() {
        let mut p = policy();
        let mut s = state();
        s.nav_polar = terrain(100, -40.0);
        s.pose = Pose::new(0.0, 0.0, 0.0).with_velocity(2.5);
        tick_moving(&mut p, &mut s, 0.0);
        assert_abs_diff_eq!(s.commands.throttle, 0.0);
        assert_abs_diff_eq!(s.commands.steer, -15.0);
    }

    #[test]
    fn test_stop_keeps_braking_while_moving() {
        let mut p = policy();
        let mut s = state();
        s.mode = Mode::Stop;
        s.nav_polar = terrain(1000, 0.0);
        s.pose.velocity = 0.5;
        tick_moving(&mut p, &mut s, 0.0);
        assert_eq!(s.mode, Mode::Stop);
        assert_abs_diff_eq!(s.commands.brake, 10.0);
    }

    #[test]
    fn test_stopped_rover_turns_in_place_without_terrain() {
        let mut p = policy();
        let mut s = state();
        s.mode = Mode::Stop;
        s.nav_polar = terrain(499, 0.0);
        s.pose.velocity = 0.1;
        tick_moving(&mut p, &mut s, 0.0);
        assert_eq!(s.mode, Mode::Stop);
        assert_abs_diff_eq!(s.commands.brake, 0.0);
        assert_abs_diff_eq!(s.commands.steer, -15.0);
        assert_abs_diff_eq!(s.commands.throttle, 0.0);
    }

    #[test]
    fn test_stopped_rover_resumes_with_enough_terrain() {
        let mut p = policy();
        let mut s = state();
        s.mode = Mode::Stop;
        s.nav_polar = terrain(500, 5.0);
        tick_moving(&mut p, &mut s, 0.0);
        assert_eq!(s.mode, Mode::Forward);
        assert_abs_diff_eq!(s.commands.throttle, 0.2);
        assert_abs_diff_eq!(s.commands.steer, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_stuck_after_full_window_at_one_spot() {
        let mut p = policy();
        let mut s = state();
        s.nav_polar = terrain(1000, 0.0);
        s.pose = Pose::new(50.0, 50.0, 0.0);

        for second in 0..6 {
            s.total_time = second as f64;
            s.pose.position.x = 50.0 + if second % 2 == 0 { 0.01 } else { -0.01 };
            s.commands.steer = if second % 2 == 0 { 3.0 } else { -7.0 };
            assert_ne!(p.decide(&mut s), Decision::Stuck, "second {second}");
        }

        s.total_time = 6.0;
        assert_eq!(p.decide(&mut s), Decision::Stuck);
        assert_eq!(s.mode, Mode::Stop);
        assert_abs_diff_eq!(s.commands.steer, -15.0);
        assert_abs_diff_eq!(s.commands.throttle, 0.0);
        assert_abs_diff_eq!(s.commands.brake, 0.0);

        // The current slot is invalidated so the window no longer matches as-is.
        assert_eq!(s.history.iter().nth(6).unwrap().x, crate::state::SENTINEL);
        assert!(!s.history.all_near(s.pose.x(), s.pose.y(), 0.05));
    }

    #[test]
    fn test_rounds_recovery_draws_integer_steer_in_range() {
        let mut seen = std::collections::HashSet::new();
        for seed in 0..200 {
            let mut p = DecisionPolicy::seeded(HistoryConfig::default(), seed);
            let mut s = state();
            s.nav_polar = terrain(1000, 40.0);
            for second in 0..7 {
                tick_moving(&mut p, &mut s, second as f64);
                assert_abs_diff_eq!(s.commands.steer, 15.0);
            }
            let Decision::Rounds { steer } = tick_moving(&mut p, &mut s, 7.0) else {
                panic!("expected rounds recovery");
            };
            assert_eq!(steer.fract(), 0.0);
            assert!((-10.0..=10.0).contains(&steer));
            assert_abs_diff_eq!(s.commands.steer, steer);
            seen.insert(steer as i32);
        }
        // Sampling covers both sides of the range.
        assert!(seen.iter().any(|&v| v < 0));
        assert!(seen.iter().any(|&v| v > 0));
    }

    #[test]
    fn test_same_seed_same_recovery() {
        let run = |seed| {
            let mut p = DecisionPolicy::seeded(HistoryConfig::default(), seed);
            let mut s = state();
            s.nav_polar = terrain(1000, -40.0);
            (0..10)
                .map(|t| tick_moving(&mut p, &mut s, t as f64))
                .collect::<Vec<_>>()
        };
        assert_eq!(run(42), run(42));
    }

    #[test]
    fn test_pickup_outside_pursuit() {
        let mut p = policy();
        let mut s = state();
        s.nav_polar = terrain(1000, 0.0);
        s.near_sample = true;
        s.pose.velocity = 0.0;
        tick_moving(&mut p, &mut s, 0.0);
        assert!(s.commands.send_pickup);

        let mut s = state();
        s.nav_polar = terrain(1000, 0.0);
        s.near_sample = true;
        s.picking_up = true;
        tick_moving(&mut p, &mut s, 0.0);
        assert!(!s.commands.send_pickup);
    }

    #[test]
    fn test_pursuit_preempts_navigation() {
        let mut p = policy();
        let mut s = state();
        s.nav_polar = terrain(10, 0.0);
        s.rock_sighting = Some(crate::perception::RockSighting {
            pixel_count: 5,
            world_position: nalgebra::Point2::new(30.0, 10.0),
            distance: 40.0,
            angle: 0.0,
        });
        s.pose.position.y = 10.0;
        // Too little terrain would normally stop the rover.
        assert_eq!(tick_moving(&mut p, &mut s, 0.0), Decision::Pursuing);
        assert_eq!(s.mode, Mode::Forward);
        assert_abs_diff_eq!(s.commands.throttle, 0.2);
    }

    #[test]
    fn test_mean_degrees() {
        assert_abs_diff_eq!(mean_degrees(std::iter::empty()), 0.0);
        let angles = [0.1f64, 0.3];
        assert_abs_diff_eq!(mean_degrees(angles.into_iter()), 0.2f64.to_degrees(), epsilon = 1e-9);
    }
}
