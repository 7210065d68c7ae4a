// rover_core/src/decision/pursuit.rs

//! Sample pursuit: while a [`SampleSearchState`] is active it overrides normal
//! terrain navigation and steers the rover onto the target.

use super::Decision;
use crate::geometry::{heading_degrees, wrap_degrees};
use crate::state::{Mode, RoverState, SampleSearchState};
use tracing::{debug, info};

/// Opens a pursuit from this tick's rock sighting, if one is allowed.
/// Returns `true` when a new target was taken on.
pub(super) fn acquire_target(state: &mut RoverState) -> bool {
    if state.sample_search.is_some() {
        return false;
    }
    if let Some(until) = state.sample_ignore_until {
        if state.total_time < until {
            return false;
        }
    }
    let Some(sighting) = state.rock_sighting else {
        return false;
    };

    let radius = state.sample.collected_radius;
    let already_collected = state
        .collected_samples
        .iter()
        .any(|p| (p - sighting.world_position).norm() <= radius);
    if already_collected {
        debug!(
            x = sighting.world_position.x,
            y = sighting.world_position.y,
            "ignoring sighting of a collected sample"
        );
        return false;
    }

    let search = SampleSearchState::new(
        sighting.world_position,
        &state.pose,
        state.total_time,
        state.sample.search_timeout,
    );
    info!(
        x = search.position.x,
        y = search.position.y,
        distance = search.distance,
        "starting sample pursuit"
    );
    state.sample_search = Some(search);
    true
}

/// Runs one pursuit tick. Returns `None` when no pursuit is active, in which
/// case normal navigation should run.
pub(super) fn pursue(state: &mut RoverState) -> Option<Decision> {
    let now = state.total_time;
    let search = state.sample_search.as_mut()?;

    if search.expired(now) {
        let until = now + state.sample.cooldown;
        info!(
            started = search.start_time,
            ignore_until = until,
            "sample pursuit timed out"
        );
        state.sample_search = None;
        state.sample_ignore_until = Some(until);
        state.commands.throttle = 0.0;
        state.mode = Mode::Stop;
        return Some(Decision::PursuitTimedOut);
    }

    let pose = state.pose;
    search.refresh(&pose);
    let target = *search;

    let limit = state.drive.steer_limit_deg;
    let yaw_error = wrap_degrees(heading_degrees(target.angle) - pose.yaw);
    let mut throttle = state.drive.throttle_set * target.distance.min(1.0);
    if yaw_error.abs() > state.sample.reverse_yaw_error_deg {
        // Target is behind: back onto it rather than swinging round.
        throttle = -throttle;
    }
    state.commands.steer = yaw_error.clamp(-limit, limit);
    state.commands.throttle = throttle;
    state.commands.brake = (1.0 - target.distance).max(0.0);

    if state.near_sample && pose.velocity == 0.0 && !state.picking_up {
        info!(x = target.position.x, y = target.position.y, "picking up sample");
        state.commands.send_pickup = true;
        state.mode = Mode::Stop;
        state.collected_samples.push(target.position);
        state.sample_search = None;
        return Some(Decision::PickedUp);
    }

    Some(Decision::Pursuing)
}
