// rover_core/src/rover.rs

use crate::config::RoverConfig;
use crate::decision::{Decision, DecisionPolicy};
use crate::error::RoverError;
use crate::perception::PerceptionPipeline;
use crate::state::{Commands, RoverState};
use crate::types::Telemetry;
use image::RgbImage;
use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// What one tick produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutput {
    pub commands: Commands,
    pub decision: Decision,
}

/// The full perception-and-decision loop behind a single `tick` call.
///
/// The collaborator owns the `Rover` for the whole mission and calls
/// [`Rover::tick`] once per camera frame, strictly in sequence.
#[derive(Debug, Clone)]
pub struct Rover<R = ChaCha8Rng> {
    state: RoverState,
    perception: PerceptionPipeline,
    policy: DecisionPolicy<R>,
}

impl Rover<ChaCha8Rng> {
    pub fn new(config: &RoverConfig) -> Result<Self, RoverError> {
        Self::with_policy(config, DecisionPolicy::from_config(config))
    }
}

impl<R: Rng> Rover<R> {
    pub fn with_policy(config: &RoverConfig, policy: DecisionPolicy<R>) -> Result<Self, RoverError> {
        config.validate()?;
        Ok(Self {
            state: RoverState::new(config)?,
            perception: PerceptionPipeline::new(config.perception.clone())?,
            policy,
        })
    }

    /// Runs perception then decision for one frame.
    ///
    /// The returned `send_pickup` is consumed here: it is `true` only on the
    /// tick that raised it.
    pub fn tick(&mut self, frame: Option<&RgbImage>, telemetry: &Telemetry) -> TickOutput {
        self.state.apply_telemetry(telemetry);
        self.perception.step(&mut self.state, frame);
        let decision = self.policy.decide(&mut self.state);

        let commands = self.state.commands;
        self.state.take_pickup();
        TickOutput { commands, decision }
    }

    pub fn state(&self) -> &RoverState {
        &self.state
    }

    /// Mutable access for collaborators that need to seed or reset fields.
    pub fn state_mut(&mut self) -> &mut RoverState {
        &mut self.state
    }

    pub fn perception(&self) -> &PerceptionPipeline {
        &self.perception
    }
}
