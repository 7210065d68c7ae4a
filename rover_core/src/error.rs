// rover_core/src/error.rs

use thiserror::Error;

/// Everything that can go wrong while *building* the perception/decision stack.
///
/// Per-tick operations never fail: degenerate inputs are handled as policy
/// branches (see `DecisionPolicy::decide`).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RoverError {
    /// The four point correspondences do not define a projective transform
    /// (three or more points collinear, or repeated points).
    #[error("perspective quadrilaterals are degenerate: {0}")]
    DegenerateQuad(&'static str),

    /// A configuration value is outside its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
