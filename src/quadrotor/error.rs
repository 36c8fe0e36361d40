use thiserror::Error;

/// Raised when building a [`Quadrotor`](super::Quadrotor) from parameters outside their domain.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("Parameter '{name}' must be {requirement}, got {value}")]
    OutOfDomain {
        name: &'static str,
        requirement: &'static str,
        value: f64,
    },

    #[error("Only '+' configurations with {expected} motors are supported, got {got}")]
    MotorCount { expected: usize, got: usize },
}
