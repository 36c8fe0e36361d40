pub mod aerodynamics;
pub mod error;
pub mod motors;
pub mod quadrotor;
pub mod quadrotor_data;

pub use error::ConfigError;
pub use quadrotor::Quadrotor;
pub use quadrotor_data::{DerivedLimits, QuadrotorState, VehicleParams};
