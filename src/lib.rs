pub mod math;
pub mod parameters;
pub mod quadrotor;
pub mod runner;
