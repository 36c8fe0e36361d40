pub mod ode;
pub mod rotation;
