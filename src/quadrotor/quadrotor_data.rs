use anyhow::Result;
use nalgebra::{SVector, Vector3};

use crate::parameters::ParameterMap;

use super::{aerodynamics::AerodynamicActions, error::ConfigError, motors::MotorActions};

/// Number of motors of a '+' configuration quadrotor
pub const N_MOTORS: usize = 4;

/// Physical and numerical parameters of the vehicle. Fixed once the simulation is built.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleParams {
    pub mass_kg: f64,
    /// Cosmetic only, no momentum theory
    pub prop_radius_m: f64,
    pub n_motors: usize,
    /// Fraction of the maximum thrust needed to hover, in (0, 1]
    pub hover_throttle: f64,
    /// Distance between the center of mass and each prop disk
    pub arm_length_m: f64,
    /// Principal moments of inertia (Jxx, Jyy, Jzz), the inertia tensor is diagonal
    pub inertia_kgm2: Vector3<f64>,
    pub kt: f64,
    pub kq: f64,
    pub kd: f64,
    pub km: f64,
    /// Gravitational acceleration, positive. Applied along -z of the inertial frame.
    pub g_m_s2: f64,
    pub dt_s: f64,
}

impl VehicleParams {
    pub fn from_params(params: &ParameterMap) -> Result<Self> {
        let n_motors = usize::try_from(params.get_param("n_motors")?.value_int()?)?;

        Ok(VehicleParams {
            mass_kg: params.get_param("mass")?.value_float()?,
            prop_radius_m: params.get_param("prop_radius")?.value_float()?,
            n_motors,
            hover_throttle: params.get_param("hover_throttle")?.value_float()?,
            arm_length_m: params.get_param("arm_length")?.value_float()?,
            inertia_kgm2: params.get_param("inertia")?.value_vector::<3>()?,
            kt: params.get_param("kt")?.value_float()?,
            kq: params.get_param("kq")?.value_float()?,
            kd: params.get_param("kd")?.value_float()?,
            km: params.get_param("km")?.value_float()?,
            g_m_s2: params.get_param("g")?.value_float()?,
            dt_s: params.get_param("dt")?.value_float()?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.n_motors != N_MOTORS {
            return Err(ConfigError::MotorCount {
                expected: N_MOTORS,
                got: self.n_motors,
            });
        }

        positive("mass", self.mass_kg)?;
        positive("arm_length", self.arm_length_m)?;
        positive("inertia.xx", self.inertia_kgm2[0])?;
        positive("inertia.yy", self.inertia_kgm2[1])?;
        positive("inertia.zz", self.inertia_kgm2[2])?;
        positive("kt", self.kt)?;
        positive("kq", self.kq)?;
        positive("km", self.km)?;
        positive("g", self.g_m_s2)?;
        positive("dt", self.dt_s)?;

        if !(self.hover_throttle > 0.0 && self.hover_throttle <= 1.0) {
            return Err(ConfigError::OutOfDomain {
                name: "hover_throttle",
                requirement: "in (0, 1]",
                value: self.hover_throttle,
            });
        }

        if !(self.kd >= 0.0) {
            return Err(ConfigError::OutOfDomain {
                name: "kd",
                requirement: ">= 0",
                value: self.kd,
            });
        }

        Ok(())
    }

    /// Gravity vector in the inertial frame
    pub fn g_n(&self) -> Vector3<f64> {
        Vector3::new(0.0, 0.0, -self.g_m_s2)
    }
}

// Written as a negated comparison so that NaN is rejected too
fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if !(value > 0.0) {
        Err(ConfigError::OutOfDomain {
            name,
            requirement: "> 0",
            value,
        })
    } else {
        Ok(())
    }
}

/// Physical limits derived from the vehicle parameters
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedLimits {
    /// Motor speed at which the total thrust balances the weight
    pub hover_speed: f64,
    pub max_speed: f64,
    /// Thrust of a single motor at maximum speed
    pub max_thrust_n: f64,
    /// Infinite when there is no aerodynamic drag
    pub terminal_velocity_m_s: f64,
    pub terminal_rotation_rad_s: f64,
}

impl DerivedLimits {
    pub fn from_params(params: &VehicleParams) -> Self {
        let weight_n = params.mass_kg * params.g_m_s2;

        let hover_speed = (weight_n / params.n_motors as f64 / params.kt).sqrt();
        let max_speed = (1.0 / params.hover_throttle).sqrt() * hover_speed;
        let max_thrust_n = params.kt * max_speed.powi(2);

        DerivedLimits {
            hover_speed,
            max_speed,
            max_thrust_n,
            terminal_velocity_m_s: ((max_thrust_n + weight_n) / params.kd).sqrt(),
            terminal_rotation_rad_s: (params.arm_length_m * max_thrust_n / params.km).sqrt(),
        }
    }
}

/// Rigid body state: position and attitude (Euler angles) in the inertial frame, linear and
/// angular velocity in the body frame.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct QuadrotorState(pub SVector<f64, 12>);

impl QuadrotorState {
    pub fn new(
        pos_n_m: &Vector3<f64>,
        euler_rad: &Vector3<f64>,
        vel_b_m_s: &Vector3<f64>,
        angvel_b_rad_s: &Vector3<f64>,
    ) -> Self {
        let mut state = Self::default();
        state.set_pos_n_m(pos_n_m);
        state.set_euler_rad(euler_rad);
        state.set_vel_b_m_s(vel_b_m_s);
        state.set_angvel_b_rad_s(angvel_b_rad_s);
        state
    }

    /// Builds a state from its configuration (position, attitude) and velocity halves
    pub fn from_halves(q: &SVector<f64, 6>, v: &SVector<f64, 6>) -> Self {
        let mut state = Self::default();
        state.0.fixed_rows_mut::<6>(0).copy_from(q);
        state.0.fixed_rows_mut::<6>(6).copy_from(v);
        state
    }

    pub fn pos_n_m(&self) -> Vector3<f64> {
        self.0.fixed_rows::<3>(0).clone_owned()
    }

    /// Roll, pitch, yaw
    pub fn euler_rad(&self) -> Vector3<f64> {
        self.0.fixed_rows::<3>(3).clone_owned()
    }

    pub fn vel_b_m_s(&self) -> Vector3<f64> {
        self.0.fixed_rows::<3>(6).clone_owned()
    }

    pub fn angvel_b_rad_s(&self) -> Vector3<f64> {
        self.0.fixed_rows::<3>(9).clone_owned()
    }

    pub fn configuration(&self) -> SVector<f64, 6> {
        self.0.fixed_rows::<6>(0).clone_owned()
    }

    pub fn velocities(&self) -> SVector<f64, 6> {
        self.0.fixed_rows::<6>(6).clone_owned()
    }

    pub fn set_pos_n_m(&mut self, pos_n: &Vector3<f64>) {
        self.0.fixed_rows_mut::<3>(0).copy_from(pos_n);
    }

    pub fn set_euler_rad(&mut self, euler: &Vector3<f64>) {
        self.0.fixed_rows_mut::<3>(3).copy_from(euler);
    }

    pub fn set_vel_b_m_s(&mut self, vel_b: &Vector3<f64>) {
        self.0.fixed_rows_mut::<3>(6).copy_from(vel_b);
    }

    pub fn set_angvel_b_rad_s(&mut self, angvel_b: &Vector3<f64>) {
        self.0.fixed_rows_mut::<3>(9).copy_from(angvel_b);
    }
}

#[derive(Debug, Clone)]
pub struct QuadrotorActions {
    pub motors: MotorActions,
    pub aero: AerodynamicActions,
    /// Weight, rotated in the body frame
    pub gravity_b_n: Vector3<f64>,

    pub tot_force_b_n: Vector3<f64>,
    pub tot_moment_b_nm: Vector3<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct QuadrotorAccelerations {
    /// Time derivative of the body frame velocity (includes the transport term)
    pub acc_b_m_s2: Vector3<f64>,
    /// Acceleration of the center of mass in the inertial frame
    pub acc_n_m_s2: Vector3<f64>,
    pub ang_acc_b_rad_s2: Vector3<f64>,
}
