use log::{debug, trace};
use nalgebra::{Matrix3, Matrix4, SVector, Vector3, Vector4};

use crate::math::{
    ode::{SecondOrderOdeProblem, SecondOrderOdeSolver, SemiImplicitEuler},
    rotation,
};

use super::{
    aerodynamics::QuadraticDrag,
    error::ConfigError,
    motors::MotorMixer,
    quadrotor_data::{
        DerivedLimits, QuadrotorAccelerations, QuadrotorActions, QuadrotorState, VehicleParams,
    },
};

/// 6DOF rigid body simulation of a '+' configuration quadrotor, in an East-North-Up axis
/// system: thrust is along body +z and gravity along inertial -z.
///
/// The equations of motion are
///
/// ```text
/// v_dot     = F_b / m + R1^T * G_n - w x v
/// w_dot     = J^-1 * (Q_b - w x (J * w))
/// x_dot     = R1 * v
/// zeta_dot  = R2 * w
/// ```
///
/// and are stepped with a semi-implicit Euler scheme: the velocities are updated first and
/// the updated velocities are used to step position and attitude.
///
/// Attitude is represented with Euler angles, so the simulation is not valid close to
/// `pitch = +-90 deg`, where `R2` is singular.
pub struct Quadrotor {
    params: VehicleParams,
    limits: DerivedLimits,
    mixer: MotorMixer,
    drag: QuadraticDrag,
    inv_inertia_kgm2: Vector3<f64>,
    g_n: Vector3<f64>,

    state: QuadrotorState,
    motor_speeds: Vector4<f64>,
    t_s: f64,
    saturation_count: u64,
}

impl Quadrotor {
    pub fn new(params: VehicleParams) -> Result<Self, ConfigError> {
        params.validate()?;
        debug!("Params loaded: {params:?}");

        let limits = DerivedLimits::from_params(&params);
        debug!("Derived limits: {limits:?}");

        Ok(Quadrotor {
            limits,
            mixer: MotorMixer::new(params.kt, params.kq, params.arm_length_m),
            drag: QuadraticDrag::new(params.kd, params.km),
            inv_inertia_kgm2: params.inertia_kgm2.map(|j| 1.0 / j),
            g_n: params.g_n(),
            params,
            state: QuadrotorState::default(),
            motor_speeds: Vector4::zeros(),
            t_s: 0.0,
            saturation_count: 0,
        })
    }

    /// Advances the simulation by one time step with the commanded motor speeds, clipped to
    /// `[0, max_speed]`. Non-finite commands are not checked for and propagate to the state.
    pub fn step(&mut self, motor_speeds: &Vector4<f64>) -> QuadrotorState {
        let max_speed = self.limits.max_speed;

        let saturated = motor_speeds
            .iter()
            .filter(|&&n| n < 0.0 || n > max_speed)
            .count();

        if saturated > 0 {
            self.saturation_count += saturated as u64;
            trace!(
                "t={:.3} s: {saturated} motor command(s) clipped: {:?}",
                self.t_s,
                motor_speeds.as_slice()
            );
        }

        let clipped = self.clip(motor_speeds);

        let dynamics: &dyn SecondOrderOdeProblem<f64, 6> = &QuadrotorDynamics {
            quad: &*self,
            motor_speeds: clipped,
        };
        let (q, v) = SemiImplicitEuler.solve(
            dynamics,
            self.t_s,
            self.params.dt_s,
            self.state.configuration(),
            self.state.velocities(),
        );

        self.motor_speeds = clipped;
        self.state = QuadrotorState::from_halves(&q, &v);
        self.t_s += self.params.dt_s;

        self.state
    }

    /// Evaluates forces, moments and accelerations at the current state, without advancing it
    pub fn evaluate(&self, motor_speeds: &Vector4<f64>) -> QuadrotorStep {
        QuadrotorStep::calc(self, &self.state, &self.clip(motor_speeds))
    }

    pub fn state(&self) -> QuadrotorState {
        self.state
    }

    /// Overrides the rigid body state, bypassing the dynamics
    pub fn set_state(&mut self, state: QuadrotorState) {
        self.state = state;
    }

    /// Brings the simulation back to its initial conditions: everything at zero
    pub fn reset(&mut self) -> QuadrotorState {
        self.state = QuadrotorState::default();
        self.motor_speeds = Vector4::zeros();
        self.t_s = 0.0;
        self.saturation_count = 0;

        self.state
    }

    /// Motor speeds applied during the last step, after clipping
    pub fn motor_speeds(&self) -> Vector4<f64> {
        self.motor_speeds
    }

    /// Number of motor commands clipped since construction or the last reset
    pub fn saturation_count(&self) -> u64 {
        self.saturation_count
    }

    pub fn time_s(&self) -> f64 {
        self.t_s
    }

    pub fn params(&self) -> &VehicleParams {
        &self.params
    }

    pub fn limits(&self) -> &DerivedLimits {
        &self.limits
    }

    pub fn hover_speed(&self) -> f64 {
        self.limits.hover_speed
    }

    pub fn max_speed(&self) -> f64 {
        self.limits.max_speed
    }

    pub fn max_thrust_n(&self) -> f64 {
        self.limits.max_thrust_n
    }

    pub fn terminal_velocity_m_s(&self) -> f64 {
        self.limits.terminal_velocity_m_s
    }

    pub fn terminal_rotation_rad_s(&self) -> f64 {
        self.limits.terminal_rotation_rad_s
    }

    pub fn mixer(&self) -> &MotorMixer {
        &self.mixer
    }

    pub fn mixing_matrix(&self) -> &Matrix4<f64> {
        self.mixer.mixing_matrix()
    }

    pub fn inverse_mixing_matrix(&self) -> &Matrix4<f64> {
        self.mixer.inverse_mixing_matrix()
    }

    fn clip(&self, motor_speeds: &Vector4<f64>) -> Vector4<f64> {
        motor_speeds.map(|n| n.clamp(0.0, self.limits.max_speed))
    }
}

/// Quantities computed while evaluating the equations of motion at a given state
#[derive(Debug, Clone)]
pub struct QuadrotorStep {
    /// Body to inertial rotation
    pub r1: Matrix3<f64>,
    /// Angular velocity to Euler rates
    pub r2: Matrix3<f64>,
    pub actions: QuadrotorActions,
    pub accels: QuadrotorAccelerations,
}

impl QuadrotorStep {
    pub fn calc(quad: &Quadrotor, state: &QuadrotorState, motor_speeds: &Vector4<f64>) -> Self {
        let euler = state.euler_rad();
        let r1 = rotation::body_to_inertial(&euler);
        let r2 = rotation::euler_rates(&euler);

        let vel_b = state.vel_b_m_s();
        let w_b = state.angvel_b_rad_s();

        let motors = quad.mixer.actions(motor_speeds);
        let aero = quad.drag.actions(&vel_b, &w_b);

        // Inverse of R1 is its transpose
        let gravity_b_m_s2 = r1.transpose() * quad.g_n;

        let tot_force_b_n = motors.thrust_b_n + aero.forces_b_n;
        let tot_moment_b_nm = motors.moment_b_nm + aero.moments_b_nm;

        let spec_force_b = tot_force_b_n / quad.params.mass_kg;
        let h_b = quad.params.inertia_kgm2.component_mul(&w_b);

        let accels = QuadrotorAccelerations {
            acc_b_m_s2: spec_force_b + gravity_b_m_s2 - w_b.cross(&vel_b),
            acc_n_m_s2: r1 * spec_force_b + quad.g_n,
            ang_acc_b_rad_s2: quad
                .inv_inertia_kgm2
                .component_mul(&(tot_moment_b_nm - w_b.cross(&h_b))),
        };

        QuadrotorStep {
            r1,
            r2,
            actions: QuadrotorActions {
                motors,
                aero,
                gravity_b_n: gravity_b_m_s2 * quad.params.mass_kg,
                tot_force_b_n,
                tot_moment_b_nm,
            },
            accels,
        }
    }
}

/// Equations of motion for a fixed motor command, split into configuration
/// `[position, attitude]` and velocities `[linear, angular]`
struct QuadrotorDynamics<'a> {
    quad: &'a Quadrotor,
    motor_speeds: Vector4<f64>,
}

impl SecondOrderOdeProblem<f64, 6> for QuadrotorDynamics<'_> {
    fn v_dot(&self, _t: f64, q: &SVector<f64, 6>, v: &SVector<f64, 6>) -> SVector<f64, 6> {
        let step = QuadrotorStep::calc(
            self.quad,
            &QuadrotorState::from_halves(q, v),
            &self.motor_speeds,
        );

        stack(&step.accels.acc_b_m_s2, &step.accels.ang_acc_b_rad_s2)
    }

    fn q_dot(&self, _t: f64, q: &SVector<f64, 6>, v: &SVector<f64, 6>) -> SVector<f64, 6> {
        let euler: Vector3<f64> = q.fixed_rows::<3>(3).clone_owned();

        let pos_dot = rotation::body_to_inertial(&euler) * v.fixed_rows::<3>(0);
        let euler_dot = rotation::euler_rates(&euler) * v.fixed_rows::<3>(3);

        stack(&pos_dot, &euler_dot)
    }
}

fn stack(top: &Vector3<f64>, bottom: &Vector3<f64>) -> SVector<f64, 6> {
    let mut out = SVector::<f64, 6>::zeros();
    out.fixed_rows_mut::<3>(0).copy_from(top);
    out.fixed_rows_mut::<3>(3).copy_from(bottom);
    out
}
