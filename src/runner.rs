use std::{fs, path::Path, time::Instant};

use anyhow::{Result, anyhow};
use log::{debug, info};
use nalgebra::Vector4;
use serde::Serialize;

use crate::{
    parameters::{self, ParameterMap},
    quadrotor::{Quadrotor, QuadrotorState, VehicleParams},
};

/// Upper bound on the number of integration steps of a single run
pub const MAX_STEPS: usize = 100_000_000;

/// Open loop command schedule: start from hover plus `trim_offset`, then add
/// `ramp_per_ctrl_step` to the command after every control step.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub duration_s: f64,
    pub ctrl_dt_s: f64,
    pub trim_offset: Vector4<f64>,
    pub ramp_per_ctrl_step: Vector4<f64>,
}

impl Scenario {
    pub fn from_params(params: &ParameterMap) -> Result<Self> {
        let scenario = Scenario {
            duration_s: params.get_param("duration")?.value_float()?,
            ctrl_dt_s: params.get_param("ctrl_dt")?.value_float()?,
            trim_offset: params.get_param("trim_offset")?.value_vector::<4>()?,
            ramp_per_ctrl_step: params.get_param("ramp_per_ctrl_step")?.value_vector::<4>()?,
        };

        if !(scenario.duration_s >= 0.0 && scenario.duration_s.is_finite()) {
            return Err(anyhow!(
                "Scenario duration must be finite and >= 0, got {}",
                scenario.duration_s
            ));
        }

        if !(scenario.ctrl_dt_s > 0.0 && scenario.ctrl_dt_s.is_finite()) {
            return Err(anyhow!(
                "Control period must be finite and > 0, got {}",
                scenario.ctrl_dt_s
            ));
        }

        Ok(scenario)
    }
}

/// One row of the recorded trajectory
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrajectorySample {
    pub t_s: f64,
    pub x_m: f64,
    pub y_m: f64,
    pub z_m: f64,
    pub roll_rad: f64,
    pub pitch_rad: f64,
    pub yaw_rad: f64,
    pub u_m_s: f64,
    pub v_m_s: f64,
    pub w_m_s: f64,
    pub p_rad_s: f64,
    pub q_rad_s: f64,
    pub r_rad_s: f64,
    pub n1: f64,
    pub n2: f64,
    pub n3: f64,
    pub n4: f64,
}

impl TrajectorySample {
    pub fn new(t_s: f64, state: &QuadrotorState, motor_speeds: &Vector4<f64>) -> Self {
        let pos = state.pos_n_m();
        let euler = state.euler_rad();
        let vel = state.vel_b_m_s();
        let w = state.angvel_b_rad_s();

        TrajectorySample {
            t_s,
            x_m: pos[0],
            y_m: pos[1],
            z_m: pos[2],
            roll_rad: euler[0],
            pitch_rad: euler[1],
            yaw_rad: euler[2],
            u_m_s: vel[0],
            v_m_s: vel[1],
            w_m_s: vel[2],
            p_rad_s: w[0],
            q_rad_s: w[1],
            r_rad_s: w[2],
            n1: motor_speeds[0],
            n2: motor_speeds[1],
            n3: motor_speeds[2],
            n4: motor_speeds[3],
        }
    }
}

pub struct ScenarioRunner {
    quad: Quadrotor,
    scenario: Scenario,
}

impl ScenarioRunner {
    pub fn new(params: &Path) -> Result<Self> {
        info!("Reading parameters from '{}'", params.display());

        let params_toml = fs::read_to_string(params)?;
        let params = parameters::parse_string(&params_toml)?;

        Self::from_params(&params)
    }

    /// Expects a `quadrotor` map with the vehicle parameters and a `sim` map with the scenario
    pub fn from_params(params: &ParameterMap) -> Result<Self> {
        debug!("Parameters:\n{params}");

        let vehicle = VehicleParams::from_params(params.get_map("quadrotor")?)?;
        let scenario = Scenario::from_params(params.get_map("sim")?)?;

        Ok(ScenarioRunner {
            quad: Quadrotor::new(vehicle)?,
            scenario,
        })
    }

    pub fn quadrotor(&self) -> &Quadrotor {
        &self.quad
    }

    /// Runs the scenario from the initial conditions, sampling the state at every control
    /// step. The first sample is the initial state.
    pub fn run(&mut self) -> Result<Vec<TrajectorySample>> {
        let dt = self.quad.params().dt_s;
        let ctrl_dt = self.scenario.ctrl_dt_s;

        if ctrl_dt < dt {
            return Err(anyhow!(
                "Control period ({ctrl_dt} s) is shorter than the simulation time step ({dt} s)"
            ));
        }

        let steps_per_ctrl = (ctrl_dt / dt).round();
        if (steps_per_ctrl * dt - ctrl_dt).abs() > 1e-9 * ctrl_dt {
            return Err(anyhow!(
                "Control period ({ctrl_dt} s) is not a multiple of the simulation time step ({dt} s)"
            ));
        }

        let n_ctrl = (self.scenario.duration_s / ctrl_dt).round();
        if n_ctrl * steps_per_ctrl > MAX_STEPS as f64 {
            return Err(anyhow!(
                "Scenario needs {} integration steps, at most {MAX_STEPS} are allowed",
                n_ctrl * steps_per_ctrl
            ));
        }

        // Both bounded by MAX_STEPS
        let steps_per_ctrl = steps_per_ctrl as usize;
        let n_ctrl = n_ctrl as usize;

        info!(
            "Simulation dt is {:.2} ms, {steps_per_ctrl} steps per control period",
            dt * 1000.0
        );
        info!(
            "Hover speed: {:.2}, max speed: {:.2}",
            self.quad.hover_speed(),
            self.quad.max_speed()
        );

        self.quad.reset();

        let mut command = Vector4::repeat(self.quad.hover_speed()) + self.scenario.trim_offset;
        let mut samples = Vec::with_capacity(n_ctrl + 1);
        samples.push(TrajectorySample::new(
            self.quad.time_s(),
            &self.quad.state(),
            &self.quad.motor_speeds(),
        ));

        info!("Running simulation!");
        let start_time = Instant::now();

        for _ in 0..n_ctrl {
            for _ in 0..steps_per_ctrl {
                self.quad.step(&command);
            }

            samples.push(TrajectorySample::new(
                self.quad.time_s(),
                &self.quad.state(),
                &self.quad.motor_speeds(),
            ));

            command += self.scenario.ramp_per_ctrl_step;
        }

        let duration = start_time.elapsed().as_secs_f64();
        let pos = self.quad.state().pos_n_m();

        info!(
            "Simulation ended at t={:.3} s (took {duration:.6} s). Position: [{:.3}, {:.3}, {:.3}] m, {} clipped motor commands",
            self.quad.time_s(),
            pos[0],
            pos[1],
            pos[2],
            self.quad.saturation_count()
        );

        Ok(samples)
    }
}

pub fn write_csv(path: &Path, samples: &[TrajectorySample]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;

    for sample in samples {
        writer.serialize(sample)?;
    }
    writer.flush()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const VEHICLE: &str = "
    [quadrotor]
    mass = { val = 1.2, type = \"float\" }
    prop_radius = { val = 0.1, type = \"float\" }
    n_motors = { val = 4, type = \"int\" }
    hover_throttle = { val = 0.5, type = \"float\" }
    arm_length = { val = 0.2, type = \"float\" }
    inertia = { val = [0.0123, 0.0123, 0.0224], type = \"float[]\" }
    kt = { val = 3.13e-5, type = \"float\" }
    kq = { val = 7.5e-7, type = \"float\" }
    kd = { val = 0.1, type = \"float\" }
    km = { val = 0.1, type = \"float\" }
    g = { val = 9.81, type = \"float\" }
    dt = { val = 0.01, type = \"float\" }
    ";

    fn runner(sim: &str) -> Result<ScenarioRunner> {
        let params = parameters::parse_string(&format!("{VEHICLE}\n[sim]\n{sim}"))?;
        ScenarioRunner::from_params(&params)
    }

    #[test]
    fn test_hover_scenario() {
        let mut runner = runner(
            "
            duration = { val = 1.0, type = \"float\" }
            ctrl_dt = { val = 0.05, type = \"float\" }
            trim_offset = { val = [0.0, 0.0, 0.0, 0.0], type = \"float[]\" }
            ramp_per_ctrl_step = { val = [0.0, 0.0, 0.0, 0.0], type = \"float[]\" }
            ",
        )
        .unwrap();

        let samples = runner.run().unwrap();

        assert_eq!(samples.len(), 21);
        assert_eq!(samples[0].t_s, 0.0);
        assert_eq!(samples[0].n1, 0.0);
        assert_relative_eq!(samples[20].t_s, 1.0, epsilon = 1e-9);

        let hover = runner.quadrotor().hover_speed();
        for sample in &samples[1..] {
            assert!(sample.z_m.abs() < 1e-3);
            assert_eq!(sample.n1, hover);
        }
    }

    #[test]
    fn test_ramp_scenario() {
        let mut runner = runner(
            "
            duration = { val = 0.5, type = \"float\" }
            ctrl_dt = { val = 0.05, type = \"float\" }
            trim_offset = { val = [50.0, 50.0, 50.0, 50.0], type = \"float[]\" }
            ramp_per_ctrl_step = { val = [0.0, 0.0, 0.0, 0.25], type = \"float[]\" }
            ",
        )
        .unwrap();

        let samples = runner.run().unwrap();
        let last = samples.last().unwrap();

        assert_eq!(samples.len(), 11);
        // Extra thrust climbs, motor 4 faster than motor 2 rolls negative
        assert!(last.z_m > 0.0);
        assert!(last.p_rad_s < 0.0);
        assert_relative_eq!(last.n4 - last.n2, 9.0 * 0.25, epsilon = 1e-9);

        // Running again starts over from the initial conditions
        let again = runner.run().unwrap();
        assert_eq!(again, samples);
    }

    #[test]
    fn test_control_period_too_short() {
        let mut runner = runner(
            "
            duration = { val = 1.0, type = \"float\" }
            ctrl_dt = { val = 0.001, type = \"float\" }
            trim_offset = { val = [0.0, 0.0, 0.0, 0.0], type = \"float[]\" }
            ramp_per_ctrl_step = { val = [0.0, 0.0, 0.0, 0.0], type = \"float[]\" }
            ",
        )
        .unwrap();

        assert!(runner.run().is_err());
    }

    #[test]
    fn test_control_period_not_multiple_of_dt() {
        let mut runner = runner(
            "
            duration = { val = 1.0, type = \"float\" }
            ctrl_dt = { val = 0.015, type = \"float\" }
            trim_offset = { val = [0.0, 0.0, 0.0, 0.0], type = \"float[]\" }
            ramp_per_ctrl_step = { val = [0.0, 0.0, 0.0, 0.0], type = \"float[]\" }
            ",
        )
        .unwrap();

        assert!(runner.run().is_err());
    }

    #[test]
    fn test_huge_duration() {
        let mut huge_duration = runner(
            "
            duration = { val = 1e300, type = \"float\" }
            ctrl_dt = { val = 0.05, type = \"float\" }
            trim_offset = { val = [0.0, 0.0, 0.0, 0.0], type = \"float[]\" }
            ramp_per_ctrl_step = { val = [0.0, 0.0, 0.0, 0.0], type = \"float[]\" }
            ",
        )
        .unwrap();

        assert!(huge_duration.run().is_err());
        assert_eq!(huge_duration.quadrotor().time_s(), 0.0);

        // Huge control period with a duration in the same range
        let mut huge_period = runner(
            "
            duration = { val = 1e300, type = \"float\" }
            ctrl_dt = { val = 1e300, type = \"float\" }
            trim_offset = { val = [0.0, 0.0, 0.0, 0.0], type = \"float[]\" }
            ramp_per_ctrl_step = { val = [0.0, 0.0, 0.0, 0.0], type = \"float[]\" }
            ",
        )
        .unwrap();

        assert!(huge_period.run().is_err());
    }

    #[test]
    fn test_non_finite_duration() {
        let res = runner(
            "
            duration = { val = inf, type = \"float\" }
            ctrl_dt = { val = 0.05, type = \"float\" }
            trim_offset = { val = [0.0, 0.0, 0.0, 0.0], type = \"float[]\" }
            ramp_per_ctrl_step = { val = [0.0, 0.0, 0.0, 0.0], type = \"float[]\" }
            ",
        );

        assert!(res.is_err());
    }

    #[test]
    fn test_missing_scenario_param() {
        let res = runner("duration = { val = 1.0, type = \"float\" }");

        assert!(res.is_err());
    }

    #[test]
    fn test_invalid_vehicle() {
        let sim = "
            duration = { val = 1.0, type = \"float\" }
            ctrl_dt = { val = 0.05, type = \"float\" }
            trim_offset = { val = [0.0, 0.0, 0.0, 0.0], type = \"float[]\" }
            ramp_per_ctrl_step = { val = [0.0, 0.0, 0.0, 0.0], type = \"float[]\" }
            ";
        let params = parameters::parse_string(
            &format!("{VEHICLE}\n[sim]\n{sim}")
                .replace("mass = { val = 1.2", "mass = { val = -1.2"),
        )
        .unwrap();

        assert!(ScenarioRunner::from_params(&params).is_err());
    }

    #[test]
    fn test_write_csv() {
        let state = QuadrotorState::default();
        let samples = vec![
            TrajectorySample::new(0.0, &state, &Vector4::zeros()),
            TrajectorySample::new(0.01, &state, &Vector4::repeat(300.0)),
        ];

        let path = std::env::temp_dir().join(format!(
            "quadrotor_test_write_csv_{}.csv",
            std::process::id()
        ));
        write_csv(&path, &samples).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();

        assert_eq!(
            lines.next().unwrap(),
            "t_s,x_m,y_m,z_m,roll_rad,pitch_rad,yaw_rad,u_m_s,v_m_s,w_m_s,p_rad_s,q_rad_s,r_rad_s,n1,n2,n3,n4"
        );
        assert_eq!(lines.count(), 2);

        let _ = fs::remove_file(&path);
    }
}
