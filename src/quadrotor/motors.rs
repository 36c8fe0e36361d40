use nalgebra::{Matrix4, Vector3, Vector4, matrix};

/// Body frame force and moment produced by the four rotors
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MotorActions {
    pub thrust_b_n: Vector3<f64>,
    pub moment_b_nm: Vector3<f64>,
}

/// '+' configuration mixer.
///
/// Motors are numbered 1 to 4 as front, right, back, left. 1 and 3 spin one way, 2 and 4 the
/// other. With `n_i` the squared speed of motor `i`:
///
/// ```text
/// thrust = kt * (n1 + n2 + n3 + n4)
/// roll   = l * kt * (n2 - n4)
/// pitch  = l * kt * (n3 - n1)
/// yaw    = kq * (-n1 + n2 - n3 + n4)
/// ```
#[derive(Debug, Clone)]
pub struct MotorMixer {
    kt: f64,
    kq: f64,
    arm_length_m: f64,
    mixing: Matrix4<f64>,
    inverse: Matrix4<f64>,
}

impl MotorMixer {
    pub fn new(kt: f64, kq: f64, arm_length_m: f64) -> Self {
        let lkt = arm_length_m * kt;

        let mixing = matrix![kt, kt, kt, kt;
                             0.0, lkt, 0.0, -lkt;
                             -lkt, 0.0, lkt, 0.0;
                             -kq, kq, -kq, kq];

        let a = 1.0 / (4.0 * kt);
        let b = 1.0 / (2.0 * lkt);
        let c = 1.0 / (4.0 * kq);

        let inverse = matrix![a, 0.0, -b, -c;
                              a, b, 0.0, c;
                              a, 0.0, b, -c;
                              a, -b, 0.0, c];

        MotorMixer {
            kt,
            kq,
            arm_length_m,
            mixing,
            inverse,
        }
    }

    /// Maps squared motor speeds to `[thrust, roll, pitch, yaw]`
    pub fn mixing_matrix(&self) -> &Matrix4<f64> {
        &self.mixing
    }

    /// Maps `[thrust, roll, pitch, yaw]` to squared motor speeds
    pub fn inverse_mixing_matrix(&self) -> &Matrix4<f64> {
        &self.inverse
    }

    pub fn thrust_b_n(&self, motor_speeds: &Vector4<f64>) -> Vector3<f64> {
        let n = motor_speeds.component_mul(motor_speeds);

        Vector3::new(0.0, 0.0, self.kt * n.sum())
    }

    pub fn moment_b_nm(&self, motor_speeds: &Vector4<f64>) -> Vector3<f64> {
        let n = motor_speeds.component_mul(motor_speeds);
        let lkt = self.arm_length_m * self.kt;

        Vector3::new(
            lkt * (n[1] - n[3]),
            lkt * (n[2] - n[0]),
            self.kq * (-n[0] + n[1] - n[2] + n[3]),
        )
    }

    pub fn actions(&self, motor_speeds: &Vector4<f64>) -> MotorActions {
        MotorActions {
            thrust_b_n: self.thrust_b_n(motor_speeds),
            moment_b_nm: self.moment_b_nm(motor_speeds),
        }
    }

    /// Squared motor speeds producing the `[thrust, roll, pitch, yaw]` command. Components are
    /// negative when the command cannot be produced.
    pub fn speeds_sq_from_command(&self, command: &Vector4<f64>) -> Vector4<f64> {
        self.inverse * command
    }

    /// Motor speeds producing the `[thrust, roll, pitch, yaw]` command, as close as possible:
    /// negative squared speeds are floored at zero.
    pub fn speeds_from_command(&self, command: &Vector4<f64>) -> Vector4<f64> {
        self.speeds_sq_from_command(command)
            .map(|n| n.max(0.0).sqrt())
    }
}
