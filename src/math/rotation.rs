//! Euler angle kinematics for an East-North-Up axis system.
//!
//! Attitude is stored as `[roll, pitch, yaw]` (phi, theta, psi), in radians.

use nalgebra::{Matrix3, Vector3, matrix};

pub fn rot_x(phi: f64) -> Matrix3<f64> {
    let (s, c) = phi.sin_cos();
    matrix![1.0, 0.0, 0.0;
            0.0, c, -s;
            0.0, s, c]
}

pub fn rot_y(theta: f64) -> Matrix3<f64> {
    let (s, c) = theta.sin_cos();
    matrix![c, 0.0, s;
            0.0, 1.0, 0.0;
            -s, 0.0, c]
}

pub fn rot_z(psi: f64) -> Matrix3<f64> {
    let (s, c) = psi.sin_cos();
    matrix![c, -s, 0.0;
            s, c, 0.0;
            0.0, 0.0, 1.0]
}

/// Rotation from the body frame to the inertial frame, `Rz(psi) * Ry(theta) * Rx(phi)`.
///
/// The matrix is orthonormal: the inertial to body rotation is its transpose.
pub fn body_to_inertial(euler: &Vector3<f64>) -> Matrix3<f64> {
    rot_z(euler[2]) * (rot_y(euler[1]) * rot_x(euler[0]))
}

/// Maps the angular velocity to Euler angle rates `[phi_dot, theta_dot, psi_dot]`.
///
/// Only pitch and yaw enter the transform. It is not orthonormal and it is singular at
/// `theta = +-90 deg` (gimbal lock): rates blow up as `cos(theta)` approaches zero.
pub fn euler_rates(euler: &Vector3<f64>) -> Matrix3<f64> {
    let (s_th, c_th) = euler[1].sin_cos();
    let (s_psi, c_psi) = euler[2].sin_cos();
    let t_th = s_th / c_th;

    matrix![c_psi / c_th, s_psi / c_th, 0.0;
            -s_psi, c_psi, 0.0;
            c_psi * t_th, s_psi * t_th, 1.0]
}

/// Inverse of [`euler_rates`], written out in closed form: maps Euler angle rates back to
/// the angular velocity. Well defined at every attitude.
pub fn euler_rates_inverse(euler: &Vector3<f64>) -> Matrix3<f64> {
    let (s_th, c_th) = euler[1].sin_cos();
    let (s_psi, c_psi) = euler[2].sin_cos();

    matrix![c_psi * c_th, -s_psi, 0.0;
            s_psi * c_th, c_psi, 0.0;
            -s_th, 0.0, 1.0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::{Rotation3, vector};

    fn attitudes() -> Vec<Vector3<f64>> {
        let angles = [-3.0, -1.2, -0.3, 0.0, 0.4, 1.1, 2.9];
        let mut out = Vec::new();
        for phi in angles {
            for theta in angles {
                for psi in angles {
                    out.push(vector![phi, theta, psi]);
                }
            }
        }
        out
    }

    #[test]
    fn test_body_to_inertial_orthonormal() {
        for euler in attitudes() {
            let r1 = body_to_inertial(&euler);

            assert_relative_eq!(r1 * r1.transpose(), Matrix3::identity(), epsilon = 1e-9);
            assert_relative_eq!(r1.determinant(), 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_body_to_inertial_matches_nalgebra() {
        for euler in attitudes() {
            let expected = Rotation3::from_euler_angles(euler[0], euler[1], euler[2]);

            assert_relative_eq!(
                body_to_inertial(&euler),
                *expected.matrix(),
                epsilon = 1e-12
            );
        }
    }

    #[test]
    fn test_body_to_inertial_yaw() {
        let r1 = body_to_inertial(&vector![0.0, 0.0, std::f64::consts::FRAC_PI_2]);

        // Body x points North after a 90 deg yaw
        assert_relative_eq!(r1 * Vector3::x(), Vector3::y(), epsilon = 1e-12);
    }

    #[test]
    fn test_euler_rates_level() {
        assert_relative_eq!(
            euler_rates(&Vector3::zeros()),
            Matrix3::identity(),
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_euler_rates_ignores_roll() {
        let a = euler_rates(&vector![0.0, 0.3, -0.7]);
        let b = euler_rates(&vector![1.4, 0.3, -0.7]);

        assert_eq!(a, b);
    }

    #[test]
    fn test_euler_rates_inverse() {
        for euler in attitudes() {
            let r2 = euler_rates(&euler);
            let r2_inv = euler_rates_inverse(&euler);

            assert_relative_eq!(r2 * r2_inv, Matrix3::identity(), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_euler_rates_not_orthonormal() {
        let euler = vector![0.0, 1.1, 0.4];
        let r2 = euler_rates(&euler);

        assert!((r2 * r2.transpose() - Matrix3::identity()).norm() > 0.1);
    }

    #[test]
    fn test_euler_rates_singular_near_gimbal_lock() {
        let euler = vector![0.0, std::f64::consts::FRAC_PI_2 - 1e-9, 0.0];

        assert!(euler_rates(&euler).norm() > 1e6);
        assert_relative_eq!(euler_rates_inverse(&euler).determinant(), 0.0, epsilon = 1e-8);
    }
}
