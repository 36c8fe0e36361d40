use nalgebra::Vector3;

/// Body frame aerodynamic force and moment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AerodynamicActions {
    pub forces_b_n: Vector3<f64>,
    pub moments_b_nm: Vector3<f64>,
}

/// Quadratic drag model: no lift, no stall, the force opposes the linear velocity and the
/// moment opposes the angular velocity.
#[derive(Debug, Clone)]
pub struct QuadraticDrag {
    kd: f64,
    km: f64,
}

impl QuadraticDrag {
    pub fn new(kd: f64, km: f64) -> Self {
        QuadraticDrag { kd, km }
    }

    pub fn force_b_n(&self, vel_b_m_s: &Vector3<f64>) -> Vector3<f64> {
        quadratic_drag(self.kd, vel_b_m_s)
    }

    pub fn moment_b_nm(&self, angvel_b_rad_s: &Vector3<f64>) -> Vector3<f64> {
        quadratic_drag(self.km, angvel_b_rad_s)
    }

    pub fn actions(
        &self,
        vel_b_m_s: &Vector3<f64>,
        angvel_b_rad_s: &Vector3<f64>,
    ) -> AerodynamicActions {
        AerodynamicActions {
            forces_b_n: self.force_b_n(vel_b_m_s),
            moments_b_nm: self.moment_b_nm(angvel_b_rad_s),
        }
    }
}

fn quadratic_drag(coeff: f64, v: &Vector3<f64>) -> Vector3<f64> {
    let norm = v.norm();

    // No direction to oppose
    if norm == 0.0 {
        return Vector3::zeros();
    }

    -(coeff * norm.powi(2)) * (v / norm)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::vector;

    #[test]
    fn test_zero_velocity() {
        let drag = QuadraticDrag::new(0.1, 0.2);
        let actions = drag.actions(&Vector3::zeros(), &Vector3::zeros());

        assert_eq!(actions.forces_b_n, Vector3::zeros());
        assert_eq!(actions.moments_b_nm, Vector3::zeros());
        assert!(actions.forces_b_n.iter().all(|f| f.is_finite()));
    }

    #[test]
    fn test_force_opposes_velocity() {
        let drag = QuadraticDrag::new(0.1, 0.2);
        let v = vector![3.0, 0.0, -4.0];

        let f = drag.force_b_n(&v);

        assert_relative_eq!(f.norm(), 0.1 * 25.0, epsilon = 1e-12);
        assert_relative_eq!(f.normalize(), -v.normalize(), epsilon = 1e-12);
    }

    #[test]
    fn test_moment_opposes_rotation() {
        let drag = QuadraticDrag::new(0.1, 0.2);

        assert_relative_eq!(
            drag.moment_b_nm(&vector![0.0, 0.0, 2.0]),
            vector![0.0, 0.0, -0.8],
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_no_drag() {
        let drag = QuadraticDrag::new(0.0, 0.2);

        assert_eq!(drag.force_b_n(&vector![10.0, 1.0, 2.0]).norm(), 0.0);
    }
}
