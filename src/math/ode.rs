use nalgebra::{RealField, SVector};

/// Second order system split into a configuration `q` and its velocity-like companion `v`.
pub trait SecondOrderOdeProblem<T, const S: usize>
where
    T: RealField,
{
    /// Time derivative of `v`
    fn v_dot(&self, t: T, q: &SVector<T, S>, v: &SVector<T, S>) -> SVector<T, S>;

    /// Time derivative of `q`, evaluated with the velocity passed in
    fn q_dot(&self, t: T, q: &SVector<T, S>, v: &SVector<T, S>) -> SVector<T, S>;
}

pub trait SecondOrderOdeSolver<T, const S: usize>
where
    T: RealField,
{
    fn solve(
        &self,
        problem: &dyn SecondOrderOdeProblem<T, S>,
        t0: T,
        dt: T,
        q0: SVector<T, S>,
        v0: SVector<T, S>,
    ) -> (SVector<T, S>, SVector<T, S>);
}

/// Symplectic Euler: velocities are stepped first, then the configuration is stepped
/// using the updated velocities.
pub struct SemiImplicitEuler;

impl<T: RealField + Copy, const S: usize> SecondOrderOdeSolver<T, S> for SemiImplicitEuler {
    fn solve(
        &self,
        problem: &dyn SecondOrderOdeProblem<T, S>,
        t0: T,
        dt: T,
        q0: SVector<T, S>,
        v0: SVector<T, S>,
    ) -> (SVector<T, S>, SVector<T, S>) {
        let v1 = v0 + problem.v_dot(t0, &q0, &v0) * dt;
        let q1 = q0 + problem.q_dot(t0, &q0, &v1) * dt;

        (q1, v1)
    }
}
