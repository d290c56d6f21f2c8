use crate::traits::{DynamicalSystem, Scalar, Steppable};

/// `out = state + h * slope`, the input of the next Runge-Kutta stage.
fn offset<T: Scalar>(out: &mut [T], state: &[T], slope: &[T], h: T) {
    for ((o, &y), &k) in out.iter_mut().zip(state).zip(slope) {
        *o = y + h * k;
    }
}

/// Classic fourth-order Runge-Kutta with a fixed step.
pub struct RK4<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> RK4<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::zero();
        Self {
            k1: vec![z; dim],
            k2: vec![z; dim],
            k3: vec![z; dim],
            k4: vec![z; dim],
            tmp: vec![z; dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for RK4<T> {
    fn step(&mut self, system: &impl DynamicalSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        let t0 = *t;
        let mid = dt * T::lit(0.5);

        system.apply(t0, state, &mut self.k1);
        offset(&mut self.tmp, state, &self.k1, mid);
        system.apply(t0 + mid, &self.tmp, &mut self.k2);
        offset(&mut self.tmp, state, &self.k2, mid);
        system.apply(t0 + mid, &self.tmp, &mut self.k3);
        offset(&mut self.tmp, state, &self.k3, dt);
        system.apply(t0 + dt, &self.tmp, &mut self.k4);

        let weight = dt / T::lit(6.0);
        let two = T::lit(2.0);
        for (idx, y) in state.iter_mut().enumerate() {
            let slope = self.k1[idx] + two * (self.k2[idx] + self.k3[idx]) + self.k4[idx];
            *y = *y + weight * slope;
        }

        *t = t0 + dt;
    }
}

/// Bogacki-Shampine 3(2) embedded pair.
///
/// Steps are split into `attempt` (compute a candidate and its error norm) and
/// `commit` (accept the candidate). The last stage of an accepted step is the
/// first stage of the next one, so `prime` is only needed once per trajectory.
pub struct BogackiShampine<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    tmp: Vec<T>,
    candidate: Vec<T>,
}

impl<T: Scalar> BogackiShampine<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::zero();
        Self {
            k1: vec![z; dim],
            k2: vec![z; dim],
            k3: vec![z; dim],
            k4: vec![z; dim],
            tmp: vec![z; dim],
            candidate: vec![z; dim],
        }
    }

    /// Evaluates the first stage at `(t, state)`.
    pub fn prime(&mut self, system: &impl DynamicalSystem<T>, t: T, state: &[T]) {
        system.apply(t, state, &mut self.k1);
    }

    /// Computes the third-order candidate for a step of size `dt` and returns
    /// the RMS error norm scaled by `atol + rtol * |y|`. Values <= 1 are acceptable.
    pub fn attempt(
        &mut self,
        system: &impl DynamicalSystem<T>,
        t: T,
        state: &[T],
        dt: T,
        rtol: T,
        atol: T,
    ) -> T {
        let a21 = T::lit(0.5);
        let a32 = T::lit(0.75);
        let b1 = T::lit(2.0 / 9.0);
        let b2 = T::lit(1.0 / 3.0);
        let b3 = T::lit(4.0 / 9.0);
        // Difference between the third- and second-order weights.
        let e1 = T::lit(-5.0 / 72.0);
        let e2 = T::lit(1.0 / 12.0);
        let e3 = T::lit(1.0 / 9.0);
        let e4 = T::lit(-1.0 / 8.0);

        let n = state.len();

        offset(&mut self.tmp, state, &self.k1, dt * a21);
        system.apply(t + dt * a21, &self.tmp, &mut self.k2);

        offset(&mut self.tmp, state, &self.k2, dt * a32);
        system.apply(t + dt * a32, &self.tmp, &mut self.k3);

        for i in 0..n {
            self.candidate[i] =
                state[i] + dt * (b1 * self.k1[i] + b2 * self.k2[i] + b3 * self.k3[i]);
        }
        system.apply(t + dt, &self.candidate, &mut self.k4);

        let mut err_sq = T::zero();
        for i in 0..n {
            let err = dt * (e1 * self.k1[i] + e2 * self.k2[i] + e3 * self.k3[i] + e4 * self.k4[i]);
            let scale = atol + rtol * state[i].abs().max(self.candidate[i].abs());
            let ratio = err / scale;
            err_sq = err_sq + ratio * ratio;
        }
        if n == 0 {
            return T::zero();
        }
        (err_sq / T::lit(n as f64)).sqrt()
    }

    /// Writes the last candidate into `state` and reuses its derivative as the
    /// next first stage.
    pub fn commit(&mut self, state: &mut [T]) {
        state.copy_from_slice(&self.candidate);
        std::mem::swap(&mut self.k1, &mut self.k4);
    }
}
