//! Local stability of steady states on the simplex.
//!
//! Conservation makes the full 3×3 Jacobian singular, so stability is judged on
//! the reduced `(V, I)` system obtained by substituting `S = 1 - V - I`.

use crate::classification::Classification;
use crate::model::{rate_equations, Compartments, Parameters};
use nalgebra::Matrix2;
use num_complex::Complex;
use serde::{Deserialize, Serialize};

/// Eigenvalues with real part inside `±STABILITY_TOLERANCE` count as zero.
pub const STABILITY_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stability {
    Stable,
    Unstable,
    Marginal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexNumber {
    pub re: f64,
    pub im: f64,
}

impl From<Complex<f64>> for ComplexNumber {
    fn from(value: Complex<f64>) -> Self {
        Self {
            re: value.re,
            im: value.im,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityReport {
    pub state: Compartments,
    /// Norm of the rate equations at `state`; zero at a true equilibrium.
    pub residual_norm: f64,
    /// Reduced Jacobian, row-major `[dV/dV, dV/dI, dI/dV, dI/dI]`.
    pub jacobian: Vec<f64>,
    pub eigenvalues: Vec<ComplexNumber>,
    pub stability: Stability,
}

/// Jacobian of `(dV/dt, dI/dt)` with respect to `(V, I)` after eliminating `S`.
pub fn simplex_jacobian(params: &Parameters, state: &Compartments) -> Matrix2<f64> {
    let Parameters {
        beta,
        gamma,
        theta,
        sigma,
        phi,
    } = *params;
    let Compartments { v, i, .. } = *state;

    Matrix2::new(
        -(phi + sigma * beta * i + theta),
        -(phi + sigma * beta * v),
        -(1.0 - sigma) * beta * i,
        beta * (1.0 - v - 2.0 * i) + sigma * beta * v - gamma,
    )
}

fn classify_spectrum(eigenvalues: &[Complex<f64>]) -> Stability {
    let max_re = eigenvalues
        .iter()
        .map(|lambda| lambda.re)
        .fold(f64::NEG_INFINITY, f64::max);
    if max_re > STABILITY_TOLERANCE {
        Stability::Unstable
    } else if max_re < -STABILITY_TOLERANCE {
        Stability::Stable
    } else {
        Stability::Marginal
    }
}

/// Linearizes the model at `state`.
pub fn assess_point(params: &Parameters, state: &Compartments) -> StabilityReport {
    let jacobian = simplex_jacobian(params, state);
    let eigenvalues: Vec<Complex<f64>> = jacobian.complex_eigenvalues().iter().copied().collect();
    let residual = rate_equations(params, state);

    StabilityReport {
        state: *state,
        residual_norm: residual.norm(),
        jacobian: vec![
            jacobian[(0, 0)],
            jacobian[(0, 1)],
            jacobian[(1, 0)],
            jacobian[(1, 1)],
        ],
        stability: classify_spectrum(&eigenvalues),
        eigenvalues: eigenvalues.into_iter().map(ComplexNumber::from).collect(),
    }
}

/// One report per steady state of `classification`, in the same order.
pub fn assess_equilibria(
    params: &Parameters,
    classification: &Classification,
) -> Vec<StabilityReport> {
    classification
        .equilibria()
        .iter()
        .map(|state| assess_point(params, state))
        .collect()
}
