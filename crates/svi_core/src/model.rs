//! Susceptible–Vaccinated–Infected rate equations.
//!
//! The population is closed: compartments are fractions of the total, and the
//! three derivatives always sum to zero, so trajectories started on the simplex
//! `S + V + I = 1` stay on it.

use crate::traits::{DynamicalSystem, Scalar};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Epidemiological rates of the SVI model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Parameters {
    /// Transmission rate.
    pub beta: f64,
    /// Recovery rate.
    pub gamma: f64,
    /// Vaccine waning rate.
    pub theta: f64,
    /// Relative susceptibility of vaccinated individuals, in `[0, 1]`.
    pub sigma: f64,
    /// Vaccination rate.
    pub phi: f64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    #[error("parameter `{name}` must be finite (got {value})")]
    NotFinite { name: &'static str, value: f64 },
    #[error("parameter `{name}` must be non-negative (got {value})")]
    Negative { name: &'static str, value: f64 },
    #[error("parameter `sigma` must not exceed 1 (got {0})")]
    SigmaAboveOne(f64),
}

impl Parameters {
    pub fn new(beta: f64, gamma: f64, theta: f64, sigma: f64, phi: f64) -> Self {
        Self {
            beta,
            gamma,
            theta,
            sigma,
            phi,
        }
    }

    /// R0 = beta / gamma. Infinite when `gamma == 0` and `beta > 0`.
    pub fn basic_reproduction_number(&self) -> f64 {
        self.beta / self.gamma
    }

    /// R0 scaled by the vaccinated share of susceptibility.
    /// NaN when `theta == phi == 0`, which callers treat as "no vaccination".
    pub fn vaccine_reproduction_number(&self) -> f64 {
        if self.theta == 0.0 && self.phi == 0.0 {
            return f64::NAN;
        }
        self.basic_reproduction_number() * (self.theta + self.sigma * self.phi)
            / (self.theta + self.phi)
    }

    /// Checks the documented domain. The classifier itself never calls this.
    pub fn validate(&self) -> Result<(), ParameterError> {
        for (name, value) in self.named() {
            if !value.is_finite() {
                return Err(ParameterError::NotFinite { name, value });
            }
            if value < 0.0 {
                return Err(ParameterError::Negative { name, value });
            }
        }
        if self.sigma > 1.0 {
            return Err(ParameterError::SigmaAboveOne(self.sigma));
        }
        Ok(())
    }

    fn named(&self) -> [(&'static str, f64); 5] {
        [
            ("beta", self.beta),
            ("gamma", self.gamma),
            ("theta", self.theta),
            ("sigma", self.sigma),
            ("phi", self.phi),
        ]
    }
}

/// Compartment fractions `(S, V, I)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Compartments {
    pub s: f64,
    pub v: f64,
    pub i: f64,
}

impl Compartments {
    pub fn new(s: f64, v: f64, i: f64) -> Self {
        Self { s, v, i }
    }

    /// Builds a state from `[S, V, I]`.
    pub fn from_slice(values: &[f64]) -> anyhow::Result<Self> {
        match values {
            [s, v, i] => Ok(Self::new(*s, *v, *i)),
            _ => anyhow::bail!(
                "Compartment state must have 3 entries (S, V, I), got {}.",
                values.len()
            ),
        }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.s, self.v, self.i]
    }

    pub fn total(&self) -> f64 {
        self.s + self.v + self.i
    }

    pub fn norm(&self) -> f64 {
        (self.s * self.s + self.v * self.v + self.i * self.i).sqrt()
    }

    /// Euclidean distance between two states.
    pub fn distance(&self, other: &Compartments) -> f64 {
        Compartments::new(self.s - other.s, self.v - other.v, self.i - other.i).norm()
    }
}

impl From<[f64; 3]> for Compartments {
    fn from(values: [f64; 3]) -> Self {
        Self::new(values[0], values[1], values[2])
    }
}

impl From<Compartments> for [f64; 3] {
    fn from(state: Compartments) -> Self {
        state.to_array()
    }
}

/// Instantaneous derivatives `(dS/dt, dV/dt, dI/dt)`.
pub fn rate_equations(params: &Parameters, state: &Compartments) -> Compartments {
    let mut out = [0.0; 3];
    DynamicalSystem::<f64>::apply(&SviModel::new(*params), 0.0, &state.to_array(), &mut out);
    Compartments::from(out)
}

/// The SVI vector field as a [`DynamicalSystem`] with state order `[S, V, I]`.
#[derive(Debug, Clone, Copy)]
pub struct SviModel {
    pub params: Parameters,
}

impl SviModel {
    pub fn new(params: Parameters) -> Self {
        Self { params }
    }
}

impl<T: Scalar> DynamicalSystem<T> for SviModel {
    fn dimension(&self) -> usize {
        3
    }

    fn apply(&self, _t: T, x: &[T], out: &mut [T]) {
        let beta = T::lit(self.params.beta);
        let gamma = T::lit(self.params.gamma);
        let theta = T::lit(self.params.theta);
        let sigma = T::lit(self.params.sigma);
        let phi = T::lit(self.params.phi);
        let (s, v, i) = (x[0], x[1], x[2]);

        out[0] = theta * v + gamma * i - beta * i * s - phi * s;
        out[1] = phi * s - sigma * beta * i * v - theta * v;
        out[2] = beta * s * i + sigma * beta * v * i - gamma * i;
    }
}
