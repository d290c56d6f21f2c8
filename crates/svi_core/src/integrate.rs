//! Grid integrators: drive a stepper so that the output has exactly one row per
//! requested time point.

use crate::solvers::{BogackiShampine, RK4};
use crate::traits::{DynamicalSystem, Steppable};
use log::trace;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Settings for the adaptive integrator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorSettings {
    pub rtol: f64,
    pub atol: f64,
    /// Zero selects a step from the span of the time grid.
    pub initial_step: f64,
    pub min_step: f64,
    pub max_step: f64,
    /// Step attempts (accepted or rejected) allowed over the whole grid.
    pub max_steps: usize,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-9,
            initial_step: 0.0,
            min_step: 1e-12,
            max_step: f64::INFINITY,
            max_steps: 1_000_000,
        }
    }
}

impl IntegratorSettings {
    pub fn validate(&self) -> Result<(), IntegrationError> {
        if !self.rtol.is_finite() || self.rtol <= 0.0 {
            return Err(IntegrationError::InvalidSettings(
                "rtol must be finite and positive".into(),
            ));
        }
        if !self.atol.is_finite() || self.atol <= 0.0 {
            return Err(IntegrationError::InvalidSettings(
                "atol must be finite and positive".into(),
            ));
        }
        if !self.initial_step.is_finite() || self.initial_step < 0.0 {
            return Err(IntegrationError::InvalidSettings(
                "initial_step must be finite and non-negative".into(),
            ));
        }
        if !(self.min_step > 0.0) {
            return Err(IntegrationError::InvalidSettings(
                "min_step must be positive".into(),
            ));
        }
        if !(self.max_step >= self.min_step) {
            return Err(IntegrationError::InvalidSettings(
                "max_step must be at least min_step".into(),
            ));
        }
        if self.max_steps == 0 {
            return Err(IntegrationError::InvalidSettings(
                "max_steps must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    fn first_step(&self, span: f64) -> f64 {
        let step = if self.initial_step > 0.0 {
            self.initial_step
        } else {
            span * 1e-3
        };
        step.min(self.max_step).max(self.min_step)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrationError {
    #[error("invalid integrator settings: {0}")]
    InvalidSettings(String),
    #[error("initial state dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error("invalid time grid: {0}")]
    InvalidTimeGrid(String),
    #[error("step size underflow at t = {t} (step {step:e})")]
    StepSizeUnderflow { t: f64, step: f64 },
    #[error("exceeded {max_steps} steps at t = {t}")]
    MaxStepsExceeded { max_steps: usize, t: f64 },
    #[error("state became non-finite at t = {t}")]
    NonFiniteState { t: f64 },
}

/// Integrates a system over a time grid.
///
/// Returns one state row per entry of `times`; the first row is `initial`,
/// taken to hold at `times[0]`.
pub trait Integrator {
    fn integrate(
        &mut self,
        system: &impl DynamicalSystem<f64>,
        initial: &[f64],
        times: &[f64],
    ) -> Result<Vec<Vec<f64>>, IntegrationError>;
}

fn check_inputs(
    system: &impl DynamicalSystem<f64>,
    initial: &[f64],
    times: &[f64],
) -> Result<(), IntegrationError> {
    let dim = system.dimension();
    if initial.len() != dim {
        return Err(IntegrationError::DimensionMismatch {
            expected: dim,
            got: initial.len(),
        });
    }
    if times.iter().any(|t| !t.is_finite()) {
        return Err(IntegrationError::InvalidTimeGrid(
            "time points must be finite".into(),
        ));
    }
    if times.windows(2).any(|pair| pair[1] < pair[0]) {
        return Err(IntegrationError::InvalidTimeGrid(
            "time points must be non-decreasing".into(),
        ));
    }
    Ok(())
}

fn all_finite(state: &[f64]) -> bool {
    state.iter().all(|v| v.is_finite())
}

/// Adaptive Bogacki-Shampine integrator. Lands exactly on every grid time.
#[derive(Debug, Clone, Default)]
pub struct AdaptiveIntegrator {
    pub settings: IntegratorSettings,
}

impl AdaptiveIntegrator {
    pub fn new(settings: IntegratorSettings) -> Self {
        Self { settings }
    }
}

impl Integrator for AdaptiveIntegrator {
    fn integrate(
        &mut self,
        system: &impl DynamicalSystem<f64>,
        initial: &[f64],
        times: &[f64],
    ) -> Result<Vec<Vec<f64>>, IntegrationError> {
        let settings = self.settings;
        settings.validate()?;
        check_inputs(system, initial, times)?;

        let Some((&start, rest)) = times.split_first() else {
            return Ok(Vec::new());
        };
        if !all_finite(initial) {
            return Err(IntegrationError::NonFiniteState { t: start });
        }

        let span = times[times.len() - 1] - start;
        let mut rows = Vec::with_capacity(times.len());
        let mut t = start;
        let mut state = initial.to_vec();
        rows.push(state.clone());

        let mut stepper = BogackiShampine::<f64>::new(state.len());
        stepper.prime(system, t, &state);
        let mut h = settings.first_step(span);
        let mut attempts = 0usize;

        for &target in rest {
            while t < target {
                if attempts >= settings.max_steps {
                    return Err(IntegrationError::MaxStepsExceeded {
                        max_steps: settings.max_steps,
                        t,
                    });
                }
                attempts += 1;

                let remaining = target - t;
                let landing = h >= remaining;
                let dt = if landing { remaining } else { h };
                let err = stepper.attempt(system, t, &state, dt, settings.rtol, settings.atol);

                let accepted = err.is_finite() && err <= 1.0;
                if accepted {
                    stepper.commit(&mut state);
                    t = if landing { target } else { t + dt };
                    if !all_finite(&state) {
                        return Err(IntegrationError::NonFiniteState { t });
                    }
                } else {
                    trace!("rejected step at t = {t}: dt = {dt:e}, error norm = {err}");
                }

                let factor = if !err.is_finite() {
                    0.2
                } else if err == 0.0 {
                    5.0
                } else {
                    (0.9 * err.powf(-1.0 / 3.0)).clamp(0.2, 5.0)
                };
                let proposed = (dt * factor).min(settings.max_step);
                // A shortened landing step says nothing about the step the
                // dynamics allow, so it never shrinks h.
                h = if accepted && landing {
                    h.max(proposed)
                } else {
                    proposed
                };

                if h < settings.min_step {
                    if !accepted {
                        return Err(IntegrationError::StepSizeUnderflow { t, step: h });
                    }
                    h = settings.min_step;
                }
            }
            rows.push(state.clone());
        }

        Ok(rows)
    }
}

/// Fixed-step RK4 integrator. Steps are shortened to land on grid times.
#[derive(Debug, Clone)]
pub struct FixedStepIntegrator {
    pub dt: f64,
    pub max_steps: usize,
}

impl FixedStepIntegrator {
    pub fn new(dt: f64) -> Self {
        Self {
            dt,
            max_steps: 10_000_000,
        }
    }
}

impl Integrator for FixedStepIntegrator {
    fn integrate(
        &mut self,
        system: &impl DynamicalSystem<f64>,
        initial: &[f64],
        times: &[f64],
    ) -> Result<Vec<Vec<f64>>, IntegrationError> {
        if !self.dt.is_finite() || self.dt <= 0.0 {
            return Err(IntegrationError::InvalidSettings(
                "dt must be finite and positive".into(),
            ));
        }
        check_inputs(system, initial, times)?;

        let Some((&start, rest)) = times.split_first() else {
            return Ok(Vec::new());
        };

        let mut rows = Vec::with_capacity(times.len());
        let mut t = start;
        let mut state = initial.to_vec();
        rows.push(state.clone());

        let mut stepper = RK4::<f64>::new(state.len());
        let mut steps = 0usize;
        for &target in rest {
            while t < target {
                if steps >= self.max_steps {
                    return Err(IntegrationError::MaxStepsExceeded {
                        max_steps: self.max_steps,
                        t,
                    });
                }
                steps += 1;

                let remaining = target - t;
                if self.dt >= remaining {
                    stepper.step(system, &mut t, &mut state, remaining);
                    t = target;
                } else {
                    stepper.step(system, &mut t, &mut state, self.dt);
                }
                if !all_finite(&state) {
                    return Err(IntegrationError::NonFiniteState { t });
                }
            }
            rows.push(state.clone());
        }

        Ok(rows)
    }
}
