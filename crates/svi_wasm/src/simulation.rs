//! Trajectory entry point.

use crate::system::{parse_state, WasmSviModel};
use js_sys::Float64Array;
use serde::Deserialize;
use serde_wasm_bindgen::from_value;
use svi_core::integrate::{AdaptiveIntegrator, FixedStepIntegrator, IntegratorSettings};
use svi_core::model::{Compartments, Parameters};
use svi_core::simulation::{simulate, Trajectory};
use wasm_bindgen::prelude::*;

/// JS-side simulation options. Every field is optional; tolerance fields left
/// out keep their `IntegratorSettings` defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SimulationOptions {
    solver: Option<String>,
    dt: Option<f64>,
    rtol: Option<f64>,
    atol: Option<f64>,
    initial_step: Option<f64>,
    min_step: Option<f64>,
    max_step: Option<f64>,
    max_steps: Option<usize>,
}

impl SimulationOptions {
    fn settings(&self) -> IntegratorSettings {
        let defaults = IntegratorSettings::default();
        IntegratorSettings {
            rtol: self.rtol.unwrap_or(defaults.rtol),
            atol: self.atol.unwrap_or(defaults.atol),
            initial_step: self.initial_step.unwrap_or(defaults.initial_step),
            min_step: self.min_step.unwrap_or(defaults.min_step),
            max_step: self.max_step.unwrap_or(defaults.max_step),
            max_steps: self.max_steps.unwrap_or(defaults.max_steps),
        }
    }
}

enum SolverChoice {
    Adaptive(AdaptiveIntegrator),
    RK4(FixedStepIntegrator),
}

fn parse_options(value: JsValue) -> Result<SolverChoice, JsValue> {
    let options: SimulationOptions = if value.is_undefined() || value.is_null() {
        SimulationOptions::default()
    } else {
        from_value(value)
            .map_err(|e| JsValue::from_str(&format!("Invalid simulation options: {}", e)))?
    };

    match options.solver.as_deref().unwrap_or("adaptive") {
        "adaptive" => Ok(SolverChoice::Adaptive(AdaptiveIntegrator::new(
            options.settings(),
        ))),
        "rk4" => {
            let dt = options
                .dt
                .ok_or_else(|| JsValue::from_str("The rk4 solver requires a dt option"))?;
            let mut integrator = FixedStepIntegrator::new(dt);
            if let Some(max_steps) = options.max_steps {
                integrator.max_steps = max_steps;
            }
            Ok(SolverChoice::RK4(integrator))
        }
        _ => Err(JsValue::from_str("Unknown solver")),
    }
}

fn run(
    params: &Parameters,
    initial: &Compartments,
    times: &[f64],
    solver: SolverChoice,
) -> Result<Trajectory, JsValue> {
    let result = match solver {
        SolverChoice::Adaptive(mut integrator) => simulate(params, initial, times, &mut integrator),
        SolverChoice::RK4(mut integrator) => simulate(params, initial, times, &mut integrator),
    };
    result.map_err(|e| JsValue::from_str(&format!("Simulation failed: {:#}", e)))
}

#[wasm_bindgen]
impl WasmSviModel {
    /// Row-major `[S, V, I]` rows, one per entry of `times`.
    ///
    /// `options` may be `undefined`. `solver` is `"adaptive"` (default, tuned by
    /// `rtol`, `atol`, `initial_step`, `min_step`, `max_step`, `max_steps`) or
    /// `"rk4"` (fixed step `dt`, capped by `max_steps`).
    pub fn simulate(
        &self,
        initial_state: Vec<f64>,
        times: Vec<f64>,
        options: JsValue,
    ) -> Result<Float64Array, JsValue> {
        let initial = parse_state(&initial_state)?;
        let solver = parse_options(options)?;
        let trajectory = run(&self.params, &initial, &times, solver)?;
        Ok(Float64Array::from(trajectory.to_flat().as_slice()))
    }
}
