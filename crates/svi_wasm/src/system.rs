//! Core WASM model wrapper and boundary conversions.

use serde_wasm_bindgen::from_value;
use svi_core::model::{rate_equations, Compartments, Parameters};
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
pub struct WasmSviModel {
    pub(crate) params: Parameters,
}

pub(crate) fn parse_parameters(value: JsValue) -> Result<Parameters, JsValue> {
    let params: Parameters = from_value(value)
        .map_err(|e| JsValue::from_str(&format!("Invalid parameters: {}", e)))?;
    params
        .validate()
        .map_err(|e| JsValue::from_str(&format!("Invalid parameters: {}", e)))?;
    Ok(params)
}

pub(crate) fn parse_state(state: &[f64]) -> Result<Compartments, JsValue> {
    Compartments::from_slice(state).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen]
impl WasmSviModel {
    #[wasm_bindgen(constructor)]
    pub fn new(params: JsValue) -> Result<WasmSviModel, JsValue> {
        console_error_panic_hook::set_once();
        Ok(WasmSviModel {
            params: parse_parameters(params)?,
        })
    }

    pub fn set_params(&mut self, params: JsValue) -> Result<(), JsValue> {
        self.params = parse_parameters(params)?;
        Ok(())
    }

    pub fn get_params(&self) -> Result<JsValue, JsValue> {
        serde_wasm_bindgen::to_value(&self.params)
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// `[dS/dt, dV/dt, dI/dt]` at `state`.
    pub fn rate_equations(&self, state: Vec<f64>) -> Result<Vec<f64>, JsValue> {
        let state = parse_state(&state)?;
        Ok(rate_equations(&self.params, &state).to_array().to_vec())
    }
}
