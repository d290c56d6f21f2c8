//! Classification and stability entry points.

use crate::system::{parse_state, WasmSviModel};
use serde_wasm_bindgen::to_value;
use svi_core::classification::classify;
use svi_core::stability::assess_equilibria;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
impl WasmSviModel {
    /// Regime, reproduction numbers and steady states for `initial_state`.
    pub fn classify(&self, initial_state: Vec<f64>) -> Result<JsValue, JsValue> {
        let initial = parse_state(&initial_state)?;
        let result = classify(&self.params, &initial);
        to_value(&result).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Human-readable regime label for `initial_state`.
    pub fn regime_description(&self, initial_state: Vec<f64>) -> Result<String, JsValue> {
        let initial = parse_state(&initial_state)?;
        Ok(classify(&self.params, &initial)
            .regime
            .description()
            .to_string())
    }

    /// One stability report per steady state, in classification order.
    pub fn equilibrium_stability(&self, initial_state: Vec<f64>) -> Result<JsValue, JsValue> {
        let initial = parse_state(&initial_state)?;
        let classification = classify(&self.params, &initial);
        let reports = assess_equilibria(&self.params, &classification);
        to_value(&reports).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use crate::system::WasmSviModel;
    use serde_wasm_bindgen::{from_value, to_value};
    use svi_core::classification::{Classification, Regime, SteadyState};
    use svi_core::model::Parameters;
    use svi_core::stability::{Stability, StabilityReport};
    use wasm_bindgen_test::wasm_bindgen_test;

    fn model(params: Parameters) -> WasmSviModel {
        WasmSviModel::new(to_value(&params).expect("params")).expect("model")
    }

    #[wasm_bindgen_test]
    fn classify_round_trips_through_js() {
        let model = model(Parameters::new(1.1, 0.7, 0.0, 0.0, 0.0));
        let value = model.classify(vec![0.99, 0.0, 0.01]).expect("classify");
        let result: Classification = from_value(value).expect("classification");
        assert_eq!(result.regime, Regime::AlwaysEndemic);
        assert_eq!(result.v_star, SteadyState::Single(0.0));
    }

    #[wasm_bindgen_test]
    fn bistable_labels_and_reports_two_equilibria() {
        let model = model(Parameters::new(3.27, 0.306, 0.01, 0.02, 0.125));
        let label = model
            .regime_description(vec![0.99, 0.0, 0.01])
            .expect("label");
        assert_eq!(
            label,
            "both disease-free and endemic equilibria locally stable"
        );
        let value = model
            .equilibrium_stability(vec![0.99, 0.0, 0.01])
            .expect("stability");
        let reports: Vec<StabilityReport> = from_value(value).expect("reports");
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].stability, Stability::Stable);
    }
}
