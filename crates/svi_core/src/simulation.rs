//! Trajectory simulation: classify first, integrate only when the regime does
//! not already pin the trajectory down.

use crate::classification::{classify, Classification};
use crate::integrate::{AdaptiveIntegrator, Integrator};
use crate::model::{Compartments, Parameters, SviModel};
use anyhow::{bail, Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

/// Compartment fractions sampled on a time grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub times: Vec<f64>,
    pub states: Vec<Compartments>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn final_state(&self) -> Option<&Compartments> {
        self.states.last()
    }

    /// Row-major `[S, V, I]` rows, for consumers that want a flat buffer.
    pub fn to_flat(&self) -> Vec<f64> {
        self.states.iter().flat_map(|state| state.to_array()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Simulation {
    pub classification: Classification,
    pub trajectory: Trajectory,
}

fn validate_times(times: &[f64]) -> Result<()> {
    for (index, &t) in times.iter().enumerate() {
        if !t.is_finite() {
            bail!("Time point {} is not finite ({}).", index, t);
        }
        if t < 0.0 {
            bail!("Time point {} is negative ({}).", index, t);
        }
    }
    if let Some(index) = times.windows(2).position(|pair| pair[1] < pair[0]) {
        bail!(
            "Time grid must be non-decreasing (t[{}] = {} > t[{}] = {}).",
            index,
            times[index],
            index + 1,
            times[index + 1]
        );
    }
    Ok(())
}

/// Simulates the model on `times`, returning the classification alongside the
/// trajectory.
///
/// The neutral regime returns `initial` at every time point without touching
/// `integrator`; every other regime integrates the rate equations. Integrator
/// failures are returned unchanged.
pub fn simulate_with_classification(
    params: &Parameters,
    initial: &Compartments,
    times: &[f64],
    integrator: &mut impl Integrator,
) -> Result<Simulation> {
    validate_times(times)?;
    let classification = classify(params, initial);

    let states = if classification.is_neutral() {
        debug!(
            "neutral regime: holding initial state for {} time points",
            times.len()
        );
        vec![*initial; times.len()]
    } else {
        debug!(
            "{:?} regime: integrating over {} time points",
            classification.regime,
            times.len()
        );
        let rows = integrator
            .integrate(&SviModel::new(*params), &initial.to_array(), times)
            .context("Failed to integrate SVI rate equations.")?;
        rows.iter()
            .map(|row| Compartments::from_slice(row))
            .collect::<Result<Vec<_>>>()?
    };

    Ok(Simulation {
        classification,
        trajectory: Trajectory {
            times: times.to_vec(),
            states,
        },
    })
}

/// Compartment fractions at each entry of `times`.
pub fn simulate(
    params: &Parameters,
    initial: &Compartments,
    times: &[f64],
    integrator: &mut impl Integrator,
) -> Result<Trajectory> {
    simulate_with_classification(params, initial, times, integrator)
        .map(|simulation| simulation.trajectory)
}

/// [`simulate`] with the default adaptive integrator.
pub fn simulate_default(
    params: &Parameters,
    initial: &Compartments,
    times: &[f64],
) -> Result<Trajectory> {
    simulate(params, initial, times, &mut AdaptiveIntegrator::default())
}

/// `count` evenly spaced points on `[0, end]`.
pub fn linear_time_grid(end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![0.0],
        _ => (0..count)
            .map(|k| end * k as f64 / (count - 1) as f64)
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::{linear_time_grid, simulate, simulate_default, simulate_with_classification};
    use crate::classification::Regime;
    use crate::integrate::{IntegrationError, Integrator};
    use crate::model::{Compartments, Parameters};
    use crate::traits::DynamicalSystem;

    /// Counts calls and echoes the initial state.
    #[derive(Default)]
    struct CountingIntegrator {
        calls: usize,
    }

    impl Integrator for CountingIntegrator {
        fn integrate(
            &mut self,
            _system: &impl DynamicalSystem<f64>,
            initial: &[f64],
            times: &[f64],
        ) -> Result<Vec<Vec<f64>>, IntegrationError> {
            self.calls += 1;
            Ok(vec![initial.to_vec(); times.len()])
        }
    }

    struct FailingIntegrator;

    impl Integrator for FailingIntegrator {
        fn integrate(
            &mut self,
            _system: &impl DynamicalSystem<f64>,
            _initial: &[f64],
            _times: &[f64],
        ) -> Result<Vec<Vec<f64>>, IntegrationError> {
            Err(IntegrationError::NonFiniteState { t: 1.5 })
        }
    }

    fn assert_err_contains<T: std::fmt::Debug>(result: anyhow::Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err:#}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    fn assert_near(actual: &Compartments, expected: &Compartments, tolerance: f64) {
        assert!(
            actual.distance(expected) < tolerance,
            "expected {expected:?}, got {actual:?}"
        );
    }

    fn seeded() -> Compartments {
        Compartments::new(0.99, 0.0, 0.01)
    }

    #[test]
    fn neutral_regime_short_circuits_integrator() {
        let params = Parameters::new(0.93, 0.93, 0.0, 0.0, 0.0);
        let initial = Compartments::new(0.7, 0.1, 0.2);
        let times = linear_time_grid(100.0, 51);
        let mut integrator = CountingIntegrator::default();

        let simulation = simulate_with_classification(&params, &initial, &times, &mut integrator)
            .expect("simulation should succeed");

        assert_eq!(integrator.calls, 0);
        assert_eq!(simulation.classification.regime, Regime::Neutral);
        assert_eq!(simulation.trajectory.len(), times.len());
        assert!(simulation.trajectory.states.iter().all(|s| *s == initial));
    }

    #[test]
    fn non_neutral_regime_calls_integrator_once() {
        let params = Parameters::new(1.1, 0.7, 0.0, 0.0, 0.0);
        let mut integrator = CountingIntegrator::default();
        let trajectory = simulate(&params, &seeded(), &[0.0, 1.0, 2.0], &mut integrator)
            .expect("simulation should succeed");
        assert_eq!(integrator.calls, 1);
        assert_eq!(trajectory.len(), 3);
    }

    #[test]
    fn integrator_failure_propagates() {
        let params = Parameters::new(1.1, 0.7, 0.0, 0.0, 0.0);
        let result = simulate(&params, &seeded(), &[0.0, 1.0], &mut FailingIntegrator);
        let err = result.expect_err("failure should propagate");
        let source = err
            .downcast_ref::<IntegrationError>()
            .expect("integration error should be preserved");
        assert_eq!(*source, IntegrationError::NonFiniteState { t: 1.5 });
    }

    #[test]
    fn rejects_invalid_time_grids() {
        let params = Parameters::new(1.1, 0.7, 0.0, 0.0, 0.0);
        assert_err_contains(
            simulate_default(&params, &seeded(), &[0.0, -1.0]),
            "negative",
        );
        assert_err_contains(
            simulate_default(&params, &seeded(), &[0.0, 2.0, 1.0]),
            "non-decreasing",
        );
        assert_err_contains(
            simulate_default(&params, &seeded(), &[0.0, f64::INFINITY]),
            "not finite",
        );
    }

    #[test]
    fn one_row_per_time_point_on_the_simplex() {
        let params = Parameters::new(2.0, 0.5, 0.1, 0.5, 0.2);
        let times = linear_time_grid(50.0, 101);
        let trajectory =
            simulate_default(&params, &seeded(), &times).expect("simulation should succeed");
        assert_eq!(trajectory.states.len(), times.len());
        assert_eq!(trajectory.times, times);
        for state in &trajectory.states {
            assert!((state.total() - 1.0).abs() < 1e-6);
        }
        assert_eq!(trajectory.to_flat().len(), 3 * times.len());
    }

    #[test]
    fn long_run_matches_unvaccinated_endemic_equilibrium() {
        let params = Parameters::new(1.1, 0.7, 0.0, 0.0, 0.0);
        let simulation = simulate_with_classification(
            &params,
            &seeded(),
            &[0.0, 5000.0],
            &mut crate::integrate::AdaptiveIntegrator::default(),
        )
        .expect("simulation should succeed");
        let last = simulation.trajectory.final_state().expect("final state");
        let expected = simulation.classification.equilibria()[0];
        assert_near(last, &expected, 1e-5);
        assert!((last.i - 0.3636).abs() < 1e-4);
    }

    #[test]
    fn long_run_matches_perfect_vaccine_equilibrium() {
        let params = Parameters::new(1.6, 0.7, 0.1, 0.0, 0.05);
        let simulation = simulate_with_classification(
            &params,
            &seeded(),
            &[0.0, 5000.0],
            &mut crate::integrate::AdaptiveIntegrator::default(),
        )
        .expect("simulation should succeed");
        let last = simulation.trajectory.final_state().expect("final state");
        let (index, distance) = simulation
            .classification
            .nearest_equilibrium(last)
            .expect("steady state");
        assert_eq!(index, 0);
        assert!(distance < 1e-5, "distance {distance}");
    }

    #[test]
    fn long_run_matches_disease_free_equilibria() {
        let cases = [
            (
                Parameters::new(0.7, 1.1, 0.0, 0.0, 0.0),
                Regime::AlwaysDiseaseFree,
            ),
            (
                Parameters::new(0.5, 1.0, 0.1, 0.3, 0.3),
                Regime::AlwaysDiseaseFree,
            ),
            (
                Parameters::new(1.6, 0.7, 0.1, 0.1, 1.0),
                Regime::VaccinationDiseaseFree,
            ),
        ];
        for (params, regime) in cases {
            let simulation = simulate_with_classification(
                &params,
                &seeded(),
                &[0.0, 5000.0],
                &mut crate::integrate::AdaptiveIntegrator::default(),
            )
            .expect("simulation should succeed");
            assert_eq!(simulation.classification.regime, regime);
            let last = simulation.trajectory.final_state().expect("final state");
            assert_near(last, &simulation.classification.equilibria()[0], 1e-5);
        }
    }

    #[test]
    fn bistable_start_near_disease_free_member_stays_disease_free() {
        let params = Parameters::new(3.27, 0.306, 0.01, 0.02, 0.125);
        let initial = Compartments::new(0.0731, 0.9259, 0.001);
        let simulation = simulate_with_classification(
            &params,
            &initial,
            &[0.0, 5000.0],
            &mut crate::integrate::AdaptiveIntegrator::default(),
        )
        .expect("simulation should succeed");
        assert_eq!(simulation.classification.regime, Regime::Bistable);
        let last = simulation.trajectory.final_state().expect("final state");
        let (index, distance) = simulation
            .classification
            .nearest_equilibrium(last)
            .expect("steady state");
        assert_eq!(index, 0);
        assert!(distance < 1e-5, "distance {distance}");
    }

    #[test]
    fn fast_waning_without_vaccination_stays_bounded() {
        // Vaccinated outflow is fast and inflow is absent.
        let params = Parameters::new(1.1, 0.7, 5.0, 0.5, 0.0);
        let initial = Compartments::new(0.05, 0.9, 0.05);
        let times = linear_time_grid(200.0, 401);
        let trajectory =
            simulate_default(&params, &initial, &times).expect("simulation should succeed");
        for state in &trajectory.states {
            assert!(state.s.is_finite() && state.v.is_finite() && state.i.is_finite());
            assert!((state.total() - 1.0).abs() < 1e-6);
        }
        let last = trajectory.final_state().expect("final state");
        assert!((last.i - (1.0 - 0.7 / 1.1)).abs() < 1e-4);
        assert!(last.v.abs() < 1e-6);
    }

    #[test]
    fn linear_time_grid_spans_interval() {
        assert!(linear_time_grid(10.0, 0).is_empty());
        assert_eq!(linear_time_grid(10.0, 1), vec![0.0]);
        let grid = linear_time_grid(10.0, 5);
        assert_eq!(grid, vec![0.0, 2.5, 5.0, 7.5, 10.0]);
    }
}
