pub mod classification;
pub mod integrate;
pub mod model;
pub mod simulation;
pub mod solvers;
pub mod stability;
/// The `svi_core` crate classifies and simulates the Susceptible–Vaccinated–Infected
/// epidemic model with imperfect, waning vaccination.
///
/// Key components:
/// - **Model**: `Parameters`, `Compartments` and the rate equations as a `DynamicalSystem`.
/// - **Classification**: closed-form regime selection (disease-free, endemic, bistable, neutral)
///   and steady states, without time integration.
/// - **Stability**: reduced Jacobian and eigenvalues at each steady state.
/// - **Solvers / Integrate**: RK4 and adaptive Bogacki-Shampine steppers driven over a time grid.
/// - **Simulation**: classification-aware trajectories that skip integration in the neutral regime.
pub mod traits;

pub use classification::{classify, Branch, Classification, Regime, SteadyState};
pub use model::{rate_equations, Compartments, Parameters, SviModel};
pub use simulation::{simulate, simulate_default, Trajectory};
