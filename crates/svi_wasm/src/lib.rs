//! WASM bridge for the SVI bifurcation engine.
//!
//! Parameters and settings cross the boundary as plain JS objects
//! (`{ beta, gamma, theta, sigma, phi }`); states are `[S, V, I]` arrays.

mod analysis;
mod simulation;
mod system;

pub use system::WasmSviModel;
