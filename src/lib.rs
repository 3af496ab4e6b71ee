//! Simulation of networks of coupled hydrological process models.
//!
//! The engine lives in [`engine`] (network topology, the time-step scheduler and the
//! numerical integrator), the reference process models in [`components`]. This crate ties
//! both together for callers that start from a declarative network description.
//!
//! ```no_run
//! use hydronet::engine::config::{NetworkSpec, SimulationConfig};
//!
//! let spec = NetworkSpec::from_toml_str(
//!     r#"
//! [[elements]]
//! name = "A"
//! model = { type = "ConstantInflow", q = 10.0 }
//!
//! [[elements]]
//! name = "B"
//! model = { type = "Accumulator" }
//!
//! [[links]]
//! from = "A"
//! to = "B"
//! "#,
//! )?;
//! let status = hydronet::run(spec, &SimulationConfig::new(0.0, 3.0, 1.0))?;
//! println!("{}", status);
//! # Ok::<(), hydronet::engine::errors::HydroNetError>(())
//! ```

pub mod logging;

pub use hydronet_components as components;
pub use hydronet_core as engine;

use hydronet_core::config::{NetworkSpec, SimulationConfig};
use hydronet_core::errors::HydroNetResult;
use hydronet_core::simulation::{RunStatus, SimulationRun};
use std::sync::Arc;

/// Names of every process model that can be used in a network description
pub fn available_models() -> &'static [&'static str] {
    hydronet_components::available_models()
}

/// Validate a network description and prepare a run over it
///
/// Every setup error (cycles, interface mismatches, invalid configuration) is returned
/// here, before any step is taken. The returned run can be given an input source, sinks
/// or a cancellation token before it is started.
pub fn prepare(network: NetworkSpec, config: &SimulationConfig) -> HydroNetResult<SimulationRun> {
    let network = network.into_network()?;
    log::debug!(
        "Network of {} elements with models from {:?}",
        network.len(),
        available_models()
    );
    SimulationRun::new(Arc::new(network), config)
}

/// Run a network description to completion
///
/// Setup errors are returned as `Err`, failures during the run are reported through the
/// returned [`RunStatus`].
pub fn run(network: NetworkSpec, config: &SimulationConfig) -> HydroNetResult<RunStatus> {
    Ok(prepare(network, config)?.run())
}
