//! Engine for simulating networks of hydrological process models.
//!
//! Elements bound to [`process::ProcessModel`]s are linked into a [`network::Network`],
//! which a [`simulation::SimulationRun`] advances through a [`timeseries::TimeAxis`].

pub mod config;
pub mod element;
pub mod integrator;
pub mod io;
pub mod network;
pub mod process;
pub mod simulation;
pub mod smooth;
pub mod state;
pub mod timeseries;

pub mod errors;

#[cfg(test)]
mod example_models;
