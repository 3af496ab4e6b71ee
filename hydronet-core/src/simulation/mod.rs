//! Driving a network through time.
//!
//! A [`SimulationRun`] owns the state of every element and advances the whole network
//! one [`crate::timeseries::TimeStep`] at a time. Within a step elements are evaluated
//! in topological order so that every consumer sees the outputs its producers computed
//! for the same step.

mod cancel;
mod checks;
mod run;
mod status;
#[cfg(test)]
mod tests;

pub use cancel::CancelToken;
pub use run::SimulationRun;
pub use status::{RunFailure, RunStatus, SchedulerState};
