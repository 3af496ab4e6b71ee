//! Reference process models for hydronet networks.
//!
//! These cover the common building blocks of a river network (inflows, stores,
//! reservoirs, abstractions and dams) and double as examples of how to implement
//! [`hydronet_core::process::ProcessModel`].

pub mod components;
pub mod constants;

/// Type names under which the models in this crate are registered
///
/// These are the values accepted by the `type` key of a model table in a network
/// description.
pub fn available_models() -> &'static [&'static str] {
    &[
        "Abstraction",
        "Accumulator",
        "ConstantInflow",
        "LinearReservoir",
        "ThresholdDam",
    ]
}
