use crate::components::supplied;
use crate::constants::{Q, STORAGE};
use hydronet_core::errors::HydroNetResult;
use hydronet_core::process::{ModelOutput, ProcessModel, QuantityDefinition, StepContext};
use hydronet_core::state::{QuantityMap, State};
use serde::{Deserialize, Serialize};

/// A lossless store that collects all of its inflow
///
/// Typically used as the terminal element of a network, e.g. a lake without outlet or
/// the sea, to close the water balance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Accumulator {}

#[typetag::serde]
impl ProcessModel for Accumulator {
    fn definitions(&self) -> Vec<QuantityDefinition> {
        vec![
            QuantityDefinition::input(Q, "m^3 / s"),
            QuantityDefinition::state(STORAGE, "m^3"),
        ]
    }

    fn advance(
        &self,
        state: &State,
        ctx: &StepContext,
        upstream: &QuantityMap,
    ) -> HydroNetResult<ModelOutput> {
        let storage = state.require(STORAGE)? + supplied(upstream, Q) * ctx.duration();
        Ok(ModelOutput::new(
            State::new(ctx.end()).with(STORAGE, storage),
            QuantityMap::new(),
        ))
    }
}
