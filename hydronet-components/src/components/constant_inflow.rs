use crate::constants::Q;
use hydronet_core::errors::{HydroNetError, HydroNetResult};
use hydronet_core::process::{ModelOutput, ProcessModel, QuantityDefinition, StepContext};
use hydronet_core::state::{QuantityMap, State};
use hydronet_core::timeseries::FloatValue;
use serde::{Deserialize, Serialize};

/// A headwater or boundary inflow with a constant rate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConstantInflow {
    /// unit: m^3 / s
    pub q: FloatValue,
}

impl ConstantInflow {
    pub fn new(q: FloatValue) -> Self {
        Self { q }
    }
}

#[typetag::serde]
impl ProcessModel for ConstantInflow {
    fn definitions(&self) -> Vec<QuantityDefinition> {
        vec![QuantityDefinition::output(Q, "m^3 / s")]
    }

    fn validate(&self) -> HydroNetResult<()> {
        if !self.q.is_finite() || self.q < 0.0 {
            return Err(HydroNetError::InvalidConfig(format!(
                "constant inflow must be non-negative, got {}",
                self.q
            )));
        }
        Ok(())
    }

    fn advance(
        &self,
        state: &State,
        ctx: &StepContext,
        _upstream: &QuantityMap,
    ) -> HydroNetResult<ModelOutput> {
        let mut new_state = state.clone();
        new_state.set_time(ctx.end());
        Ok(ModelOutput::new(
            new_state,
            QuantityMap::from([(Q.to_string(), self.q)]),
        ))
    }
}
