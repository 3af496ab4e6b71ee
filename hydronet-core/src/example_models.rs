//! Small process models used to exercise the engine in tests.

use crate::errors::{HydroNetError, HydroNetResult};
use crate::process::{ModelOutput, ProcessModel, QuantityDefinition, StepContext};
use crate::state::{QuantityMap, State};
use crate::timeseries::FloatValue;
use serde::{Deserialize, Serialize};

/// Emits a constant flow
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Source {
    pub q: FloatValue,
}

#[typetag::serde]
impl ProcessModel for Source {
    fn definitions(&self) -> Vec<QuantityDefinition> {
        vec![QuantityDefinition::output("q", "m3/s")]
    }

    fn validate(&self) -> HydroNetResult<()> {
        if !self.q.is_finite() || self.q < 0.0 {
            return Err(HydroNetError::InvalidConfig(format!("invalid flow {}", self.q)));
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
            QuantityMap::from([("q".to_string(), self.q)]),
        ))
    }
}

/// Stores its inflow and releases a fixed rate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Store {
    pub release: FloatValue,
}

#[typetag::serde]
impl ProcessModel for Store {
    fn definitions(&self) -> Vec<QuantityDefinition> {
        vec![
            QuantityDefinition::input("q", "m3/s"),
            QuantityDefinition::output("q", "m3/s"),
            QuantityDefinition::state("storage", "m3"),
        ]
    }

    fn advance(
        &self,
        state: &State,
        ctx: &StepContext,
        upstream: &QuantityMap,
    ) -> HydroNetResult<ModelOutput> {
        let dt = ctx.duration();
        let inflow = upstream.get("q").copied().unwrap_or(0.0);
        let storage = state.require("storage")? + (inflow - self.release) * dt;

        let new_state = State::new(ctx.end()).with("storage", storage);
        Ok(ModelOutput::new(
            new_state,
            QuantityMap::from([("q".to_string(), self.release)]),
        ))
    }
}

/// Converts a precipitation forcing into flow
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Rain {}

#[typetag::serde]
impl ProcessModel for Rain {
    fn definitions(&self) -> Vec<QuantityDefinition> {
        vec![
            QuantityDefinition::forcing("precipitation", "m3/s"),
            QuantityDefinition::output("q", "m3/s"),
        ]
    }

    fn advance(
        &self,
        _state: &State,
        ctx: &StepContext,
        upstream: &QuantityMap,
    ) -> HydroNetResult<ModelOutput> {
        let precipitation = upstream.get("precipitation").copied().unwrap_or(0.0);
        Ok(ModelOutput::new(
            State::new(ctx.end()),
            QuantityMap::from([("q".to_string(), precipitation)]),
        ))
    }
}

/// Fails on a given step, otherwise passes its inflow through
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct FailAt {
    pub step_index: usize,
}

#[typetag::serde]
impl ProcessModel for FailAt {
    fn definitions(&self) -> Vec<QuantityDefinition> {
        vec![
            QuantityDefinition::input("q", "m3/s"),
            QuantityDefinition::output("q", "m3/s"),
        ]
    }

    fn advance(
        &self,
        _state: &State,
        ctx: &StepContext,
        upstream: &QuantityMap,
    ) -> HydroNetResult<ModelOutput> {
        if ctx.step.index == self.step_index {
            return Err(HydroNetError::NumericalInstability {
                quantity: "q".to_string(),
                reason: "forced failure".to_string(),
            });
        }
        Ok(ModelOutput::new(
            State::new(ctx.end()),
            QuantityMap::from([("q".to_string(), upstream.get("q").copied().unwrap_or(0.0))]),
        ))
    }
}

/// Returns whatever value it is configured with, finite or not
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Emit {
    pub value: FloatValue,
}

#[typetag::serde]
impl ProcessModel for Emit {
    fn definitions(&self) -> Vec<QuantityDefinition> {
        vec![QuantityDefinition::output("q", "m3/s")]
    }

    fn advance(
        &self,
        _state: &State,
        ctx: &StepContext,
        _upstream: &QuantityMap,
    ) -> HydroNetResult<ModelOutput> {
        Ok(ModelOutput::new(
            State::new(ctx.end()),
            QuantityMap::from([("q".to_string(), self.value)]),
        ))
    }
}

/// Converts inflow into a water level, exposing no flow of its own
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct Gauge {
    pub scale: FloatValue,
}

#[typetag::serde]
impl ProcessModel for Gauge {
    fn definitions(&self) -> Vec<QuantityDefinition> {
        vec![
            QuantityDefinition::input("q", "m3/s"),
            QuantityDefinition::output("level", "m"),
        ]
    }

    fn advance(
        &self,
        _state: &State,
        ctx: &StepContext,
        upstream: &QuantityMap,
    ) -> HydroNetResult<ModelOutput> {
        let q = upstream.get("q").copied().unwrap_or(0.0);
        Ok(ModelOutput::new(
            State::new(ctx.end()),
            QuantityMap::from([("level".to_string(), q * self.scale)]),
        ))
    }
}
