//! Demand-driven water abstraction from a storage
//!
//! A supply tank (or a reservoir operated for water supply) is filled by its inflow and
//! emptied by a withdrawal meeting a demand. Water above an optional capacity spills
//! downstream.

use crate::components::supplied;
use crate::constants::{DEMAND, Q, STORAGE, WITHDRAWAL};
use hydronet_core::errors::{HydroNetError, HydroNetResult};
use hydronet_core::process::{ModelOutput, ProcessModel, QuantityDefinition, StepContext};
use hydronet_core::state::{QuantityMap, State};
use hydronet_core::timeseries::FloatValue;
use serde::{Deserialize, Serialize};

/// What to do when the demand exceeds the water available in a step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UnderflowPolicy {
    /// Fail the step with a storage underflow
    #[default]
    Reject,
    /// Deliver only what is available and empty the storage
    Clamp,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbstractionParameters {
    /// Demand used when no demand forcing is supplied
    /// unit: m^3 / s
    #[serde(default)]
    pub demand: FloatValue,
    /// Storage above which water spills downstream
    /// unit: m^3
    #[serde(default)]
    pub capacity: Option<FloatValue>,
    #[serde(default)]
    pub policy: UnderflowPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Abstraction {
    #[serde(flatten)]
    parameters: AbstractionParameters,
}

impl Abstraction {
    pub fn from_parameters(parameters: AbstractionParameters) -> Self {
        Self { parameters }
    }

    /// Withdrawal rate delivered over a step of length `dt`
    fn withdrawal(
        &self,
        available: FloatValue,
        demand: FloatValue,
        dt: FloatValue,
    ) -> HydroNetResult<FloatValue> {
        let requested = demand * dt;
        if requested <= available {
            return Ok(demand);
        }
        match self.parameters.policy {
            UnderflowPolicy::Reject => Err(HydroNetError::StorageUnderflow {
                quantity: STORAGE.to_string(),
                available,
                requested,
            }),
            UnderflowPolicy::Clamp => {
                log::debug!(
                    "Demand of {} clamped to the available {}",
                    requested,
                    available
                );
                Ok(available / dt)
            }
        }
    }
}

#[typetag::serde]
impl ProcessModel for Abstraction {
    fn definitions(&self) -> Vec<QuantityDefinition> {
        vec![
            QuantityDefinition::input(Q, "m^3 / s"),
            QuantityDefinition::forcing(DEMAND, "m^3 / s"),
            QuantityDefinition::state(STORAGE, "m^3"),
            QuantityDefinition::output(Q, "m^3 / s"),
            QuantityDefinition::output(WITHDRAWAL, "m^3 / s"),
        ]
    }

    fn validate(&self) -> HydroNetResult<()> {
        let AbstractionParameters {
            demand, capacity, ..
        } = self.parameters;
        if !demand.is_finite() || demand < 0.0 {
            return Err(HydroNetError::InvalidConfig(format!(
                "abstraction needs a non-negative demand, got {}",
                demand
            )));
        }
        match capacity {
            Some(capacity) if !capacity.is_finite() || capacity < 0.0 => {
                Err(HydroNetError::InvalidConfig(format!(
                    "abstraction needs a non-negative capacity, got {}",
                    capacity
                )))
            }
            _ => Ok(()),
        }
    }

    fn advance(
        &self,
        state: &State,
        ctx: &StepContext,
        upstream: &QuantityMap,
    ) -> HydroNetResult<ModelOutput> {
        let dt = ctx.duration();
        let demand = upstream
            .get(DEMAND)
            .copied()
            .unwrap_or(self.parameters.demand);
        // Forced demands are only known once the step is gathered
        if !demand.is_finite() || demand < 0.0 {
            return Err(HydroNetError::Error(format!(
                "demand must be non-negative, got {}",
                demand
            )));
        }

        let available = state.require(STORAGE)? + supplied(upstream, Q) * dt;
        let withdrawal = self.withdrawal(available, demand, dt)?;
        let mut storage = (available - withdrawal * dt).max(0.0);

        let mut spill = 0.0;
        if let Some(capacity) = self.parameters.capacity {
            if storage > capacity {
                spill = (storage - capacity) / dt;
                storage = capacity;
            }
        }

        Ok(ModelOutput::new(
            State::new(ctx.end()).with(STORAGE, storage),
            QuantityMap::from([(Q.to_string(), spill), (WITHDRAWAL.to_string(), withdrawal)]),
        ))
    }
}
