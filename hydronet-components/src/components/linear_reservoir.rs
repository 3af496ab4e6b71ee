//! Linear storage reservoir
//!
//! The workhorse of conceptual runoff routing. Outflow is proportional to storage, so
//! the reservoir damps and delays its inflow. The governing equation is
//!
//! $$ \frac{dS}{dt} = I + A \cdot P - k S $$
//!
//! Where:
//! - $S$ is the storage (m^3)
//! - $I$ is the summed inflow from upstream elements (m^3 / s)
//! - $A$ is the surface area receiving precipitation (m^2)
//! - $P$ is the precipitation rate (m / s)
//! - $k$ is the recession constant (1 / s)
//!
//! Large values of $k \Delta t$ make the equation stiff; the run's integrator subdivides
//! the step as needed.

use crate::components::{balance_outflow, supplied};
use crate::constants::{PRECIPITATION, Q, STORAGE};
use hydronet_core::errors::{HydroNetError, HydroNetResult};
use hydronet_core::integrator::IVP;
use hydronet_core::process::{ModelOutput, ProcessModel, QuantityDefinition, StepContext};
use hydronet_core::state::{QuantityMap, State};
use hydronet_core::timeseries::{FloatValue, Time};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Parameters for the linear reservoir
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearReservoirParameters {
    /// Recession constant
    /// unit: 1 / s
    pub k: FloatValue,
    /// Area receiving precipitation
    /// unit: m^2
    #[serde(default)]
    pub area: FloatValue,
}

impl Default for LinearReservoirParameters {
    fn default() -> Self {
        Self { k: 0.1, area: 0.0 }
    }
}

/// Storage equation for a single step with constant forcing
struct ReservoirSystem {
    k: FloatValue,
    inflow: FloatValue,
}

impl IVP for ReservoirSystem {
    fn calculate_dy_dt(&self, _t: Time, y: &DVector<FloatValue>, dy_dt: &mut DVector<FloatValue>) {
        dy_dt[0] = self.inflow - self.k * y[0];
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearReservoir {
    #[serde(flatten)]
    parameters: LinearReservoirParameters,
}

impl LinearReservoir {
    pub fn from_parameters(parameters: LinearReservoirParameters) -> Self {
        Self { parameters }
    }

    pub fn parameters(&self) -> &LinearReservoirParameters {
        &self.parameters
    }
}

#[typetag::serde]
impl ProcessModel for LinearReservoir {
    fn definitions(&self) -> Vec<QuantityDefinition> {
        vec![
            QuantityDefinition::input(Q, "m^3 / s"),
            QuantityDefinition::forcing(PRECIPITATION, "m / s"),
            QuantityDefinition::state(STORAGE, "m^3"),
            QuantityDefinition::output(Q, "m^3 / s"),
        ]
    }

    fn validate(&self) -> HydroNetResult<()> {
        let LinearReservoirParameters { k, area } = self.parameters;
        if !k.is_finite() || k < 0.0 || !area.is_finite() || area < 0.0 {
            return Err(HydroNetError::InvalidConfig(format!(
                "linear reservoir needs a non-negative k and area, got k = {}, area = {}",
                k, area
            )));
        }
        Ok(())
    }

    fn advance(
        &self,
        state: &State,
        ctx: &StepContext,
        upstream: &QuantityMap,
    ) -> HydroNetResult<ModelOutput> {
        let inflow = supplied(upstream, Q) + self.parameters.area * supplied(upstream, PRECIPITATION);
        let system = ReservoirSystem {
            k: self.parameters.k,
            inflow,
        };

        let storage = state.require(STORAGE)?;
        let result = ctx.integrator.integrate(
            &system,
            &DVector::from_vec(vec![storage]),
            ctx.start(),
            ctx.duration(),
        )?;
        let new_storage = result.y[0];

        Ok(ModelOutput::new(
            State::new(ctx.end()).with(STORAGE, new_storage),
            QuantityMap::from([(
                Q.to_string(),
                balance_outflow(storage, new_storage, inflow, ctx.duration()),
            )]),
        ))
    }
}
