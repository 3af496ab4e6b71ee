//! Dam releasing water above a crest storage
//!
//! Below the crest no water leaves the dam. Above it the release grows linearly with the
//! excess storage:
//!
//! $$ \frac{dS}{dt} = I - k \max(S - S_c, 0) $$
//!
//! The kink at the crest is replaced by [`smooth_logistic2`], whose smoothing parameter
//! is derived from the `smoothing` distance (in storage units) at which the smoothed
//! release deviates from the sharp one by 1 %. A smoothing of zero keeps the sharp kink.
//! The smoothed release is shifted so that an empty dam releases nothing.

use crate::components::{balance_outflow, supplied};
use crate::constants::{Q, STORAGE};
use hydronet_core::errors::{HydroNetError, HydroNetResult};
use hydronet_core::integrator::IVP;
use hydronet_core::process::{ModelOutput, ProcessModel, QuantityDefinition, StepContext};
use hydronet_core::smooth::{calc_smoothpar_logistic2, smooth_logistic2};
use hydronet_core::state::{QuantityMap, State};
use hydronet_core::timeseries::{FloatValue, Time};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdDamParameters {
    /// Release per unit of storage above the crest
    /// unit: 1 / s
    pub k: FloatValue,
    /// Storage at the crest
    /// unit: m^3
    pub threshold: FloatValue,
    /// Distance from the crest at which smoothing is 1 %
    /// unit: m^3
    #[serde(default)]
    pub smoothing: FloatValue,
}

struct DamSystem {
    k: FloatValue,
    threshold: FloatValue,
    smoothpar: FloatValue,
    inflow: FloatValue,
}

impl DamSystem {
    fn release(&self, storage: FloatValue) -> FloatValue {
        self.k
            * (smooth_logistic2(storage - self.threshold, self.smoothpar)
                - smooth_logistic2(-self.threshold, self.smoothpar))
    }
}

impl IVP for DamSystem {
    fn calculate_dy_dt(&self, _t: Time, y: &DVector<FloatValue>, dy_dt: &mut DVector<FloatValue>) {
        dy_dt[0] = self.inflow - self.release(y[0]);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdDam {
    #[serde(flatten)]
    parameters: ThresholdDamParameters,
}

impl ThresholdDam {
    pub fn from_parameters(parameters: ThresholdDamParameters) -> Self {
        Self { parameters }
    }

    fn system(&self, inflow: FloatValue) -> DamSystem {
        let ThresholdDamParameters {
            k,
            threshold,
            smoothing,
        } = self.parameters;
        DamSystem {
            k,
            threshold,
            smoothpar: calc_smoothpar_logistic2(smoothing),
            inflow,
        }
    }
}

#[typetag::serde]
impl ProcessModel for ThresholdDam {
    fn definitions(&self) -> Vec<QuantityDefinition> {
        vec![
            QuantityDefinition::input(Q, "m^3 / s"),
            QuantityDefinition::state(STORAGE, "m^3"),
            QuantityDefinition::output(Q, "m^3 / s"),
        ]
    }

    fn validate(&self) -> HydroNetResult<()> {
        let ThresholdDamParameters {
            k,
            threshold,
            smoothing,
        } = self.parameters;
        let valid = |value: FloatValue| value.is_finite() && value >= 0.0;
        if !valid(k) || !valid(threshold) || !valid(smoothing) {
            return Err(HydroNetError::InvalidConfig(format!(
                "threshold dam needs a non-negative k, threshold and smoothing, \
                 got k = {}, threshold = {}, smoothing = {}",
                k, threshold, smoothing
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
        let inflow = supplied(upstream, Q);
        let system = self.system(inflow);

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
