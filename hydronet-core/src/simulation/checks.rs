use crate::errors::{HydroNetError, HydroNetResult};
use crate::process::{ModelOutput, ProcessModel};
use crate::state::State;

/// Validate the result of advancing a process model over one step
///
/// Every declared state quantity must be present and every value must be finite.
/// Quantities that are not declared as signed must not be negative: a negative storage
/// is reported as an underflow against the storage available before the step, a
/// negative output as a numerical instability.
pub(crate) fn check_model_output(
    model: &dyn ProcessModel,
    previous: &State,
    output: &ModelOutput,
) -> HydroNetResult<()> {
    for name in model.state_names() {
        if !output.state.contains(&name) {
            return Err(HydroNetError::Error(format!(
                "new state is missing the declared quantity '{}'",
                name
            )));
        }
    }

    for (name, value) in output.state.iter() {
        if !value.is_finite() {
            return Err(HydroNetError::NumericalInstability {
                quantity: name.clone(),
                reason: format!("state became {}", value),
            });
        }
        if *value < 0.0 && !model.is_signed(name) {
            let available = previous.get_or(name, 0.0);
            return Err(HydroNetError::StorageUnderflow {
                quantity: name.clone(),
                available,
                requested: available - value,
            });
        }
    }

    for (name, value) in output.outputs.iter() {
        if !value.is_finite() {
            return Err(HydroNetError::NumericalInstability {
                quantity: name.clone(),
                reason: format!("output became {}", value),
            });
        }
        if *value < 0.0 && !model.is_signed(name) {
            return Err(HydroNetError::NumericalInstability {
                quantity: name.clone(),
                reason: format!("non-negative output became {}", value),
            });
        }
    }
    Ok(())
}
