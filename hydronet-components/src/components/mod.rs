mod abstraction;
mod accumulator;
mod constant_inflow;
pub mod linear_reservoir;
mod threshold_dam;

pub use abstraction::{Abstraction, AbstractionParameters, UnderflowPolicy};
pub use accumulator::Accumulator;
pub use constant_inflow::ConstantInflow;
pub use linear_reservoir::{LinearReservoir, LinearReservoirParameters};
pub use threshold_dam::{ThresholdDam, ThresholdDamParameters};

use hydronet_core::state::QuantityMap;
use hydronet_core::timeseries::FloatValue;

/// Read a quantity supplied by producers or forcings, absent quantities are zero
pub(crate) fn supplied(upstream: &QuantityMap, name: &str) -> FloatValue {
    upstream.get(name).copied().unwrap_or(0.0)
}

/// Mean outflow over a step from the change in storage
///
/// Tiny negative values caused by rounding are clipped to zero.
pub(crate) fn balance_outflow(
    storage_before: FloatValue,
    storage_after: FloatValue,
    inflow: FloatValue,
    duration: FloatValue,
) -> FloatValue {
    (inflow + (storage_before - storage_after) / duration).max(0.0)
}
