//! Names of the quantities exchanged by the reference models.

/// Flow rate passed from producers to consumers
/// unit: m^3 / s
pub const Q: &str = "q";

/// Water held by an element
/// unit: m^3
pub const STORAGE: &str = "storage";

/// Precipitation depth rate falling on an element's surface
/// unit: m / s
pub const PRECIPITATION: &str = "precipitation";

/// Requested abstraction rate
/// unit: m^3 / s
pub const DEMAND: &str = "demand";

/// Abstraction rate actually delivered
/// unit: m^3 / s
pub const WITHDRAWAL: &str = "withdrawal";
