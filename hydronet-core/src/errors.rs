use crate::timeseries::{FloatValue, Time};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for invalid networks, configurations and failed simulation steps.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HydroNetError {
    #[error("{0}")]
    Error(String),
    #[error("Cycle detected in the element network: {}", path.join(" -> "))]
    Cycle { path: Vec<String> },
    #[error(
        "Interface mismatch on link '{producer}' -> '{consumer}': \
         '{producer}' does not provide {missing:?} required by '{consumer}'"
    )]
    InterfaceMismatch {
        producer: String,
        consumer: String,
        missing: Vec<String>,
    },
    #[error("Element '{0}' is defined more than once")]
    DuplicateElement(String),
    #[error("Link '{from}' -> '{to}' references unknown element '{missing}'")]
    UnknownElement {
        from: String,
        to: String,
        missing: String,
    },
    #[error("Numerical instability in '{quantity}': {reason}")]
    NumericalInstability { quantity: String, reason: String },
    #[error(
        "Storage underflow for '{quantity}': withdrawal of {requested} exceeds the available {available}"
    )]
    StorageUnderflow {
        quantity: String,
        available: FloatValue,
        requested: FloatValue,
    },
    #[error(
        "Integration over {duration} did not converge: error {error:e} exceeds tolerance {tolerance:e} \
         at the minimum sub-step of {min_substep}"
    )]
    Convergence {
        duration: Time,
        min_substep: Time,
        error: FloatValue,
        tolerance: FloatValue,
    },
    #[error("Input source failed for element '{element}': {reason}")]
    InputSource { element: String, reason: String },
    #[error("Invalid time axis: {0}")]
    InvalidTimeAxis(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Element '{element}' failed at step {step_index}: {source}")]
    ElementFailed {
        element: String,
        step_index: usize,
        #[source]
        source: Box<HydroNetError>,
    },
    #[error("Simulation cannot be stepped: {0}")]
    NotRunnable(String),
}

/// Coarse classification of a [`HydroNetError`].
///
/// Used in run statuses where the full error is not needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Cycle,
    InterfaceMismatch,
    Configuration,
    NumericalInstability,
    StorageUnderflow,
    Convergence,
    InputSource,
    Other,
}

impl HydroNetError {
    /// The kind of the underlying failure.
    ///
    /// For [`HydroNetError::ElementFailed`] this is the kind of the wrapped error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HydroNetError::Cycle { .. } => ErrorKind::Cycle,
            HydroNetError::InterfaceMismatch { .. } => ErrorKind::InterfaceMismatch,
            HydroNetError::DuplicateElement(_)
            | HydroNetError::UnknownElement { .. }
            | HydroNetError::InvalidTimeAxis(_)
            | HydroNetError::InvalidConfig(_) => ErrorKind::Configuration,
            HydroNetError::NumericalInstability { .. } => ErrorKind::NumericalInstability,
            HydroNetError::StorageUnderflow { .. } => ErrorKind::StorageUnderflow,
            HydroNetError::Convergence { .. } => ErrorKind::Convergence,
            HydroNetError::InputSource { .. } => ErrorKind::InputSource,
            HydroNetError::ElementFailed { source, .. } => source.kind(),
            HydroNetError::Error(_) | HydroNetError::NotRunnable(_) => ErrorKind::Other,
        }
    }

    /// Returns true for errors raised while assembling a network or configuration.
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Cycle | ErrorKind::InterfaceMismatch | ErrorKind::Configuration
        )
    }
}

/// Convenience type for `Result<T, HydroNetError>`.
pub type HydroNetResult<T> = Result<T, HydroNetError>;
