use crate::errors::{ErrorKind, HydroNetError};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Why a run stopped early
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFailure {
    pub kind: ErrorKind,
    /// The element whose evaluation failed, if the failure is tied to one
    pub element: Option<String>,
    pub step_index: Option<usize>,
    pub message: String,
}

impl RunFailure {
    pub fn from_error(error: &HydroNetError) -> Self {
        match error {
            HydroNetError::ElementFailed {
                element,
                step_index,
                source,
            } => Self {
                kind: error.kind(),
                element: Some(element.clone()),
                step_index: Some(*step_index),
                message: source.to_string(),
            },
            _ => Self {
                kind: error.kind(),
                element: None,
                step_index: None,
                message: error.to_string(),
            },
        }
    }
}

impl Display for RunFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(element) = &self.element {
            write!(f, " in '{}'", element)?;
        }
        if let Some(step_index) = self.step_index {
            write!(f, " at step {}", step_index)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Where a run is in its lifecycle
///
/// `Idle -> Running -> Completed | Failed | Cancelled`. The last three are terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SchedulerState {
    Idle,
    Running,
    Completed,
    Failed(RunFailure),
    Cancelled,
}

impl SchedulerState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SchedulerState::Completed | SchedulerState::Failed(_) | SchedulerState::Cancelled
        )
    }
}

impl Display for SchedulerState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SchedulerState::Idle => write!(f, "idle"),
            SchedulerState::Running => write!(f, "running"),
            SchedulerState::Completed => write!(f, "completed"),
            SchedulerState::Failed(failure) => write!(f, "failed ({})", failure),
            SchedulerState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Outcome of [`super::SimulationRun::run`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunStatus {
    Completed,
    Failed(RunFailure),
    Cancelled,
}

impl Display for RunStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "Completed"),
            RunStatus::Failed(failure) => write!(f, "Failed: {}", failure),
            RunStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}
