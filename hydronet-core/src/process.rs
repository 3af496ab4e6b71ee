//! The pluggable update rule attached to every element.

use crate::errors::HydroNetResult;
use crate::integrator::Integrator;
use crate::state::{QuantityMap, State};
use crate::timeseries::{Time, TimeStep};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// How a quantity is exchanged with the rest of the network
#[derive(Debug, Eq, PartialEq, Clone, Copy, Hash, Serialize, Deserialize)]
pub enum QuantityKind {
    /// Supplied by upstream producers in the current step
    Input,
    /// Supplied by the run's input source
    Forcing,
    /// Exposed to downstream consumers
    Output,
    /// Carried from one step to the next
    State,
}

/// Declaration of a single quantity used by a process model
#[derive(Debug, Eq, PartialEq, Clone, Hash, Serialize, Deserialize)]
pub struct QuantityDefinition {
    pub name: String,
    pub unit: String,
    pub kind: QuantityKind,
    /// Quantities that are not signed must never become negative
    #[serde(default)]
    pub signed: bool,
}

impl QuantityDefinition {
    pub fn new(name: &str, unit: &str, kind: QuantityKind) -> Self {
        Self {
            name: name.to_string(),
            unit: unit.to_string(),
            kind,
            signed: false,
        }
    }

    pub fn input(name: &str, unit: &str) -> Self {
        Self::new(name, unit, QuantityKind::Input)
    }

    pub fn forcing(name: &str, unit: &str) -> Self {
        Self::new(name, unit, QuantityKind::Forcing)
    }

    pub fn output(name: &str, unit: &str) -> Self {
        Self::new(name, unit, QuantityKind::Output)
    }

    pub fn state(name: &str, unit: &str) -> Self {
        Self::new(name, unit, QuantityKind::State)
    }

    /// Allow the quantity to take negative values
    pub fn signed(self) -> Self {
        Self {
            signed: true,
            ..self
        }
    }
}

/// Everything a process model may know about the step it is advancing over
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub step: TimeStep,
    pub integrator: &'a Integrator,
}

impl<'a> StepContext<'a> {
    pub fn new(step: TimeStep, integrator: &'a Integrator) -> Self {
        Self { step, integrator }
    }

    pub fn start(&self) -> Time {
        self.step.start
    }

    pub fn end(&self) -> Time {
        self.step.end
    }

    pub fn duration(&self) -> Time {
        self.step.duration()
    }
}

/// The result of advancing a process model over one step
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelOutput {
    /// State valid at the end of the step
    pub state: State,
    /// Values made available to downstream consumers for this step
    pub outputs: QuantityMap,
}

impl ModelOutput {
    pub fn new(state: State, outputs: QuantityMap) -> Self {
        Self { state, outputs }
    }
}

/// A per-element update rule
///
/// Implementations are registered with `typetag` under their type name so that a network
/// can be described in a configuration file, e.g.
///
/// ```toml
/// [elements.model]
/// type = "LinearReservoir"
/// k = 0.2
/// ```
///
/// A process model holds only parameters. The state it advances is owned by the
/// simulation run and handed in as a shared borrow; the model returns a new state rather
/// than mutating the old one, so a failed step leaves the previous state untouched.
#[typetag::serde(tag = "type")]
pub trait ProcessModel: Debug + Send + Sync {
    /// Declare every quantity the model reads, writes or carries
    fn definitions(&self) -> Vec<QuantityDefinition>;

    /// Check the model's parameters
    ///
    /// Called for every element when a network is built, so invalid parameters are
    /// reported as `InvalidConfig` before any step is taken.
    fn validate(&self) -> HydroNetResult<()> {
        Ok(())
    }

    /// Advance the model over the step described by `ctx`
    ///
    /// `upstream` contains the summed outputs of every producer feeding this element in
    /// the current step plus any forcings, restricted to declared inputs and forcings.
    /// Quantities with no producer and no forcing are absent.
    fn advance(
        &self,
        state: &State,
        ctx: &StepContext,
        upstream: &QuantityMap,
    ) -> HydroNetResult<ModelOutput>;

    /// State used when no initial condition is configured
    fn initial_state(&self, time: Time) -> State {
        State::from_values(time, self.state_names().into_iter().map(|name| (name, 0.0)))
    }

    fn names_of(&self, kind: QuantityKind) -> Vec<String> {
        self.definitions()
            .into_iter()
            .filter(|d| d.kind == kind)
            .map(|d| d.name)
            .collect()
    }

    fn inputs(&self) -> Vec<String> {
        self.names_of(QuantityKind::Input)
    }

    fn forcings(&self) -> Vec<String> {
        self.names_of(QuantityKind::Forcing)
    }

    fn outputs(&self) -> Vec<String> {
        self.names_of(QuantityKind::Output)
    }

    fn state_names(&self) -> Vec<String> {
        self.names_of(QuantityKind::State)
    }

    /// Whether a declared quantity may be negative
    ///
    /// Undeclared quantities are treated as non-negative.
    fn is_signed(&self, name: &str) -> bool {
        self.definitions()
            .iter()
            .any(|d| d.name == name && d.signed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::example_models::Store;

    #[test]
    fn definitions_by_kind() {
        let model = Store::default();
        assert_eq!(model.inputs(), vec!["q".to_string()]);
        assert_eq!(model.outputs(), vec!["q".to_string()]);
        assert_eq!(model.state_names(), vec!["storage".to_string()]);
        assert!(model.forcings().is_empty());
        assert!(!model.is_signed("storage"));
    }

    #[test]
    fn default_initial_state_is_zero() {
        let state = Store::default().initial_state(10.0);
        assert_eq!(state.time(), 10.0);
        assert_eq!(state.get("storage"), Some(0.0));
        assert_eq!(state.len(), 1);
    }

    #[test]
    fn signed_definition() {
        let def = QuantityDefinition::state("level", "m").signed();
        assert!(def.signed);
        assert_eq!(def.kind, QuantityKind::State);
    }

    #[test]
    fn serialise_trait_object() {
        let model: Box<dyn ProcessModel> = Box::new(Store::default());
        let serialised = serde_json::to_string(&model).unwrap();
        assert_eq!(serialised, r#"{"type":"Store","release":0.0}"#);

        let restored: Box<dyn ProcessModel> = serde_json::from_str(&serialised).unwrap();
        assert_eq!(restored.definitions(), model.definitions());
    }
}
