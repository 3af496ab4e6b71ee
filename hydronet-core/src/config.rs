//! Run configuration and declarative network descriptions.
//!
//! Both are plain serde structures so they can be read from TOML files. Everything is
//! validated when a run is prepared, before the first step.

use crate::element::{Deploy, Element};
use crate::errors::{HydroNetError, HydroNetResult};
use crate::integrator::Integrator;
use crate::network::Network;
use crate::process::ProcessModel;
use crate::state::QuantityMap;
use crate::timeseries::{FloatValue, Time, TimeAxis};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

fn default_tolerance() -> FloatValue {
    Integrator::default().tolerance
}

fn default_min_substep() -> Time {
    Integrator::default().min_substep
}

/// Settings of a single simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    pub start: Time,
    pub end: Time,
    /// Nominal step duration
    ///
    /// Required unless explicit `bounds` are given.
    #[serde(default)]
    pub step: Option<Time>,
    /// Explicit step bounds for variable step durations
    ///
    /// Must begin at `start` and finish at `end`.
    #[serde(default)]
    pub bounds: Option<Vec<Time>>,
    #[serde(default = "default_tolerance")]
    pub tolerance: FloatValue,
    #[serde(default = "default_min_substep")]
    pub min_substep: Time,
    /// Evaluate independent elements of a layer concurrently
    #[serde(default)]
    pub parallel: bool,
    /// Initial state quantities per element, overriding each model's defaults
    #[serde(default)]
    pub initial_states: BTreeMap<String, QuantityMap>,
}

impl SimulationConfig {
    pub fn new(start: Time, end: Time, step: Time) -> Self {
        Self {
            start,
            end,
            step: Some(step),
            bounds: None,
            tolerance: default_tolerance(),
            min_substep: default_min_substep(),
            parallel: false,
            initial_states: BTreeMap::new(),
        }
    }

    pub fn with_bounds(mut self, bounds: Vec<Time>) -> Self {
        self.bounds = Some(bounds);
        self
    }

    pub fn with_tolerance(mut self, tolerance: FloatValue) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_min_substep(mut self, min_substep: Time) -> Self {
        self.min_substep = min_substep;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_initial_value(mut self, element: &str, quantity: &str, value: FloatValue) -> Self {
        self.initial_states
            .entry(element.to_string())
            .or_default()
            .insert(quantity.to_string(), value);
        self
    }

    pub fn from_toml_str(content: &str) -> HydroNetResult<Self> {
        toml::from_str(content)
            .map_err(|e| HydroNetError::InvalidConfig(format!("invalid simulation config: {e}")))
    }

    /// The time axis the run advances through
    pub fn time_axis(&self) -> HydroNetResult<TimeAxis> {
        match (&self.bounds, self.step) {
            (Some(bounds), _) => {
                let axis = TimeAxis::from_bounds(Array1::from(bounds.clone()))?;
                if axis.start() != self.start || axis.end() != self.end {
                    return Err(HydroNetError::InvalidTimeAxis(format!(
                        "bounds cover [{}, {}] but the run is configured for [{}, {}]",
                        axis.start(),
                        axis.end(),
                        self.start,
                        self.end
                    )));
                }
                Ok(axis)
            }
            (None, Some(step)) => TimeAxis::fixed(self.start, self.end, step),
            (None, None) => Err(HydroNetError::InvalidConfig(
                "either a step duration or explicit bounds are required".to_string(),
            )),
        }
    }

    pub fn integrator(&self) -> HydroNetResult<Integrator> {
        Integrator::new(self.tolerance, self.min_substep)
    }
}

/// Declarative description of one element
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ElementSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// Values passed on to consumers: `newsim` (default), `obs` or `oldsim`
    #[serde(default)]
    pub deploy: Deploy,
    pub model: Box<dyn ProcessModel>,
}

/// Declarative description of a link between two elements
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkSpec {
    pub from: String,
    pub to: String,
}

/// Declarative description of a network
///
/// ```toml
/// [[elements]]
/// name = "headwater"
/// model = { type = "ConstantInflow", q = 10.0 }
///
/// [[elements]]
/// name = "reservoir"
/// keywords = ["storage"]
/// model = { type = "LinearReservoir", k = 0.1 }
///
/// [[links]]
/// from = "headwater"
/// to = "reservoir"
/// ```
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NetworkSpec {
    #[serde(default)]
    pub elements: Vec<ElementSpec>,
    #[serde(default)]
    pub links: Vec<LinkSpec>,
}

impl NetworkSpec {
    pub fn from_toml_str(content: &str) -> HydroNetResult<Self> {
        toml::from_str(content)
            .map_err(|e| HydroNetError::InvalidConfig(format!("invalid network description: {e}")))
    }

    /// Validate the description and build the network
    pub fn into_network(self) -> HydroNetResult<Network> {
        let elements = self
            .elements
            .into_iter()
            .map(|spec| {
                Element::new(&spec.name, Arc::from(spec.model))
                    .with_keywords(spec.keywords)
                    .with_deploy(spec.deploy)
            })
            .collect();
        Network::build(elements, self.links.into_iter().map(|l| (l.from, l.to)))
    }
}
