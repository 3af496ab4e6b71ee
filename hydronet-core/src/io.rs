//! Boundaries between a simulation run and the outside world.
//!
//! An [`InputSource`] supplies the forcing quantities (precipitation, demands, ...) an
//! element declares, an [`OutputSink`] receives the committed state and outputs of every
//! element after each step. Readers and writers for particular file formats are expected
//! to implement these traits outside of this crate.

use crate::errors::{HydroNetError, HydroNetResult};
use crate::state::{QuantityMap, State};
use crate::timeseries::{FloatValue, Time, TimeStep, Timeseries};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Supplies externally driven quantities for an element and step
pub trait InputSource: Send + Sync {
    /// Forcing values for `element` over `step`
    ///
    /// Quantities that are not returned are treated as absent.
    fn forcing(&self, element: &str, step: &TimeStep) -> HydroNetResult<QuantityMap>;
}

/// Receives the results of every committed step
pub trait OutputSink: Send {
    fn record(
        &mut self,
        element: &str,
        step: &TimeStep,
        state: &State,
        outputs: &QuantityMap,
    ) -> HydroNetResult<()>;
}

/// A single forcing quantity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Forcing {
    /// The same value for every step
    Constant(FloatValue),
    /// A step-wise series sampled at the start of each step
    Series(Timeseries),
}

impl Forcing {
    pub fn at(&self, t: Time) -> Option<FloatValue> {
        match self {
            Forcing::Constant(value) => Some(*value),
            Forcing::Series(series) => series.at_time(t),
        }
    }
}

/// In-memory forcing data keyed by element and quantity
///
/// Deserialises from a table of tables, e.g.
///
/// ```toml
/// [catchment]
/// precipitation = { time = [0.0, 2.0], values = [1.0, 4.0] }
///
/// [town]
/// demand = 0.5
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ForcingTable {
    forcings: BTreeMap<String, BTreeMap<String, Forcing>>,
}

impl ForcingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_forcing(mut self, element: &str, quantity: &str, forcing: Forcing) -> Self {
        self.insert(element, quantity, forcing);
        self
    }

    pub fn insert(&mut self, element: &str, quantity: &str, forcing: Forcing) {
        self.forcings
            .entry(element.to_string())
            .or_default()
            .insert(quantity.to_string(), forcing);
    }

    pub fn get(&self, element: &str, quantity: &str) -> Option<&Forcing> {
        self.forcings.get(element)?.get(quantity)
    }

    pub fn from_toml_str(content: &str) -> HydroNetResult<Self> {
        toml::from_str(content)
            .map_err(|e| HydroNetError::InvalidConfig(format!("invalid forcing table: {e}")))
    }
}

impl InputSource for ForcingTable {
    fn forcing(&self, element: &str, step: &TimeStep) -> HydroNetResult<QuantityMap> {
        let Some(quantities) = self.forcings.get(element) else {
            return Ok(QuantityMap::new());
        };

        quantities
            .iter()
            .map(|(name, forcing)| {
                forcing
                    .at(step.start)
                    .map(|value| (name.clone(), value))
                    .ok_or_else(|| HydroNetError::InputSource {
                        element: element.to_string(),
                        reason: format!("'{}' has no value at {}", name, step.start),
                    })
            })
            .collect()
    }
}

/// The committed result of one element for one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub element: String,
    pub step: TimeStep,
    pub state: State,
    pub outputs: QuantityMap,
}

/// Collects every record in memory
///
/// Clones share the same buffer, so a clone can be handed to a run and the original
/// inspected afterwards.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<Record>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<Record> {
        match self.records.lock() {
            Ok(records) => records.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values of a state or output quantity of an element, one per recorded step
    ///
    /// Outputs take precedence over state quantities with the same name.
    pub fn series(&self, element: &str, quantity: &str) -> Vec<(Time, FloatValue)> {
        self.records()
            .iter()
            .filter(|r| r.element == element)
            .filter_map(|r| {
                r.outputs
                    .get(quantity)
                    .copied()
                    .or_else(|| r.state.get(quantity))
                    .map(|value| (r.step.end, value))
            })
            .collect()
    }
}

impl OutputSink for MemorySink {
    fn record(
        &mut self,
        element: &str,
        step: &TimeStep,
        state: &State,
        outputs: &QuantityMap,
    ) -> HydroNetResult<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| HydroNetError::Error("memory sink lock is poisoned".to_string()))?;
        records.push(Record {
            element: element.to_string(),
            step: *step,
            state: state.clone(),
            outputs: outputs.clone(),
        });
        Ok(())
    }
}

/// Writes every record to the debug log
#[derive(Debug, Clone, Default)]
pub struct LogSink {}

impl OutputSink for LogSink {
    fn record(
        &mut self,
        element: &str,
        step: &TimeStep,
        state: &State,
        outputs: &QuantityMap,
    ) -> HydroNetResult<()> {
        log::debug!(
            "[{}] {} -> {}: state {:?}, outputs {:?}",
            step.index,
            element,
            step.end,
            state.values(),
            outputs
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn forcing_table_samples_step_start() {
        let table = ForcingTable::new()
            .with_forcing("catchment", "precipitation", Forcing::Constant(2.0))
            .with_forcing(
                "town",
                "demand",
                Forcing::Series(Timeseries::new(array![1.0, 3.0], array![0.0, 2.0]).unwrap()),
            );

        let step = TimeStep::new(2, 2.0, 3.0);
        assert_eq!(
            table.forcing("town", &step).unwrap(),
            QuantityMap::from([("demand".to_string(), 3.0)])
        );
        assert_eq!(
            table.forcing("catchment", &step).unwrap()["precipitation"],
            2.0
        );
        assert!(table.forcing("nowhere", &step).unwrap().is_empty());
    }

    #[test]
    fn missing_series_value_fails() {
        let table = ForcingTable::new().with_forcing(
            "town",
            "demand",
            Forcing::Series(Timeseries::new(array![1.0], array![5.0]).unwrap()),
        );
        let err = table
            .forcing("town", &TimeStep::new(0, 0.0, 1.0))
            .unwrap_err();
        assert!(matches!(err, HydroNetError::InputSource { .. }));
    }

    #[test]
    fn forcing_table_from_toml() {
        let table = ForcingTable::from_toml_str(
            r#"
[catchment]
precipitation = { time = [0.0, 2.0], values = [1.0, 4.0] }

[town]
demand = 0.5
"#,
        )
        .unwrap();
        assert_eq!(table.get("town", "demand"), Some(&Forcing::Constant(0.5)));
        assert_eq!(table.get("catchment", "precipitation").unwrap().at(2.5), Some(4.0));

        let invalid = ForcingTable::from_toml_str(
            "[catchment]\nprecipitation = { time = [1.0, 0.0], values = [1.0, 4.0] }\n",
        );
        assert!(invalid.is_err());
    }

    #[test]
    fn memory_sink_shares_records() {
        let sink = MemorySink::new();
        let mut handle = sink.clone();
        let step = TimeStep::new(0, 0.0, 1.0);
        handle
            .record(
                "reach",
                &step,
                &State::new(1.0).with("storage", 4.0),
                &QuantityMap::from([("q".to_string(), 2.0)]),
            )
            .unwrap();

        assert_eq!(sink.len(), 1);
        assert_eq!(sink.series("reach", "storage"), vec![(1.0, 4.0)]);
        assert_eq!(sink.series("reach", "q"), vec![(1.0, 2.0)]);
        assert!(sink.series("other", "q").is_empty());
    }
}
