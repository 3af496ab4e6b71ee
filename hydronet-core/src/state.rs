use crate::errors::{HydroNetError, HydroNetResult};
use crate::timeseries::{FloatValue, Time};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named quantities exchanged between elements
///
/// Ordered by name so that iteration (and therefore floating point summation) is
/// deterministic.
pub type QuantityMap = BTreeMap<String, FloatValue>;

/// Add every value in `source` onto the matching entry of `target`
///
/// Missing entries start at zero. This is how the contributions of several producers
/// are combined before they reach a consumer.
pub fn accumulate(target: &mut QuantityMap, source: &QuantityMap) {
    for (name, value) in source {
        *target.entry(name.clone()).or_insert(0.0) += value;
    }
}

/// The physical quantities of a single element at a single instant
///
/// Holds storages and any other quantities a process model needs to carry from one
/// step into the next.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct State {
    time: Time,
    values: QuantityMap,
}

impl State {
    pub fn new(time: Time) -> Self {
        Self {
            time,
            values: QuantityMap::new(),
        }
    }

    pub fn from_values<I, K>(time: Time, values: I) -> Self
    where
        I: IntoIterator<Item = (K, FloatValue)>,
        K: Into<String>,
    {
        Self {
            time,
            values: values.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Builder-style setter
    pub fn with(mut self, name: &str, value: FloatValue) -> Self {
        self.set(name, value);
        self
    }

    /// The instant the state is valid for
    pub fn time(&self) -> Time {
        self.time
    }

    pub fn set_time(&mut self, time: Time) {
        self.time = time;
    }

    pub fn get(&self, name: &str) -> Option<FloatValue> {
        self.values.get(name).copied()
    }

    pub fn get_or(&self, name: &str, default: FloatValue) -> FloatValue {
        self.get(name).unwrap_or(default)
    }

    /// Get a value that must be present
    pub fn require(&self, name: &str) -> HydroNetResult<FloatValue> {
        self.get(name).ok_or_else(|| {
            HydroNetError::Error(format!("State has no quantity named '{}'", name))
        })
    }

    pub fn set(&mut self, name: &str, value: FloatValue) {
        self.values.insert(name.to_string(), value);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FloatValue)> {
        self.values.iter()
    }

    pub fn values(&self) -> &QuantityMap {
        &self.values
    }

    /// Pack the named quantities into a vector for integration
    ///
    /// Missing quantities are packed as zero.
    pub fn to_vector(&self, names: &[&str]) -> DVector<FloatValue> {
        DVector::from_iterator(names.len(), names.iter().map(|n| self.get_or(n, 0.0)))
    }

    /// Overwrite the named quantities with the entries of `vector`
    pub fn update_from_vector(&mut self, names: &[&str], vector: &DVector<FloatValue>) {
        for (name, value) in names.iter().zip(vector.iter()) {
            self.set(name, *value);
        }
    }
}
