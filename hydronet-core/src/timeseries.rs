//! Time representation for simulations.
//!
//! A [`TimeAxis`] describes the contiguous, non-overlapping steps a simulation advances
//! through. Each step is handed to process models as a [`TimeStep`].
//! [`Timeseries`] holds externally supplied data that is sampled at the start of a step.

use crate::errors::{HydroNetError, HydroNetResult};
use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

pub type FloatValue = f64;
pub type Time = f64;

/// One discrete interval of the simulation horizon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeStep {
    /// Position of the step within its time axis
    pub index: usize,
    pub start: Time,
    pub end: Time,
}

impl TimeStep {
    pub fn new(index: usize, start: Time, end: Time) -> Self {
        Self { index, start, end }
    }

    pub fn duration(&self) -> Time {
        self.end - self.start
    }
}

/// The ordered boundaries of every step in a simulation.
///
/// A time axis with `n` steps holds `n + 1` strictly increasing bounds.
/// Step `i` covers `[bounds[i], bounds[i + 1])`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeAxis {
    bounds: Array1<Time>,
}

fn check_bounds(bounds: &Array1<Time>) -> HydroNetResult<()> {
    if bounds.len() < 2 {
        return Err(HydroNetError::InvalidTimeAxis(
            "at least two bounds are required to define a step".to_string(),
        ));
    }
    if let Some(value) = bounds.iter().find(|v| !v.is_finite()) {
        return Err(HydroNetError::InvalidTimeAxis(format!(
            "bound {value} is not finite"
        )));
    }
    for window in bounds.windows(2) {
        if window[1] <= window[0] {
            return Err(HydroNetError::InvalidTimeAxis(format!(
                "bounds must be strictly increasing, found {} followed by {}",
                window[0], window[1]
            )));
        }
    }
    Ok(())
}

impl TimeAxis {
    /// Create a time axis from explicit step bounds
    ///
    /// Step durations may differ between steps.
    pub fn from_bounds(bounds: Array1<Time>) -> HydroNetResult<Self> {
        check_bounds(&bounds)?;
        Ok(Self { bounds })
    }

    /// Create a time axis from the start instants of each step
    ///
    /// The final step is assumed to have the same duration as the step before it.
    pub fn from_values(values: Array1<Time>) -> HydroNetResult<Self> {
        let n = values.len();
        if n < 2 {
            return Err(HydroNetError::InvalidTimeAxis(
                "at least two values are required to infer the final step".to_string(),
            ));
        }
        let last_step = values[n - 1] - values[n - 2];
        let mut bounds = values.to_vec();
        bounds.push(values[n - 1] + last_step);
        Self::from_bounds(Array1::from(bounds))
    }

    /// Create a time axis of fixed-duration steps covering `[start, end]`
    ///
    /// If the horizon is not a whole multiple of `step`, the final step is shortened
    /// so that the axis ends exactly at `end`.
    pub fn fixed(start: Time, end: Time, step: Time) -> HydroNetResult<Self> {
        if !step.is_finite() || step <= 0.0 {
            return Err(HydroNetError::InvalidTimeAxis(format!(
                "step duration must be positive, got {step}"
            )));
        }
        if !start.is_finite() || !end.is_finite() || end <= start {
            return Err(HydroNetError::InvalidTimeAxis(format!(
                "end ({end}) must be after start ({start})"
            )));
        }

        // Absorb floating point noise so that e.g. 0.3 / 0.1 gives 3 steps
        let n_steps = ((end - start) / step - 1e-9).ceil().max(1.0) as usize;
        let mut bounds: Vec<Time> = (0..n_steps).map(|i| start + i as Time * step).collect();
        bounds.push(end);
        Self::from_bounds(Array1::from(bounds))
    }

    /// Number of steps on the axis
    pub fn len(&self) -> usize {
        self.bounds.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn start(&self) -> Time {
        self.bounds[0]
    }

    pub fn end(&self) -> Time {
        self.bounds[self.bounds.len() - 1]
    }

    pub fn bounds(&self) -> ArrayView1<'_, Time> {
        self.bounds.view()
    }

    /// Start instant of the step at `index`
    pub fn at(&self, index: usize) -> Option<Time> {
        if index < self.len() {
            Some(self.bounds[index])
        } else {
            None
        }
    }

    pub fn at_bounds(&self, index: usize) -> Option<(Time, Time)> {
        if index < self.len() {
            Some((self.bounds[index], self.bounds[index + 1]))
        } else {
            None
        }
    }

    pub fn step(&self, index: usize) -> Option<TimeStep> {
        self.at_bounds(index)
            .map(|(start, end)| TimeStep::new(index, start, end))
    }

    pub fn steps(&self) -> impl Iterator<Item = TimeStep> + '_ {
        (0..self.len()).filter_map(|index| self.step(index))
    }

    /// Index of the step containing `t`
    pub fn index_of(&self, t: Time) -> Option<usize> {
        if t < self.start() || t >= self.end() {
            return None;
        }
        self.bounds
            .windows(2)
            .into_iter()
            .position(|w| w[0] <= t && t < w[1])
    }

    /// True if every step has the same duration
    pub fn is_uniform(&self) -> bool {
        let first = self.bounds[1] - self.bounds[0];
        self.bounds
            .windows(2)
            .into_iter()
            .all(|w| ((w[1] - w[0]) - first).abs() <= 1e-9 * first.abs().max(1.0))
    }
}

/// A series of values at strictly increasing time points.
///
/// Values are held constant until the next time point (previous-value interpolation),
/// which matches how externally driven quantities such as precipitation totals are
/// usually reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TimeseriesRepr", into = "TimeseriesRepr")]
pub struct Timeseries {
    time: Array1<Time>,
    values: Array1<FloatValue>,
}

/// Plain-list form used in configuration files
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TimeseriesRepr {
    time: Vec<Time>,
    values: Vec<FloatValue>,
}

impl TryFrom<TimeseriesRepr> for Timeseries {
    type Error = HydroNetError;

    fn try_from(repr: TimeseriesRepr) -> Result<Self, Self::Error> {
        Timeseries::new(Array1::from(repr.values), Array1::from(repr.time))
    }
}

impl From<Timeseries> for TimeseriesRepr {
    fn from(ts: Timeseries) -> Self {
        Self {
            time: ts.time.to_vec(),
            values: ts.values.to_vec(),
        }
    }
}

impl Timeseries {
    pub fn new(values: Array1<FloatValue>, time: Array1<Time>) -> HydroNetResult<Self> {
        if values.len() != time.len() {
            return Err(HydroNetError::InvalidConfig(format!(
                "timeseries has {} values but {} time points",
                values.len(),
                time.len()
            )));
        }
        if time.is_empty() {
            return Err(HydroNetError::InvalidConfig(
                "timeseries must contain at least one value".to_string(),
            ));
        }
        for window in time.windows(2) {
            if window[1] <= window[0] {
                return Err(HydroNetError::InvalidConfig(format!(
                    "timeseries time points must be strictly increasing, found {} followed by {}",
                    window[0], window[1]
                )));
            }
        }
        Ok(Self { time, values })
    }

    /// Create a timeseries aligned with the starts of each step on a time axis
    pub fn on_axis(values: Array1<FloatValue>, time_axis: &TimeAxis) -> HydroNetResult<Self> {
        let starts = time_axis.bounds().slice(ndarray::s![..-1]).to_owned();
        Self::new(values, starts)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> ArrayView1<'_, FloatValue> {
        self.values.view()
    }

    pub fn time(&self) -> ArrayView1<'_, Time> {
        self.time.view()
    }

    /// Value in effect at `t`
    ///
    /// Returns `None` before the first time point.
    pub fn at_time(&self, t: Time) -> Option<FloatValue> {
        let position = self.time.iter().rposition(|&ti| ti <= t)?;
        Some(self.values[position])
    }
}
