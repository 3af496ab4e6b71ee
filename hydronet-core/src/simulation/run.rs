//! The time-step scheduler.

use super::cancel::CancelToken;
use super::checks::check_model_output;
use super::status::{RunFailure, RunStatus, SchedulerState};
use crate::config::SimulationConfig;
use crate::element::Deploy;
use crate::errors::{HydroNetError, HydroNetResult};
use crate::integrator::Integrator;
use crate::io::{InputSource, OutputSink};
use crate::network::Network;
use crate::process::{ModelOutput, StepContext};
use crate::state::{accumulate, QuantityMap, State};
use crate::timeseries::{Time, TimeAxis, TimeStep};
use log::{debug, error, info, warn};
use petgraph::graph::NodeIndex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Advance a single element and check the result
///
/// Free of any reference to the run itself so it can be called from worker threads.
fn advance_element(
    network: &Network,
    states: &[State],
    index: NodeIndex,
    ctx: &StepContext,
    upstream: &QuantityMap,
) -> HydroNetResult<ModelOutput> {
    let element = network.node(index);
    let previous = &states[index.index()];

    let mut output = element
        .model()
        .advance(previous, ctx, upstream)
        .and_then(|output| {
            check_model_output(element.model(), previous, &output)?;
            Ok(output)
        })
        .map_err(|err| HydroNetError::ElementFailed {
            element: element.name().to_string(),
            step_index: ctx.step.index,
            source: Box::new(err),
        })?;
    output.state.set_time(ctx.end());
    Ok(output)
}

/// A single simulation of a network over a time axis
///
/// The run owns the state of every element. States are only replaced once every element
/// has been advanced successfully over a step, so after a failure the states of the last
/// complete step remain available for inspection.
pub struct SimulationRun {
    network: Arc<Network>,
    time_axis: TimeAxis,
    integrator: Integrator,
    parallel: bool,
    /// Indexed by the node index of each element
    states: Vec<State>,
    /// Outputs of the last committed step
    outputs: Vec<QuantityMap>,
    step_index: usize,
    status: SchedulerState,
    input: Option<Box<dyn InputSource>>,
    sinks: Vec<Box<dyn OutputSink>>,
    cancel: CancelToken,
}

impl SimulationRun {
    /// Prepare a run, initialising every element's state
    ///
    /// Configured initial values must refer to existing elements and declared state
    /// quantities, be finite and be non-negative unless the quantity is signed.
    pub fn new(network: Arc<Network>, config: &SimulationConfig) -> HydroNetResult<Self> {
        let time_axis = config.time_axis()?;
        let integrator = config.integrator()?;

        let mut states: Vec<State> = network
            .graph()
            .node_weights()
            .map(|element| element.model().initial_state(time_axis.start()))
            .collect();

        for (name, values) in &config.initial_states {
            let index = network.index_of(name).ok_or_else(|| {
                HydroNetError::InvalidConfig(format!(
                    "initial state given for unknown element '{}'",
                    name
                ))
            })?;
            let model = network.node(index).model();
            let declared: BTreeSet<String> = model.state_names().into_iter().collect();

            for (quantity, value) in values {
                if !declared.contains(quantity) {
                    return Err(HydroNetError::InvalidConfig(format!(
                        "element '{}' has no state quantity '{}'",
                        name, quantity
                    )));
                }
                if !value.is_finite() || (*value < 0.0 && !model.is_signed(quantity)) {
                    return Err(HydroNetError::InvalidConfig(format!(
                        "invalid initial value {} for '{}' of element '{}'",
                        value, quantity, name
                    )));
                }
                states[index.index()].set(quantity, *value);
            }
        }

        let n = network.len();
        Ok(Self {
            network,
            time_axis,
            integrator,
            parallel: config.parallel,
            states,
            outputs: vec![QuantityMap::new(); n],
            step_index: 0,
            status: SchedulerState::Idle,
            input: None,
            sinks: vec![],
            cancel: CancelToken::new(),
        })
    }

    pub fn with_input_source(mut self, input: Box<dyn InputSource>) -> Self {
        self.input = Some(input);
        self
    }

    pub fn with_sink(mut self, sink: Box<dyn OutputSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    /// A handle that cancels this run when triggered
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn time_axis(&self) -> &TimeAxis {
        &self.time_axis
    }

    pub fn integrator(&self) -> &Integrator {
        &self.integrator
    }

    pub fn status(&self) -> &SchedulerState {
        &self.status
    }

    /// Number of committed steps
    pub fn step_index(&self) -> usize {
        self.step_index
    }

    /// The instant the current states are valid for
    pub fn current_time(&self) -> Time {
        self.time_axis.bounds()[self.step_index]
    }

    pub fn finished(&self) -> bool {
        self.step_index >= self.time_axis.len()
    }

    pub fn state(&self, element: &str) -> Option<&State> {
        self.network
            .index_of(element)
            .map(|index| &self.states[index.index()])
    }

    /// Outputs of `element` in the last committed step
    pub fn outputs(&self, element: &str) -> Option<&QuantityMap> {
        self.network
            .index_of(element)
            .map(|index| &self.outputs[index.index()])
    }

    /// Current state of every element in insertion order
    pub fn states(&self) -> impl Iterator<Item = (&str, &State)> + '_ {
        self.network
            .elements()
            .zip(self.states.iter())
            .map(|(element, state)| (element.name(), state))
    }

    /// Copy of the current state of every element keyed by name
    pub fn snapshot(&self) -> BTreeMap<String, State> {
        self.states()
            .map(|(name, state)| (name.to_string(), state.clone()))
            .collect()
    }

    /// Advance every element over the next time step
    ///
    /// Any failure moves the run into [`SchedulerState::Failed`] without touching the
    /// committed states. Stepping a run that has already terminated is an error.
    pub fn step(&mut self) -> HydroNetResult<()> {
        match &self.status {
            SchedulerState::Idle => {
                info!(
                    "Starting run of {} elements over {} steps ({} to {})",
                    self.network.len(),
                    self.time_axis.len(),
                    self.time_axis.start(),
                    self.time_axis.end()
                );
                self.status = SchedulerState::Running;
            }
            SchedulerState::Running => {}
            terminal => {
                return Err(HydroNetError::NotRunnable(format!("the run is {}", terminal)));
            }
        }

        let step = self.time_axis.step(self.step_index).ok_or_else(|| {
            HydroNetError::NotRunnable(format!("no step with index {}", self.step_index))
        })?;
        debug!("Step {}: {} -> {}", step.index, step.start, step.end);

        let evaluated = if self.parallel {
            self.evaluate_layers(&step)
        } else {
            self.evaluate_sequential(&step)
        };

        match evaluated {
            Ok((states, outputs)) => {
                self.commit(&step, states, outputs);
                Ok(())
            }
            Err(err) => {
                error!("Run failed: {}", err);
                self.status = SchedulerState::Failed(RunFailure::from_error(&err));
                Err(err)
            }
        }
    }

    /// Step until the end of the time axis, a failure or cancellation
    ///
    /// Cancellation is checked before every step.
    pub fn run(&mut self) -> RunStatus {
        loop {
            match &self.status {
                SchedulerState::Completed => return RunStatus::Completed,
                SchedulerState::Failed(failure) => return RunStatus::Failed(failure.clone()),
                SchedulerState::Cancelled => return RunStatus::Cancelled,
                SchedulerState::Idle | SchedulerState::Running => {}
            }

            if self.cancel.is_cancelled() {
                info!(
                    "Run cancelled after {} of {} steps",
                    self.step_index,
                    self.time_axis.len()
                );
                self.status = SchedulerState::Cancelled;
                continue;
            }
            if let Err(err) = self.step() {
                if !self.status.is_terminal() {
                    self.status = SchedulerState::Failed(RunFailure::from_error(&err));
                }
            }
        }
    }

    /// Values from the input source standing in for the outputs of an element
    ///
    /// Every declared output must be supplied with a finite value.
    fn external_outputs(&self, index: NodeIndex, step: &TimeStep) -> HydroNetResult<QuantityMap> {
        let element = self.network.node(index);
        let wrap = |source: HydroNetError| HydroNetError::ElementFailed {
            element: element.name().to_string(),
            step_index: step.index,
            source: Box::new(source),
        };
        let missing = |reason: String| {
            wrap(HydroNetError::InputSource {
                element: element.name().to_string(),
                reason,
            })
        };

        let input = self.input.as_ref().ok_or_else(|| {
            missing(format!(
                "deploy mode '{}' requires an input source",
                element.deploy()
            ))
        })?;
        let mut supplied = input.forcing(element.name(), step).map_err(&wrap)?;

        element
            .model()
            .outputs()
            .into_iter()
            .map(|name| match supplied.remove(&name) {
                Some(value) if value.is_finite() => Ok((name, value)),
                Some(value) => Err(missing(format!(
                    "external value {} for output '{}' is not finite",
                    value, name
                ))),
                None => Err(missing(format!("no external value for output '{}'", name))),
            })
            .collect()
    }

    /// Outputs staged for an element after it has been advanced
    ///
    /// An element in `oldsim` mode stages the external values in place of its own.
    fn staged(
        &self,
        index: NodeIndex,
        simulated: QuantityMap,
        step: &TimeStep,
    ) -> HydroNetResult<QuantityMap> {
        match self.network.node(index).deploy() {
            Deploy::OldSim => self.external_outputs(index, step),
            Deploy::NewSim | Deploy::Obs => Ok(simulated),
        }
    }

    /// Summed producer outputs and forcings for a single element
    ///
    /// Only quantities the element declares as inputs or forcings are passed on. A
    /// producer in `obs` mode contributes its external values instead of its staged
    /// outputs. An element in `obs` or `oldsim` mode is not fed its own external values.
    fn gather(
        &self,
        index: NodeIndex,
        staged_outputs: &[QuantityMap],
        step: &TimeStep,
    ) -> HydroNetResult<QuantityMap> {
        let element = self.network.node(index);
        let model = element.model();
        let inputs: BTreeSet<String> = model.inputs().into_iter().collect();
        let mut accepted: BTreeSet<String> = inputs
            .iter()
            .cloned()
            .chain(model.forcings())
            .collect();
        if element.deploy().is_external() {
            // The element's own outputs in the input source are its external values
            let forcings: BTreeSet<String> = model.forcings().into_iter().collect();
            for output in model.outputs() {
                if !forcings.contains(&output) {
                    accepted.remove(&output);
                }
            }
        }

        let mut upstream = QuantityMap::new();
        for producer in self.network.upstream_indices(index) {
            let observed;
            let outputs = if self.network.node(producer).deploy() == Deploy::Obs {
                observed = self.external_outputs(producer, step)?;
                &observed
            } else {
                &staged_outputs[producer.index()]
            };
            let provided: QuantityMap = outputs
                .iter()
                .filter(|(name, _)| inputs.contains(*name))
                .map(|(name, value)| (name.clone(), *value))
                .collect();
            accumulate(&mut upstream, &provided);
        }

        if let Some(input) = self.input.as_ref().filter(|_| !accepted.is_empty()) {
            let forcing: QuantityMap = input
                .forcing(element.name(), step)
                .map_err(|err| HydroNetError::ElementFailed {
                    element: element.name().to_string(),
                    step_index: step.index,
                    source: Box::new(err),
                })?
                .into_iter()
                .filter(|(name, _)| accepted.contains(name))
                .collect();
            accumulate(&mut upstream, &forcing);
        }
        Ok(upstream)
    }

    fn evaluate_sequential(
        &self,
        step: &TimeStep,
    ) -> HydroNetResult<(Vec<State>, Vec<QuantityMap>)> {
        let ctx = StepContext::new(*step, &self.integrator);
        let mut staged_states = self.states.clone();
        let mut staged_outputs = vec![QuantityMap::new(); self.network.len()];

        for index in self.network.evaluation_indices() {
            let upstream = self.gather(*index, &staged_outputs, step)?;
            let output = advance_element(&self.network, &self.states, *index, &ctx, &upstream)?;
            staged_states[index.index()] = output.state;
            staged_outputs[index.index()] = self.staged(*index, output.outputs, step)?;
        }
        Ok((staged_states, staged_outputs))
    }

    /// Evaluate one topological layer at a time, the elements of a layer concurrently
    ///
    /// Every element of a layer only reads outputs of earlier layers, so the results
    /// match sequential evaluation exactly.
    fn evaluate_layers(
        &self,
        step: &TimeStep,
    ) -> HydroNetResult<(Vec<State>, Vec<QuantityMap>)> {
        let ctx = StepContext::new(*step, &self.integrator);
        let mut staged_states = self.states.clone();
        let mut staged_outputs = vec![QuantityMap::new(); self.network.len()];

        for layer in self.network.layers() {
            let upstreams = layer
                .iter()
                .map(|index| self.gather(*index, &staged_outputs, step))
                .collect::<HydroNetResult<Vec<QuantityMap>>>()?;

            let results: Vec<HydroNetResult<ModelOutput>> = if layer.len() == 1 {
                vec![advance_element(
                    &self.network,
                    &self.states,
                    layer[0],
                    &ctx,
                    &upstreams[0],
                )]
            } else {
                let network: &Network = &self.network;
                let states: &[State] = &self.states;
                let ctx = &ctx;
                std::thread::scope(|scope| {
                    let handles: Vec<_> = layer
                        .iter()
                        .zip(upstreams.iter())
                        .map(|(index, upstream)| {
                            scope.spawn(move || {
                                advance_element(network, states, *index, ctx, upstream)
                            })
                        })
                        .collect();
                    handles
                        .into_iter()
                        .zip(layer.iter())
                        .map(|(handle, index)| {
                            handle.join().unwrap_or_else(|_| {
                                Err(HydroNetError::ElementFailed {
                                    element: network.node(*index).name().to_string(),
                                    step_index: ctx.step.index,
                                    source: Box::new(HydroNetError::Error(
                                        "process model panicked".to_string(),
                                    )),
                                })
                            })
                        })
                        .collect()
                })
            };

            // Report the first failure in layer order
            for (index, result) in layer.iter().zip(results) {
                let output = result?;
                staged_states[index.index()] = output.state;
                staged_outputs[index.index()] = self.staged(*index, output.outputs, step)?;
            }
        }
        Ok((staged_states, staged_outputs))
    }

    fn commit(&mut self, step: &TimeStep, states: Vec<State>, outputs: Vec<QuantityMap>) {
        self.states = states;
        self.outputs = outputs;

        for sink in self.sinks.iter_mut() {
            for index in self.network.evaluation_indices() {
                let element = self.network.node(*index);
                if let Err(err) = sink.record(
                    element.name(),
                    step,
                    &self.states[index.index()],
                    &self.outputs[index.index()],
                ) {
                    warn!(
                        "Output sink failed to record '{}' at step {}: {}",
                        element.name(),
                        step.index,
                        err
                    );
                }
            }
        }

        self.step_index += 1;
        if self.finished() {
            info!("Run completed after {} steps", self.step_index);
            self.status = SchedulerState::Completed;
        }
    }
}
