//! Lifecycle of a run: stepping, completion and inspection of results.

use super::{source, source_into_store, store};
use crate::config::SimulationConfig;
use crate::element::Element;
use crate::errors::HydroNetError;
use crate::example_models::{Rain, Source, Store};
use crate::integrator::Integrator;
use crate::io::{Forcing, ForcingTable, MemorySink};
use crate::network::Network;
use crate::process::{ProcessModel, StepContext};
use crate::state::{QuantityMap, State};
use crate::timeseries::TimeStep;
use crate::simulation::{RunStatus, SchedulerState, SimulationRun};
use is_close::is_close;
use std::sync::Arc;

#[test]
fn store_accumulates_inflow() {
    let config = SimulationConfig::new(0.0, 3.0, 1.0);
    let mut run = SimulationRun::new(source_into_store(), &config).unwrap();

    assert_eq!(run.status(), &SchedulerState::Idle);
    assert_eq!(run.current_time(), 0.0);
    assert_eq!(run.state("B").unwrap().get("storage"), Some(0.0));

    assert_eq!(run.run(), RunStatus::Completed);
    assert!(run.finished());
    assert_eq!(run.step_index(), 3);
    assert_eq!(run.current_time(), 3.0);

    let state = run.state("B").unwrap();
    assert_eq!(state.get("storage"), Some(30.0));
    assert_eq!(state.time(), 3.0);
    assert_eq!(run.outputs("A").unwrap()["q"], 10.0);
}

#[test]
fn manual_steps() {
    let config = SimulationConfig::new(0.0, 3.0, 1.0);
    let mut run = SimulationRun::new(source_into_store(), &config).unwrap();

    run.step().unwrap();
    assert_eq!(run.status(), &SchedulerState::Running);
    run.step().unwrap();
    assert_eq!(run.current_time(), 2.0);
    assert_eq!(run.state("B").unwrap().get("storage"), Some(20.0));

    run.step().unwrap();
    assert_eq!(run.status(), &SchedulerState::Completed);
    assert!(matches!(run.step(), Err(HydroNetError::NotRunnable(_))));
    assert_eq!(run.run(), RunStatus::Completed);
}

#[test]
fn truncated_final_step() {
    let config = SimulationConfig::new(0.0, 2.5, 1.0);
    let mut run = SimulationRun::new(source_into_store(), &config).unwrap();
    assert_eq!(run.run(), RunStatus::Completed);
    assert_eq!(run.step_index(), 3);
    assert!(is_close!(run.state("B").unwrap().get("storage").unwrap(), 25.0));
}

#[test]
fn initial_state_from_config() {
    let config = SimulationConfig::new(0.0, 2.0, 1.0).with_initial_value("B", "storage", 5.0);
    let mut run = SimulationRun::new(source_into_store(), &config).unwrap();
    assert_eq!(run.state("B").unwrap().get("storage"), Some(5.0));
    run.run();
    assert_eq!(run.state("B").unwrap().get("storage"), Some(25.0));
}

#[test]
fn invalid_initial_states() {
    let network = source_into_store();
    for config in [
        SimulationConfig::new(0.0, 2.0, 1.0).with_initial_value("C", "storage", 1.0),
        SimulationConfig::new(0.0, 2.0, 1.0).with_initial_value("B", "level", 1.0),
        SimulationConfig::new(0.0, 2.0, 1.0).with_initial_value("B", "storage", -1.0),
        SimulationConfig::new(0.0, 2.0, 1.0).with_initial_value("B", "storage", f64::NAN),
    ] {
        let result = SimulationRun::new(network.clone(), &config);
        assert!(matches!(result, Err(HydroNetError::InvalidConfig(_))));
    }
}

#[test]
fn confluence_sums_tributaries() {
    let network = Network::build(
        vec![source("left", 3.0), source("right", 4.5), store("junction")],
        [("left", "junction"), ("right", "junction")],
    )
    .unwrap();
    let mut run = SimulationRun::new(Arc::new(network), &SimulationConfig::new(0.0, 2.0, 1.0))
        .unwrap();
    assert_eq!(run.run(), RunStatus::Completed);
    assert_eq!(run.state("junction").unwrap().get("storage"), Some(15.0));
}

#[test]
fn consumers_see_outputs_of_the_same_step() {
    // B releases 2 per step into C, so C must see B's release in every step
    let network = Network::build(
        vec![
            source("A", 10.0),
            Element::new("B", Arc::new(Store { release: 2.0 })),
            store("C"),
        ],
        [("A", "B"), ("B", "C")],
    )
    .unwrap();
    let mut run =
        SimulationRun::new(Arc::new(network), &SimulationConfig::new(0.0, 4.0, 1.0)).unwrap();
    run.run();
    assert_eq!(run.state("B").unwrap().get("storage"), Some(32.0));
    assert_eq!(run.state("C").unwrap().get("storage"), Some(8.0));
}

#[test]
fn forcing_reaches_declaring_elements() {
    let network = Network::build(
        vec![Element::new("catchment", Arc::new(Rain {})), store("lake")],
        [("catchment", "lake")],
    )
    .unwrap();
    let forcing = ForcingTable::new()
        .with_forcing("catchment", "precipitation", Forcing::Constant(1.5))
        // The lake declares no forcings so this is never passed on
        .with_forcing("lake", "precipitation", Forcing::Constant(100.0));

    let mut run =
        SimulationRun::new(Arc::new(network), &SimulationConfig::new(0.0, 2.0, 1.0))
            .unwrap()
            .with_input_source(Box::new(forcing));
    assert_eq!(run.run(), RunStatus::Completed);
    assert_eq!(run.state("lake").unwrap().get("storage"), Some(3.0));
}

#[test]
fn sink_sees_every_committed_step() {
    let sink = MemorySink::new();
    let mut run = SimulationRun::new(source_into_store(), &SimulationConfig::new(0.0, 3.0, 1.0))
        .unwrap()
        .with_sink(Box::new(sink.clone()));
    run.run();

    assert_eq!(sink.len(), 6);
    assert_eq!(
        sink.series("B", "storage"),
        vec![(1.0, 10.0), (2.0, 20.0), (3.0, 30.0)]
    );
    let records = sink.records();
    assert_eq!(records[0].element, "A");
    assert_eq!(records[1].element, "B");
}

#[test]
fn runs_are_deterministic() {
    let run_once = || {
        let mut run =
            SimulationRun::new(source_into_store(), &SimulationConfig::new(0.0, 10.0, 0.7))
                .unwrap();
        run.run();
        run.snapshot()
    };
    assert_eq!(run_once(), run_once());
}

#[test]
fn sources_depend_only_on_state_and_duration() {
    let integrator = Integrator::default();
    let models: [Box<dyn ProcessModel>; 2] = [
        Box::new(Source { q: 7.25 }),
        Box::new(Store { release: 1.5 }),
    ];

    for model in models {
        let state = model.initial_state(0.0).with("storage", 40.0);
        let advance = |start: f64| {
            let step = TimeStep::new(3, start, start + 0.5);
            model
                .advance(&state, &StepContext::new(step, &integrator), &QuantityMap::new())
                .unwrap()
        };

        let early = advance(0.0);
        let late = advance(1234.5);
        assert_eq!(early.outputs, late.outputs);
        let values = |state: &State| state.values().clone();
        assert_eq!(values(&early.state), values(&late.state));
    }
}

#[test]
fn empty_network_completes() {
    let network = Network::build(vec![], Vec::<(&str, &str)>::new()).unwrap();
    let mut run =
        SimulationRun::new(Arc::new(network), &SimulationConfig::new(0.0, 2.0, 1.0)).unwrap();
    assert_eq!(run.run(), RunStatus::Completed);
    assert!(run.snapshot().is_empty());
}
