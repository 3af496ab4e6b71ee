//! Elements that pass external values on to their consumers.

use super::{source, store};
use crate::config::SimulationConfig;
use crate::element::Deploy;
use crate::errors::ErrorKind;
use crate::io::{Forcing, ForcingTable, MemorySink};
use crate::network::Network;
use crate::simulation::{RunStatus, SimulationRun};
use crate::timeseries::Timeseries;
use ndarray::array;
use std::sync::Arc;

/// `gauge -> lake` where the gauge simulates a flow of 10
fn gauged(deploy: Deploy) -> Arc<Network> {
    Arc::new(
        Network::build(
            vec![source("gauge", 10.0).with_deploy(deploy), store("lake")],
            [("gauge", "lake")],
        )
        .unwrap(),
    )
}

fn observed(q: Forcing) -> Box<ForcingTable> {
    Box::new(ForcingTable::new().with_forcing("gauge", "q", q))
}

#[test]
fn obs_passes_observations_downstream() {
    let sink = MemorySink::new();
    let mut run = SimulationRun::new(gauged(Deploy::Obs), &SimulationConfig::new(0.0, 3.0, 1.0))
        .unwrap()
        .with_input_source(observed(Forcing::Series(
            Timeseries::new(array![4.0, 1.0], array![0.0, 2.0]).unwrap(),
        )))
        .with_sink(Box::new(sink.clone()));

    assert_eq!(run.run(), RunStatus::Completed);
    assert_eq!(run.state("lake").unwrap().get("storage"), Some(9.0));

    // The simulated flow is still recorded for comparison
    assert_eq!(run.outputs("gauge").unwrap()["q"], 10.0);
    assert_eq!(
        sink.series("gauge", "q"),
        vec![(1.0, 10.0), (2.0, 10.0), (3.0, 10.0)]
    );
}

#[test]
fn oldsim_replaces_outputs() {
    let sink = MemorySink::new();
    let mut run =
        SimulationRun::new(gauged(Deploy::OldSim), &SimulationConfig::new(0.0, 2.0, 1.0))
            .unwrap()
            .with_input_source(observed(Forcing::Constant(2.5)))
            .with_sink(Box::new(sink.clone()));

    assert_eq!(run.run(), RunStatus::Completed);
    assert_eq!(run.state("lake").unwrap().get("storage"), Some(5.0));
    assert_eq!(run.outputs("gauge").unwrap()["q"], 2.5);
    assert_eq!(sink.series("gauge", "q"), vec![(1.0, 2.5), (2.0, 2.5)]);
}

#[test]
fn newsim_ignores_external_values() {
    let mut run =
        SimulationRun::new(gauged(Deploy::NewSim), &SimulationConfig::new(0.0, 2.0, 1.0))
            .unwrap()
            .with_input_source(observed(Forcing::Constant(2.5)));
    assert_eq!(run.run(), RunStatus::Completed);
    assert_eq!(run.state("lake").unwrap().get("storage"), Some(20.0));
}

#[test]
fn missing_observation_fails_the_step() {
    let mut run = SimulationRun::new(gauged(Deploy::Obs), &SimulationConfig::new(0.0, 3.0, 1.0))
        .unwrap()
        .with_input_source(observed(Forcing::Series(
            Timeseries::new(array![4.0], array![1.0]).unwrap(),
        )));

    let RunStatus::Failed(failure) = run.run() else {
        panic!("run should fail");
    };
    assert_eq!(failure.kind, ErrorKind::InputSource);
    assert_eq!(failure.element.as_deref(), Some("gauge"));
    assert_eq!(failure.step_index, Some(0));
    assert_eq!(run.step_index(), 0);
}

#[test]
fn external_values_require_an_input_source() {
    for deploy in [Deploy::Obs, Deploy::OldSim] {
        let mut run =
            SimulationRun::new(gauged(deploy), &SimulationConfig::new(0.0, 2.0, 1.0)).unwrap();
        let RunStatus::Failed(failure) = run.run() else {
            panic!("run should fail in {} mode", deploy);
        };
        assert_eq!(failure.kind, ErrorKind::InputSource);
        assert!(failure.message.contains("requires an input source"));
    }
}

#[test]
fn parallel_matches_sequential() {
    let network = Arc::new(
        Network::build(
            vec![
                source("left", 3.0).with_deploy(Deploy::Obs),
                source("right", 4.0).with_deploy(Deploy::OldSim),
                store("junction"),
            ],
            [("left", "junction"), ("right", "junction")],
        )
        .unwrap(),
    );
    let forcing = ForcingTable::new()
        .with_forcing("left", "q", Forcing::Constant(1.0))
        .with_forcing("right", "q", Forcing::Constant(0.5));

    let run_with = |parallel: bool| {
        let config = SimulationConfig::new(0.0, 4.0, 1.0).with_parallel(parallel);
        let mut run = SimulationRun::new(network.clone(), &config)
            .unwrap()
            .with_input_source(Box::new(forcing.clone()));
        assert_eq!(run.run(), RunStatus::Completed);
        run.snapshot()
    };
    let sequential = run_with(false);
    assert_eq!(sequential["junction"].get("storage"), Some(6.0));
    assert_eq!(sequential, run_with(true));
}
