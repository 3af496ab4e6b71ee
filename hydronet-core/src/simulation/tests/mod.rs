//! Scenario tests for the scheduler.
//!
//! These drive small networks of the test models through complete runs, covering the
//! lifecycle of a run, failure handling, cancellation and layered evaluation.

mod basic;
mod deploy;

use crate::element::Element;
use crate::example_models::{Source, Store};
use crate::network::Network;
use crate::timeseries::FloatValue;
use std::sync::Arc;

fn source(name: &str, q: FloatValue) -> Element {
    Element::new(name, Arc::new(Source { q }))
}

fn store(name: &str) -> Element {
    Element::new(name, Arc::new(Store::default()))
}

/// `A -> B` where `A` emits a constant flow of 10 into store `B`
fn source_into_store() -> Arc<Network> {
    Arc::new(Network::build(vec![source("A", 10.0), store("B")], [("A", "B")]).unwrap())
}
