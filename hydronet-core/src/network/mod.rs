//! Network topology: elements, the links between them and the order they are evaluated in.

mod ordering;
mod topology;
mod validation;

pub use topology::{Link, Network, NetworkBuilder, NetworkGraph};
