use super::topology::NetworkGraph;
use crate::errors::{HydroNetError, HydroNetResult};
use petgraph::graph::NodeIndex;
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Topological order of an acyclic graph (Kahn's algorithm)
///
/// When several nodes are ready at once the one inserted first is emitted first, so the
/// order is a pure function of the insertion order of elements and links.
pub(crate) fn evaluation_order(graph: &NetworkGraph) -> HydroNetResult<Vec<NodeIndex>> {
    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|n| graph.neighbors_directed(n, Direction::Incoming).count())
        .collect();

    let mut ready: BinaryHeap<Reverse<NodeIndex>> = graph
        .node_indices()
        .filter(|n| in_degree[n.index()] == 0)
        .map(Reverse)
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for next in graph.neighbors_directed(node, Direction::Outgoing) {
            in_degree[next.index()] -= 1;
            if in_degree[next.index()] == 0 {
                ready.push(Reverse(next));
            }
        }
    }

    if order.len() != graph.node_count() {
        return Err(HydroNetError::Error(format!(
            "no evaluation order exists: {} of {} elements could not be ordered",
            graph.node_count() - order.len(),
            graph.node_count()
        )));
    }
    Ok(order)
}

/// Group nodes by the length of the longest path reaching them from a source
///
/// Nodes in the same layer are never linked to each other, so a layer can be evaluated
/// concurrently once all earlier layers are complete. Each layer is sorted by insertion
/// order.
pub(crate) fn layers(graph: &NetworkGraph, order: &[NodeIndex]) -> Vec<Vec<NodeIndex>> {
    let mut depth = vec![0usize; graph.node_count()];
    for node in order {
        let d = graph
            .neighbors_directed(*node, Direction::Incoming)
            .map(|p| depth[p.index()] + 1)
            .max()
            .unwrap_or(0);
        depth[node.index()] = d;
    }

    let n_layers = order.iter().map(|n| depth[n.index()] + 1).max().unwrap_or(0);
    let mut layers: Vec<Vec<NodeIndex>> = vec![Vec::new(); n_layers];
    for node in graph.node_indices() {
        layers[depth[node.index()]].push(node);
    }
    layers
}
