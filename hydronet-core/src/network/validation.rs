//! Structural checks run while a network is built.

use super::topology::{Link, NetworkGraph};
use crate::errors::{HydroNetError, HydroNetResult};
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Colour {
    /// Not visited yet
    White,
    /// On the current traversal path
    Grey,
    /// Fully explored
    Black,
}

fn sorted_successors(graph: &NetworkGraph, node: NodeIndex) -> Vec<NodeIndex> {
    let mut successors: Vec<NodeIndex> = graph.neighbors(node).collect();
    successors.sort();
    successors.dedup();
    successors
}

/// Find a cycle in the graph, if there is one
///
/// Uses an iterative depth-first traversal with an explicit stack so that long river
/// networks cannot exhaust the call stack. Nodes are visited in index order which makes
/// the reported cycle deterministic. The returned path starts and ends with the same
/// node; a self-loop is reported as `[a, a]`.
pub(crate) fn find_cycle(graph: &NetworkGraph) -> Option<Vec<NodeIndex>> {
    let mut colour = vec![Colour::White; graph.node_count()];

    for root in graph.node_indices() {
        if colour[root.index()] != Colour::White {
            continue;
        }

        // Each frame holds a node and the successors that still need to be visited
        let mut stack: Vec<(NodeIndex, Vec<NodeIndex>, usize)> = Vec::new();
        colour[root.index()] = Colour::Grey;
        stack.push((root, sorted_successors(graph, root), 0));

        while let Some((node, successors, position)) = stack.last_mut() {
            if *position >= successors.len() {
                colour[node.index()] = Colour::Black;
                stack.pop();
                continue;
            }

            let next = successors[*position];
            *position += 1;

            match colour[next.index()] {
                Colour::White => {
                    colour[next.index()] = Colour::Grey;
                    let successors = sorted_successors(graph, next);
                    stack.push((next, successors, 0));
                }
                Colour::Grey => {
                    let start = stack
                        .iter()
                        .position(|(n, _, _)| *n == next)
                        .unwrap_or(0);
                    let mut path: Vec<NodeIndex> =
                        stack[start..].iter().map(|(n, _, _)| *n).collect();
                    path.push(next);
                    return Some(path);
                }
                Colour::Black => {}
            }
        }
    }
    None
}

/// Check that every producer supplies each quantity its consumers require
///
/// Links are checked in insertion order and the first mismatch is reported.
pub(crate) fn check_interfaces(graph: &NetworkGraph) -> HydroNetResult<()> {
    for edge in graph.edge_references() {
        let producer = &graph[edge.source()];
        let consumer = &graph[edge.target()];

        let provided: BTreeSet<String> = producer.model().outputs().into_iter().collect();
        let missing: Vec<String> = consumer
            .model()
            .inputs()
            .into_iter()
            .filter(|name| !provided.contains(name))
            .collect();

        if !missing.is_empty() {
            return Err(HydroNetError::InterfaceMismatch {
                producer: producer.name().to_string(),
                consumer: consumer.name().to_string(),
                missing,
            });
        }
    }
    Ok(())
}

/// The quantities carried along a link from `producer` to `consumer`
pub(crate) fn link_quantities(graph: &NetworkGraph, producer: NodeIndex, consumer: NodeIndex) -> Link {
    let provided: BTreeSet<String> = graph[producer].model().outputs().into_iter().collect();
    Link {
        quantities: graph[consumer]
            .model()
            .inputs()
            .into_iter()
            .filter(|name| provided.contains(name))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;
    use crate::example_models::{Gauge, Source, Store};
    use std::sync::Arc;

    fn graph(n: usize, edges: &[(usize, usize)]) -> NetworkGraph {
        let mut g = NetworkGraph::new();
        let nodes: Vec<NodeIndex> = (0..n)
            .map(|i| g.add_node(Element::new(&format!("e{i}"), Arc::new(Store::default()))))
            .collect();
        for (a, b) in edges {
            g.add_edge(nodes[*a], nodes[*b], Link::default());
        }
        g
    }

    #[test]
    fn acyclic() {
        let g = graph(4, &[(0, 1), (1, 2), (0, 2), (3, 2)]);
        assert_eq!(find_cycle(&g), None);
    }

    #[test]
    fn cycle_path() {
        let g = graph(4, &[(0, 1), (1, 2), (2, 3), (3, 1)]);
        let path: Vec<usize> = find_cycle(&g).unwrap().iter().map(|n| n.index()).collect();
        assert_eq!(path, vec![1, 2, 3, 1]);
    }

    #[test]
    fn self_loop() {
        let g = graph(2, &[(0, 1), (1, 1)]);
        let path: Vec<usize> = find_cycle(&g).unwrap().iter().map(|n| n.index()).collect();
        assert_eq!(path, vec![1, 1]);
    }

    #[test]
    fn long_chain_does_not_overflow() {
        let edges: Vec<(usize, usize)> = (0..99_999).map(|i| (i, i + 1)).collect();
        let g = graph(100_000, &edges);
        assert_eq!(find_cycle(&g), None);
    }

    #[test]
    fn interface_mismatch() {
        let mut g = NetworkGraph::new();
        let a = g.add_node(Element::new("a", Arc::new(Source { q: 1.0 })));
        let b = g.add_node(Element::new("b", Arc::new(Gauge { scale: 1.0 })));
        g.add_edge(a, b, Link::default());
        assert!(check_interfaces(&g).is_ok());

        let c = g.add_node(Element::new("c", Arc::new(Store::default())));
        g.add_edge(b, c, Link::default());
        match check_interfaces(&g) {
            Err(HydroNetError::InterfaceMismatch {
                producer,
                consumer,
                missing,
            }) => {
                assert_eq!(producer, "b");
                assert_eq!(consumer, "c");
                assert_eq!(missing, vec!["q".to_string()]);
            }
            other => panic!("Expected an interface mismatch, got {:?}", other),
        }
    }

    #[test]
    fn link_carries_consumed_quantities() {
        let mut g = NetworkGraph::new();
        let a = g.add_node(Element::new("a", Arc::new(Source { q: 1.0 })));
        let b = g.add_node(Element::new("b", Arc::new(Store::default())));
        assert_eq!(link_quantities(&g, a, b).quantities, vec!["q".to_string()]);
    }
}
