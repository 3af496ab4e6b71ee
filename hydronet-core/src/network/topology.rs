//! The directed acyclic graph of elements.

use super::ordering::{evaluation_order, layers};
use super::validation::{check_interfaces, find_cycle, link_quantities};
use crate::config::LinkSpec;
use crate::element::Element;
use crate::errors::{HydroNetError, HydroNetResult};
use petgraph::dot::{Config, Dot};
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::{Direction, Graph};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};

/// A directed link from a producer to a consumer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// Quantities the consumer reads from the producer
    pub quantities: Vec<String>,
}

impl Display for Link {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.quantities.join(", "))
    }
}

pub type NetworkGraph = Graph<Element, Link>;

/// Serialised form of a [`Network`]
///
/// Only elements and links are stored. Deserialising goes through [`Network::build`],
/// so the evaluation order and layers are always derived from a validated graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct NetworkRepr {
    elements: Vec<Element>,
    #[serde(default)]
    links: Vec<LinkSpec>,
}

/// A validated network of elements
///
/// A `Network` can only be obtained through [`Network::build`] (or [`NetworkBuilder`]),
/// which guarantees that every model's parameters are valid, that the graph is acyclic
/// and that every link's producer supplies the inputs its consumer declares. It is
/// immutable afterwards and is shared read-only by simulation runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "NetworkRepr", into = "NetworkRepr")]
pub struct Network {
    graph: NetworkGraph,
    order: Vec<NodeIndex>,
    layers: Vec<Vec<NodeIndex>>,
    names: HashMap<String, NodeIndex>,
}

impl TryFrom<NetworkRepr> for Network {
    type Error = HydroNetError;

    fn try_from(repr: NetworkRepr) -> HydroNetResult<Self> {
        Network::build(repr.elements, repr.links.into_iter().map(|l| (l.from, l.to)))
    }
}

impl From<Network> for NetworkRepr {
    fn from(network: Network) -> Self {
        let graph = network.graph;
        let links = graph
            .edge_references()
            .map(|e| LinkSpec {
                from: graph[e.source()].name().to_string(),
                to: graph[e.target()].name().to_string(),
            })
            .collect();
        let (nodes, _) = graph.into_nodes_edges();
        Self {
            elements: nodes.into_iter().map(|node| node.weight).collect(),
            links,
        }
    }
}

impl Network {
    /// Build and validate a network
    ///
    /// Checks run in a fixed order: duplicate element names and model parameters, links
    /// to unknown elements, cycles and finally interface compatibility. The first failure
    /// is returned and no partial network is produced. Repeated links between the same
    /// pair of elements are collapsed into one.
    pub fn build<I, A, B>(elements: Vec<Element>, links: I) -> HydroNetResult<Self>
    where
        I: IntoIterator<Item = (A, B)>,
        A: AsRef<str>,
        B: AsRef<str>,
    {
        let mut graph = NetworkGraph::new();
        let mut index: HashMap<String, NodeIndex> = HashMap::new();

        for element in elements {
            if index.contains_key(element.name()) {
                return Err(HydroNetError::DuplicateElement(element.name().to_string()));
            }
            element.model().validate().map_err(|err| match err {
                HydroNetError::InvalidConfig(reason) => HydroNetError::InvalidConfig(format!(
                    "element '{}': {}",
                    element.name(),
                    reason
                )),
                other => other,
            })?;
            let name = element.name().to_string();
            let node = graph.add_node(element);
            index.insert(name, node);
        }

        for (from, to) in links {
            let (from, to) = (from.as_ref(), to.as_ref());
            let lookup = |name: &str| {
                index
                    .get(name)
                    .copied()
                    .ok_or_else(|| HydroNetError::UnknownElement {
                        from: from.to_string(),
                        to: to.to_string(),
                        missing: name.to_string(),
                    })
            };
            let producer = lookup(from)?;
            let consumer = lookup(to)?;

            if graph.find_edge(producer, consumer).is_some() {
                log::warn!("Ignoring repeated link '{}' -> '{}'", from, to);
                continue;
            }
            let link = link_quantities(&graph, producer, consumer);
            graph.add_edge(producer, consumer, link);
        }

        if let Some(path) = find_cycle(&graph) {
            return Err(HydroNetError::Cycle {
                path: path.iter().map(|n| graph[*n].name().to_string()).collect(),
            });
        }
        check_interfaces(&graph)?;

        let order = evaluation_order(&graph)?;
        let layers = layers(&graph, &order);

        log::debug!(
            "Built network of {} elements and {} links in {} layers",
            graph.node_count(),
            graph.edge_count(),
            layers.len()
        );
        Ok(Self {
            graph,
            order,
            layers,
            names: index,
        })
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn graph(&self) -> &NetworkGraph {
        &self.graph
    }

    /// Elements ordered so that every producer precedes all of its consumers
    pub fn evaluation_order(&self) -> Vec<&Element> {
        self.order.iter().map(|n| &self.graph[*n]).collect()
    }

    pub fn evaluation_indices(&self) -> &[NodeIndex] {
        &self.order
    }

    /// Groups of mutually independent elements in evaluation order
    pub fn layers(&self) -> &[Vec<NodeIndex>] {
        &self.layers
    }

    pub fn index_of(&self, name: &str) -> Option<NodeIndex> {
        self.names.get(name).copied()
    }

    pub fn element(&self, name: &str) -> Option<&Element> {
        self.index_of(name).map(|n| &self.graph[n])
    }

    pub fn node(&self, index: NodeIndex) -> &Element {
        &self.graph[index]
    }

    /// Elements in insertion order
    pub fn elements(&self) -> impl Iterator<Item = &Element> + '_ {
        self.graph.node_weights()
    }

    /// Producers feeding the node, in link insertion order
    pub fn upstream_indices(&self, index: NodeIndex) -> Vec<NodeIndex> {
        self.linked(index, Direction::Incoming)
    }

    /// Consumers fed by the node, in link insertion order
    pub fn downstream_indices(&self, index: NodeIndex) -> Vec<NodeIndex> {
        self.linked(index, Direction::Outgoing)
    }

    fn linked(&self, index: NodeIndex, direction: Direction) -> Vec<NodeIndex> {
        let mut edges: Vec<_> = self
            .graph
            .edges_directed(index, direction)
            .map(|e| {
                let other = match direction {
                    Direction::Incoming => e.source(),
                    Direction::Outgoing => e.target(),
                };
                (e.id(), other)
            })
            .collect();
        edges.sort_by_key(|(id, _)| *id);
        edges.into_iter().map(|(_, n)| n).collect()
    }

    pub fn upstream(&self, name: &str) -> Option<Vec<&Element>> {
        let index = self.index_of(name)?;
        Some(
            self.upstream_indices(index)
                .into_iter()
                .map(|n| &self.graph[n])
                .collect(),
        )
    }

    pub fn downstream(&self, name: &str) -> Option<Vec<&Element>> {
        let index = self.index_of(name)?;
        Some(
            self.downstream_indices(index)
                .into_iter()
                .map(|n| &self.graph[n])
                .collect(),
        )
    }

    /// Elements tagged with `keyword`, in evaluation order
    pub fn select(&self, keyword: &str) -> Vec<&Element> {
        self.evaluation_order()
            .into_iter()
            .filter(|e| e.has_keyword(keyword))
            .collect()
    }

    /// Render the network in Graphviz DOT format
    pub fn as_dot(&self) -> String {
        let dot = Dot::with_attr_getters(
            &self.graph,
            &[Config::NodeNoLabel, Config::EdgeNoLabel],
            &|_, er| format!("label = {:?}", er.weight().to_string()),
            &|_, (_, element)| format!("label = {:?}", element.name()),
        );
        format!("{:?}", dot)
    }
}

/// Incrementally assemble a [`Network`]
#[derive(Debug, Default)]
pub struct NetworkBuilder {
    elements: Vec<Element>,
    links: Vec<(String, String)>,
}

impl NetworkBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_element(&mut self, element: Element) -> &mut Self {
        self.elements.push(element);
        self
    }

    /// Link the outputs of `from` into the inputs of `to`
    pub fn with_link(&mut self, from: &str, to: &str) -> &mut Self {
        self.links.push((from.to_string(), to.to_string()));
        self
    }

    pub fn build(&self) -> HydroNetResult<Network> {
        Network::build(self.elements.clone(), self.links.iter().cloned())
    }
}
