//! # Graph
//!
//! The in-memory knowledge graph state held by the store.
//!
//! A `Graph` value is never mutated once it has been published to readers.
//! The store builds the next state from a clone and swaps it in as a whole
//! (see `store.rs`). All data structures use `BTreeMap`/`BTreeSet` so that
//! enumeration order is deterministic.

use crate::{Node, NodeId, PropertyValue, Relationship};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// GRAPH
// =============================================================================

/// The knowledge graph: nodes keyed by id plus a set of typed links.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Node storage: NodeId -> Node
    nodes: BTreeMap<NodeId, Node>,

    /// Links ordered by (source, target, type).
    links: BTreeSet<Relationship>,

    /// Number of non-empty batches committed to produce this state.
    version: u64,
}

impl Graph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit counter of this state.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Get a node by id.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Check if the graph contains a node.
    #[must_use]
    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Check if the graph contains a link.
    #[must_use]
    pub fn contains_link(&self, link: &Relationship) -> bool {
        self.links.contains(link)
    }

    /// All nodes in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// All links in ascending (source, target, type) order.
    pub fn links(&self) -> impl Iterator<Item = &Relationship> {
        self.links.iter()
    }

    /// Links touching a node on either end.
    pub fn links_of<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a Relationship> + 'a {
        self.links.iter().filter(move |l| l.touches(id))
    }

    /// Total number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Total number of links.
    #[must_use]
    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Check if the graph holds no nodes (and therefore no links).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // -------------------------------------------------------------------------
    // Write primitives. Only the mutation engine calls these, and only on a
    // private clone that has not been published yet.
    // -------------------------------------------------------------------------

    /// Insert a node or merge labels and properties into the existing one.
    /// Returns `true` if the node was newly created.
    pub(crate) fn upsert_node(
        &mut self,
        id: &NodeId,
        labels: &[String],
        properties: &BTreeMap<String, PropertyValue>,
    ) -> bool {
        let mut created = false;
        let node = self.nodes.entry(id.clone()).or_insert_with(|| {
            created = true;
            Node::new(id.clone())
        });
        for label in labels {
            node.add_label(label.clone());
        }
        for (key, value) in properties {
            node.properties.insert(key.clone(), value.clone());
        }
        created
    }

    /// Insert a link. Returns `true` if it was not already present.
    pub(crate) fn insert_link(&mut self, link: Relationship) -> bool {
        self.links.insert(link)
    }

    /// Set one property on an existing node.
    pub(crate) fn set_property(&mut self, id: &NodeId, key: &str, value: PropertyValue) -> bool {
        match self.nodes.get_mut(id) {
            Some(node) => {
                node.properties.insert(key.to_string(), value);
                true
            }
            None => false,
        }
    }

    pub(crate) fn bump_version(&mut self) -> u64 {
        self.version = self.version.saturating_add(1);
        self.version
    }
}

// =============================================================================
// SERIALIZATION SUPPORT
// =============================================================================

/// Serializable representation of the graph for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableGraph {
    pub nodes: Vec<Node>,
    pub links: Vec<Relationship>,
    pub version: u64,
}

impl From<&Graph> for SerializableGraph {
    fn from(graph: &Graph) -> Self {
        Self {
            nodes: graph.nodes.values().cloned().collect(),
            links: graph.links.iter().cloned().collect(),
            version: graph.version,
        }
    }
}

impl From<SerializableGraph> for Graph {
    /// Rebuild a graph. Links whose endpoints are missing are dropped, so a
    /// hand-edited or truncated file cannot introduce dangling links.
    fn from(sg: SerializableGraph) -> Self {
        let mut graph = Graph {
            version: sg.version,
            ..Graph::default()
        };

        for node in sg.nodes {
            graph.nodes.insert(node.id.clone(), node);
        }

        for link in sg.links {
            if graph.contains_node(&link.source) && graph.contains_node(&link.target) {
                graph.links.insert(link);
            }
        }

        graph
    }
}

// =============================================================================
// TESTS
// =============================================================================
