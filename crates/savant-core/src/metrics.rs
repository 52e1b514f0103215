//! # Graph Metrics
//!
//! Counts computed from a snapshot for status output.

use crate::Graph;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Summary counts of a graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphMetrics {
    pub version: u64,
    pub node_count: usize,
    pub link_count: usize,
    /// Nodes per label.
    pub labels: BTreeMap<String, usize>,
    /// Links per relationship type.
    pub relationship_types: BTreeMap<String, usize>,
    /// Nodes with no label at all.
    pub unlabeled_nodes: usize,
}

impl GraphMetrics {
    /// Compute metrics for a graph.
    #[must_use]
    pub fn from_graph(graph: &Graph) -> Self {
        let mut metrics = Self {
            version: graph.version(),
            node_count: graph.node_count(),
            link_count: graph.link_count(),
            ..Self::default()
        };

        for node in graph.nodes() {
            if node.labels.is_empty() {
                metrics.unlabeled_nodes += 1;
            }
            for label in &node.labels {
                *metrics.labels.entry(label.clone()).or_default() += 1;
            }
        }

        for link in graph.links() {
            *metrics
                .relationship_types
                .entry(link.rel_type.clone())
                .or_default() += 1;
        }

        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Mutation, MutationBatch, MutationEngine, Properties};

    #[test]
    fn counts_labels_and_types() {
        let batch = MutationBatch::new()
            .with(Mutation::add_node("1", &["Person", "Author"], Properties::new()))
            .with(Mutation::add_node("2", &["Person"], Properties::new()))
            .with(Mutation::add_node("3", &[], Properties::new()))
            .with(Mutation::add_relationship("1", "2", "KNOWS"))
            .with(Mutation::add_relationship("2", "1", "KNOWS"))
            .with(Mutation::add_relationship("1", "3", "CITES"));
        let (graph, _) = MutationEngine::apply(&Graph::new(), &batch).expect("apply");

        let metrics = GraphMetrics::from_graph(&graph);

        assert_eq!(metrics.node_count, 3);
        assert_eq!(metrics.link_count, 3);
        assert_eq!(metrics.labels.get("Person"), Some(&2));
        assert_eq!(metrics.labels.get("Author"), Some(&1));
        assert_eq!(metrics.relationship_types.get("KNOWS"), Some(&2));
        assert_eq!(metrics.unlabeled_nodes, 1);
        assert_eq!(metrics.version, 1);
    }

    #[test]
    fn empty_graph_metrics() {
        let metrics = GraphMetrics::from_graph(&Graph::new());
        assert_eq!(metrics, GraphMetrics::default());
    }
}
