//! # Mutation Engine
//!
//! Mutation batches and the rules that apply them to a graph.
//!
//! A batch is an ordered list of entries. Entries are applied in order to a
//! private copy of the current graph, so a relationship may reference a node
//! created by an earlier entry of the same batch. The first entry that
//! violates graph integrity aborts the batch; the copy is discarded and the
//! caller's graph is left untouched.

use crate::graph::Graph;
use crate::primitives::{
    MAX_BATCH_SIZE, MAX_LABEL_LENGTH, MAX_LABELS_PER_NODE, MAX_NODE_ID_LENGTH,
    MAX_PROPERTY_KEY_LENGTH, MAX_TEXT_VALUE_LENGTH,
};
use crate::{GraphError, MutationFault, NodeId, Properties, PropertyValue, Relationship};
use serde::{Deserialize, Serialize};

// =============================================================================
// MUTATIONS
// =============================================================================

/// One entry of a mutation batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    /// Create a node, or merge labels and properties into an existing one.
    AddNode {
        id: NodeId,
        labels: Vec<String>,
        properties: Properties,
    },
    /// Link two nodes that exist in the store or earlier in the batch.
    AddRelationship {
        source: NodeId,
        target: NodeId,
        rel_type: String,
    },
    /// Set a single property on an existing node.
    UpdateProperty {
        node: NodeId,
        key: String,
        value: PropertyValue,
    },
}

impl Mutation {
    /// Shorthand for `AddNode`.
    #[must_use]
    pub fn add_node(id: impl Into<NodeId>, labels: &[&str], properties: Properties) -> Self {
        Self::AddNode {
            id: id.into(),
            labels: labels.iter().map(|l| (*l).to_string()).collect(),
            properties,
        }
    }

    /// Shorthand for `AddRelationship`.
    #[must_use]
    pub fn add_relationship(
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        rel_type: impl Into<String>,
    ) -> Self {
        Self::AddRelationship {
            source: source.into(),
            target: target.into(),
            rel_type: rel_type.into(),
        }
    }

    /// Shorthand for `UpdateProperty`.
    #[must_use]
    pub fn update_property(
        node: impl Into<NodeId>,
        key: impl Into<String>,
        value: impl Into<PropertyValue>,
    ) -> Self {
        Self::UpdateProperty {
            node: node.into(),
            key: key.into(),
            value: value.into(),
        }
    }
}

/// An ordered sequence of mutations applied as one atomic unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MutationBatch {
    entries: Vec<Mutation>,
}

impl MutationBatch {
    /// Create an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn push(&mut self, mutation: Mutation) {
        self.entries.push(mutation);
    }

    /// Builder: append an entry.
    #[must_use]
    pub fn with(mut self, mutation: Mutation) -> Self {
        self.entries.push(mutation);
        self
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the batch has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the entries in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Mutation> {
        self.entries.iter()
    }
}

impl From<Vec<Mutation>> for MutationBatch {
    fn from(entries: Vec<Mutation>) -> Self {
        Self { entries }
    }
}

impl FromIterator<Mutation> for MutationBatch {
    fn from_iter<I: IntoIterator<Item = Mutation>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a MutationBatch {
    type Item = &'a Mutation;
    type IntoIter = std::slice::Iter<'a, Mutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

// =============================================================================
// COMMIT RECEIPT
// =============================================================================

/// Summary of a committed batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReceipt {
    /// Store version after the commit.
    pub version: u64,
    pub nodes_added: usize,
    pub nodes_merged: usize,
    pub links_added: usize,
    pub properties_updated: usize,
}

impl CommitReceipt {
    /// Check if the commit changed nothing (e.g. an empty batch).
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.nodes_added == 0
            && self.nodes_merged == 0
            && self.links_added == 0
            && self.properties_updated == 0
    }
}

// =============================================================================
// ENGINE
// =============================================================================

/// Applies mutation batches.
///
/// The engine is stateless; the store decides when its output is published.
pub struct MutationEngine;

impl MutationEngine {
    /// Apply a batch to a copy of `base` and return the new graph.
    ///
    /// `base` is never modified. On error nothing of the batch is visible
    /// anywhere. An empty batch yields a clone of `base` with the same version.
    pub fn apply(base: &Graph, batch: &MutationBatch) -> Result<(Graph, CommitReceipt), GraphError> {
        if batch.len() > MAX_BATCH_SIZE {
            return Err(GraphError::invalid(
                MAX_BATCH_SIZE,
                MutationFault::BatchTooLarge {
                    len: batch.len(),
                    max: MAX_BATCH_SIZE,
                },
            ));
        }

        let mut staged = base.clone();
        let mut receipt = CommitReceipt {
            version: base.version(),
            ..CommitReceipt::default()
        };

        for (index, mutation) in batch.iter().enumerate() {
            Self::apply_entry(&mut staged, mutation, &mut receipt)
                .map_err(|fault| GraphError::invalid(index, fault))?;
        }

        if !batch.is_empty() {
            receipt.version = staged.bump_version();
        }

        Ok((staged, receipt))
    }

    /// Check a batch against `base` without producing a new graph.
    pub fn validate(base: &Graph, batch: &MutationBatch) -> Result<(), GraphError> {
        Self::apply(base, batch).map(|_| ())
    }

    fn apply_entry(
        graph: &mut Graph,
        mutation: &Mutation,
        receipt: &mut CommitReceipt,
    ) -> Result<(), MutationFault> {
        match mutation {
            Mutation::AddNode {
                id,
                labels,
                properties,
            } => {
                check_node_id(id)?;
                for label in labels {
                    check_text("label", label, MAX_LABEL_LENGTH)?;
                }
                for (key, value) in properties {
                    check_property(key, value)?;
                }

                let existing = graph.node(id).map_or(0, |n| n.labels.len());
                let fresh = labels
                    .iter()
                    .enumerate()
                    .filter(|&(i, label)| {
                        !labels[..i].contains(label)
                            && !graph.node(id).is_some_and(|n| n.has_label(label))
                    })
                    .count();
                if existing + fresh > MAX_LABELS_PER_NODE {
                    return Err(MutationFault::TooManyLabels {
                        id: id.clone(),
                        count: existing + fresh,
                        max: MAX_LABELS_PER_NODE,
                    });
                }

                if graph.upsert_node(id, labels, properties) {
                    receipt.nodes_added += 1;
                } else {
                    receipt.nodes_merged += 1;
                }
                Ok(())
            }

            Mutation::AddRelationship {
                source,
                target,
                rel_type,
            } => {
                check_text("relationship type", rel_type, MAX_LABEL_LENGTH)?;
                if !graph.contains_node(source) {
                    return Err(MutationFault::DanglingSource(source.clone()));
                }
                if !graph.contains_node(target) {
                    return Err(MutationFault::DanglingTarget(target.clone()));
                }

                let link = Relationship::new(source.clone(), target.clone(), rel_type.clone());
                if graph.insert_link(link) {
                    receipt.links_added += 1;
                }
                Ok(())
            }

            Mutation::UpdateProperty { node, key, value } => {
                check_property(key, value)?;
                if !graph.set_property(node, key, value.clone()) {
                    return Err(MutationFault::UnknownNode(node.clone()));
                }
                receipt.properties_updated += 1;
                Ok(())
            }
        }
    }
}

fn check_text(field: &'static str, text: &str, max: usize) -> Result<(), MutationFault> {
    if text.is_empty() {
        return Err(MutationFault::EmptyField(field));
    }
    if text.len() > max {
        return Err(MutationFault::TooLong {
            field,
            len: text.len(),
            max,
        });
    }
    Ok(())
}

fn check_node_id(id: &NodeId) -> Result<(), MutationFault> {
    check_text("node id", id.as_str(), MAX_NODE_ID_LENGTH)
}

fn check_property(key: &str, value: &PropertyValue) -> Result<(), MutationFault> {
    check_text("property key", key, MAX_PROPERTY_KEY_LENGTH)?;
    if value.payload_len() > MAX_TEXT_VALUE_LENGTH {
        return Err(MutationFault::TooLong {
            field: "property value",
            len: value.payload_len(),
            max: MAX_TEXT_VALUE_LENGTH,
        });
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
