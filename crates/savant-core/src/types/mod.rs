//! # Core Type Definitions
//!
//! This module contains all core types for the Savant knowledge graph:
//! - Identifiers (`NodeId`)
//! - Graph entries (`Node`, `Relationship`, `PropertyValue`)
//! - Error types (`GraphError`, `MutationFault`)
//!
//! ## Ordering Guarantees
//!
//! `NodeId` and `Relationship` implement `Ord` so that the store can keep them
//! in `BTreeMap`/`BTreeSet` and every snapshot enumerates them in the same order.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unique identifier of a node within the store.
///
/// Ids are chosen by whoever produces the mutation (usually a research task)
/// and never change once the node exists.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Create a new node id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// =============================================================================
// PROPERTY VALUES
// =============================================================================

/// A scalar property value attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl PropertyValue {
    /// Create a text value.
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Get the text content, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Length used for size limits. Only text carries a variable payload.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        match self {
            Self::Text(s) => s.len(),
            _ => 0,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

/// Node properties, ordered by key.
pub type Properties = BTreeMap<String, PropertyValue>;

// =============================================================================
// NODE
// =============================================================================

/// A node in the knowledge graph.
///
/// `labels` behaves as an ordered set: insertion order is kept and duplicates
/// are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// The node identifier. Immutable once created.
    pub id: NodeId,
    /// Category tags, e.g. "Person".
    pub labels: Vec<String>,
    /// Scalar properties; may include `name`.
    pub properties: Properties,
}

impl Node {
    /// Create a node with no labels and no properties.
    #[must_use]
    pub fn new(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            labels: Vec::new(),
            properties: Properties::new(),
        }
    }

    /// Builder: add a label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.add_label(label);
        self
    }

    /// Builder: set a property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Add a label, keeping set semantics. Returns `true` if it was new.
    pub fn add_label(&mut self, label: impl Into<String>) -> bool {
        let label = label.into();
        if self.labels.contains(&label) {
            return false;
        }
        self.labels.push(label);
        true
    }

    /// Check if the node carries a label.
    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// The display name: the `name` property if it is text, otherwise the id.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.properties
            .get("name")
            .and_then(PropertyValue::as_text)
            .unwrap_or(self.id.as_str())
    }
}

// =============================================================================
// RELATIONSHIP
// =============================================================================

/// A directed, typed link between two nodes.
///
/// A relationship is identified by `(source, target, rel_type)`; adding the
/// same triple twice stores it once.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Relationship {
    pub source: NodeId,
    pub target: NodeId,
    pub rel_type: String,
}

impl Relationship {
    /// Create a new relationship.
    #[must_use]
    pub fn new(
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
        rel_type: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            rel_type: rel_type.into(),
        }
    }

    /// Check if the node is either endpoint.
    #[must_use]
    pub fn touches(&self, id: &NodeId) -> bool {
        &self.source == id || &self.target == id
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Why a single batch entry was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationFault {
    /// The relationship source is neither in the store nor created earlier in the batch.
    #[error("relationship source '{0}' does not exist")]
    DanglingSource(NodeId),

    /// The relationship target is neither in the store nor created earlier in the batch.
    #[error("relationship target '{0}' does not exist")]
    DanglingTarget(NodeId),

    /// A property update names a node that does not exist.
    #[error("node '{0}' does not exist")]
    UnknownNode(NodeId),

    /// A required string field is empty.
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    /// A string field is longer than allowed.
    #[error("{field} length {len} exceeds maximum {max} bytes")]
    TooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// A node would carry more labels than allowed.
    #[error("node '{id}' would carry {count} labels (maximum {max})")]
    TooManyLabels { id: NodeId, count: usize, max: usize },

    /// The batch holds more entries than allowed.
    #[error("batch of {len} entries exceeds maximum {max}")]
    BatchTooLarge { len: usize, max: usize },
}

/// Errors that can occur in the knowledge graph store.
///
/// - No silent failures
/// - Use `Result<T, GraphError>` for fallible operations
/// - The store never panics; all errors leave it unchanged
#[derive(Debug, Error)]
pub enum GraphError {
    /// A batch entry violates graph integrity; the whole batch was discarded.
    #[error("Invalid mutation at entry {index}: {fault}")]
    InvalidMutation { index: usize, fault: MutationFault },

    /// The requested node was not found in the graph.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// The persistence hook refused or failed to record a commit.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl GraphError {
    /// Shorthand for an `InvalidMutation` error.
    #[must_use]
    pub fn invalid(index: usize, fault: MutationFault) -> Self {
        Self::InvalidMutation { index, fault }
    }

    /// Check if the error is a batch integrity violation.
    #[must_use]
    pub fn is_invalid_mutation(&self) -> bool {
        matches!(self, Self::InvalidMutation { .. })
    }
}

// =============================================================================
// TESTS
// =============================================================================
