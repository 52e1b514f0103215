//! # Knowledge Graph Store
//!
//! The single owner of node and relationship lifetime.
//!
//! ## Consistency Model
//!
//! - The published state is an `Arc<Graph>` behind a `RwLock`. Readers take
//!   the read lock only long enough to clone the `Arc`, so a snapshot is
//!   never torn and never waits on a running batch.
//! - Writers are serialized by a dedicated mutex. A batch is applied to a
//!   private copy, handed to the persistence hook, and only then swapped in.
//! - A rejected batch (integrity or persistence failure) never becomes
//!   visible.

use crate::storage::{Commit, NoPersistence, PersistenceHook};
use crate::{CommitReceipt, Graph, GraphError, MutationBatch, MutationEngine, Node, NodeId, Relationship};
use std::ops::Deref;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

// =============================================================================
// SNAPSHOT
// =============================================================================

/// An immutable, point-in-time view of the whole graph.
///
/// Cloning a snapshot is cheap; it shares the underlying graph.
#[derive(Debug, Clone)]
pub struct GraphSnapshot {
    graph: Arc<Graph>,
}

impl GraphSnapshot {
    /// Copy the snapshot into owned node and link vectors.
    #[must_use]
    pub fn to_parts(&self) -> (Vec<Node>, Vec<Relationship>) {
        (
            self.graph.nodes().cloned().collect(),
            self.graph.links().cloned().collect(),
        )
    }
}

impl Deref for GraphSnapshot {
    type Target = Graph;

    fn deref(&self) -> &Graph {
        &self.graph
    }
}

// =============================================================================
// STORE
// =============================================================================

/// The knowledge graph store.
pub struct KnowledgeGraphStore {
    /// Last committed state.
    current: RwLock<Arc<Graph>>,
    /// Serializes every write path.
    writer: Mutex<()>,
    /// Durable storage notified before each publish.
    hook: Box<dyn PersistenceHook>,
}

impl std::fmt::Debug for KnowledgeGraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeGraphStore")
            .field("version", &self.version())
            .field("hook", &self.hook.name())
            .finish_non_exhaustive()
    }
}

impl Default for KnowledgeGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KnowledgeGraphStore {
    /// Create an empty, volatile store.
    #[must_use]
    pub fn new() -> Self {
        Self::with_graph(Graph::new())
    }

    /// Create a volatile store seeded with an existing graph.
    #[must_use]
    pub fn with_graph(graph: Graph) -> Self {
        Self {
            current: RwLock::new(Arc::new(graph)),
            writer: Mutex::new(()),
            hook: Box::new(NoPersistence),
        }
    }

    /// Create a store backed by a persistence hook, loading its last state.
    pub fn with_hook(hook: Box<dyn PersistenceHook>) -> Result<Self, GraphError> {
        let graph = hook.load()?.unwrap_or_default();
        Ok(Self {
            current: RwLock::new(Arc::new(graph)),
            writer: Mutex::new(()),
            hook,
        })
    }

    /// Name of the persistence backend.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.hook.name()
    }

    /// Check if commits are written to durable storage.
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.hook.is_durable()
    }

    /// Apply a batch atomically.
    ///
    /// Either every entry is applied and the result is visible to all later
    /// `snapshot()` calls, or nothing changes. Fails with
    /// `GraphError::InvalidMutation` on an integrity violation and with
    /// `GraphError::Persistence` if the hook could not record the commit.
    pub fn apply_mutations(&self, batch: &MutationBatch) -> Result<CommitReceipt, GraphError> {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);

        let base = self.published();
        let (next, receipt) = MutationEngine::apply(&base, batch)?;

        if batch.is_empty() {
            return Ok(receipt);
        }

        self.hook.persist(Commit {
            graph: &next,
            batch,
            receipt: &receipt,
        })?;

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        Ok(receipt)
    }

    /// Read the last committed state.
    #[must_use]
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            graph: self.published(),
        }
    }

    /// Commit counter of the last committed state.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.published().version()
    }

    /// Clone of a single node from the last committed state.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<Node> {
        self.published().node(id).cloned()
    }

    fn published(&self) -> Arc<Graph> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Mutation, Properties, PropertyValue};

    fn person(id: &str, name: Option<&str>) -> Mutation {
        let mut props = Properties::new();
        if let Some(name) = name {
            props.insert("name".to_string(), PropertyValue::text(name));
        }
        Mutation::add_node(id, &["Person"], props)
    }

    #[test]
    fn alice_knows_bob_scenario() {
        let store = KnowledgeGraphStore::new();
        let batch = MutationBatch::new()
            .with(person("1", Some("Alice")))
            .with(person("2", None))
            .with(Mutation::add_relationship("1", "2", "KNOWS"));

        store.apply_mutations(&batch).expect("apply");
        let snapshot = store.snapshot();
        let (nodes, links) = snapshot.to_parts();

        let ids: Vec<_> = nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2"]);
        assert_eq!(nodes[0].display_name(), "Alice");
        assert_eq!(nodes[1].labels, vec!["Person".to_string()]);
        assert!(nodes[1].properties.is_empty());
        assert_eq!(links, vec![Relationship::new("1", "2", "KNOWS")]);
    }

    #[test]
    fn rejected_batch_leaves_store_unchanged() {
        let store = KnowledgeGraphStore::new();
        store
            .apply_mutations(&MutationBatch::new().with(person("1", None)))
            .expect("seed");
        let before = store.snapshot();

        let batch = MutationBatch::new()
            .with(person("2", None))
            .with(Mutation::add_relationship("2", "3", "KNOWS"));
        let err = store.apply_mutations(&batch).expect_err("dangling");

        assert!(err.is_invalid_mutation());
        let after = store.snapshot();
        assert_eq!(after.node_count(), before.node_count());
        assert_eq!(after.version(), before.version());
        assert!(!after.contains_node(&NodeId::new("2")));
    }

    #[test]
    fn old_snapshot_is_immutable() {
        let store = KnowledgeGraphStore::new();
        let empty = store.snapshot();

        store
            .apply_mutations(&MutationBatch::new().with(person("1", None)))
            .expect("apply");

        assert!(empty.is_empty());
        assert_eq!(store.snapshot().node_count(), 1);
    }

    #[test]
    fn empty_batch_does_not_bump_version() {
        let store = KnowledgeGraphStore::new();
        let receipt = store.apply_mutations(&MutationBatch::new()).expect("apply");
        assert_eq!(receipt.version, 0);
        assert_eq!(store.version(), 0);
    }

    #[derive(Debug)]
    struct FailingHook;

    impl PersistenceHook for FailingHook {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn load(&self) -> Result<Option<Graph>, GraphError> {
            Ok(None)
        }

        fn persist(&self, _commit: Commit<'_>) -> Result<(), GraphError> {
            Err(GraphError::Persistence("disk full".to_string()))
        }
    }

    #[test]
    fn persistence_failure_aborts_commit() {
        let store = KnowledgeGraphStore::with_hook(Box::new(FailingHook)).expect("store");

        let err = store
            .apply_mutations(&MutationBatch::new().with(person("1", None)))
            .expect_err("must fail");

        assert!(matches!(err, GraphError::Persistence(_)));
        assert!(store.snapshot().is_empty());
        assert_eq!(store.version(), 0);
    }

    #[test]
    fn node_lookup_returns_committed_node() {
        let store = KnowledgeGraphStore::new();
        store
            .apply_mutations(&MutationBatch::new().with(person("1", Some("Alice"))))
            .expect("apply");

        assert_eq!(
            store.node(&NodeId::new("1")).map(|n| n.display_name().to_string()),
            Some("Alice".to_string())
        );
        assert!(store.node(&NodeId::new("2")).is_none());
    }
}
