//! # Persistence Hooks
//!
//! The store is authoritative in memory. A `PersistenceHook` is told about
//! every commit before the new state becomes visible to readers; if the hook
//! fails, the commit is abandoned and the store keeps its previous state.
//!
//! Hooks shipped here:
//! - `NoPersistence`: volatile, the default
//! - `FileSnapshot`: rewrites a single binary snapshot file per commit
//! - `RedbPersistence`: incremental, ACID writes to a redb database

mod redb_store;

pub use redb_store::RedbPersistence;

use crate::formats::{graph_from_bytes, graph_to_bytes};
use crate::{CommitReceipt, Graph, GraphError, MutationBatch};
use std::fmt;
use std::path::{Path, PathBuf};

// =============================================================================
// HOOK TRAIT
// =============================================================================

/// A commit about to be published.
#[derive(Debug, Clone, Copy)]
pub struct Commit<'a> {
    /// The complete graph after the batch.
    pub graph: &'a Graph,
    /// The batch that produced it.
    pub batch: &'a MutationBatch,
    /// Counters and the new version.
    pub receipt: &'a CommitReceipt,
}

/// Durable storage for the knowledge graph.
///
/// Implementations must be `Send + Sync`; the store calls `persist` while
/// holding its writer lock, so calls never overlap.
pub trait PersistenceHook: Send + Sync + fmt::Debug {
    /// Short backend name for status output.
    fn name(&self) -> &'static str;

    /// Load the last persisted graph, or `None` if nothing was stored yet.
    fn load(&self) -> Result<Option<Graph>, GraphError>;

    /// Record a commit. An error aborts the commit.
    fn persist(&self, commit: Commit<'_>) -> Result<(), GraphError>;

    /// Whether the hook writes anything durable.
    fn is_durable(&self) -> bool {
        true
    }
}

// =============================================================================
// NO PERSISTENCE
// =============================================================================

/// Volatile storage: nothing is written, nothing is loaded.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPersistence;

impl PersistenceHook for NoPersistence {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn load(&self) -> Result<Option<Graph>, GraphError> {
        Ok(None)
    }

    fn persist(&self, _commit: Commit<'_>) -> Result<(), GraphError> {
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }
}

// =============================================================================
// FILE SNAPSHOT
// =============================================================================

/// Writes the full graph to one file after every commit.
///
/// The file is replaced atomically (write to a sibling temp file, then
/// rename), so a crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    path: PathBuf,
}

impl FileSnapshot {
    /// Use the snapshot file at `path`. The file need not exist yet.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The snapshot file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a graph to the snapshot file.
    pub fn write(&self, graph: &Graph) -> Result<(), GraphError> {
        let data = graph_to_bytes(graph)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, &data)
            .map_err(|e| GraphError::IoError(format!("Write {}: {}", tmp.display(), e)))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| GraphError::IoError(format!("Rename {}: {}", self.path.display(), e)))
    }
}

impl PersistenceHook for FileSnapshot {
    fn name(&self) -> &'static str {
        "file"
    }

    fn load(&self) -> Result<Option<Graph>, GraphError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let data = std::fs::read(&self.path)
            .map_err(|e| GraphError::IoError(format!("Read {}: {}", self.path.display(), e)))?;
        graph_from_bytes(&data).map(Some)
    }

    fn persist(&self, commit: Commit<'_>) -> Result<(), GraphError> {
        self.write(commit.graph)
            .map_err(|e| GraphError::Persistence(e.to_string()))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Mutation, MutationEngine, Properties};
    use tempfile::tempdir;

    #[test]
    fn file_snapshot_missing_file_loads_none() {
        let temp = tempdir().expect("temp dir");
        let hook = FileSnapshot::new(temp.path().join("graph.savant"));
        assert!(hook.load().expect("load").is_none());
    }

    #[test]
    fn file_snapshot_persists_commit() {
        let temp = tempdir().expect("temp dir");
        let hook = FileSnapshot::new(temp.path().join("graph.savant"));

        let batch = MutationBatch::new()
            .with(Mutation::add_node("1", &["Person"], Properties::new()))
            .with(Mutation::add_node("2", &["Person"], Properties::new()))
            .with(Mutation::add_relationship("1", "2", "KNOWS"));
        let (graph, receipt) = MutationEngine::apply(&Graph::new(), &batch).expect("apply");

        hook.persist(Commit {
            graph: &graph,
            batch: &batch,
            receipt: &receipt,
        })
        .expect("persist");

        let loaded = hook.load().expect("load").expect("some graph");
        assert_eq!(loaded.node_count(), 2);
        assert_eq!(loaded.link_count(), 1);
        assert_eq!(loaded.version(), 1);
        assert!(!temp.path().join("graph.tmp").exists());
    }

    #[test]
    fn file_snapshot_unwritable_path_fails() {
        let temp = tempdir().expect("temp dir");
        let hook = FileSnapshot::new(temp.path().join("no-such-dir").join("graph.savant"));
        let graph = Graph::new();
        let batch = MutationBatch::new();
        let receipt = CommitReceipt::default();

        let err = hook
            .persist(Commit {
                graph: &graph,
                batch: &batch,
                receipt: &receipt,
            })
            .expect_err("must fail");
        assert!(matches!(err, GraphError::Persistence(_)));
    }

    #[test]
    fn no_persistence_is_volatile() {
        assert!(!NoPersistence.is_durable());
        assert!(NoPersistence.load().expect("load").is_none());
    }
}
