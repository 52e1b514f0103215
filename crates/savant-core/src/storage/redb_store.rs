//! # redb-backed Persistence
//!
//! Records commits in a redb embedded database, providing:
//! - ACID transactions (one write transaction per batch)
//! - Crash safety (copy-on-write B-trees)
//! - Incremental writes: only nodes and links touched by the batch are written

use super::{Commit, PersistenceHook};
use crate::{Graph, GraphError, Mutation, Node, NodeId, Relationship, SerializableGraph};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::collections::BTreeSet;
use std::path::Path;

/// Table for nodes: node id -> postcard-serialized Node
const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");

/// Table for links: (source, target, type) -> ()
const LINKS: TableDefinition<(&str, &str, &str), ()> = TableDefinition::new("links");

/// Table for metadata: key string -> value u64
const METADATA: TableDefinition<&str, u64> = TableDefinition::new("metadata");

const VERSION_KEY: &str = "version";

fn io_err(e: impl std::fmt::Display) -> GraphError {
    GraphError::IoError(e.to_string())
}

/// A redb database holding the knowledge graph.
pub struct RedbPersistence {
    db: Database,
}

impl std::fmt::Debug for RedbPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbPersistence").finish_non_exhaustive()
    }
}

impl RedbPersistence {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let db = Database::create(path.as_ref()).map_err(io_err)?;

        // Initialize tables if they don't exist
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            let _ = write_txn.open_table(NODES).map_err(io_err)?;
            let _ = write_txn.open_table(LINKS).map_err(io_err)?;
            let _ = write_txn.open_table(METADATA).map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        Ok(Self { db })
    }

    /// Replace the whole database content with `graph`.
    ///
    /// Used when importing a graph into a fresh redb file.
    pub fn write_full(&self, graph: &Graph) -> Result<(), GraphError> {
        let write_txn = self.db.begin_write().map_err(io_err)?;
        {
            let mut nodes = write_txn.open_table(NODES).map_err(io_err)?;
            nodes.retain(|_, _| false).map_err(io_err)?;
            for node in graph.nodes() {
                let bytes = encode_node(node)?;
                nodes
                    .insert(node.id.as_str(), bytes.as_slice())
                    .map_err(io_err)?;
            }
        }
        {
            let mut links = write_txn.open_table(LINKS).map_err(io_err)?;
            links.retain(|_, _| false).map_err(io_err)?;
            for link in graph.links() {
                links
                    .insert(
                        (
                            link.source.as_str(),
                            link.target.as_str(),
                            link.rel_type.as_str(),
                        ),
                        (),
                    )
                    .map_err(io_err)?;
            }
        }
        {
            let mut meta = write_txn.open_table(METADATA).map_err(io_err)?;
            meta.insert(VERSION_KEY, graph.version()).map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)
    }
}

fn encode_node(node: &Node) -> Result<Vec<u8>, GraphError> {
    postcard::to_allocvec(node).map_err(|e| GraphError::SerializationError(e.to_string()))
}

impl PersistenceHook for RedbPersistence {
    fn name(&self) -> &'static str {
        "redb"
    }

    fn load(&self) -> Result<Option<Graph>, GraphError> {
        let read_txn = self.db.begin_read().map_err(io_err)?;

        let version = {
            let table = read_txn.open_table(METADATA).map_err(io_err)?;
            table.get(VERSION_KEY).map_err(io_err)?.map(|v| v.value())
        };

        let nodes = {
            let table = read_txn.open_table(NODES).map_err(io_err)?;
            let mut nodes = Vec::new();
            for entry in table.iter().map_err(io_err)? {
                let (_, value) = entry.map_err(io_err)?;
                let node: Node = postcard::from_bytes(value.value())
                    .map_err(|e| GraphError::DeserializationError(e.to_string()))?;
                nodes.push(node);
            }
            nodes
        };

        let links = {
            let table = read_txn.open_table(LINKS).map_err(io_err)?;
            let mut links = Vec::new();
            for entry in table.iter().map_err(io_err)? {
                let (key, _) = entry.map_err(io_err)?;
                let (source, target, rel_type) = key.value();
                links.push(Relationship::new(source, target, rel_type));
            }
            links
        };

        if version.is_none() && nodes.is_empty() {
            return Ok(None);
        }

        Ok(Some(Graph::from(SerializableGraph {
            nodes,
            links,
            version: version.unwrap_or(0),
        })))
    }

    fn persist(&self, commit: Commit<'_>) -> Result<(), GraphError> {
        // Nodes whose stored form changed: every AddNode and UpdateProperty target.
        let mut touched: BTreeSet<&NodeId> = BTreeSet::new();
        let mut links: Vec<&Mutation> = Vec::new();
        for mutation in commit.batch {
            match mutation {
                Mutation::AddNode { id, .. } => {
                    touched.insert(id);
                }
                Mutation::UpdateProperty { node, .. } => {
                    touched.insert(node);
                }
                Mutation::AddRelationship { .. } => links.push(mutation),
            }
        }

        let persist_err = |e: GraphError| GraphError::Persistence(e.to_string());

        let write_txn = self.db.begin_write().map_err(io_err).map_err(persist_err)?;
        {
            let mut nodes = write_txn
                .open_table(NODES)
                .map_err(io_err)
                .map_err(persist_err)?;
            for id in touched {
                let Some(node) = commit.graph.node(id) else {
                    continue;
                };
                let bytes = encode_node(node).map_err(persist_err)?;
                nodes
                    .insert(id.as_str(), bytes.as_slice())
                    .map_err(io_err)
                    .map_err(persist_err)?;
            }
        }
        {
            let mut table = write_txn
                .open_table(LINKS)
                .map_err(io_err)
                .map_err(persist_err)?;
            for mutation in links {
                if let Mutation::AddRelationship {
                    source,
                    target,
                    rel_type,
                } = mutation
                {
                    table
                        .insert((source.as_str(), target.as_str(), rel_type.as_str()), ())
                        .map_err(io_err)
                        .map_err(persist_err)?;
                }
            }
        }
        {
            let mut meta = write_txn
                .open_table(METADATA)
                .map_err(io_err)
                .map_err(persist_err)?;
            meta.insert(VERSION_KEY, commit.receipt.version)
                .map_err(io_err)
                .map_err(persist_err)?;
        }
        write_txn.commit().map_err(io_err).map_err(persist_err)
    }
}

// =============================================================================
// TESTS
// =============================================================================
