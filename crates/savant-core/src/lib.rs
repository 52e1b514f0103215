//! # savant-core
//!
//! The Knowledge Graph Store for Savant - THE STORE.
//!
//! This crate holds the graph that autonomous research runs write into and
//! that viewers read from. It guarantees two things:
//! - A mutation batch is applied atomically: all entries or none.
//! - A snapshot is never torn: readers see the state before or after a
//!   batch, never in between.
//!
//! ## Architectural Constraints
//!
//! - Has NO async, NO network dependencies (pure Rust)
//! - Is the ONLY place where graph state lives
//! - Never decides what to write; research tasks produce batches and the
//!   controller hands them in
//! - Persistence is optional and pluggable (`storage::PersistenceHook`)

// =============================================================================
// MODULES
// =============================================================================

pub mod export;
pub mod formats;
pub mod graph;
pub mod metrics;
pub mod mutation;
pub mod primitives;
pub mod storage;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    GraphError, MutationFault, Node, NodeId, Properties, PropertyValue, Relationship,
};

// =============================================================================
// RE-EXPORTS: Store
// =============================================================================

pub use export::{ExportedGraph, checksum_bytes, export_graph, import_verified};
pub use graph::{Graph, SerializableGraph};
pub use metrics::GraphMetrics;
pub use mutation::{CommitReceipt, Mutation, MutationBatch, MutationEngine};
pub use storage::{Commit, FileSnapshot, NoPersistence, PersistenceHook, RedbPersistence};
pub use store::{GraphSnapshot, KnowledgeGraphStore};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{PersistenceHeader, graph_from_bytes, graph_to_bytes};
