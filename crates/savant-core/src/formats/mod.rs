//! # Serialization Formats
//!
//! Byte-level encodings of the graph used by the persistence hooks and the
//! export endpoint.

pub mod persistence;

pub use persistence::{
    MAX_PERSISTENCE_PAYLOAD_SIZE, PersistenceHeader, graph_from_bytes, graph_to_bytes,
};
