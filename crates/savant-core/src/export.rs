//! # Snapshot Export
//!
//! Portable export of a graph snapshot: the binary persistence encoding plus
//! an integrity checksum.
//!
//! The encoding is deterministic (ordered maps and sets all the way down), so
//! equal graphs export to equal bytes and therefore equal checksums.

use crate::formats::{graph_from_bytes, graph_to_bytes};
use crate::{Graph, GraphError};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// An exported snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedGraph {
    /// Header + postcard payload.
    pub data: Vec<u8>,
    /// FNV-1a checksum of `data`.
    pub checksum: u64,
    /// Store version the export was taken from.
    pub version: u64,
}

/// FNV-1a over a byte slice.
#[must_use]
pub fn checksum_bytes(data: &[u8]) -> u64 {
    data.iter().fold(FNV_OFFSET, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Export a graph.
pub fn export_graph(graph: &Graph) -> Result<ExportedGraph, GraphError> {
    let data = graph_to_bytes(graph)?;
    let checksum = checksum_bytes(&data);
    Ok(ExportedGraph {
        data,
        checksum,
        version: graph.version(),
    })
}

/// Import exported bytes, verifying the checksum first.
pub fn import_verified(data: &[u8], checksum: u64) -> Result<Graph, GraphError> {
    let actual = checksum_bytes(data);
    if actual != checksum {
        return Err(GraphError::DeserializationError(format!(
            "Checksum mismatch: expected {:016x}, got {:016x}",
            checksum, actual
        )));
    }
    graph_from_bytes(data)
}

/// BLAKE3 hex digest of a graph's export encoding.
#[cfg(feature = "crypto-hash")]
pub fn crypto_hash(graph: &Graph) -> Result<String, GraphError> {
    let data = graph_to_bytes(graph)?;
    Ok(blake3::hash(&data).to_hex().to_string())
}

// =============================================================================
// TESTS
// =============================================================================
