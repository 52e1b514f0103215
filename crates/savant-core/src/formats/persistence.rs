//! # Persistence Format
//!
//! Binary serialization for Savant graphs.
//!
//! Format: Header (5 bytes) + postcard-serialized graph data.
//! - 4 bytes: Magic ("SAVG")
//! - 1 byte: Version
//!
//! File I/O lives in the persistence hooks (`storage` module); this module
//! only converts between `Graph` and bytes.
//!
//! Size and header checks run before any payload is deserialized, so a
//! corrupted or hostile file is rejected without large allocations.

use crate::{Graph, GraphError, SerializableGraph, primitives};

/// Maximum allowed payload size for persistence format (500 MB).
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 500 * 1024 * 1024;

/// Header length in bytes.
const HEADER_LEN: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The persistence header precedes all graph data.
#[derive(Debug, Clone, Copy)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Create a new header with current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), GraphError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(GraphError::DeserializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(GraphError::DeserializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, GraphError> {
        if bytes.len() < HEADER_LEN {
            return Err(GraphError::DeserializationError(
                "Header too short".to_string(),
            ));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a graph to bytes (header + payload).
pub fn graph_to_bytes(graph: &Graph) -> Result<Vec<u8>, GraphError> {
    let header = PersistenceHeader::new();
    let serializable = SerializableGraph::from(graph);

    let payload = postcard::to_stdvec(&serializable)
        .map_err(|e| GraphError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_LEN + payload.len());
    result.extend_from_slice(&header.to_bytes());
    result.extend_from_slice(&payload);

    Ok(result)
}

/// Deserialize a graph from bytes.
///
/// Validates minimum size, maximum size and header before touching the payload.
pub fn graph_from_bytes(bytes: &[u8]) -> Result<Graph, GraphError> {
    if bytes.len() < HEADER_LEN {
        return Err(GraphError::DeserializationError(
            "Data too short: minimum 5 bytes required".to_string(),
        ));
    }

    if bytes.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(GraphError::DeserializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }

    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = &bytes[HEADER_LEN..];
    let serializable: SerializableGraph = postcard::from_bytes(payload).map_err(|e| {
        GraphError::DeserializationError(format!("Failed to deserialize graph data: {}", e))
    })?;

    Ok(Graph::from(serializable))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Mutation, MutationBatch, MutationEngine, Properties, PropertyValue};

    fn sample_graph() -> Graph {
        let mut props = Properties::new();
        props.insert("name".to_string(), PropertyValue::text("Alice"));
        props.insert("h_index".to_string(), PropertyValue::Int(12));
        props.insert("verified".to_string(), PropertyValue::Bool(true));
        let batch = MutationBatch::new()
            .with(Mutation::add_node("1", &["Person"], props))
            .with(Mutation::add_node("2", &["Paper"], Properties::new()))
            .with(Mutation::add_relationship("1", "2", "AUTHORED"));
        MutationEngine::apply(&Graph::new(), &batch).expect("apply").0
    }

    #[test]
    fn header_roundtrip() {
        let header = PersistenceHeader::new();
        let bytes = header.to_bytes();
        let restored = PersistenceHeader::from_bytes(&bytes).expect("parse header");

        assert_eq!(restored.magic, *primitives::MAGIC_BYTES);
        assert_eq!(restored.version, primitives::FORMAT_VERSION);
    }

    #[test]
    fn bytes_roundtrip_bit_exact() {
        let graph = sample_graph();

        let bytes1 = graph_to_bytes(&graph).expect("first serialize");
        let restored = graph_from_bytes(&bytes1).expect("deserialize");
        let bytes2 = graph_to_bytes(&restored).expect("second serialize");

        assert_eq!(
            bytes1, bytes2,
            "save -> load -> save must produce identical bytes"
        );
        assert_eq!(restored.version(), 1);
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = vec![0u8; 10];
        bytes[0..4].copy_from_slice(b"XXXX");

        let result = graph_from_bytes(&bytes);
        assert!(result.is_err());
    }

    #[test]
    fn future_version_rejected() {
        let mut bytes = graph_to_bytes(&sample_graph()).expect("serialize");
        bytes[4] = primitives::FORMAT_VERSION + 1;

        let err = graph_from_bytes(&bytes).expect_err("must fail");
        assert!(err.to_string().contains("Unsupported version"));
    }

    #[test]
    fn truncated_payload_rejected() {
        let bytes = graph_to_bytes(&sample_graph()).expect("serialize");
        assert!(graph_from_bytes(&bytes[..bytes.len() / 2]).is_err());
        assert!(graph_from_bytes(&bytes[..3]).is_err());
    }
}
