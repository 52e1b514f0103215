//! # Store Limits
//!
//! Hardcoded limits and format constants for the Savant store.
//!
//! Every batch entry is checked against these limits before it is applied,
//! so an oversized or malformed batch is rejected as a whole.

/// Magic bytes for the Savant binary snapshot header.
///
/// - File Header = Magic Bytes ("SAVG") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"SAVG";

/// Current serialization format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length of a node id in bytes.
pub const MAX_NODE_ID_LENGTH: usize = 256;

/// Maximum length of a label or relationship type in bytes.
pub const MAX_LABEL_LENGTH: usize = 128;

/// Maximum number of labels a node may carry.
pub const MAX_LABELS_PER_NODE: usize = 32;

/// Maximum length of a property key in bytes.
pub const MAX_PROPERTY_KEY_LENGTH: usize = 256;

/// Maximum length of a text property value (64KB).
pub const MAX_TEXT_VALUE_LENGTH: usize = 65536;

/// Maximum number of entries in a single mutation batch.
pub const MAX_BATCH_SIZE: usize = 10000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"SAVG");
    }

    #[test]
    fn labels_fit_in_node_ids() {
        assert!(MAX_LABEL_LENGTH <= MAX_NODE_ID_LENGTH);
    }
}
