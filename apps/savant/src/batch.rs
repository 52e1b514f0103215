//! # Batch Wire Format
//!
//! The JSON form of mutation batches, shared by the HTTP API, the `apply`
//! command and external research commands.
//!
//! ```json
//! {
//!   "mutations": [
//!     { "op": "add_node", "id": "1", "labels": ["Person"], "properties": { "name": "Alice" } },
//!     { "op": "add_node", "id": "2", "labels": ["Person"] },
//!     { "op": "add_relationship", "source": "1", "target": "2", "type": "KNOWS" },
//!     { "op": "update_property", "node": "2", "key": "age", "value": 41 }
//!   ]
//! }
//! ```
//!
//! A bare array of mutations is accepted too. Property values must be JSON
//! scalars; arrays and objects are rejected before the batch reaches the store.

use savant_core::{Mutation, MutationBatch, NodeId, Properties, PropertyValue};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

// =============================================================================
// WIRE TYPES
// =============================================================================

/// One batch entry in JSON form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
pub enum MutationJson {
    AddNode {
        id: String,
        #[serde(default)]
        labels: Vec<String>,
        #[serde(default)]
        properties: Map<String, Value>,
    },
    AddRelationship {
        source: String,
        target: String,
        #[serde(rename = "type")]
        rel_type: String,
    },
    UpdateProperty {
        node: String,
        key: String,
        value: Value,
    },
}

/// A batch in JSON form. Deserializes from `{"mutations": [...]}` or a bare
/// array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BatchInput")]
pub struct MutationBatchJson {
    pub mutations: Vec<MutationJson>,
}

#[derive(Deserialize)]
struct WrappedBatch {
    mutations: Vec<MutationJson>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BatchInput {
    Wrapped(WrappedBatch),
    Bare(Vec<MutationJson>),
}

impl From<BatchInput> for MutationBatchJson {
    fn from(input: BatchInput) -> Self {
        let mutations = match input {
            BatchInput::Wrapped(batch) => batch.mutations,
            BatchInput::Bare(mutations) => mutations,
        };
        Self { mutations }
    }
}

/// Errors turning JSON into a mutation batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BatchFormatError {
    #[error("invalid batch JSON: {0}")]
    Parse(String),

    #[error("entry {index}: property '{key}' must be null, a boolean, a number or a string")]
    NonScalar { index: usize, key: String },
}

impl MutationBatchJson {
    /// Parse either `{"mutations": [...]}` or a bare array.
    pub fn parse(text: &str) -> Result<Self, BatchFormatError> {
        serde_json::from_str(text).map_err(|e| BatchFormatError::Parse(e.to_string()))
    }

    /// Convert into a store batch. Limits are checked later by the store.
    pub fn into_batch(self) -> Result<MutationBatch, BatchFormatError> {
        self.mutations
            .into_iter()
            .enumerate()
            .map(|(index, entry)| entry.into_mutation(index))
            .collect()
    }
}

impl MutationJson {
    fn into_mutation(self, index: usize) -> Result<Mutation, BatchFormatError> {
        Ok(match self {
            Self::AddNode {
                id,
                labels,
                properties,
            } => Mutation::AddNode {
                id: NodeId::new(id),
                labels,
                properties: properties_from_json(index, &properties)?,
            },
            Self::AddRelationship {
                source,
                target,
                rel_type,
            } => Mutation::add_relationship(source, target, rel_type),
            Self::UpdateProperty { node, key, value } => {
                let value = property_from_json(&value)
                    .ok_or_else(|| BatchFormatError::NonScalar { index, key: key.clone() })?;
                Mutation::update_property(node, key, value)
            }
        })
    }
}

// =============================================================================
// PROPERTY CONVERSION
// =============================================================================

/// Map a JSON scalar to a property value. Arrays and objects yield `None`.
#[must_use]
pub fn property_from_json(value: &Value) -> Option<PropertyValue> {
    match value {
        Value::Null => Some(PropertyValue::Null),
        Value::Bool(b) => Some(PropertyValue::Bool(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(PropertyValue::Int)
            .or_else(|| n.as_f64().map(PropertyValue::Float)),
        Value::String(s) => Some(PropertyValue::Text(s.clone())),
        Value::Array(_) | Value::Object(_) => None,
    }
}

/// Map a property value to JSON. Non-finite floats become `null`.
#[must_use]
pub fn property_to_json(value: &PropertyValue) -> Value {
    match value {
        PropertyValue::Null => Value::Null,
        PropertyValue::Bool(b) => Value::Bool(*b),
        PropertyValue::Int(i) => Value::from(*i),
        PropertyValue::Float(f) => {
            serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number)
        }
        PropertyValue::Text(s) => Value::String(s.clone()),
    }
}

fn properties_from_json(
    index: usize,
    map: &Map<String, Value>,
) -> Result<Properties, BatchFormatError> {
    map.iter()
        .map(|(key, value)| {
            property_from_json(value)
                .map(|v| (key.clone(), v))
                .ok_or_else(|| BatchFormatError::NonScalar {
                    index,
                    key: key.clone(),
                })
        })
        .collect()
}

/// JSON object of a property map.
#[must_use]
pub fn properties_to_json(properties: &Properties) -> Map<String, Value> {
    properties
        .iter()
        .map(|(k, v)| (k.clone(), property_to_json(v)))
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_wrapped_and_bare_forms() {
        let wrapped = r#"{"mutations":[{"op":"add_node","id":"1","labels":["Person"]}]}"#;
        let bare = r#"[{"op":"add_node","id":"1","labels":["Person"]}]"#;

        let a = MutationBatchJson::parse(wrapped).unwrap();
        let b = MutationBatchJson::parse(bare).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.mutations.len(), 1);
    }

    #[test]
    fn converts_to_store_batch() {
        let text = json!({
            "mutations": [
                {"op": "add_node", "id": "1", "labels": ["Person"], "properties": {"name": "Alice", "age": 30}},
                {"op": "add_node", "id": "2"},
                {"op": "add_relationship", "source": "1", "target": "2", "type": "KNOWS"},
                {"op": "update_property", "node": "2", "key": "score", "value": 0.5}
            ]
        })
        .to_string();

        let batch = MutationBatchJson::parse(&text).unwrap().into_batch().unwrap();
        let entries: Vec<_> = batch.iter().collect();

        assert_eq!(entries.len(), 4);
        match entries[0] {
            Mutation::AddNode { id, properties, .. } => {
                assert_eq!(id.as_str(), "1");
                assert_eq!(properties.get("name"), Some(&PropertyValue::text("Alice")));
                assert_eq!(properties.get("age"), Some(&PropertyValue::Int(30)));
            }
            other => panic!("unexpected entry: {:?}", other),
        }
        assert_eq!(entries[2], &Mutation::add_relationship("1", "2", "KNOWS"));
        assert_eq!(
            entries[3],
            &Mutation::update_property("2", "score", PropertyValue::Float(0.5))
        );
    }

    #[test]
    fn rejects_nested_property_values() {
        let text = r#"[{"op":"add_node","id":"1","properties":{"tags":["a","b"]}}]"#;
        let err = MutationBatchJson::parse(text)
            .unwrap()
            .into_batch()
            .unwrap_err();
        assert_eq!(
            err,
            BatchFormatError::NonScalar {
                index: 0,
                key: "tags".to_string()
            }
        );
    }

    #[test]
    fn rejects_unknown_op() {
        let err = MutationBatchJson::parse(r#"[{"op":"delete_node","id":"1"}]"#).unwrap_err();
        assert!(matches!(err, BatchFormatError::Parse(_)));
    }

    #[test]
    fn non_finite_float_maps_to_null() {
        assert_eq!(property_to_json(&PropertyValue::Float(f64::NAN)), Value::Null);
        assert_eq!(property_to_json(&PropertyValue::Int(7)), json!(7));
    }

    #[test]
    fn rejects_misspelled_keys() {
        for text in [
            r#"[{"op":"add_node","id":"1","propertys":{"name":"Alice"}}]"#,
            r#"{"mutations":[{"op":"add_node","id":"1","lables":["Person"]}]}"#,
            r#"[{"op":"add_relationship","source":"1","target":"2","type":"KNOWS","weight":1}]"#,
        ] {
            let err = MutationBatchJson::parse(text).unwrap_err();
            assert!(matches!(err, BatchFormatError::Parse(_)), "accepted: {}", text);
        }
    }
}
