//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use crate::batch::properties_to_json;
use crate::research::{AutonomyState, RunOutcome, RunStatus};
use crate::service::{NodeView, StartOutcome};
use savant_core::{CommitReceipt, GraphMetrics, GraphSnapshot, Node, Relationship};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// AUTONOMY
// =============================================================================

/// Response of `POST /api/research/toggle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleResponse {
    pub enabled: bool,
}

/// Body of `PUT /api/research/autonomy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutonomyRequest {
    pub enabled: bool,
}

/// Response of `PUT /api/research/autonomy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutonomyResponse {
    pub enabled: bool,
    pub changed: bool,
}

impl From<AutonomyState> for AutonomyResponse {
    fn from(state: AutonomyState) -> Self {
        Self {
            enabled: state.enabled,
            changed: state.changed,
        }
    }
}

// =============================================================================
// START
// =============================================================================

/// Query parameters of `POST /api/research/start`.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct StartParams {
    /// Wait for the run to finish and include its outcome.
    #[serde(default)]
    pub wait: bool,
}

/// Outcome details of a run awaited with `?wait=true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcomeJson {
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<CommitReceipt>,
}

/// Response of `POST /api/research/start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RunOutcomeJson>,
}

impl From<StartOutcome> for StartResponse {
    fn from(outcome: StartOutcome) -> Self {
        Self {
            accepted: outcome.accepted,
            reason: outcome.reason,
            run_id: outcome.run_id,
            outcome: None,
        }
    }
}

impl From<RunOutcome> for StartResponse {
    fn from(outcome: RunOutcome) -> Self {
        let (run_id, details) = match outcome {
            RunOutcome::Rejected(_) => {
                return StartOutcome {
                    accepted: false,
                    reason: Some(crate::service::ALREADY_RUNNING.to_string()),
                    run_id: None,
                }
                .into();
            }
            RunOutcome::Completed { run_id, receipt } => (
                run_id,
                RunOutcomeJson {
                    status: RunStatus::Completed,
                    error_kind: None,
                    message: None,
                    receipt: Some(receipt),
                },
            ),
            RunOutcome::Failed { run_id, error } => (
                run_id,
                RunOutcomeJson {
                    status: RunStatus::Failed,
                    error_kind: Some(error.kind().to_string()),
                    message: Some(error.to_string()),
                    receipt: None,
                },
            ),
        };
        Self {
            accepted: true,
            reason: None,
            run_id: Some(run_id),
            outcome: Some(details),
        }
    }
}

// =============================================================================
// GRAPH
// =============================================================================

/// A node: `{id, labels, properties}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeJson {
    pub id: String,
    pub labels: Vec<String>,
    pub properties: Map<String, Value>,
}

impl From<&Node> for NodeJson {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.to_string(),
            labels: node.labels.clone(),
            properties: properties_to_json(&node.properties),
        }
    }
}

/// A link: `{source, target, type}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkJson {
    pub source: String,
    pub target: String,
    #[serde(rename = "type")]
    pub rel_type: String,
}

impl From<&Relationship> for LinkJson {
    fn from(link: &Relationship) -> Self {
        Self {
            source: link.source.to_string(),
            target: link.target.to_string(),
            rel_type: link.rel_type.clone(),
        }
    }
}

/// Response of `GET /api/graph`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphJson {
    pub nodes: Vec<NodeJson>,
    pub links: Vec<LinkJson>,
}

impl From<&GraphSnapshot> for GraphJson {
    fn from(snapshot: &GraphSnapshot) -> Self {
        Self {
            nodes: snapshot.nodes().map(NodeJson::from).collect(),
            links: snapshot.links().map(LinkJson::from).collect(),
        }
    }
}

/// Response of `GET /api/graph/nodes/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDetailResponse {
    pub node: NodeJson,
    pub links: Vec<LinkJson>,
}

impl From<&NodeView> for NodeDetailResponse {
    fn from(view: &NodeView) -> Self {
        Self {
            node: NodeJson::from(&view.node),
            links: view.links.iter().map(LinkJson::from).collect(),
        }
    }
}

/// Response of `GET /api/graph/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStatusResponse {
    pub backend: String,
    #[serde(flatten)]
    pub metrics: GraphMetrics,
}

/// Plain error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { error: msg.into() }
    }
}

// =============================================================================
// MUTATIONS
// =============================================================================

/// Response of `POST /api/graph/mutations`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationResponse {
    pub success: bool,
    pub receipt: Option<CommitReceipt>,
    pub error: Option<String>,
}

impl MutationResponse {
    pub fn success(receipt: CommitReceipt) -> Self {
        Self {
            success: true,
            receipt: Some(receipt),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            receipt: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// EXPORT RESPONSE
// =============================================================================

/// Export response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub success: bool,
    pub data: Option<String>, // Base64 encoded
    pub checksum: Option<u64>,
    pub version: Option<u64>,
    /// BLAKE3 hex digest of the same bytes.
    pub blake3: Option<String>,
    pub error: Option<String>,
}

impl ExportResponse {
    pub fn success(data: &[u8], checksum: u64, version: u64, blake3: String) -> Self {
        Self {
            success: true,
            data: Some(base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                data,
            )),
            checksum: Some(checksum),
            version: Some(version),
            blake3: Some(blake3),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            checksum: None,
            version: None,
            blake3: None,
            error: Some(msg.into()),
        }
    }
}
