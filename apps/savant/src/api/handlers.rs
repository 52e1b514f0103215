//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.

use super::{
    AppState,
    types::{
        AutonomyRequest, AutonomyResponse, ErrorResponse, ExportResponse, GraphJson,
        GraphStatusResponse, HealthResponse, MutationResponse, NodeDetailResponse, StartParams,
        StartResponse, ToggleResponse,
    },
};
use crate::batch::MutationBatchJson;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use savant_core::{GraphError, NodeId, export::crypto_hash, export_graph};

/// Status code for a store error.
fn graph_error_status(err: &GraphError) -> StatusCode {
    match err {
        GraphError::InvalidMutation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        GraphError::NodeNotFound(_) => StatusCode::NOT_FOUND,
        GraphError::Persistence(_)
        | GraphError::SerializationError(_)
        | GraphError::DeserializationError(_)
        | GraphError::IoError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// RESEARCH HANDLERS
// =============================================================================

/// Flip the autonomy flag.
pub async fn toggle_handler(State(state): State<AppState>) -> impl IntoResponse {
    let enabled = state.service.toggle();
    (StatusCode::OK, Json(ToggleResponse { enabled }))
}

/// Set the autonomy flag explicitly.
pub async fn autonomy_handler(
    State(state): State<AppState>,
    Json(request): Json<AutonomyRequest>,
) -> impl IntoResponse {
    let result = state.service.set_enabled(request.enabled);
    (StatusCode::OK, Json(AutonomyResponse::from(result)))
}

/// Request a run now.
///
/// Always 200: a run in flight is reported as `accepted: false`. With
/// `?wait=true` the response carries the run outcome.
pub async fn start_handler(
    State(state): State<AppState>,
    Query(params): Query<StartParams>,
) -> impl IntoResponse {
    let response = if params.wait {
        StartResponse::from(state.service.trigger_now().await)
    } else {
        StartResponse::from(state.service.start())
    };
    (StatusCode::OK, Json(response))
}

/// Controller status: flag, run state, counters, last outcome.
pub async fn research_status_handler(State(state): State<AppState>) -> impl IntoResponse {
    (StatusCode::OK, Json(state.service.status()))
}

// =============================================================================
// GRAPH HANDLERS
// =============================================================================

/// The whole graph as one consistent snapshot.
pub async fn graph_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.service.read_graph();
    (StatusCode::OK, Json(GraphJson::from(&snapshot)))
}

/// One node and its links.
pub async fn node_handler(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.service.node(&NodeId::new(id)) {
        Ok(view) => (StatusCode::OK, Json(NodeDetailResponse::from(&view))).into_response(),
        Err(e) => (graph_error_status(&e), Json(ErrorResponse::new(e.to_string()))).into_response(),
    }
}

/// Graph metrics.
pub async fn graph_status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let response = GraphStatusResponse {
        backend: state.service.backend_name().to_string(),
        metrics: state.service.metrics(),
    };
    (StatusCode::OK, Json(response))
}

/// Apply a manual mutation batch.
pub async fn mutations_handler(
    State(state): State<AppState>,
    Json(request): Json<MutationBatchJson>,
) -> impl IntoResponse {
    let batch = match request.into_batch() {
        Ok(b) => b,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(MutationResponse::error(format!("Invalid batch: {}", e))),
            );
        }
    };

    match state.service.apply_manual(batch).await {
        Ok(receipt) => (StatusCode::OK, Json(MutationResponse::success(receipt))),
        Err(e) => {
            tracing::warn!(error = %e, "manual batch rejected");
            (graph_error_status(&e), Json(MutationResponse::error(e.to_string())))
        }
    }
}

// =============================================================================
// EXPORT HANDLER
// =============================================================================

/// Export the current snapshot: base64 payload, checksum and BLAKE3 digest.
pub async fn export_handler(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.service.read_graph();

    let exported = match export_graph(&snapshot) {
        Ok(e) => e,
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ExportResponse::error(format!("Export failed: {}", e))),
            );
        }
    };
    match crypto_hash(&snapshot) {
        Ok(digest) => (
            StatusCode::OK,
            Json(ExportResponse::success(
                &exported.data,
                exported.checksum,
                exported.version,
                digest,
            )),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ExportResponse::error(format!("Hash failed: {}", e))),
        ),
    }
}
