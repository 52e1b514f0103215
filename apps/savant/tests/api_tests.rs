//! Integration tests for the Savant HTTP API.
//!
//! Uses axum-test to test the API handlers without starting a real server.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::StatusCode;
use axum_test::TestServer;
use savant::ResearchService;
use savant::api::{
    AppState, AutonomyResponse, ExportResponse, GraphJson, GraphStatusResponse, HealthResponse,
    MutationResponse, NodeDetailResponse, StartResponse, ToggleResponse, create_router,
};
use savant::config::ServerConfig;
use savant::research::{
    ControllerConfig, ControllerStatus, ResearchController, RunResult, RunState, RunStatus,
    ScriptStep, ScriptedTask,
};
use savant_core::{KnowledgeGraphStore, Mutation, MutationBatch, Properties, PropertyValue};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Test server config: rate limiting off unless a test asks for it.
fn test_config() -> ServerConfig {
    ServerConfig {
        rate_limit: 0,
        ..ServerConfig::default()
    }
}

/// Create a test server over a fresh in-memory store driven by `task`.
fn create_test_server(task: ScriptedTask) -> (TestServer, ResearchService) {
    create_test_server_with(task, &test_config())
}

fn create_test_server_with(
    task: ScriptedTask,
    config: &ServerConfig,
) -> (TestServer, ResearchService) {
    let controller = ResearchController::new(
        Arc::new(KnowledgeGraphStore::new()),
        Arc::new(task),
        ControllerConfig::default(),
    );
    let service = ResearchService::new(controller);
    let router = create_router(AppState::new(service.clone()), config);
    (TestServer::new(router).unwrap(), service)
}

/// Alice KNOWS Bob.
fn alice_batch() -> MutationBatch {
    let mut props = Properties::new();
    props.insert("name".to_string(), PropertyValue::text("Alice"));
    MutationBatch::new()
        .with(Mutation::add_node("alice", &["Person"], props))
        .with(Mutation::add_node("bob", &["Person"], Properties::new()))
        .with(Mutation::add_relationship("alice", "bob", "KNOWS"))
}

// =============================================================================
// HEALTH ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let (server, _) = create_test_server(ScriptedTask::new([]));

    let response = server.get("/health").await;
    response.assert_status_ok();

    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
}

// =============================================================================
// AUTONOMY ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_toggle_round_trip() {
    let (server, service) = create_test_server(ScriptedTask::new([]));

    let first: ToggleResponse = server.post("/api/research/toggle").await.json();
    assert!(first.enabled);
    assert!(service.is_enabled());

    let second: ToggleResponse = server.post("/api/research/toggle").await.json();
    assert!(!second.enabled);
    assert!(!service.is_enabled());
}

#[tokio::test]
async fn test_autonomy_put_is_idempotent() {
    let (server, _) = create_test_server(ScriptedTask::new([]));

    let response = server
        .put("/api/research/autonomy")
        .json(&json!({"enabled": true}))
        .await;
    response.assert_status_ok();
    let set: AutonomyResponse = response.json();
    assert!(set.enabled);
    assert!(set.changed);

    let again: AutonomyResponse = server
        .put("/api/research/autonomy")
        .json(&json!({"enabled": true}))
        .await
        .json();
    assert!(again.enabled);
    assert!(!again.changed);

    let status: ControllerStatus = server.get("/api/research/status").await.json();
    assert!(status.autonomy);
}

#[tokio::test]
async fn test_toggle_not_blocked_by_running_run() {
    let (server, service) = create_test_server(ScriptedTask::new([ScriptStep::delayed(
        Duration::from_millis(300),
        RunResult::Success(MutationBatch::new()),
    )]));

    let start: StartResponse = server.post("/api/research/start").await.json();
    assert!(start.accepted);

    let toggled: ToggleResponse = server.post("/api/research/toggle").await.json();
    assert!(toggled.enabled);
    let status: ControllerStatus = server.get("/api/research/status").await.json();
    assert_eq!(status.state, RunState::Running);

    service.controller().wait_idle().await;
}

#[tokio::test]
async fn test_graph_readable_during_run() {
    let (server, service) = create_test_server(ScriptedTask::new([ScriptStep::delayed(
        Duration::from_secs(2),
        RunResult::Success(
            MutationBatch::new().with(Mutation::add_node("carol", &["Person"], Properties::new())),
        ),
    )]));
    service.apply_manual(alice_batch()).await.unwrap();

    let start: StartResponse = server.post("/api/research/start").await.json();
    assert!(start.accepted);

    let graph: GraphJson = tokio::time::timeout(Duration::from_millis(500), async {
        server.get("/api/graph").await.json()
    })
    .await
    .unwrap();
    assert_eq!(graph.nodes.len(), 2);
    assert!(graph.nodes.iter().all(|n| n.id != "carol"));

    let status: ControllerStatus = server.get("/api/research/status").await.json();
    assert_eq!(status.state, RunState::Running);

    service.controller().wait_idle().await;
    let after: GraphJson = server.get("/api/graph").await.json();
    assert_eq!(after.nodes.len(), 3);
}

// =============================================================================
// START ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_start_reports_already_running() {
    let (server, service) = create_test_server(ScriptedTask::new([ScriptStep::delayed(
        Duration::from_millis(300),
        RunResult::Success(MutationBatch::new()),
    )]));

    let first = server.post("/api/research/start").await;
    first.assert_status_ok();
    let first: StartResponse = first.json();
    assert!(first.accepted);
    assert_eq!(first.run_id, Some(1));

    let second = server.post("/api/research/start").await;
    second.assert_status_ok();
    let second: StartResponse = second.json();
    assert!(!second.accepted);
    assert_eq!(second.reason.as_deref(), Some("AlreadyRunning"));

    service.controller().wait_idle().await;
    let status: ControllerStatus = server.get("/api/research/status").await.json();
    assert_eq!(status.state, RunState::Idle);
    assert_eq!(status.stats.started, 1);
    assert_eq!(status.stats.succeeded, 1);
    assert_eq!(status.stats.rejected, 1);
}

#[tokio::test]
async fn test_start_wait_commits_batch() {
    let (server, _) = create_test_server(ScriptedTask::new([ScriptStep::immediate(
        RunResult::Success(alice_batch()),
    )]));

    let response: StartResponse = server
        .post("/api/research/start")
        .add_query_param("wait", true)
        .await
        .json();
    assert!(response.accepted);
    let outcome = response.outcome.unwrap();
    assert_eq!(outcome.status, RunStatus::Completed);
    assert_eq!(outcome.receipt.unwrap().nodes_added, 2);

    let graph: GraphJson = server.get("/api/graph").await.json();
    assert_eq!(graph.nodes.len(), 2);
    assert_eq!(graph.links.len(), 1);
    assert_eq!(graph.links[0].source, "alice");
    assert_eq!(graph.links[0].target, "bob");
    assert_eq!(graph.links[0].rel_type, "KNOWS");

    let alice = graph.nodes.iter().find(|n| n.id == "alice").unwrap();
    assert_eq!(alice.labels, vec!["Person".to_string()]);
    assert_eq!(alice.properties.get("name"), Some(&json!("Alice")));
}

#[tokio::test]
async fn test_failed_run_leaves_graph_unchanged() {
    let (server, _) = create_test_server(ScriptedTask::new([ScriptStep::immediate(
        RunResult::failed("source unreachable"),
    )]));

    let response: StartResponse = server
        .post("/api/research/start")
        .add_query_param("wait", true)
        .await
        .json();
    let outcome = response.outcome.unwrap();
    assert_eq!(outcome.status, RunStatus::Failed);
    assert_eq!(outcome.error_kind.as_deref(), Some("TaskFailed"));

    let graph: GraphJson = server.get("/api/graph").await.json();
    assert!(graph.nodes.is_empty());

    let status: ControllerStatus = server.get("/api/research/status").await.json();
    assert_eq!(status.state, RunState::Idle);
    assert_eq!(status.last_run.unwrap().status, RunStatus::Failed);
}

// =============================================================================
// GRAPH ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_node_endpoint() {
    let (server, service) = create_test_server(ScriptedTask::new([]));
    service.apply_manual(alice_batch()).await.unwrap();

    let response = server.get("/api/graph/nodes/alice").await;
    response.assert_status_ok();
    let detail: NodeDetailResponse = response.json();
    assert_eq!(detail.node.id, "alice");
    assert_eq!(detail.links.len(), 1);

    let missing = server.get("/api/graph/nodes/carol").await;
    missing.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_manual_mutations() {
    let (server, _) = create_test_server(ScriptedTask::new([]));

    let response = server
        .post("/api/graph/mutations")
        .json(&json!({"mutations": [
            {"op": "add_node", "id": "paper", "labels": ["Paper"], "properties": {"year": 2024}},
            {"op": "update_property", "node": "paper", "key": "title", "value": "Graphs"}
        ]}))
        .await;
    response.assert_status_ok();
    let result: MutationResponse = response.json();
    assert!(result.success);
    let receipt = result.receipt.unwrap();
    assert_eq!(receipt.version, 1);
    assert_eq!(receipt.properties_updated, 1);
}

#[tokio::test]
async fn test_dangling_link_is_rejected_atomically() {
    let (server, service) = create_test_server(ScriptedTask::new([]));
    service.apply_manual(alice_batch()).await.unwrap();
    let before: GraphJson = server.get("/api/graph").await.json();

    let response = server
        .post("/api/graph/mutations")
        .json(&json!([
            {"op": "add_node", "id": "carol"},
            {"op": "add_relationship", "source": "carol", "target": "ghost", "type": "KNOWS"}
        ]))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let result: MutationResponse = response.json();
    assert!(!result.success);
    assert!(result.error.is_some());

    let after: GraphJson = server.get("/api/graph").await.json();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_non_scalar_property_is_bad_request() {
    let (server, _) = create_test_server(ScriptedTask::new([]));

    let response = server
        .post("/api/graph/mutations")
        .json(&json!([{"op": "add_node", "id": "a", "properties": {"tags": {"x": 1}}}]))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_graph_status_endpoint() {
    let (server, service) = create_test_server(ScriptedTask::new([]));
    service.apply_manual(alice_batch()).await.unwrap();

    let status: GraphStatusResponse = server.get("/api/graph/status").await.json();
    assert_eq!(status.backend, "memory");
    assert_eq!(status.metrics.node_count, 2);
    assert_eq!(status.metrics.link_count, 1);
    assert_eq!(status.metrics.labels.get("Person"), Some(&2));
    assert_eq!(status.metrics.relationship_types.get("KNOWS"), Some(&1));
}

#[tokio::test]
async fn test_export_endpoint() {
    let (server, service) = create_test_server(ScriptedTask::new([]));
    service.apply_manual(alice_batch()).await.unwrap();

    let response = server.get("/api/graph/export").await;
    response.assert_status_ok();
    let export: ExportResponse = response.json();
    assert!(export.success);
    assert_eq!(export.version, Some(1));
    assert_eq!(export.blake3.map(|h| h.len()), Some(64));

    let data = base64::Engine::decode(
        &base64::engine::general_purpose::STANDARD,
        export.data.unwrap(),
    )
    .unwrap();
    let graph = savant_core::import_verified(&data, export.checksum.unwrap()).unwrap();
    assert_eq!(graph.node_count(), 2);
}

// =============================================================================
// MIDDLEWARE TESTS
// =============================================================================

#[tokio::test]
async fn test_rate_limit_returns_429() {
    let config = ServerConfig {
        rate_limit: 1,
        ..ServerConfig::default()
    };
    let (server, _) = create_test_server_with(ScriptedTask::new([]), &config);

    server.get("/health").await.assert_status_ok();
    server
        .get("/health")
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
}
