//! # Savant HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `POST /api/research/toggle` - Flip the autonomy flag
//! - `PUT /api/research/autonomy` - Set the autonomy flag
//! - `POST /api/research/start` - Request a run (`?wait=true` to await it)
//! - `GET /api/research/status` - Controller status
//! - `GET /api/graph` - Whole graph snapshot
//! - `GET /api/graph/nodes/{id}` - One node and its links
//! - `POST /api/graph/mutations` - Apply a manual batch
//! - `GET /api/graph/export` - Binary snapshot export (base64)
//! - `GET /api/graph/status` - Graph metrics
//! - `GET /health` - Health check
//!
//! ## Security Configuration
//!
//! - `cors_origins` / `SAVANT_CORS_ORIGINS`: allowed origins, or "*" for all (default: localhost only)
//! - `rate_limit` / `SAVANT_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)

mod handlers;
mod middleware;
mod types;

// Re-exports for external use
pub use middleware::create_rate_limiter;
// Re-export handlers and types for integration tests (via `savant::api::*`)
pub use handlers::{
    autonomy_handler, export_handler, graph_handler, graph_status_handler, health_handler,
    mutations_handler, node_handler, research_status_handler, start_handler, toggle_handler,
};
pub use types::{
    AutonomyRequest, AutonomyResponse, ErrorResponse, ExportResponse, GraphJson,
    GraphStatusResponse, HealthResponse, LinkJson, MutationResponse, NodeDetailResponse, NodeJson,
    RunOutcomeJson, StartParams, StartResponse, ToggleResponse,
};

use crate::AppError;
use crate::config::ServerConfig;
use crate::service::ResearchService;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post, put},
};
use std::future::Future;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Request body limit (2 MiB).
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state.
#[derive(Clone)]
pub struct AppState {
    pub service: ResearchService,
}

impl AppState {
    #[must_use]
    pub fn new(service: ResearchService) -> Self {
        Self { service }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build the CORS layer.
///
/// - `Some(["*"])`: allows all origins (development mode - use with caution!)
/// - `None`: localhost only
/// - Otherwise: the listed origins; invalid entries are skipped
fn build_cors_layer(origins: Option<&[String]>) -> CorsLayer {
    match origins {
        Some([only]) if only == "*" => {
            tracing::warn!("CORS: Allowing ALL origins. This is insecure for production!");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .iter()
                .filter_map(|s| match s.parse::<HeaderValue>() {
                    Ok(hv) => {
                        tracing::info!("CORS: Allowing origin: {}", s);
                        Some(hv)
                    }
                    Err(e) => {
                        tracing::warn!("CORS: Invalid origin '{}': {}", s, e);
                        None
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!("CORS: No valid origins configured, defaulting to localhost only");
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE])
            }
        }
        None => {
            tracing::info!("CORS: No origins configured, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Build a restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Body limit
/// 4. Rate Limiting - protects against floods (if enabled)
pub fn create_router(state: AppState, config: &ServerConfig) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/api/research/toggle", post(handlers::toggle_handler))
        .route("/api/research/autonomy", put(handlers::autonomy_handler))
        .route("/api/research/start", post(handlers::start_handler))
        .route("/api/research/status", get(handlers::research_status_handler))
        .route("/api/graph", get(handlers::graph_handler))
        .route("/api/graph/nodes/{id}", get(handlers::node_handler))
        .route("/api/graph/mutations", post(handlers::mutations_handler))
        .route("/api/graph/export", get(handlers::export_handler))
        .route("/api/graph/status", get(handlers::graph_status_handler));

    if config.rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", config.rate_limit);
        router = router.layer(axum_middleware::from_fn_with_state(
            create_rate_limiter(config.rate_limit),
            middleware::rate_limit_middleware,
        ));
    } else {
        tracing::info!("Rate limiting disabled");
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors_layer(config.cors_origins.as_deref()))
                .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Serve the API until `shutdown` resolves.
pub async fn run_server<F>(
    addr: &str,
    service: ResearchService,
    config: &ServerConfig,
    shutdown: F,
) -> Result<(), AppError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let router = create_router(AppState::new(service), config);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| AppError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("Savant HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| AppError::Server(e.to_string()))
}
