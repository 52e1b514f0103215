//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::ExportFormat;
use crate::AppError;
use crate::api::{self, GraphJson, GraphStatusResponse};
use crate::batch::MutationBatchJson;
use crate::config::{AppConfig, Backend};
use crate::research::{ResearchController, RunOutcome, spawn_scheduler};
use crate::service::ResearchService;
use savant_core::{FileSnapshot, Graph, GraphMetrics, RedbPersistence, export_graph};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a batch file (100 MB).
///
/// This prevents memory exhaustion from malicious or accidental large files.
const MAX_BATCH_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), AppError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| AppError::Io(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(AppError::Io(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Validate an input file path.
///
/// Canonicalizes the path (resolving symlinks and "..") and ensures it names
/// an existing regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, AppError> {
    let canonical = path.canonicalize().map_err(|e| {
        AppError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(AppError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Validate an output path: the parent directory must exist.
fn validate_output_path(path: &Path) -> Result<PathBuf, AppError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        AppError::Io(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(AppError::Io(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| AppError::Io("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

fn print_json(value: &impl serde::Serialize) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server and the research scheduler.
pub async fn cmd_server(config: &AppConfig) -> Result<(), AppError> {
    let store = Arc::new(config.open_store()?);
    let controller =
        ResearchController::new(store, config.build_task(), config.controller_config());
    controller.set_autonomy(config.research.autonomous);

    println!("Savant Research Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:       {}", config.server.host);
    println!("  Port:       {}", config.server.port);
    println!("  Backend:    {}", config.storage.backend.as_str());
    println!("  Database:   {}", config.storage.path.display());
    println!("  Task:       {}", controller.status().task);
    println!("  Autonomous: {}", config.research.autonomous);
    println!("  Interval:   {}s", config.research.interval_secs);
    println!();
    println!("Endpoints:");
    println!("  POST /api/research/toggle   - Flip autonomous research");
    println!("  PUT  /api/research/autonomy - Set autonomous research");
    println!("  POST /api/research/start    - Start a research run");
    println!("  GET  /api/research/status   - Controller status");
    println!("  GET  /api/graph             - Knowledge graph");
    println!("  POST /api/graph/mutations   - Apply a mutation batch");
    println!("  GET  /health                - Health check");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let scheduler = spawn_scheduler(controller.clone());
    let service = ResearchService::new(controller.clone());
    let addr = format!("{}:{}", config.server.host, config.server.port);

    let served = api::run_server(&addr, service, &config.server, shutdown_signal()).await;

    tracing::info!("shutting down research controller");
    controller.shutdown();
    if let Err(e) = scheduler.await {
        tracing::warn!(error = %e, "scheduler task ended abnormally");
    }
    controller.wait_idle().await;

    served
}

/// Resolves on Ctrl+C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for Ctrl+C; stopping");
    }
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show graph status.
pub fn cmd_status(config: &AppConfig, json_mode: bool) -> Result<(), AppError> {
    let store = config.open_store()?;
    let metrics = GraphMetrics::from_graph(&store.snapshot());

    if json_mode {
        print_json(&GraphStatusResponse {
            backend: store.backend_name().to_string(),
            metrics,
        });
        return Ok(());
    }

    println!("Savant Graph Status");
    println!("===================");
    println!("Database: {}", config.storage.path.display());
    println!("Backend:  {}", store.backend_name());
    println!();
    println!("Version:  {}", metrics.version);
    println!("Nodes:    {}", metrics.node_count);
    println!("Links:    {}", metrics.link_count);
    println!("Unlabeled nodes: {}", metrics.unlabeled_nodes);

    if !metrics.labels.is_empty() {
        println!();
        println!("Labels:");
        for (label, count) in &metrics.labels {
            println!("  {:<24} {}", label, count);
        }
    }
    if !metrics.relationship_types.is_empty() {
        println!();
        println!("Relationship types:");
        for (rel_type, count) in &metrics.relationship_types {
            println!("  {:<24} {}", rel_type, count);
        }
    }

    Ok(())
}

// =============================================================================
// APPLY COMMAND
// =============================================================================

/// Apply a JSON mutation batch file as one atomic commit.
pub fn cmd_apply(config: &AppConfig, json_mode: bool, file: &Path) -> Result<(), AppError> {
    tracing::info!("Applying batch from {}", file.display());

    let validated_path = validate_file_path(file)?;
    validate_file_size(&validated_path, MAX_BATCH_FILE_SIZE)?;

    let text = std::fs::read_to_string(&validated_path)
        .map_err(|e| AppError::Io(format!("Read file: {}", e)))?;
    let batch = MutationBatchJson::parse(&text)?.into_batch()?;

    let store = config.open_store()?;
    let receipt = store.apply_mutations(&batch)?;

    if json_mode {
        print_json(&receipt);
        return Ok(());
    }

    println!("Applied {} mutations", batch.len());
    println!(
        "  nodes added: {}, merged: {}, links added: {}, properties updated: {}",
        receipt.nodes_added, receipt.nodes_merged, receipt.links_added, receipt.properties_updated
    );
    println!("Graph version is now {}", receipt.version);

    Ok(())
}

// =============================================================================
// RESEARCH COMMAND
// =============================================================================

/// Run the configured research task once and commit its batch.
pub async fn cmd_research(config: &AppConfig, json_mode: bool) -> Result<(), AppError> {
    let store = Arc::new(config.open_store()?);
    let controller =
        ResearchController::new(store, config.build_task(), config.controller_config());

    match controller.trigger_now().await {
        RunOutcome::Completed { run_id, receipt } => {
            if json_mode {
                print_json(&serde_json::json!({
                    "run_id": run_id,
                    "receipt": receipt,
                }));
            } else {
                println!("Research run {} committed", run_id);
                println!(
                    "  nodes added: {}, merged: {}, links added: {}",
                    receipt.nodes_added, receipt.nodes_merged, receipt.links_added
                );
                println!("Graph version is now {}", receipt.version);
            }
            Ok(())
        }
        RunOutcome::Failed { run_id, error } => Err(AppError::Run {
            run_id,
            source: error,
        }),
        RunOutcome::Rejected(busy) => Err(busy.into()),
    }
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Export the graph.
pub fn cmd_export(config: &AppConfig, output: &Path, format: ExportFormat) -> Result<(), AppError> {
    let validated_output = validate_output_path(output)?;

    let store = config.open_store()?;
    let snapshot = store.snapshot();

    let data = match format {
        ExportFormat::Binary => {
            let exported = export_graph(&snapshot)?;
            println!("Checksum: {:016x}", exported.checksum);
            exported.data
        }
        ExportFormat::Json => serde_json::to_vec_pretty(&GraphJson::from(&snapshot))
            .map_err(|e| AppError::Io(format!("Encode JSON: {}", e)))?,
    };

    std::fs::write(&validated_output, &data)
        .map_err(|e| AppError::Io(format!("Write file: {}", e)))?;

    println!(
        "Exported {} bytes to {}",
        data.len(),
        validated_output.display()
    );

    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new empty store.
pub fn cmd_init(config: &AppConfig, force: bool) -> Result<(), AppError> {
    let db_path = &config.storage.path;

    if config.storage.backend == Backend::Memory {
        return Err(AppError::Io(
            "The memory backend has nothing to initialize. Use --backend file or redb."
                .to_string(),
        ));
    }
    if db_path.exists() && !force {
        return Err(AppError::Io(
            "Database already exists. Use --force to overwrite.".to_string(),
        ));
    }

    let empty = Graph::new();
    match config.storage.backend {
        Backend::Redb => {
            RedbPersistence::open(db_path)?.write_full(&empty)?;
            println!("Initialized new redb database at {}", db_path.display());
        }
        Backend::File | Backend::Memory => {
            FileSnapshot::new(db_path).write(&empty)?;
            println!("Initialized new file database at {}", db_path.display());
        }
    }

    // Reopen to confirm the store loads.
    let store = config.open_store()?;
    tracing::debug!(version = store.version(), "store initialized");

    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================
