//! # Savant CLI Module
//!
//! This module implements the CLI interface for Savant.
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server and the research scheduler
//! - `status` - Show graph metrics
//! - `apply` - Apply a mutation batch file
//! - `research` - Run one research cycle and commit it
//! - `export` - Export the graph to a file
//! - `init` - Initialize a new empty store

mod commands;

use crate::AppError;
use crate::config::{AppConfig, Backend};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Savant - Research Control & Knowledge Graph Service
///
/// Runs autonomous research cycles and accumulates their findings in a
/// knowledge graph.
#[derive(Parser, Debug)]
#[command(name = "savant")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the config file (default: ./savant.toml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the graph database (overrides `storage.path`)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Storage backend (overrides `storage.backend`)
    #[arg(short = 'B', long, global = true, value_enum)]
    pub backend: Option<Backend>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Export file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ExportFormat {
    /// `{nodes, links}` as served by `GET /api/graph`
    Json,
    /// Header + postcard snapshot, importable with its checksum
    #[default]
    Binary,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server and research scheduler
    Server {
        /// Host to bind to
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,

        /// Start with autonomous research enabled
        #[arg(long)]
        autonomous: bool,

        /// Seconds between scheduled runs
        #[arg(long)]
        interval_secs: Option<u64>,
    },

    /// Show graph status
    Status,

    /// Apply a mutation batch file atomically
    Apply {
        /// Path to the JSON batch file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Run one research cycle and commit its batch
    Research,

    /// Export the graph
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,

        /// Export format
        #[arg(short = 't', long, value_enum, default_value_t = ExportFormat::Binary)]
        format: ExportFormat,
    },

    /// Initialize a new empty store
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },
}

// =============================================================================
// CONFIG RESOLUTION
// =============================================================================

/// Resolve the effective configuration: file, then environment, then flags.
pub fn resolve_config(cli: &Cli) -> Result<AppConfig, AppError> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_env()?;

    if let Some(path) = &cli.database {
        config.storage.path = path.clone();
    }
    if let Some(backend) = cli.backend {
        config.storage.backend = backend;
    }
    if let Some(Commands::Server {
        host,
        port,
        autonomous,
        interval_secs,
    }) = &cli.command
    {
        if let Some(host) = host {
            config.server.host = host.clone();
        }
        if let Some(port) = port {
            config.server.port = *port;
        }
        if *autonomous {
            config.research.autonomous = true;
        }
        if let Some(secs) = interval_secs {
            config.research.interval_secs = *secs;
        }
    }

    config.validate()?;
    Ok(config)
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), AppError> {
    let config = resolve_config(&cli)?;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { .. }) => cmd_server(&config).await,
        Some(Commands::Status) => cmd_status(&config, json_mode),
        Some(Commands::Apply { file }) => cmd_apply(&config, json_mode, &file),
        Some(Commands::Research) => cmd_research(&config, json_mode).await,
        Some(Commands::Export { output, format }) => cmd_export(&config, &output, format),
        Some(Commands::Init { force }) => cmd_init(&config, force),
        None => {
            // No subcommand - show status by default
            cmd_status(&config, json_mode)
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let cli = parse(&["savant", "--config", "/nonexistent/savant.toml", "status"]);
        assert!(matches!(resolve_config(&cli), Err(AppError::Config(_))));
    }

    #[test]
    fn server_flags_override_defaults() {
        let cli = parse(&[
            "savant",
            "-B",
            "file",
            "-D",
            "graph.savant",
            "server",
            "--port",
            "9999",
            "--autonomous",
            "--interval-secs",
            "30",
        ]);
        let config = resolve_config(&cli).unwrap();

        assert_eq!(config.server.port, 9999);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.storage.backend, Backend::File);
        assert_eq!(config.storage.path, PathBuf::from("graph.savant"));
        assert!(config.research.autonomous);
        assert_eq!(config.research.interval_secs, 30);
    }

    #[test]
    fn zero_interval_flag_fails_validation() {
        let cli = parse(&["savant", "server", "--interval-secs", "0"]);
        assert!(matches!(resolve_config(&cli), Err(AppError::Config(_))));
    }

    #[test]
    fn export_defaults_to_binary() {
        let cli = parse(&["savant", "export", "-o", "out.bin"]);
        match cli.command {
            Some(Commands::Export { format, .. }) => assert_eq!(format, ExportFormat::Binary),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_backend() {
        assert!(Cli::try_parse_from(["savant", "-B", "sqlite", "status"]).is_err());
    }
}
