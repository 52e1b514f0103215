//! # Savant - Research Control Server
//!
//! The main binary for the Savant research service.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - Autonomous research scheduler
//! - CLI interface for graph operations
//!
//! ## Usage
//!
//! ```bash
//! # Start the HTTP server with autonomous research enabled
//! savant server --host 0.0.0.0 --port 8080 --autonomous
//!
//! # CLI operations
//! savant status
//! savant apply -f batch.json
//! savant research
//! savant export -o graph.bin
//! ```

use clap::Parser;
use savant::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // SAVANT_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("SAVANT_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    // Parse CLI arguments
    let cli = cli::Cli::parse();

    let default_filter = if cli.verbose {
        "savant=debug,savant_core=debug,tower_http=debug"
    } else {
        "savant=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    // Display startup banner
    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    // Execute command
    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the Savant startup banner.
fn print_banner() {
    println!(
        r#"
  ███████╗ █████╗ ██╗   ██╗ █████╗ ███╗   ██╗████████╗
  ██╔════╝██╔══██╗██║   ██║██╔══██╗████╗  ██║╚══██╔══╝
  ███████╗███████║██║   ██║███████║██╔██╗ ██║   ██║
  ╚════██║██╔══██║╚██╗ ██╔╝██╔══██║██║╚██╗██║   ██║
  ███████║██║  ██║ ╚████╔╝ ██║  ██║██║ ╚████║   ██║
  ╚══════╝╚═╝  ╚═╝  ╚═══╝  ╚═╝  ╚═╝╚═╝  ╚═══╝   ╚═╝

  Research Control Server v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
