//! # Application Errors
//!
//! Top-level error of the binary. Each layer keeps its own error type; this
//! one only wraps them for `main`.

use crate::batch::BatchFormatError;
use crate::config::ConfigError;
use crate::research::{AlreadyRunning, RunError};
use savant_core::GraphError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Batch(#[from] BatchFormatError),

    #[error(transparent)]
    Rejected(#[from] AlreadyRunning),

    #[error("research run {run_id} failed: {source}")]
    Run {
        run_id: u64,
        #[source]
        source: RunError,
    },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("server error: {0}")]
    Server(String),
}
