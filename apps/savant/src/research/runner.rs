//! # Research Task Runner
//!
//! A research task is an async unit of work that produces a mutation batch.
//! Tasks never touch the store; the controller commits what they return.

use super::cancel::CancelSignal;
use async_trait::async_trait;
use savant_core::MutationBatch;
use std::fmt;

// =============================================================================
// RUN RESULT
// =============================================================================

/// Why a run produced no batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// The run observed its cancel signal.
    Cancelled,
    /// The task failed on its own.
    Task(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "cancelled"),
            Self::Task(msg) => write!(f, "{}", msg),
        }
    }
}

/// The result of one research run.
#[derive(Debug, Clone, PartialEq)]
pub enum RunResult {
    Success(MutationBatch),
    Failure(FailureReason),
}

impl RunResult {
    /// Shorthand for a task failure.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failure(FailureReason::Task(message.into()))
    }

    /// Shorthand for a cancelled run.
    #[must_use]
    pub fn cancelled() -> Self {
        Self::Failure(FailureReason::Cancelled)
    }
}

// =============================================================================
// TASK TRAIT
// =============================================================================

/// Per-run inputs handed to a task.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// Monotonic id assigned by the controller.
    pub run_id: u64,
    /// Fires when the run must stop.
    pub cancel: CancelSignal,
}

impl RunContext {
    /// A context that is never cancelled. Used for offline runs and tests.
    #[must_use]
    pub fn detached(run_id: u64) -> Self {
        Self {
            run_id,
            cancel: CancelSignal::never(),
        }
    }
}

/// An async research job.
///
/// Implementations observe `ctx.cancel` at their suspension points and
/// return `RunResult::Failure(FailureReason::Cancelled)` promptly once it fires.
#[async_trait]
pub trait ResearchTask: Send + Sync {
    /// Short name for logs and status output.
    fn name(&self) -> &str;

    /// Run once, producing a batch or a failure.
    async fn run(&self, ctx: RunContext) -> RunResult;

    /// Whether the run timeout applies to this task.
    ///
    /// Non-cancellable tasks are never force-cancelled on timeout; they are
    /// still signalled on shutdown.
    fn is_cancellable(&self) -> bool {
        true
    }
}
