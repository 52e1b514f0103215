//! # Research Controller
//!
//! Owns the run state machine, the autonomy flag and the run bookkeeping.
//!
//! ```text
//!            trigger (only from Idle)
//!   Idle ───────────────────────────────▶ Running
//!    ▲                                       │
//!    │   Success → apply_mutations           │
//!    │   Failure → no store mutation         │
//!    └───────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//!
//! - At most one run is in flight. A trigger while `Running` is rejected
//!   with [`AlreadyRunning`], never queued.
//! - The state lock is never held across an `.await`.
//! - Every run ends in `Idle`, including runs whose task panics: the run
//!   permit releases the slot on drop.
//! - A run owns its task. Dropping a caller's future never releases the
//!   slot while the run's commit is in progress.
//! - Flipping autonomy never waits for an in-flight run.

use super::cancel::{CancelHandle, CancelSignal, cancel_pair};
use super::runner::{FailureReason, ResearchTask, RunContext, RunResult};
use savant_core::{CommitReceipt, GraphError, KnowledgeGraphStore, MutationBatch};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

/// Default scheduler interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3600);

/// Default run timeout.
pub const DEFAULT_RUN_TIMEOUT: Duration = Duration::from_secs(900);

// =============================================================================
// STATES AND OUTCOMES
// =============================================================================

/// Controller run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Running,
}

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOrigin {
    /// An explicit trigger (HTTP, CLI).
    Manual,
    /// The autonomy scheduler.
    Scheduled,
}

impl fmt::Display for RunOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manual => write!(f, "manual"),
            Self::Scheduled => write!(f, "scheduled"),
        }
    }
}

/// A trigger arrived while a run was in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("a research run is already in progress (run {active_run})")]
pub struct AlreadyRunning {
    pub active_run: u64,
}

/// Why a run ended without committing.
#[derive(Debug, Error)]
pub enum RunError {
    /// The task reported a failure.
    #[error("research task failed: {0}")]
    Task(String),

    /// The run was cancelled (timeout or shutdown).
    #[error("research run cancelled")]
    Cancelled,

    /// The task succeeded but the store rejected the batch.
    #[error("commit failed: {0}")]
    CommitFailed(#[source] GraphError),

    /// The run's task ended without reporting (panic or runtime shutdown).
    #[error("research run ended without an outcome")]
    Abandoned,
}

impl RunError {
    /// Stable name for status output.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Task(_) => "TaskFailed",
            Self::Cancelled => "Cancelled",
            Self::CommitFailed(_) => "CommitFailed",
            Self::Abandoned => "Abandoned",
        }
    }
}

/// The outcome of a trigger.
#[derive(Debug)]
pub enum RunOutcome {
    /// The run succeeded and its batch was committed.
    Completed { run_id: u64, receipt: CommitReceipt },
    /// The run ended without a commit.
    Failed { run_id: u64, error: RunError },
    /// Another run was in flight; nothing happened.
    Rejected(AlreadyRunning),
}

impl RunOutcome {
    /// Id of the run, unless the trigger was rejected.
    #[must_use]
    pub fn run_id(&self) -> Option<u64> {
        match self {
            Self::Completed { run_id, .. } | Self::Failed { run_id, .. } => Some(*run_id),
            Self::Rejected(_) => None,
        }
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Final status of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    Failed,
}

/// Bookkeeping record of a finished run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: u64,
    pub origin: RunOrigin,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<CommitReceipt>,
    /// Unix seconds.
    pub finished_at: i64,
    pub duration_ms: u64,
}

impl RunSummary {
    fn new(
        run_id: u64,
        origin: RunOrigin,
        result: &Result<CommitReceipt, RunError>,
        duration: Duration,
    ) -> Self {
        let (status, receipt, error) = match result {
            Ok(receipt) => (RunStatus::Completed, Some(*receipt), None),
            Err(error) => (RunStatus::Failed, None, Some(error)),
        };
        Self {
            run_id,
            origin,
            status,
            error_kind: error.map(|e| e.kind().to_string()),
            message: error.map(ToString::to_string),
            receipt,
            finished_at: unix_now(),
            duration_ms: duration.as_millis() as u64,
        }
    }

    fn abandoned(run_id: u64, origin: RunOrigin, duration: Duration) -> Self {
        Self::new(run_id, origin, &Err(RunError::Abandoned), duration)
    }
}

/// Run counters since startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub started: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub rejected: u64,
}

/// Result of setting the autonomy flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutonomyState {
    pub enabled: bool,
    /// False when the flag already had the requested value.
    pub changed: bool,
}

/// Point-in-time controller status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerStatus {
    pub autonomy: bool,
    pub state: RunState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_run: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_origin: Option<RunOrigin>,
    pub task: String,
    pub interval_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_timeout_secs: Option<u64>,
    pub stats: RunStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<RunSummary>,
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Controller timing configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Scheduler tick period while autonomy is enabled.
    pub interval: Duration,
    /// Cancel cancellable runs that exceed this.
    pub run_timeout: Option<Duration>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            run_timeout: Some(DEFAULT_RUN_TIMEOUT),
        }
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

struct ActiveRun {
    run_id: u64,
    origin: RunOrigin,
    cancel: CancelHandle,
}

#[derive(Default)]
struct Slot {
    active: Option<ActiveRun>,
    next_run_id: u64,
    stats: RunStats,
    last: Option<RunSummary>,
}

struct Inner {
    slot: Mutex<Slot>,
    state: watch::Sender<RunState>,
    autonomy: AtomicBool,
    shutdown: watch::Sender<bool>,
    store: Arc<KnowledgeGraphStore>,
    task: Arc<dyn ResearchTask>,
    config: ControllerConfig,
}

/// The research controller. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ResearchController {
    inner: Arc<Inner>,
}

impl fmt::Debug for ResearchController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResearchController")
            .field("task", &self.inner.task.name())
            .field("state", &self.run_state())
            .field("autonomy", &self.is_enabled())
            .finish()
    }
}

impl ResearchController {
    /// Create a controller. Autonomy starts disabled.
    pub fn new(
        store: Arc<KnowledgeGraphStore>,
        task: Arc<dyn ResearchTask>,
        config: ControllerConfig,
    ) -> Self {
        let (state, _) = watch::channel(RunState::Idle);
        let (shutdown, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                slot: Mutex::new(Slot::default()),
                state,
                autonomy: AtomicBool::new(false),
                shutdown,
                store,
                task,
                config,
            }),
        }
    }

    /// The store runs commit into.
    #[must_use]
    pub fn store(&self) -> &Arc<KnowledgeGraphStore> {
        &self.inner.store
    }

    #[must_use]
    pub fn config(&self) -> ControllerConfig {
        self.inner.config
    }

    fn lock_slot(&self) -> MutexGuard<'_, Slot> {
        self.inner.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -------------------------------------------------------------------------
    // Autonomy
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.autonomy.load(Ordering::SeqCst)
    }

    /// Set the autonomy flag. Idempotent.
    pub fn set_autonomy(&self, enabled: bool) -> AutonomyState {
        let previous = self.inner.autonomy.swap(enabled, Ordering::SeqCst);
        let changed = previous != enabled;
        if changed {
            tracing::info!(enabled, "autonomy changed");
        }
        AutonomyState { enabled, changed }
    }

    /// Flip the autonomy flag and return the new value.
    pub fn toggle_autonomy(&self) -> bool {
        let enabled = !self.inner.autonomy.fetch_xor(true, Ordering::SeqCst);
        tracing::info!(enabled, "autonomy toggled");
        enabled
    }

    // -------------------------------------------------------------------------
    // Status
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn run_state(&self) -> RunState {
        *self.inner.state.borrow()
    }

    #[must_use]
    pub fn status(&self) -> ControllerStatus {
        let slot = self.lock_slot();
        ControllerStatus {
            autonomy: self.is_enabled(),
            state: if slot.active.is_some() {
                RunState::Running
            } else {
                RunState::Idle
            },
            active_run: slot.active.as_ref().map(|a| a.run_id),
            active_origin: slot.active.as_ref().map(|a| a.origin),
            task: self.inner.task.name().to_string(),
            interval_secs: self.inner.config.interval.as_secs(),
            run_timeout_secs: self.inner.config.run_timeout.map(|t| t.as_secs()),
            stats: slot.stats,
            last_run: slot.last.clone(),
        }
    }

    /// Resolve once no run is in flight.
    pub async fn wait_idle(&self) {
        let mut state = self.inner.state.subscribe();
        // The sender lives in `self`, so this cannot fail.
        let _ = state.wait_for(|s| *s == RunState::Idle).await;
    }

    // -------------------------------------------------------------------------
    // Triggers
    // -------------------------------------------------------------------------

    /// Run once now and wait for the outcome.
    pub async fn trigger_now(&self) -> RunOutcome {
        self.trigger(RunOrigin::Manual).await
    }

    /// Run once and wait for the outcome.
    ///
    /// The run executes on its own task: dropping the returned future stops
    /// the wait, not the run.
    pub async fn trigger(&self, origin: RunOrigin) -> RunOutcome {
        let permit = match self.begin(origin) {
            Ok(permit) => permit,
            Err(rejected) => {
                tracing::debug!(%origin, active_run = rejected.active_run, "trigger rejected");
                return RunOutcome::Rejected(rejected);
            }
        };
        let run_id = permit.run_id;
        let controller = self.clone();
        match tokio::spawn(async move { controller.execute(permit).await }).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(run_id, error = %e, "research run task failed");
                RunOutcome::Failed {
                    run_id,
                    error: RunError::Abandoned,
                }
            }
        }
    }

    /// Accept a run and execute it in the background. Returns the run id.
    pub fn start(&self, origin: RunOrigin) -> Result<u64, AlreadyRunning> {
        let permit = self.begin(origin)?;
        let run_id = permit.run_id;
        let controller = self.clone();
        tokio::spawn(async move {
            controller.execute(permit).await;
        });
        Ok(run_id)
    }

    /// Stop the scheduler and cancel the in-flight run, if any.
    pub fn shutdown(&self) {
        tracing::info!("research controller shutting down");
        self.inner.shutdown.send_replace(true);
        if let Some(active) = &self.lock_slot().active {
            active.cancel.cancel();
        }
    }

    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        *self.inner.shutdown.borrow()
    }

    pub(crate) fn subscribe_shutdown(&self) -> watch::Receiver<bool> {
        self.inner.shutdown.subscribe()
    }

    /// Idle → Running, or reject.
    ///
    /// After [`shutdown`](Self::shutdown) an admitted run starts cancelled.
    fn begin(&self, origin: RunOrigin) -> Result<RunPermit, AlreadyRunning> {
        let mut slot = self.lock_slot();
        if let Some(active_run) = slot.active.as_ref().map(|a| a.run_id) {
            slot.stats.rejected += 1;
            return Err(AlreadyRunning { active_run });
        }

        slot.next_run_id += 1;
        let run_id = slot.next_run_id;
        let (cancel, signal) = cancel_pair();
        slot.active = Some(ActiveRun {
            run_id,
            origin,
            cancel: cancel.clone(),
        });
        slot.stats.started += 1;
        // Read under the slot lock: `shutdown` sets the flag before it
        // inspects the slot, so no admitted run escapes cancellation.
        if self.is_shut_down() {
            cancel.cancel();
        }
        self.inner.state.send_replace(RunState::Running);

        Ok(RunPermit {
            controller: self.clone(),
            run_id,
            origin,
            cancel,
            signal,
            started: Instant::now(),
            released: false,
        })
    }

    /// Running → Idle, recording the summary.
    fn release(&self, run_id: u64, summary: RunSummary) {
        let mut slot = self.lock_slot();
        if slot.active.as_ref().is_some_and(|a| a.run_id == run_id) {
            slot.active = None;
        }
        match summary.status {
            RunStatus::Completed => slot.stats.succeeded += 1,
            RunStatus::Failed => slot.stats.failed += 1,
        }
        slot.last = Some(summary);
        self.inner.state.send_replace(RunState::Idle);
    }

    async fn execute(&self, mut permit: RunPermit) -> RunOutcome {
        let task = Arc::clone(&self.inner.task);
        let run_id = permit.run_id;
        tracing::info!(run_id, origin = %permit.origin, task = task.name(), "research run started");

        let ctx = RunContext {
            run_id,
            cancel: permit.signal.clone(),
        };
        let timeout = self.inner.config.run_timeout.filter(|_| task.is_cancellable());

        let result = match timeout {
            _ if permit.cancel.is_cancelled() => {
                tracing::info!(run_id, "research run cancelled before start");
                RunResult::cancelled()
            }
            Some(limit) => {
                let run = task.run(ctx);
                tokio::pin!(run);
                tokio::select! {
                    result = &mut run => result,
                    () = tokio::time::sleep(limit) => {
                        tracing::warn!(run_id, timeout_secs = limit.as_secs(), "research run timed out");
                        permit.cancel.cancel();
                        RunResult::cancelled()
                    }
                }
            }
            None => task.run(ctx).await,
        };

        let result = match result {
            RunResult::Success(batch) => self.commit(batch).await.map_err(RunError::CommitFailed),
            RunResult::Failure(FailureReason::Cancelled) => Err(RunError::Cancelled),
            RunResult::Failure(FailureReason::Task(msg)) => Err(RunError::Task(msg)),
        };

        match &result {
            Ok(receipt) => tracing::info!(
                run_id,
                version = receipt.version,
                nodes_added = receipt.nodes_added,
                links_added = receipt.links_added,
                "research run committed"
            ),
            Err(error) => tracing::warn!(
                run_id,
                origin = %permit.origin,
                kind = error.kind(),
                error = %error,
                "research run failed"
            ),
        }

        permit.finish(RunSummary::new(
            run_id,
            permit.origin,
            &result,
            permit.started.elapsed(),
        ));
        match result {
            Ok(receipt) => RunOutcome::Completed { run_id, receipt },
            Err(error) => RunOutcome::Failed { run_id, error },
        }
    }

    /// Hand a batch to the store off the async workers.
    async fn commit(&self, batch: MutationBatch) -> Result<CommitReceipt, GraphError> {
        let store = Arc::clone(&self.inner.store);
        tokio::task::spawn_blocking(move || store.apply_mutations(&batch))
            .await
            .map_err(|e| GraphError::Persistence(format!("commit task aborted: {}", e)))?
    }
}

// =============================================================================
// RUN PERMIT
// =============================================================================

/// Proof of owning the Running slot. Releases it on drop.
struct RunPermit {
    controller: ResearchController,
    run_id: u64,
    origin: RunOrigin,
    cancel: CancelHandle,
    signal: CancelSignal,
    started: Instant,
    released: bool,
}

impl RunPermit {
    fn finish(&mut self, summary: RunSummary) {
        self.released = true;
        self.controller.release(self.run_id, summary);
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        if !self.released {
            tracing::error!(run_id = self.run_id, "research run abandoned");
            let summary =
                RunSummary::abandoned(self.run_id, self.origin, self.started.elapsed());
            self.controller.release(self.run_id, summary);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
