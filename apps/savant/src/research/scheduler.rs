//! # Autonomy Scheduler
//!
//! Triggers a scheduled run every `interval` while autonomy is enabled.
//!
//! Runs execute inline in the loop, so scheduled runs never overlap each
//! other. Ticks missed while a run is in flight are skipped, not replayed,
//! and a tick that collides with a manual run is dropped.

use super::controller::{ResearchController, RunOrigin, RunOutcome};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Spawn the scheduler loop. It exits after [`ResearchController::shutdown`].
pub fn spawn_scheduler(controller: ResearchController) -> JoinHandle<()> {
    tokio::spawn(run_scheduler(controller))
}

async fn run_scheduler(controller: ResearchController) {
    let interval = controller.config().interval;
    let mut shutdown = controller.subscribe_shutdown();
    // First tick one full period after start.
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(interval_secs = interval.as_secs(), "research scheduler started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            () = shutdown_requested(&mut shutdown) => break,
        }

        if !controller.is_enabled() {
            continue;
        }

        match controller.trigger(RunOrigin::Scheduled).await {
            RunOutcome::Completed { run_id, receipt } => {
                tracing::debug!(run_id, version = receipt.version, "scheduled run done");
            }
            RunOutcome::Failed { run_id, error } => {
                tracing::debug!(run_id, kind = error.kind(), "scheduled run failed");
            }
            RunOutcome::Rejected(busy) => {
                tracing::debug!(active_run = busy.active_run, "tick skipped, run in flight");
            }
        }
    }

    tracing::info!("research scheduler stopped");
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender counts as shutdown too.
    let _ = shutdown.wait_for(|stop| *stop).await;
}
