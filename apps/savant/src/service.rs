//! # Research Service
//!
//! The facade used by the HTTP API and the CLI. It only delegates to the
//! controller and the store and translates their errors; all decisions
//! live below it.

use crate::research::{
    AlreadyRunning, AutonomyState, ControllerStatus, ResearchController, RunOrigin, RunOutcome,
};
use savant_core::{
    CommitReceipt, GraphError, GraphMetrics, GraphSnapshot, KnowledgeGraphStore, MutationBatch,
    Node, NodeId, Relationship,
};
use std::sync::Arc;

/// Reason string reported when a start request hits an in-flight run.
pub const ALREADY_RUNNING: &str = "AlreadyRunning";

/// Answer to a fire-and-forget start request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartOutcome {
    pub accepted: bool,
    pub reason: Option<String>,
    pub run_id: Option<u64>,
}

impl From<Result<u64, AlreadyRunning>> for StartOutcome {
    fn from(result: Result<u64, AlreadyRunning>) -> Self {
        match result {
            Ok(run_id) => Self {
                accepted: true,
                reason: None,
                run_id: Some(run_id),
            },
            Err(_) => Self {
                accepted: false,
                reason: Some(ALREADY_RUNNING.to_string()),
                run_id: None,
            },
        }
    }
}

/// A node together with every link touching it.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeView {
    pub node: Node,
    pub links: Vec<Relationship>,
}

/// Facade over the controller and the store.
#[derive(Debug, Clone)]
pub struct ResearchService {
    controller: ResearchController,
}

impl ResearchService {
    pub fn new(controller: ResearchController) -> Self {
        Self { controller }
    }

    #[must_use]
    pub fn controller(&self) -> &ResearchController {
        &self.controller
    }

    fn store(&self) -> &Arc<KnowledgeGraphStore> {
        self.controller.store()
    }

    // -------------------------------------------------------------------------
    // Autonomy
    // -------------------------------------------------------------------------

    pub fn enable(&self) -> AutonomyState {
        self.controller.set_autonomy(true)
    }

    pub fn disable(&self) -> AutonomyState {
        self.controller.set_autonomy(false)
    }

    pub fn set_enabled(&self, enabled: bool) -> AutonomyState {
        self.controller.set_autonomy(enabled)
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.controller.is_enabled()
    }

    /// Flip autonomy; returns the new value.
    pub fn toggle(&self) -> bool {
        self.controller.toggle_autonomy()
    }

    // -------------------------------------------------------------------------
    // Runs
    // -------------------------------------------------------------------------

    /// Run once and wait for the outcome.
    pub async fn trigger_now(&self) -> RunOutcome {
        self.controller.trigger_now().await
    }

    /// Accept a run and execute it in the background.
    pub fn start(&self) -> StartOutcome {
        self.controller.start(RunOrigin::Manual).into()
    }

    #[must_use]
    pub fn status(&self) -> ControllerStatus {
        self.controller.status()
    }

    // -------------------------------------------------------------------------
    // Graph
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn read_graph(&self) -> GraphSnapshot {
        self.store().snapshot()
    }

    /// A node and its incoming and outgoing links.
    pub fn node(&self, id: &NodeId) -> Result<NodeView, GraphError> {
        let snapshot = self.read_graph();
        let node = snapshot
            .node(id)
            .cloned()
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        let links = snapshot.links_of(id).cloned().collect();
        Ok(NodeView { node, links })
    }

    #[must_use]
    pub fn metrics(&self) -> GraphMetrics {
        GraphMetrics::from_graph(&self.read_graph())
    }

    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.store().backend_name()
    }

    /// Apply a batch outside of any research run.
    ///
    /// Shares the store's writer path with research commits.
    pub async fn apply_manual(&self, batch: MutationBatch) -> Result<CommitReceipt, GraphError> {
        let store = Arc::clone(self.store());
        let receipt = tokio::task::spawn_blocking(move || store.apply_mutations(&batch))
            .await
            .map_err(|e| GraphError::Persistence(format!("commit task aborted: {}", e)))??;
        tracing::info!(
            version = receipt.version,
            nodes_added = receipt.nodes_added,
            links_added = receipt.links_added,
            "manual batch committed"
        );
        Ok(receipt)
    }

    /// Stop the scheduler and cancel the in-flight run.
    pub fn shutdown(&self) {
        self.controller.shutdown();
    }
}
