//! # Research Module
//!
//! Everything that decides *when* research runs and *what* they produce:
//!
//! - `runner`: the [`ResearchTask`] trait and run results
//! - `tasks`: shipped task implementations
//! - `controller`: the single-flight run state machine and autonomy flag
//! - `scheduler`: the interval loop driving autonomous runs
//! - `cancel`: cooperative cancellation between controller and task

pub mod cancel;
pub mod controller;
pub mod runner;
pub mod scheduler;
pub mod tasks;

pub use cancel::{CancelHandle, CancelSignal, cancel_pair};
pub use controller::{
    AlreadyRunning, AutonomyState, ControllerConfig, ControllerStatus, ResearchController,
    RunError, RunOrigin, RunOutcome, RunState, RunStats, RunStatus, RunSummary,
};
pub use runner::{FailureReason, ResearchTask, RunContext, RunResult};
pub use scheduler::spawn_scheduler;
pub use tasks::{CommandTask, ScriptStep, ScriptedTask, TopicSurveyTask};
