//! # Research Tasks
//!
//! Shipped implementations of [`ResearchTask`]:
//!
//! - [`TopicSurveyTask`]: built-in, deterministic survey over configured topics
//! - [`CommandTask`]: runs an external program that prints a JSON batch
//! - [`ScriptedTask`]: replays a fixed list of results

use super::runner::{ResearchTask, RunContext, RunResult};
use crate::batch::MutationBatchJson;
use async_trait::async_trait;
use savant_core::{Mutation, MutationBatch, Properties, PropertyValue};
use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::process::Command;

/// Label of the node recording one survey run.
pub const CYCLE_LABEL: &str = "ResearchCycle";
/// Label of surveyed topic nodes.
pub const TOPIC_LABEL: &str = "Topic";
/// Link from a cycle to each topic it covered.
pub const INVESTIGATED: &str = "INVESTIGATED";

/// Longest stderr excerpt carried in a failure message.
const MAX_STDERR_EXCERPT: usize = 512;

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_secs()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

// =============================================================================
// TOPIC SURVEY
// =============================================================================

/// Surveys a fixed list of topics.
///
/// Each run yields one `ResearchCycle` node linked with `INVESTIGATED` to a
/// `Topic` node per topic. Topic nodes are merged across runs, so their
/// `last_investigated` property tracks the latest cycle.
#[derive(Debug, Clone)]
pub struct TopicSurveyTask {
    topics: Vec<String>,
    step_delay: Duration,
}

impl TopicSurveyTask {
    /// Create a survey over the given topics.
    pub fn new<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            topics: topics.into_iter().map(Into::into).collect(),
            step_delay: Duration::ZERO,
        }
    }

    /// Pause between topics. The pause is a cancellation point.
    #[must_use]
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// Configured topics.
    #[must_use]
    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    /// Stable node id of a topic: `topic:` plus a lowercase slug.
    #[must_use]
    pub fn topic_id(topic: &str) -> String {
        let mut slug = String::with_capacity(topic.len());
        for c in topic.trim().chars() {
            if c.is_alphanumeric() {
                slug.extend(c.to_lowercase());
            } else if !slug.is_empty() && !slug.ends_with('-') {
                slug.push('-');
            }
        }
        let slug = slug.trim_end_matches('-');
        if slug.is_empty() {
            "topic:untitled".to_string()
        } else {
            format!("topic:{}", slug)
        }
    }

    fn cycle_batch(&self, run_id: u64, started_at: i64) -> MutationBatch {
        let cycle_id = format!("cycle:{}-{}", started_at, run_id);

        let mut cycle_props = Properties::new();
        cycle_props.insert("run_id".to_string(), PropertyValue::Int(run_id as i64));
        cycle_props.insert("started_at".to_string(), PropertyValue::Int(started_at));
        cycle_props.insert(
            "topic_count".to_string(),
            PropertyValue::Int(self.topics.len() as i64),
        );

        let mut batch = MutationBatch::new().with(Mutation::add_node(
            cycle_id.as_str(),
            &[CYCLE_LABEL],
            cycle_props,
        ));

        for topic in &self.topics {
            let topic_id = Self::topic_id(topic);
            let mut props = Properties::new();
            props.insert("name".to_string(), PropertyValue::text(topic.trim()));
            props.insert(
                "last_investigated".to_string(),
                PropertyValue::Int(started_at),
            );
            batch.push(Mutation::add_node(topic_id.as_str(), &[TOPIC_LABEL], props));
            batch.push(Mutation::add_relationship(
                cycle_id.as_str(),
                topic_id.as_str(),
                INVESTIGATED,
            ));
        }
        batch
    }
}

#[async_trait]
impl ResearchTask for TopicSurveyTask {
    fn name(&self) -> &str {
        "topic-survey"
    }

    async fn run(&self, ctx: RunContext) -> RunResult {
        let started_at = unix_now();

        for topic in &self.topics {
            if ctx.cancel.is_cancelled() {
                return RunResult::cancelled();
            }
            if self.step_delay.is_zero() {
                tokio::task::yield_now().await;
                continue;
            }
            tokio::select! {
                () = tokio::time::sleep(self.step_delay) => {
                    tracing::debug!(run_id = ctx.run_id, topic = %topic, "topic surveyed");
                }
                () = ctx.cancel.cancelled() => return RunResult::cancelled(),
            }
        }

        if ctx.cancel.is_cancelled() {
            return RunResult::cancelled();
        }
        RunResult::Success(self.cycle_batch(ctx.run_id, started_at))
    }
}

// =============================================================================
// EXTERNAL COMMAND
// =============================================================================

/// Runs an external program once per research run.
///
/// The program receives `SAVANT_RUN_ID` in its environment and must print a
/// JSON mutation batch (see [`crate::batch`]) on stdout. Empty output is an
/// empty batch. A non-zero exit is a task failure. On cancellation the
/// child process is killed.
#[derive(Debug, Clone)]
pub struct CommandTask {
    program: String,
    args: Vec<String>,
    cancellable: bool,
}

impl CommandTask {
    /// Create a task for `program` with `args`.
    pub fn new<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cancellable: true,
        }
    }

    /// Exempt the command from the run timeout.
    #[must_use]
    pub fn non_cancellable(mut self) -> Self {
        self.cancellable = false;
        self
    }

    fn parse_output(&self, stdout: &[u8]) -> RunResult {
        let text = String::from_utf8_lossy(stdout);
        if text.trim().is_empty() {
            return RunResult::Success(MutationBatch::new());
        }
        match MutationBatchJson::parse(&text).and_then(MutationBatchJson::into_batch) {
            Ok(batch) => RunResult::Success(batch),
            Err(e) => RunResult::failed(format!("'{}' printed an invalid batch: {}", self.program, e)),
        }
    }
}

fn excerpt(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let text = text.trim();
    match text.char_indices().nth(MAX_STDERR_EXCERPT) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[async_trait]
impl ResearchTask for CommandTask {
    fn name(&self) -> &str {
        &self.program
    }

    async fn run(&self, ctx: RunContext) -> RunResult {
        let child = Command::new(&self.program)
            .args(&self.args)
            .env("SAVANT_RUN_ID", ctx.run_id.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => return RunResult::failed(format!("failed to spawn '{}': {}", self.program, e)),
        };

        // Dropping the wait future drops the child, which kills it.
        let output = tokio::select! {
            output = child.wait_with_output() => output,
            () = ctx.cancel.cancelled() => {
                tracing::info!(run_id = ctx.run_id, program = %self.program, "killing research command");
                return RunResult::cancelled();
            }
        };

        match output {
            Err(e) => RunResult::failed(format!("'{}' could not be awaited: {}", self.program, e)),
            Ok(out) if !out.status.success() => RunResult::failed(format!(
                "'{}' exited with {}: {}",
                self.program,
                out.status,
                excerpt(&out.stderr)
            )),
            Ok(out) => self.parse_output(&out.stdout),
        }
    }

    fn is_cancellable(&self) -> bool {
        self.cancellable
    }
}

// =============================================================================
// SCRIPTED
// =============================================================================

/// One scripted run: wait, then yield a fixed result.
#[derive(Debug, Clone)]
pub struct ScriptStep {
    pub delay: Duration,
    pub result: RunResult,
}

impl ScriptStep {
    #[must_use]
    pub fn immediate(result: RunResult) -> Self {
        Self {
            delay: Duration::ZERO,
            result,
        }
    }

    #[must_use]
    pub fn delayed(delay: Duration, result: RunResult) -> Self {
        Self { delay, result }
    }
}

/// Replays scripted steps in order; once exhausted every run yields an
/// empty batch.
#[derive(Debug)]
pub struct ScriptedTask {
    steps: Mutex<VecDeque<ScriptStep>>,
    cancellable: bool,
    runs: AtomicUsize,
}

impl ScriptedTask {
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            cancellable: true,
            runs: AtomicUsize::new(0),
        }
    }

    /// Ignore the cancel signal while waiting and opt out of the timeout.
    #[must_use]
    pub fn non_cancellable(mut self) -> Self {
        self.cancellable = false;
        self
    }

    /// Number of runs started so far.
    #[must_use]
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    fn next_step(&self) -> ScriptStep {
        self.steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| ScriptStep::immediate(RunResult::Success(MutationBatch::new())))
    }
}

#[async_trait]
impl ResearchTask for ScriptedTask {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn run(&self, ctx: RunContext) -> RunResult {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let step = self.next_step();

        if !step.delay.is_zero() {
            if self.cancellable {
                tokio::select! {
                    () = tokio::time::sleep(step.delay) => {}
                    () = ctx.cancel.cancelled() => return RunResult::cancelled(),
                }
            } else {
                tokio::time::sleep(step.delay).await;
            }
        }
        step.result
    }

    fn is_cancellable(&self) -> bool {
        self.cancellable
    }
}

// =============================================================================
// TESTS
// =============================================================================
