//! # Configuration
//!
//! Settings are layered, later layers winning:
//!
//! 1. Built-in defaults
//! 2. `savant.toml` (or the file given with `--config`)
//! 3. Environment variables
//! 4. CLI flags (applied by the `cli` module)
//!
//! ## Environment Variables
//!
//! - `SAVANT_CORS_ORIGINS`: Comma-separated allowed origins, or "*" for all
//! - `SAVANT_RATE_LIMIT`: Requests per second (0 disables limiting)
//! - `SAVANT_RESEARCH_INTERVAL_SECS`: Scheduler interval
//! - `SAVANT_RUN_TIMEOUT_SECS`: Run timeout (0 disables the timeout)
//!
//! ## Example
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [storage]
//! backend = "redb"
//! path = "savant.db"
//!
//! [research]
//! autonomous = true
//! interval_secs = 1800
//!
//! [research.task]
//! kind = "topic_survey"
//! topics = ["knowledge graphs", "autonomous agents"]
//! ```

use crate::research::{CommandTask, ControllerConfig, ResearchTask, TopicSurveyTask};
use clap::ValueEnum;
use savant_core::{FileSnapshot, GraphError, KnowledgeGraphStore, RedbPersistence};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Config file read when `--config` is not given and the file exists.
pub const DEFAULT_CONFIG_FILE: &str = "savant.toml";

/// Maximum config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1024 * 1024;

// =============================================================================
// ERRORS
// =============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{}': {reason}", path.display())]
    Read { path: PathBuf, reason: String },

    #[error("invalid config file '{}': {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("invalid value for {name}: '{value}'")]
    Env { name: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

// =============================================================================
// SECTIONS
// =============================================================================

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-memory only; nothing survives a restart.
    #[default]
    Memory,
    /// Whole-graph snapshot file rewritten on every commit.
    File,
    /// redb database updated incrementally.
    Redb,
}

impl Backend {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::File => "file",
            Self::Redb => "redb",
        }
    }
}

/// `[server]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// `None` means localhost only; `["*"]` allows every origin.
    pub cors_origins: Option<Vec<String>>,
    /// Requests per second; 0 disables limiting.
    pub rate_limit: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_origins: None,
            rate_limit: 100,
        }
    }
}

/// `[storage]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: Backend,
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Memory,
            path: PathBuf::from("savant.db"),
        }
    }
}

/// `[research.task]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskConfig {
    /// The built-in topic survey.
    TopicSurvey {
        topics: Vec<String>,
        #[serde(default)]
        step_delay_ms: u64,
    },
    /// An external program printing a JSON batch.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default = "default_true")]
        cancellable: bool,
    },
}

fn default_true() -> bool {
    true
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self::TopicSurvey {
            topics: vec![
                "knowledge graphs".to_string(),
                "autonomous agents".to_string(),
            ],
            step_delay_ms: 0,
        }
    }
}

/// `[research]`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResearchConfig {
    /// Start with autonomy enabled.
    pub autonomous: bool,
    pub interval_secs: u64,
    /// 0 disables the timeout.
    pub run_timeout_secs: u64,
    pub task: TaskConfig,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            autonomous: false,
            interval_secs: 3600,
            run_timeout_secs: 900,
            task: TaskConfig::default(),
        }
    }
}

/// The whole configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub research: ResearchConfig,
}

// =============================================================================
// LOADING
// =============================================================================

impl AppConfig {
    /// Parse a TOML document.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Parse {
            path: origin.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Load the file layer.
    ///
    /// An explicit path must exist. Without one, `savant.toml` in the working
    /// directory is used when present, otherwise defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let read_err = |reason: String| ConfigError::Read {
            path: path.clone(),
            reason,
        };
        let metadata = std::fs::metadata(&path).map_err(|e| read_err(e.to_string()))?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(read_err(format!(
                "file size {} bytes exceeds maximum {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }
        let text = std::fs::read_to_string(&path).map_err(|e| read_err(e.to_string()))?;

        let config = Self::from_toml_str(&text, &path)?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Apply the environment layer from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply the environment layer from an arbitrary lookup.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(origins) = lookup("SAVANT_CORS_ORIGINS") {
            self.server.cors_origins = Some(
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            );
        }
        if let Some(value) = lookup("SAVANT_RATE_LIMIT") {
            self.server.rate_limit = parse_env("SAVANT_RATE_LIMIT", &value)?;
        }
        if let Some(value) = lookup("SAVANT_RESEARCH_INTERVAL_SECS") {
            self.research.interval_secs = parse_env("SAVANT_RESEARCH_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = lookup("SAVANT_RUN_TIMEOUT_SECS") {
            self.research.run_timeout_secs = parse_env("SAVANT_RUN_TIMEOUT_SECS", &value)?;
        }
        Ok(())
    }

    /// Check cross-field constraints after all layers are applied.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.research.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "research.interval_secs must be at least 1".to_string(),
            ));
        }
        match &self.research.task {
            TaskConfig::TopicSurvey { topics, .. } if topics.iter().all(|t| t.trim().is_empty()) => {
                Err(ConfigError::Invalid(
                    "research.task.topics must name at least one topic".to_string(),
                ))
            }
            TaskConfig::Command { program, .. } if program.trim().is_empty() => Err(
                ConfigError::Invalid("research.task.program must not be empty".to_string()),
            ),
            _ => Ok(()),
        }
    }

    // -------------------------------------------------------------------------
    // Builders
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            interval: Duration::from_secs(self.research.interval_secs),
            run_timeout: (self.research.run_timeout_secs > 0)
                .then(|| Duration::from_secs(self.research.run_timeout_secs)),
        }
    }

    /// Build the configured research task.
    #[must_use]
    pub fn build_task(&self) -> Arc<dyn ResearchTask> {
        match &self.research.task {
            TaskConfig::TopicSurvey {
                topics,
                step_delay_ms,
            } => Arc::new(
                TopicSurveyTask::new(topics.iter().filter(|t| !t.trim().is_empty()).cloned())
                    .with_step_delay(Duration::from_millis(*step_delay_ms)),
            ),
            TaskConfig::Command {
                program,
                args,
                cancellable,
            } => {
                let task = CommandTask::new(program.clone(), args.iter().cloned());
                if *cancellable {
                    Arc::new(task)
                } else {
                    Arc::new(task.non_cancellable())
                }
            }
        }
    }

    /// Open the configured store, loading any persisted state.
    pub fn open_store(&self) -> Result<KnowledgeGraphStore, GraphError> {
        let path = &self.storage.path;
        match self.storage.backend {
            Backend::Memory => Ok(KnowledgeGraphStore::new()),
            Backend::File => KnowledgeGraphStore::with_hook(Box::new(FileSnapshot::new(path))),
            Backend::Redb => {
                KnowledgeGraphStore::with_hook(Box::new(RedbPersistence::open(path)?))
            }
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        name,
        value: value.to_string(),
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.backend, Backend::Memory);
        assert!(!config.research.autonomous);
        assert_eq!(
            config.controller_config().run_timeout,
            Some(Duration::from_secs(900))
        );
    }

    #[test]
    fn parses_full_file() {
        let text = r#"
            [server]
            host = "0.0.0.0"
            port = 9000
            cors_origins = ["http://example.org"]

            [storage]
            backend = "redb"
            path = "/var/lib/savant/graph.redb"

            [research]
            autonomous = true
            interval_secs = 60
            run_timeout_secs = 0

            [research.task]
            kind = "command"
            program = "./crawl.sh"
            args = ["--fast"]
        "#;
        let config = AppConfig::from_toml_str(text, Path::new("test.toml")).unwrap();

        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.rate_limit, 100);
        assert_eq!(config.storage.backend, Backend::Redb);
        assert!(config.research.autonomous);
        assert_eq!(config.controller_config().run_timeout, None);
        assert_eq!(
            config.research.task,
            TaskConfig::Command {
                program: "./crawl.sh".to_string(),
                args: vec!["--fast".to_string()],
                cancellable: true,
            }
        );
        assert_eq!(config.build_task().name(), "./crawl.sh");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = AppConfig::from_toml_str("[server]\nprot = 1\n", Path::new("x.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn env_overrides_file() {
        let mut config =
            AppConfig::from_toml_str("[research]\ninterval_secs = 60\n", Path::new("x.toml"))
                .unwrap();
        config
            .apply_env_from(env(&[
                ("SAVANT_RESEARCH_INTERVAL_SECS", "5"),
                ("SAVANT_RATE_LIMIT", "0"),
                ("SAVANT_CORS_ORIGINS", "http://a.test, http://b.test"),
            ]))
            .unwrap();

        assert_eq!(config.research.interval_secs, 5);
        assert_eq!(config.server.rate_limit, 0);
        assert_eq!(
            config.server.cors_origins,
            Some(vec!["http://a.test".to_string(), "http://b.test".to_string()])
        );
    }

    #[test]
    fn bad_env_value_is_an_error() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env_from(env(&[("SAVANT_RUN_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Env {
                name: "SAVANT_RUN_TIMEOUT_SECS",
                ..
            }
        ));
    }

    #[test]
    fn validation_catches_empty_task_settings() {
        let mut config = AppConfig::default();
        config.research.task = TaskConfig::TopicSurvey {
            topics: vec!["  ".to_string()],
            step_delay_ms: 0,
        };
        assert!(config.validate().is_err());

        config.research.task = TaskConfig::default();
        config.research.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/definitely/not/here.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn opens_file_backend() {
        let temp = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.storage.backend = Backend::File;
        config.storage.path = temp.path().join("graph.savant");

        let store = config.open_store().unwrap();
        assert_eq!(store.backend_name(), "file");
        assert!(store.snapshot().is_empty());
    }
}
