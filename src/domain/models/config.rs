use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main configuration structure for the knowledge sync controller
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Root directory for workspaces
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Reconciliation pass configuration
    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    /// Sweep loop configuration for `ksync run`
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Commands that implement each data source task, keyed by task name
    #[serde(default)]
    pub tasks: HashMap<String, TaskCommandConfig>,
}

fn default_data_dir() -> String {
    ".ksync/data".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            reconciler: ReconcilerConfig::default(),
            scheduler: SchedulerConfig::default(),
            tasks: HashMap::new(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".ksync/ksync.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    pub fn url(&self) -> String {
        format!("sqlite:{}", self.path)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stderr only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// File rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Timing knobs for a single reconciliation pass
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReconcilerConfig {
    /// Seconds between progress checkpoints while a task runs
    #[serde(default = "default_checkpoint_interval_secs")]
    pub checkpoint_interval_secs: u64,

    /// Seconds to wait for a thread to be assigned a workspace
    #[serde(default = "default_thread_ready_timeout_secs")]
    pub thread_ready_timeout_secs: u64,
}

const fn default_checkpoint_interval_secs() -> u64 {
    15
}

const fn default_thread_ready_timeout_secs() -> u64 {
    60
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval_secs: default_checkpoint_interval_secs(),
            thread_ready_timeout_secs: default_thread_ready_timeout_secs(),
        }
    }
}

/// Sweep loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SchedulerConfig {
    /// Seconds between sweeps over all sources
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Initial retry delay after a failed pass
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum retry delay after repeated failures
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_sweep_interval_secs() -> u64 {
    30
}

const fn default_initial_backoff_ms() -> u64 {
    1_000
}

const fn default_max_backoff_ms() -> u64 {
    300_000
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// External command that implements a data source task
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TaskCommandConfig {
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub env: HashMap<String, String>,
}
