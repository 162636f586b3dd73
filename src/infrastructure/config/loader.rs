use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project directory holding config, database and workspaces
pub const PROJECT_DIR: &str = ".ksync";

/// Prefix for environment overrides; `__` separates nested keys
pub const ENV_PREFIX: &str = "KSYNC_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Data directory cannot be empty")]
    EmptyDataDir,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid {0}: must be at least 1 second")]
    InvalidInterval(&'static str),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the project in the current directory
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .ksync/config.yaml (project config, created by init)
    /// 3. .ksync/local.yaml (project local overrides, optional)
    /// 4. Environment variables (KSYNC_* prefix, highest priority)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(".")
    }

    /// Load configuration for the project rooted at `root`
    ///
    /// Relative paths in the files are left as written; they resolve against
    /// the process working directory.
    pub fn load_from_dir(root: impl AsRef<Path>) -> Result<Config> {
        let project = root.as_ref().join(PROJECT_DIR);
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(project.join("config.yaml")))
            .merge(Yaml::file(project.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.data_dir.is_empty() {
            return Err(ConfigError::EmptyDataDir);
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        if config.reconciler.checkpoint_interval_secs == 0 {
            return Err(ConfigError::InvalidInterval("checkpoint_interval_secs"));
        }

        if config.reconciler.thread_ready_timeout_secs == 0 {
            return Err(ConfigError::InvalidInterval("thread_ready_timeout_secs"));
        }

        if config.scheduler.sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidInterval("sweep_interval_secs"));
        }

        if config.scheduler.initial_backoff_ms >= config.scheduler.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.scheduler.initial_backoff_ms,
                config.scheduler.max_backoff_ms,
            ));
        }

        for (task, command) in &config.tasks {
            if command.command.is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "task '{task}' command cannot be empty"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::config::TaskCommandConfig;
    use tempfile::TempDir;

    fn write_project_file(dir: &TempDir, name: &str, contents: &str) {
        let project = dir.path().join(PROJECT_DIR);
        std::fs::create_dir_all(&project).unwrap();
        std::fs::write(project.join(name), contents).unwrap();
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database.path, ".ksync/ksync.db");
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.reconciler.checkpoint_interval_secs, 15);
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
data_dir: /srv/ksync
database:
  path: /custom/path.db
  max_connections: 2
reconciler:
  checkpoint_interval_secs: 5
tasks:
  website-data-source:
    command: /usr/local/bin/crawl
    args: [--depth, '2']
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.data_dir, "/srv/ksync");
        assert_eq!(config.database.path, "/custom/path.db");
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.reconciler.checkpoint_interval_secs, 5);
        assert_eq!(config.reconciler.thread_ready_timeout_secs, 60);
        let task = &config.tasks["website-data-source"];
        assert_eq!(task.command, "/usr/local/bin/crawl");
        assert_eq!(task.args, vec!["--depth", "2"]);

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config).unwrap_err() {
            ConfigError::InvalidLogLevel(level) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_rotation() {
        let mut config = Config::default();
        config.logging.rotation = "weekly".to_string();

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidRotation(_)
        ));
    }

    #[test]
    fn test_validate_zero_checkpoint_interval() {
        let mut config = Config::default();
        config.reconciler.checkpoint_interval_secs = 0;

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidInterval("checkpoint_interval_secs")
        ));
    }

    #[test]
    fn test_validate_invalid_backoff() {
        let mut config = Config::default();
        config.scheduler.initial_backoff_ms = 30000;
        config.scheduler.max_backoff_ms = 10000;

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::InvalidBackoff(30000, 10000)
        ));
    }

    #[test]
    fn test_validate_empty_task_command() {
        let mut config = Config::default();
        config
            .tasks
            .insert("notion-data-source".to_string(), TaskCommandConfig::default());

        assert!(matches!(
            ConfigLoader::validate(&config).unwrap_err(),
            ConfigError::ValidationFailed(_)
        ));
    }

    #[test]
    fn test_local_overrides_project_config() {
        let dir = TempDir::new().unwrap();
        write_project_file(&dir, "config.yaml", "logging:\n  level: info\n  format: json\n");
        write_project_file(&dir, "local.yaml", "logging:\n  level: debug\n");

        let config = temp_env::with_vars_unset(["KSYNC_LOGGING__LEVEL"], || {
            ConfigLoader::load_from_dir(dir.path()).unwrap()
        });

        assert_eq!(config.logging.level, "debug", "Override should win for nested fields");
        assert_eq!(config.logging.format, "json", "Base value should persist");
    }

    #[test]
    fn test_env_override_wins() {
        let dir = TempDir::new().unwrap();
        write_project_file(&dir, "config.yaml", "scheduler:\n  sweep_interval_secs: 10\n");

        let config = temp_env::with_vars(
            [
                ("KSYNC_SCHEDULER__SWEEP_INTERVAL_SECS", Some("45")),
                ("KSYNC_DATA_DIR", Some("/var/lib/ksync")),
            ],
            || ConfigLoader::load_from_dir(dir.path()).unwrap(),
        );

        assert_eq!(config.scheduler.sweep_interval_secs, 45);
        assert_eq!(config.data_dir, "/var/lib/ksync");
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        write_project_file(&dir, "config.yaml", "logging:\n  format: xml\n");

        assert!(ConfigLoader::load_from_dir(dir.path()).is_err());
    }

    #[test]
    fn test_load_from_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ksync.yaml");
        std::fs::write(&path, "data_dir: /srv/ksync\nscheduler:\n  sweep_interval_secs: 7\n").unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();

        assert_eq!(config.data_dir, "/srv/ksync");
        assert_eq!(config.scheduler.sweep_interval_secs, 7);
        assert_eq!(config.database.path, ".ksync/ksync.db");
    }
}
