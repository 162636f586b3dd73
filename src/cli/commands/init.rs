//! Implementation of the `ksync init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::fs;

use crate::adapters::sqlite::initialize_database;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, DatabaseConfig};
use crate::infrastructure::config::PROJECT_DIR;

const CONFIG_HEADER: &str = "\
# ksync project configuration
#
# Map each data source task to the command that implements it, e.g.
#
# tasks:
#   website-data-source:
#     command: /usr/local/bin/website-crawler
#     args: [--max-pages, '500']
#
# Values can be overridden in .ksync/local.yaml or with KSYNC_* environment
# variables (use __ for nesting, e.g. KSYNC_LOGGING__LEVEL=debug).
";

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Force reinitialization even if already initialized
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub initialized_path: PathBuf,
    pub directories_created: Vec<String>,
    pub config_written: bool,
    pub database_initialized: bool,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if !self.directories_created.is_empty() {
            lines.push("\nCreated directories:".to_string());
            for dir in &self.directories_created {
                lines.push(format!("  - {dir}"));
            }
        }
        if self.config_written {
            lines.push(format!("\nWrote {PROJECT_DIR}/config.yaml"));
        }
        if self.database_initialized {
            lines.push(format!("Database initialized at {PROJECT_DIR}/ksync.db"));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(&args.path)
    };

    let project_dir = target_path.join(PROJECT_DIR);
    let config_path = project_dir.join("config.yaml");

    if config_path.exists() && !args.force {
        let output_data = InitOutput {
            success: false,
            message: "Project already initialized. Use --force to rewrite the configuration."
                .to_string(),
            initialized_path: target_path,
            directories_created: vec![],
            config_written: false,
            database_initialized: false,
        };
        output(&output_data, json_mode);
        return Ok(());
    }

    let mut directories_created = vec![];
    // Workspaces and the database are never removed by --force
    let dirs = [
        project_dir.clone(),
        project_dir.join("data").join("workspaces"),
        project_dir.join("logs"),
    ];

    for dir in &dirs {
        if !dir.exists() {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create {}", dir.display()))?;
            let relative = dir
                .strip_prefix(&target_path)
                .unwrap_or(dir)
                .to_string_lossy()
                .to_string();
            directories_created.push(relative);
        }
    }

    let defaults = serde_yaml::to_string(&Config::default())
        .context("Failed to render default configuration")?;
    fs::write(&config_path, format!("{CONFIG_HEADER}\n{defaults}"))
        .await
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    let database = DatabaseConfig {
        path: project_dir.join("ksync.db").to_string_lossy().to_string(),
        ..DatabaseConfig::default()
    };
    let pool = initialize_database(&database)
        .await
        .context("Failed to initialize database")?;
    pool.close().await;

    let output_data = InitOutput {
        success: true,
        message: if args.force {
            "Project reinitialized successfully.".to_string()
        } else {
            "Project initialized successfully.".to_string()
        },
        initialized_path: target_path,
        directories_created,
        config_written: true,
        database_initialized: true,
    };

    output(&output_data, json_mode);
    Ok(())
}
