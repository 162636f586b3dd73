//! Wiring of adapters and services for CLI commands.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::adapters::sqlite::{
    initialize_database, SqliteKnowledgeFileRepository, SqliteKnowledgeSourceRepository,
    SqliteProvisioner,
};
use crate::adapters::{FsMetadataReader, ProcessTaskInvoker};
use crate::domain::errors::DomainError;
use crate::domain::models::{Config, KnowledgeSource};
use crate::domain::ports::{KnowledgeSourceRepository, Logger};
use crate::infrastructure::logging::TracingLogger;
use crate::services::{ProgressPersister, ReconcileScheduler, Reconciler, ReconcilerSettings};

pub struct AppContext {
    pub config: Config,
    pub sources: Arc<SqliteKnowledgeSourceRepository>,
    pub files: Arc<SqliteKnowledgeFileRepository>,
    pub provisioner: Arc<SqliteProvisioner>,
}

impl AppContext {
    /// Open the project database, applying pending migrations.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = initialize_database(&config.database)
            .await
            .with_context(|| format!("Failed to open database at {}", config.database.path))?;

        Ok(Self {
            config: config.clone(),
            sources: Arc::new(SqliteKnowledgeSourceRepository::new(pool.clone())),
            files: Arc::new(SqliteKnowledgeFileRepository::new(pool.clone())),
            provisioner: Arc::new(SqliteProvisioner::new(pool, &config.data_dir)),
        })
    }

    pub async fn require_source(&self, name: &str) -> Result<KnowledgeSource> {
        self.sources
            .get(name)
            .await?
            .ok_or_else(|| DomainError::SourceNotFound(name.to_string()).into())
    }

    pub fn reconciler(&self) -> Reconciler {
        let progress = ProgressPersister::new(
            self.sources.clone(),
            self.files.clone(),
            Arc::new(FsMetadataReader::new()),
        );
        Reconciler::new(
            self.sources.clone(),
            self.provisioner.clone(),
            Arc::new(ProcessTaskInvoker::new(self.config.tasks.clone())),
            progress,
            logger(),
            ReconcilerSettings::from(&self.config.reconciler),
        )
    }

    pub fn scheduler(&self) -> ReconcileScheduler {
        ReconcileScheduler::new(
            self.sources.clone(),
            Arc::new(self.reconciler()),
            logger(),
            self.config.scheduler.clone(),
        )
    }
}

fn logger() -> Arc<dyn Logger> {
    Arc::new(TracingLogger::new())
}
