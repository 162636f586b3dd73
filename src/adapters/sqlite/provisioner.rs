//! Local workspace and thread provisioning backed by SQLite.
//!
//! A workspace is a directory under `<data_dir>/workspaces/`; its path is the
//! workspace id that threads and data source tasks see.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::adapters::sqlite::parse_datetime;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Thread, Workspace};
use crate::domain::ports::Provisioner;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Clone)]
pub struct SqliteProvisioner {
    pool: SqlitePool,
    data_dir: PathBuf,
    poll_interval: Duration,
}

impl SqliteProvisioner {
    pub fn new(pool: SqlitePool, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            pool,
            data_dir: data_dir.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub async fn get_workspace(&self, name: &str) -> DomainResult<Option<Workspace>> {
        let row: Option<WorkspaceRow> = sqlx::query_as("SELECT * FROM workspaces WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    pub async fn get_thread(&self, name: &str) -> DomainResult<Option<Thread>> {
        let row: Option<ThreadRow> = sqlx::query_as("SELECT * FROM threads WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(TryInto::try_into).transpose()
    }

    /// Remove a thread record. The workspace it used is left in place.
    pub async fn delete_thread(&self, name: &str) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM threads WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DomainError::ThreadNotFound(name.to_string()));
        }
        Ok(())
    }

    async fn poll_until_ready(&self, thread_name: &str) -> DomainResult<Thread> {
        loop {
            let current = self
                .get_thread(thread_name)
                .await?
                .ok_or_else(|| DomainError::ThreadNotFound(thread_name.to_string()))?;
            if current.is_ready() {
                return Ok(current);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    fn workspace_dir(&self, workspace_name: &str) -> PathBuf {
        self.data_dir.join("workspaces").join(workspace_name)
    }
}

fn path_to_id(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[async_trait]
impl Provisioner for SqliteProvisioner {
    async fn ensure_workspace(&self, source_name: &str) -> DomainResult<Workspace> {
        let mut workspace = Workspace::for_source(source_name);
        if let Some(existing) = self.get_workspace(&workspace.name).await? {
            return Ok(existing);
        }

        let dir = self.workspace_dir(&workspace.name);
        tokio::fs::create_dir_all(&dir).await?;
        let dir = tokio::fs::canonicalize(&dir).await?;
        workspace.workspace_id = Some(path_to_id(&dir));

        sqlx::query(
            "INSERT OR IGNORE INTO workspaces (name, source_name, workspace_id, created_at) VALUES (?, ?, ?, ?)"
        )
        .bind(&workspace.name)
        .bind(&workspace.source_name)
        .bind(&workspace.workspace_id)
        .bind(workspace.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        // Another caller may have won the insert
        self.get_workspace(&workspace.name)
            .await?
            .ok_or(DomainError::WorkspaceNotFound(workspace.name))
    }

    async fn ensure_thread(&self, source_name: &str, workspace: &Workspace) -> DomainResult<Thread> {
        let mut thread = Thread::for_source(source_name, &workspace.name);
        if let Some(existing) = self.get_thread(&thread.name).await? {
            return Ok(existing);
        }

        thread.workspace_id.clone_from(&workspace.workspace_id);
        sqlx::query(
            r#"INSERT OR IGNORE INTO threads (name, source_name, workspace_name, system_task,
               workspace_id, created_at) VALUES (?, ?, ?, ?, ?, ?)"#
        )
        .bind(&thread.name)
        .bind(&thread.source_name)
        .bind(&thread.workspace_name)
        .bind(thread.system_task)
        .bind(&thread.workspace_id)
        .bind(thread.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.get_thread(&thread.name)
            .await?
            .ok_or(DomainError::ThreadNotFound(thread.name))
    }

    async fn wait_for_thread_ready(&self, thread: &Thread, timeout: Duration) -> DomainResult<Thread> {
        tokio::time::timeout(timeout, self.poll_until_ready(&thread.name))
            .await
            .map_err(|_| DomainError::ThreadNotReady(thread.name.clone()))?
    }
}

#[derive(sqlx::FromRow)]
struct WorkspaceRow {
    name: String,
    source_name: String,
    workspace_id: Option<String>,
    created_at: String,
}

impl TryFrom<WorkspaceRow> for Workspace {
    type Error = DomainError;

    fn try_from(row: WorkspaceRow) -> Result<Self, Self::Error> {
        Ok(Workspace {
            name: row.name,
            source_name: row.source_name,
            workspace_id: row.workspace_id,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ThreadRow {
    name: String,
    source_name: String,
    workspace_name: String,
    system_task: bool,
    workspace_id: Option<String>,
    created_at: String,
}

impl TryFrom<ThreadRow> for Thread {
    type Error = DomainError;

    fn try_from(row: ThreadRow) -> Result<Self, Self::Error> {
        Ok(Thread {
            name: row.name,
            source_name: row.source_name,
            workspace_name: row.workspace_name,
            system_task: row.system_task,
            workspace_id: row.workspace_id,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}
