//! SQLite implementation of the KnowledgeSourceRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::adapters::sqlite::{parse_datetime, parse_optional_datetime};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{KnowledgeSource, KnowledgeSourceStatus, SyncState};
use crate::domain::ports::KnowledgeSourceRepository;

#[derive(Clone)]
pub struct SqliteKnowledgeSourceRepository {
    pool: SqlitePool,
}

impl SqliteKnowledgeSourceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Distinguish a stale write from a missing record after a guarded
    /// update touched no rows.
    async fn conflict_or_missing(&self, name: &str) -> DomainError {
        match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM knowledge_sources WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await
        {
            Ok(0) => DomainError::SourceNotFound(name.to_string()),
            Ok(_) => DomainError::ConcurrencyConflict {
                entity: "knowledge_source".to_string(),
                id: name.to_string(),
            },
            Err(e) => e.into(),
        }
    }
}

#[async_trait]
impl KnowledgeSourceRepository for SqliteKnowledgeSourceRepository {
    async fn create(&self, source: &mut KnowledgeSource) -> DomainResult<()> {
        let manifest_json = serde_json::to_string(&source.manifest)?;
        let status = &source.status;
        let now = Utc::now().to_rfc3339();

        let result = sqlx::query(
            r#"INSERT INTO knowledge_sources (name, manifest, sync_generation, sync_state,
               status_sync_generation, workspace_name, thread_name, run_name,
               last_sync_start_time, last_sync_end_time, next_sync_time, error, status,
               sync_details, resource_version, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)"#
        )
        .bind(&source.name)
        .bind(&manifest_json)
        .bind(source.sync_generation)
        .bind(status.sync_state.as_str())
        .bind(status.sync_generation)
        .bind(&status.workspace_name)
        .bind(&status.thread_name)
        .bind(&status.run_name)
        .bind(status.last_sync_start_time.map(|t| t.to_rfc3339()))
        .bind(status.last_sync_end_time.map(|t| t.to_rfc3339()))
        .bind(status.next_sync_time.map(|t| t.to_rfc3339()))
        .bind(&status.error)
        .bind(&status.status)
        .bind(&status.sync_details)
        .bind(source.created_at.to_rfc3339())
        .bind(&now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                source.resource_version = 1;
                Ok(())
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(DomainError::SourceAlreadyExists(source.name.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, name: &str) -> DomainResult<Option<KnowledgeSource>> {
        let row: Option<KnowledgeSourceRow> = sqlx::query_as(
            "SELECT * FROM knowledge_sources WHERE name = ?"
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self) -> DomainResult<Vec<KnowledgeSource>> {
        let rows: Vec<KnowledgeSourceRow> = sqlx::query_as(
            "SELECT * FROM knowledge_sources ORDER BY name"
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update_spec(&self, source: &mut KnowledgeSource) -> DomainResult<()> {
        let manifest_json = serde_json::to_string(&source.manifest)?;

        let result = sqlx::query(
            r#"UPDATE knowledge_sources SET manifest = ?, sync_generation = ?,
               resource_version = resource_version + 1, updated_at = ?
               WHERE name = ? AND resource_version = ?"#
        )
        .bind(&manifest_json)
        .bind(source.sync_generation)
        .bind(Utc::now().to_rfc3339())
        .bind(&source.name)
        .bind(source.resource_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.conflict_or_missing(&source.name).await);
        }

        source.resource_version += 1;
        Ok(())
    }

    async fn update_status(&self, source: &mut KnowledgeSource) -> DomainResult<()> {
        let status = &source.status;

        let result = sqlx::query(
            r#"UPDATE knowledge_sources SET sync_state = ?, status_sync_generation = ?,
               workspace_name = ?, thread_name = ?, run_name = ?, last_sync_start_time = ?,
               last_sync_end_time = ?, next_sync_time = ?, error = ?, status = ?,
               sync_details = ?, resource_version = resource_version + 1, updated_at = ?
               WHERE name = ? AND resource_version = ?"#
        )
        .bind(status.sync_state.as_str())
        .bind(status.sync_generation)
        .bind(&status.workspace_name)
        .bind(&status.thread_name)
        .bind(&status.run_name)
        .bind(status.last_sync_start_time.map(|t| t.to_rfc3339()))
        .bind(status.last_sync_end_time.map(|t| t.to_rfc3339()))
        .bind(status.next_sync_time.map(|t| t.to_rfc3339()))
        .bind(&status.error)
        .bind(&status.status)
        .bind(&status.sync_details)
        .bind(Utc::now().to_rfc3339())
        .bind(&source.name)
        .bind(source.resource_version)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(self.conflict_or_missing(&source.name).await);
        }

        source.resource_version += 1;
        Ok(())
    }

    async fn delete(&self, name: &str) -> DomainResult<()> {
        let result = sqlx::query("DELETE FROM knowledge_sources WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::SourceNotFound(name.to_string()));
        }

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct KnowledgeSourceRow {
    name: String,
    manifest: String,
    sync_generation: i64,
    sync_state: String,
    status_sync_generation: i64,
    workspace_name: Option<String>,
    thread_name: Option<String>,
    run_name: Option<String>,
    last_sync_start_time: Option<String>,
    last_sync_end_time: Option<String>,
    next_sync_time: Option<String>,
    error: Option<String>,
    status: String,
    sync_details: Vec<u8>,
    resource_version: i64,
    created_at: String,
}

impl TryFrom<KnowledgeSourceRow> for KnowledgeSource {
    type Error = DomainError;

    fn try_from(row: KnowledgeSourceRow) -> Result<Self, Self::Error> {
        let sync_state = SyncState::from_str(&row.sync_state)
            .ok_or_else(|| DomainError::SerializationError(format!("Invalid sync state: {}", row.sync_state)))?;

        Ok(KnowledgeSource {
            name: row.name,
            manifest: serde_json::from_str(&row.manifest)?,
            sync_generation: row.sync_generation,
            status: KnowledgeSourceStatus {
                sync_state,
                sync_generation: row.status_sync_generation,
                workspace_name: row.workspace_name,
                thread_name: row.thread_name,
                run_name: row.run_name,
                last_sync_start_time: parse_optional_datetime(row.last_sync_start_time)?,
                last_sync_end_time: parse_optional_datetime(row.last_sync_end_time)?,
                next_sync_time: parse_optional_datetime(row.next_sync_time)?,
                error: row.error,
                status: row.status,
                sync_details: row.sync_details,
            },
            resource_version: row.resource_version,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}
