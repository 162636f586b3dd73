//! SQLite implementation of the KnowledgeFileRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashSet;

use crate::adapters::sqlite::parse_optional_datetime;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::KnowledgeFile;
use crate::domain::ports::{ApplyMode, ApplyReport, KnowledgeFileRepository};

#[derive(Clone)]
pub struct SqliteKnowledgeFileRepository {
    pool: SqlitePool,
}

impl SqliteKnowledgeFileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KnowledgeFileRepository for SqliteKnowledgeFileRepository {
    async fn list_for_source(&self, source_name: &str) -> DomainResult<Vec<KnowledgeFile>> {
        let rows: Vec<KnowledgeFileRow> = sqlx::query_as(
            "SELECT * FROM knowledge_files WHERE source_name = ? ORDER BY discovered_index, name"
        )
        .bind(source_name)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn apply(
        &self,
        source_name: &str,
        files: &[KnowledgeFile],
        mode: ApplyMode,
    ) -> DomainResult<ApplyReport> {
        let mut report = ApplyReport::default();
        let mut tx = self.pool.begin().await?;

        for file in files {
            if file.source_name != source_name {
                return Err(DomainError::ValidationFailed(format!(
                    "file {} belongs to {}, not {}",
                    file.name, file.source_name, source_name
                )));
            }

            sqlx::query(
                r#"INSERT INTO knowledge_files (name, source_name, file_name, url, updated_at,
                   checksum, size_in_bytes, discovered_index)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                   ON CONFLICT(name) DO UPDATE SET
                   file_name = excluded.file_name, url = excluded.url,
                   updated_at = excluded.updated_at, checksum = excluded.checksum,
                   size_in_bytes = excluded.size_in_bytes,
                   discovered_index = excluded.discovered_index"#
            )
            .bind(&file.name)
            .bind(&file.source_name)
            .bind(&file.file_name)
            .bind(&file.url)
            .bind(file.updated_at.map(|t| t.to_rfc3339()))
            .bind(&file.checksum)
            .bind(file.size_in_bytes)
            .bind(file.discovered_index)
            .execute(&mut *tx)
            .await?;
            report.upserted += 1;
        }

        if mode == ApplyMode::Prune {
            let desired: HashSet<&str> = files.iter().map(|f| f.name.as_str()).collect();
            let stored: Vec<String> = sqlx::query_scalar(
                "SELECT name FROM knowledge_files WHERE source_name = ?"
            )
            .bind(source_name)
            .fetch_all(&mut *tx)
            .await?;

            for name in stored.iter().filter(|name| !desired.contains(name.as_str())) {
                sqlx::query("DELETE FROM knowledge_files WHERE name = ?")
                    .bind(name)
                    .execute(&mut *tx)
                    .await?;
                report.pruned += 1;
            }
        }

        tx.commit().await?;
        Ok(report)
    }

    async fn delete_for_source(&self, source_name: &str) -> DomainResult<u64> {
        let result = sqlx::query("DELETE FROM knowledge_files WHERE source_name = ?")
            .bind(source_name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[derive(sqlx::FromRow)]
struct KnowledgeFileRow {
    name: String,
    source_name: String,
    file_name: String,
    url: Option<String>,
    updated_at: Option<String>,
    checksum: Option<String>,
    size_in_bytes: i64,
    discovered_index: i64,
}

impl TryFrom<KnowledgeFileRow> for KnowledgeFile {
    type Error = DomainError;

    fn try_from(row: KnowledgeFileRow) -> Result<Self, Self::Error> {
        Ok(KnowledgeFile {
            name: row.name,
            source_name: row.source_name,
            file_name: row.file_name,
            url: row.url,
            updated_at: parse_optional_datetime(row.updated_at)?,
            checksum: row.checksum,
            size_in_bytes: row.size_in_bytes,
            discovered_index: row.discovered_index,
        })
    }
}
