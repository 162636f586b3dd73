//! Reads sync metadata from the local workspace directory.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{SyncMetadata, METADATA_FILE};
use crate::domain::ports::MetadataReader;

/// Treats the workspace id as a directory path and reads
/// `<workspace_id>/.metadata.json`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsMetadataReader;

impl FsMetadataReader {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MetadataReader for FsMetadataReader {
    async fn read_metadata(&self, workspace_id: &str) -> DomainResult<SyncMetadata> {
        let path = Path::new(workspace_id).join(METADATA_FILE);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(SyncMetadata::default()),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&bytes).map_err(|e| {
            DomainError::SerializationError(format!("{}: {e}", path.display()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_document_is_empty() {
        let dir = TempDir::new().unwrap();
        let metadata = FsMetadataReader::new()
            .read_metadata(dir.path().to_str().unwrap())
            .await
            .unwrap();
        assert!(metadata.files.is_empty());
        assert!(metadata.status.is_empty());
    }

    #[tokio::test]
    async fn test_reads_document() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(METADATA_FILE),
            r#"{"files": [{"id": "a", "filePath": "a.html"}], "status": "1 page"}"#,
        )
        .unwrap();

        let metadata = FsMetadataReader::new()
            .read_metadata(dir.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(metadata.files.len(), 1);
        assert_eq!(metadata.status, "1 page");
    }

    #[tokio::test]
    async fn test_malformed_document_is_an_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(METADATA_FILE), "{not json").unwrap();

        let err = FsMetadataReader::new()
            .read_metadata(dir.path().to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::SerializationError(_)));
    }
}
