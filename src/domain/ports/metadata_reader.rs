//! Workspace metadata port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::SyncMetadata;

/// Reads the sync metadata document a data source task maintains in its
/// workspace.
#[async_trait]
pub trait MetadataReader: Send + Sync {
    /// Current metadata for the workspace. A workspace without a metadata
    /// document yields empty metadata, not an error.
    async fn read_metadata(&self, workspace_id: &str) -> DomainResult<SyncMetadata>;
}
