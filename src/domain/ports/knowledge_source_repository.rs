//! Knowledge source repository port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::KnowledgeSource;

/// Repository interface for knowledge source persistence.
///
/// Every mutation is guarded by the record's `resource_version`: writing a
/// stale copy fails with `DomainError::ConcurrencyConflict` and leaves the
/// stored record untouched. Callers re-read and retry; nothing here
/// retries internally.
#[async_trait]
pub trait KnowledgeSourceRepository: Send + Sync {
    /// Create a new source. Sets `resource_version` on the passed copy.
    async fn create(&self, source: &mut KnowledgeSource) -> DomainResult<()>;

    /// Get a source by name.
    async fn get(&self, name: &str) -> DomainResult<Option<KnowledgeSource>>;

    /// List all sources ordered by name.
    async fn list(&self) -> DomainResult<Vec<KnowledgeSource>>;

    /// Write the desired state (manifest and sync generation).
    async fn update_spec(&self, source: &mut KnowledgeSource) -> DomainResult<()>;

    /// Write the status block only.
    async fn update_status(&self, source: &mut KnowledgeSource) -> DomainResult<()>;

    /// Delete a source by name.
    async fn delete(&self, name: &str) -> DomainResult<()>;
}
