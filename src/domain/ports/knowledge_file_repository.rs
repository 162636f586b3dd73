//! Knowledge file repository port.

use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::KnowledgeFile;

/// How an apply treats stored records missing from the desired set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyMode {
    /// Delete stored records of the source that are not in the desired set.
    Prune,
    /// Only create or update; never delete.
    NoPrune,
}

impl ApplyMode {
    pub fn for_completion(complete: bool) -> Self {
        if complete {
            Self::Prune
        } else {
            Self::NoPrune
        }
    }
}

/// Counts reported by an apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub upserted: u64,
    pub pruned: u64,
}

/// Repository interface for knowledge file child records.
#[async_trait]
pub trait KnowledgeFileRepository: Send + Sync {
    /// Files of a source in discovery order.
    async fn list_for_source(&self, source_name: &str) -> DomainResult<Vec<KnowledgeFile>>;

    /// Reconcile stored files of `source_name` towards `files`.
    async fn apply(
        &self,
        source_name: &str,
        files: &[KnowledgeFile],
        mode: ApplyMode,
    ) -> DomainResult<ApplyReport>;

    /// Remove every file of a source.
    async fn delete_for_source(&self, source_name: &str) -> DomainResult<u64>;
}
