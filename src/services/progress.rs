//! Progress persistence for running syncs.
//!
//! Turns the metadata a data source task keeps in its workspace into
//! knowledge file records plus the `status`/`sync_details` fields of the
//! source. Status is written only when its content changed, so periodic
//! checkpoints of an idle task cost no writes.

use std::sync::Arc;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{KnowledgeSource, SyncMetadata, Thread};
use crate::domain::ports::{
    ApplyMode, ApplyReport, KnowledgeFileRepository, KnowledgeSourceRepository, MetadataReader,
};
use crate::services::compression::compress_sync_details;

/// What a single save did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressOutcome {
    /// Number of files in the derived set
    pub files: usize,
    pub apply: ApplyReport,
    /// Whether the source status was written
    pub status_written: bool,
}

/// Persists partial and final sync progress for a knowledge source.
pub struct ProgressPersister {
    sources: Arc<dyn KnowledgeSourceRepository>,
    files: Arc<dyn KnowledgeFileRepository>,
    metadata: Arc<dyn MetadataReader>,
}

impl ProgressPersister {
    pub fn new(
        sources: Arc<dyn KnowledgeSourceRepository>,
        files: Arc<dyn KnowledgeFileRepository>,
        metadata: Arc<dyn MetadataReader>,
    ) -> Self {
        Self {
            sources,
            files,
            metadata,
        }
    }

    /// Save progress of `source` from its thread's workspace.
    ///
    /// `complete` selects pruning: only a finished, successful sync knows
    /// the full item set, so only then are stale file records deleted.
    /// Errors are returned as-is; the caller decides whether they are fatal.
    pub async fn save_progress(
        &self,
        source: &mut KnowledgeSource,
        thread: &Thread,
        complete: bool,
    ) -> DomainResult<ProgressOutcome> {
        let metadata = self.get_metadata(thread).await?;
        let files = metadata.knowledge_files(&source.name);

        let apply = self
            .files
            .apply(&source.name, &files, ApplyMode::for_completion(complete))
            .await?;

        let sync_details = compress_sync_details(&metadata.state)?;

        let mut status_written = false;
        if metadata.status != source.status.status || sync_details != source.status.sync_details {
            let previous_status = std::mem::replace(&mut source.status.status, metadata.status);
            let previous_details = std::mem::replace(&mut source.status.sync_details, sync_details);
            if let Err(err) = self.sources.update_status(source).await {
                // Keep the copy in step with the stored record
                source.status.status = previous_status;
                source.status.sync_details = previous_details;
                return Err(err);
            }
            status_written = true;
        }

        Ok(ProgressOutcome {
            files: files.len(),
            apply,
            status_written,
        })
    }

    async fn get_metadata(&self, thread: &Thread) -> DomainResult<SyncMetadata> {
        let workspace_id = thread
            .workspace_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| DomainError::ThreadNotReady(thread.name.clone()))?;
        self.metadata.read_metadata(workspace_id).await
    }
}
