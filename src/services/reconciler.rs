//! Knowledge source reconciler.
//!
//! Drives one sync pass for a knowledge source: provisions its workspace and
//! thread, starts the data source task, checkpoints progress while the task
//! runs and records the terminal outcome.
//!
//! A pass is restart-safe. A source found in `Syncing` belongs to a pass
//! that died mid-run, so it is demoted to `Pending` and synced again rather
//! than believed complete. Within one pass the state only moves forward:
//! `Pending -> Syncing -> Synced | Error`.
//!
//! The caller guarantees at most one pass per source at a time and retries
//! a pass that returns an error from a fresh read of the source.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{KnowledgeSource, ReconcilerConfig, SyncState, Thread};
use crate::domain::ports::{
    ClosingHandle, KnowledgeSourceRepository, Level, Logger, Provisioner, TaskInvoker, TaskOptions,
};
use crate::log_fields;
use crate::services::progress::ProgressPersister;

const UNKNOWN_SOURCE_TYPE: &str = "unknown knowledge source type";

/// Timing for a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerSettings {
    /// Interval between progress checkpoints while a task runs
    pub checkpoint_interval: Duration,
    /// How long to wait for a thread to be assigned a workspace
    pub thread_ready_timeout: Duration,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self::from(&ReconcilerConfig::default())
    }
}

impl From<&ReconcilerConfig> for ReconcilerSettings {
    fn from(config: &ReconcilerConfig) -> Self {
        Self {
            checkpoint_interval: Duration::from_secs(config.checkpoint_interval_secs),
            thread_ready_timeout: Duration::from_secs(config.thread_ready_timeout_secs),
        }
    }
}

/// How a pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Terminal and current; nothing was done.
    UpToDate,
    /// The manifest names no known source type; the source is in `Error`.
    UnresolvedType,
    /// A task ran to completion and the source reached this terminal state.
    Finished(SyncState),
}

/// Per-source sync state machine.
pub struct Reconciler {
    sources: Arc<dyn KnowledgeSourceRepository>,
    provisioner: Arc<dyn Provisioner>,
    invoker: Arc<dyn TaskInvoker>,
    progress: ProgressPersister,
    logger: Arc<dyn Logger>,
    settings: ReconcilerSettings,
}

impl Reconciler {
    pub fn new(
        sources: Arc<dyn KnowledgeSourceRepository>,
        provisioner: Arc<dyn Provisioner>,
        invoker: Arc<dyn TaskInvoker>,
        progress: ProgressPersister,
        logger: Arc<dyn Logger>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            sources,
            provisioner,
            invoker,
            progress,
            logger,
            settings,
        }
    }

    /// Run one reconciliation pass for `source`.
    ///
    /// `source` is updated in place with every status write. When `cancel`
    /// fires the pass stops at its next suspension point with
    /// `DomainError::Cancelled`; a started task is still released.
    #[instrument(skip_all, fields(source = %source.name))]
    pub async fn reconcile(
        &self,
        source: &mut KnowledgeSource,
        cancel: &CancellationToken,
    ) -> DomainResult<ReconcileOutcome> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(DomainError::Cancelled),
            outcome = self.sync(source) => outcome,
        }
    }

    async fn sync(&self, source: &mut KnowledgeSource) -> DomainResult<ReconcileOutcome> {
        let thread = self.get_thread(source).await?;

        if source.status.sync_state == SyncState::Syncing {
            // A previous pass died mid-run, re-evaluate as pending
            self.logger
                .log(
                    Level::Warn,
                    "recovering interrupted sync",
                    log_fields!("source" => source.name),
                )
                .await;
            source.status.sync_state = SyncState::Pending;
        }

        if source.status.sync_state.is_terminal() && !source.needs_rerun() {
            return Ok(ReconcileOutcome::UpToDate);
        }

        let Some(source_type) = source.manifest.source_type() else {
            let changed = source.status.sync_state != SyncState::Error
                || source.status.error.as_deref() != Some(UNKNOWN_SOURCE_TYPE);
            source.status.error = Some(UNKNOWN_SOURCE_TYPE.to_string());
            source.status.sync_state = SyncState::Error;
            if changed {
                self.sources.update_status(source).await?;
            }
            return Ok(ReconcileOutcome::UnresolvedType);
        };

        let task_name = source_type.task_name();
        let input = source.manifest.task_input()?;
        let options = TaskOptions {
            credential_context_ids: vec![source.name.clone()],
        };
        let mut task = ClosingHandle::new(
            self.invoker
                .start(&thread, task_name, &input, options)
                .await?,
        );

        source.status.last_sync_start_time = Some(Utc::now());
        source.status.last_sync_end_time = None;
        source.status.next_sync_time = None;
        source.status.sync_state = SyncState::Syncing;
        source.status.thread_name = Some(thread.name.clone());
        source.status.run_name = Some(task.run_name().to_string());
        self.sources.update_status(source).await?;

        self.logger
            .log(
                Level::Info,
                "sync started",
                log_fields!(
                    "source" => source.name,
                    "task" => task_name,
                    "thread" => thread.name,
                    "run" => task.run_name(),
                ),
            )
            .await;

        let period = self.settings.checkpoint_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = task.events().recv() => match event {
                    Some(event) => {
                        self.logger
                            .log(
                                Level::Debug,
                                "task event",
                                log_fields!("source" => source.name, "content" => event.content),
                            )
                            .await;
                    }
                    // Channel closure is the only completion signal
                    None => break,
                },
                _ = ticker.tick() => {
                    if let Err(err) = self.progress.save_progress(source, &thread, false).await {
                        // Transient, the next tick retries
                        self.logger
                            .log(
                                Level::Error,
                                "failed to checkpoint knowledge source progress",
                                log_fields!("source" => source.name, "error" => err.to_string()),
                            )
                            .await;
                    }
                }
            }
        }

        let task_result = match task.result().await {
            Ok(result) => result,
            Err(err) => {
                if let Err(save_err) = self.progress.save_progress(source, &thread, false).await {
                    self.log_save_failure(source, &save_err).await;
                }
                return Err(err);
            }
        };

        let mut error = task_result.error.filter(|e| !e.is_empty());
        if let Err(save_err) = self
            .progress
            .save_progress(source, &thread, error.is_none())
            .await
        {
            self.log_save_failure(source, &save_err).await;
            if error.is_none() {
                error = Some(save_err.to_string());
            }
        }

        let state = if error.is_none() {
            SyncState::Synced
        } else {
            SyncState::Error
        };
        source.status.last_sync_end_time = Some(Utc::now());
        source.status.sync_generation = source.sync_generation;
        source.status.run_name = None;
        source.status.error = error;
        source.status.sync_state = state;
        self.sources.update_status(source).await?;

        self.logger
            .log(
                Level::Info,
                "sync finished",
                log_fields!(
                    "source" => source.name,
                    "state" => state.as_str(),
                    "generation" => source.status.sync_generation,
                    "error" => source.status.error,
                ),
            )
            .await;

        Ok(ReconcileOutcome::Finished(state))
    }

    /// Create-or-get the source's workspace and thread and wait for the
    /// thread to be backed by a workspace. Newly assigned names are written
    /// in a single status update.
    async fn get_thread(&self, source: &mut KnowledgeSource) -> DomainResult<Thread> {
        let mut update = false;

        let workspace = self.provisioner.ensure_workspace(&source.name).await?;
        if source.status.workspace_name.is_none() {
            source.status.workspace_name = Some(workspace.name.clone());
            update = true;
        }

        // Threads may be deleted by anyone, so this is create-if-absent
        let thread = self.provisioner.ensure_thread(&source.name, &workspace).await?;
        if source.status.thread_name.is_none() {
            source.status.thread_name = Some(thread.name.clone());
            update = true;
        }

        if update {
            self.sources.update_status(source).await?;
        }

        self.provisioner
            .wait_for_thread_ready(&thread, self.settings.thread_ready_timeout)
            .await
    }

    async fn log_save_failure(&self, source: &KnowledgeSource, err: &DomainError) {
        self.logger
            .log(
                Level::Error,
                "failed to save knowledge source files",
                log_fields!("source" => source.name, "error" => err.to_string()),
            )
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_config() {
        let config = ReconcilerConfig {
            checkpoint_interval_secs: 5,
            thread_ready_timeout_secs: 7,
        };
        let settings = ReconcilerSettings::from(&config);
        assert_eq!(settings.checkpoint_interval, Duration::from_secs(5));
        assert_eq!(settings.thread_ready_timeout, Duration::from_secs(7));
    }

    #[test]
    fn test_default_checkpoint_interval_is_fifteen_seconds() {
        assert_eq!(
            ReconcilerSettings::default().checkpoint_interval,
            Duration::from_secs(15)
        );
    }
}
