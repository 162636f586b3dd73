//! Sweep loop that drives reconciliation passes.
//!
//! Sources are reconciled one at a time, each from a fresh read, so there is
//! never more than one pass per source. A failed pass is retried on a later
//! sweep once its per-source backoff has elapsed.

use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::SchedulerConfig;
use crate::domain::ports::{KnowledgeSourceRepository, Level, Logger};
use crate::log_fields;
use crate::services::reconciler::{ReconcileOutcome, Reconciler};

/// Counts for one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: u64,
    pub up_to_date: u64,
    pub synced: u64,
    pub failed: u64,
    /// Skipped because a previous failure is still backing off
    pub deferred: u64,
}

struct RetryState {
    backoff: ExponentialBackoff,
    not_before: Instant,
}

pub struct ReconcileScheduler {
    sources: Arc<dyn KnowledgeSourceRepository>,
    reconciler: Arc<Reconciler>,
    logger: Arc<dyn Logger>,
    config: SchedulerConfig,
    retries: HashMap<String, RetryState>,
}

impl ReconcileScheduler {
    pub fn new(
        sources: Arc<dyn KnowledgeSourceRepository>,
        reconciler: Arc<Reconciler>,
        logger: Arc<dyn Logger>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            sources,
            reconciler,
            logger,
            config,
            retries: HashMap::new(),
        }
    }

    /// Sweep until `cancel` fires.
    pub async fn run(mut self, cancel: CancellationToken) -> DomainResult<()> {
        let mut ticker = interval(Duration::from_secs(self.config.sweep_interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => match self.sweep(&cancel).await {
                    Ok(report) => {
                        self.logger
                            .log(
                                Level::Debug,
                                "sweep complete",
                                log_fields!(
                                    "examined" => report.examined,
                                    "synced" => report.synced,
                                    "failed" => report.failed,
                                    "deferred" => report.deferred,
                                ),
                            )
                            .await;
                    }
                    // Listing failed; the next tick tries again
                    Err(err) => {
                        self.logger
                            .log(
                                Level::Error,
                                "sweep failed",
                                log_fields!("error" => err.to_string()),
                            )
                            .await;
                    }
                },
            }
        }

        Ok(())
    }

    /// Reconcile every source once. Per-source failures are logged and
    /// scheduled for retry; only failing to list sources is returned.
    pub async fn sweep(&mut self, cancel: &CancellationToken) -> DomainResult<SweepReport> {
        let mut report = SweepReport::default();
        let names: Vec<String> = self
            .sources
            .list()
            .await?
            .into_iter()
            .map(|source| source.name)
            .collect();
        self.retries.retain(|name, _| names.contains(name));

        for name in names {
            if cancel.is_cancelled() {
                break;
            }
            report.examined += 1;

            if self
                .retries
                .get(&name)
                .is_some_and(|retry| Instant::now() < retry.not_before)
            {
                report.deferred += 1;
                continue;
            }

            match self.reconcile_one(&name, cancel).await {
                Ok(Some(ReconcileOutcome::UpToDate)) | Ok(None) => {
                    self.retries.remove(&name);
                    report.up_to_date += 1;
                }
                Ok(Some(_)) => {
                    self.retries.remove(&name);
                    report.synced += 1;
                }
                Err(DomainError::Cancelled) => break,
                Err(err) => {
                    report.failed += 1;
                    let delay = self.schedule_retry(&name);
                    self.logger
                        .log(
                            Level::Warn,
                            "reconciliation failed, will retry",
                            log_fields!(
                                "source" => name,
                                "error" => err.to_string(),
                                "retry_in_ms" => u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                            ),
                        )
                        .await;
                }
            }
        }

        Ok(report)
    }

    async fn reconcile_one(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> DomainResult<Option<ReconcileOutcome>> {
        // Deleted since the listing
        let Some(mut source) = self.sources.get(name).await? else {
            return Ok(None);
        };
        self.reconciler.reconcile(&mut source, cancel).await.map(Some)
    }

    fn schedule_retry(&mut self, name: &str) -> Duration {
        let config = &self.config;
        let retry = self.retries.entry(name.to_string()).or_insert_with(|| RetryState {
            backoff: ExponentialBackoffBuilder::new()
                .with_initial_interval(Duration::from_millis(config.initial_backoff_ms))
                .with_max_interval(Duration::from_millis(config.max_backoff_ms))
                .with_max_elapsed_time(None)
                .build(),
            not_before: Instant::now(),
        });
        let delay = retry
            .backoff
            .next_backoff()
            .unwrap_or(Duration::from_millis(config.max_backoff_ms));
        retry.not_before = Instant::now() + delay;
        delay
    }
}
