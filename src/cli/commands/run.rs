//! Implementation of `ksync run`: the reconciliation loop.

use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::cli::context::AppContext;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;
use crate::services::SweepReport;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Sweep every source once and exit
    #[arg(long)]
    pub once: bool,
}

#[derive(Debug, serde::Serialize)]
pub struct SweepOutput {
    pub examined: u64,
    pub up_to_date: u64,
    pub synced: u64,
    pub failed: u64,
    pub deferred: u64,
}

impl From<SweepReport> for SweepOutput {
    fn from(report: SweepReport) -> Self {
        Self {
            examined: report.examined,
            up_to_date: report.up_to_date,
            synced: report.synced,
            failed: report.failed,
            deferred: report.deferred,
        }
    }
}

impl CommandOutput for SweepOutput {
    fn to_human(&self) -> String {
        format!(
            "Examined {} source(s): {} synced, {} up to date, {} failed, {} deferred",
            self.examined, self.synced, self.up_to_date, self.failed, self.deferred
        )
    }
}

pub async fn execute(args: RunArgs, config: &Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let mut scheduler = ctx.scheduler();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, stopping");
            on_interrupt.cancel();
        }
    });

    if args.once {
        let report = scheduler.sweep(&cancel).await?;
        output(&SweepOutput::from(report), json_mode);
        return Ok(());
    }

    tracing::info!(
        interval_secs = config.scheduler.sweep_interval_secs,
        "reconciliation loop started"
    );
    scheduler.run(cancel).await?;
    tracing::info!("reconciliation loop stopped");
    Ok(())
}
