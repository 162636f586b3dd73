//! Implementation of `ksync reconcile`: one pass for one source.

use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::cli::context::AppContext;
use crate::cli::output::{create_spinner, output, CommandOutput};
use crate::domain::models::{Config, SyncState};
use crate::services::ReconcileOutcome;

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Source name
    pub name: String,
}

#[derive(Debug, serde::Serialize)]
pub struct ReconcileOutput {
    pub name: String,
    pub outcome: String,
    pub sync_state: SyncState,
    pub sync_generation: i64,
    pub error: Option<String>,
}

impl CommandOutput for ReconcileOutput {
    fn to_human(&self) -> String {
        let mut line = format!(
            "{}: {} (state {}, generation {})",
            self.name, self.outcome, self.sync_state, self.sync_generation
        );
        if let Some(ref error) = self.error {
            line.push_str(&format!("\nError: {error}"));
        }
        line
    }
}

fn describe(outcome: ReconcileOutcome) -> &'static str {
    match outcome {
        ReconcileOutcome::UpToDate => "already up to date",
        ReconcileOutcome::UnresolvedType => "unknown source type",
        ReconcileOutcome::Finished(SyncState::Synced) => "sync completed",
        ReconcileOutcome::Finished(_) => "sync failed",
    }
}

pub async fn execute(args: ReconcileArgs, config: &Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;
    let mut source = ctx.require_source(&args.name).await?;
    let reconciler = ctx.reconciler();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let spinner = create_spinner(format!("Reconciling {}", source.name), json_mode);
    let result = reconciler.reconcile(&mut source, &cancel).await;
    spinner.finish_and_clear();
    let outcome = result?;

    output(
        &ReconcileOutput {
            outcome: describe(outcome).to_string(),
            sync_state: source.status.sync_state,
            sync_generation: source.status.sync_generation,
            error: source.status.error.clone(),
            name: source.name,
        },
        json_mode,
    );
    Ok(())
}
