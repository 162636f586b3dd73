//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::file::FileArgs;
use crate::cli::commands::init::InitArgs;
use crate::cli::commands::reconcile::ReconcileArgs;
use crate::cli::commands::run::RunArgs;
use crate::cli::commands::source::SourceArgs;

#[derive(Parser, Debug)]
#[command(name = "ksync")]
#[command(about = "Knowledge source sync controller", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this file instead of .ksync/
    #[arg(short, long, global = true, env = "KSYNC_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize project configuration and database
    Init(InitArgs),

    /// Knowledge source management commands
    Source(SourceArgs),

    /// Knowledge file inspection commands
    File(FileArgs),

    /// Run a single reconciliation pass for one source
    Reconcile(ReconcileArgs),

    /// Continuously reconcile every source until interrupted
    Run(RunArgs),
}
