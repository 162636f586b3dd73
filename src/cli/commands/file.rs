//! Knowledge file CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use comfy_table::Cell;

use crate::cli::context::AppContext;
use crate::cli::output::{new_table, output, truncate, CommandOutput};
use crate::domain::models::{Config, KnowledgeFile};
use crate::domain::ports::KnowledgeFileRepository;

#[derive(Args, Debug)]
pub struct FileArgs {
    #[command(subcommand)]
    pub command: FileCommands,
}

#[derive(Subcommand, Debug)]
pub enum FileCommands {
    /// List the files ingested for a source, in discovery order
    List {
        /// Source name
        source: String,

        /// Maximum number of files to display
        #[arg(short, long, default_value = "100")]
        limit: usize,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct FileListOutput {
    pub source: String,
    pub files: Vec<KnowledgeFile>,
    pub total: usize,
}

impl CommandOutput for FileListOutput {
    fn to_human(&self) -> String {
        if self.files.is_empty() {
            return format!("No files recorded for {}.", self.source);
        }

        let mut table = new_table(&["#", "FILE", "URL", "SIZE", "UPDATED"]);
        for file in &self.files {
            table.add_row(vec![
                Cell::new(file.discovered_index),
                Cell::new(truncate(&file.file_name, 48)),
                Cell::new(truncate(file.url.as_deref().unwrap_or("-"), 48)),
                Cell::new(file.size_in_bytes),
                Cell::new(
                    file.updated_at
                        .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M").to_string()),
                ),
            ]);
        }

        let shown = self.files.len();
        if shown < self.total {
            format!("Showing {shown} of {} file(s) for {}:\n{table}", self.total, self.source)
        } else {
            format!("{} file(s) for {}:\n{table}", self.total, self.source)
        }
    }
}

pub async fn execute(args: FileArgs, config: &Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;

    match args.command {
        FileCommands::List { source, limit } => {
            ctx.require_source(&source).await?;
            let mut files = ctx.files.list_for_source(&source).await?;
            let total = files.len();
            files.truncate(limit);

            output(&FileListOutput { source, files, total }, json_mode);
        }
    }

    Ok(())
}
