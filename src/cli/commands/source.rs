//! Knowledge source CLI commands.

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use comfy_table::Cell;
use std::path::{Path, PathBuf};

use crate::cli::context::AppContext;
use crate::cli::output::{new_table, output, state_cell, truncate, CommandOutput};
use crate::domain::errors::DomainError;
use crate::domain::models::{
    Config, KnowledgeSource, NotionConfig, OneDriveConfig, SourceManifest, SyncState,
    WebsiteConfig,
};
use crate::domain::ports::{KnowledgeFileRepository, KnowledgeSourceRepository};
use crate::services::decompress_sync_details;

const MAX_CONFLICT_RETRIES: usize = 5;

#[derive(Args, Debug)]
pub struct SourceArgs {
    #[command(subcommand)]
    pub command: SourceCommands,
}

#[derive(Subcommand, Debug)]
pub enum SourceCommands {
    /// Register a new knowledge source
    Create {
        /// Source name (lowercase letters, digits and '-')
        name: String,

        /// Website URLs to crawl (comma-separated)
        #[arg(long, value_delimiter = ',')]
        website: Vec<String>,

        /// OneDrive shared links (comma-separated)
        #[arg(long, value_delimiter = ',')]
        onedrive: Vec<String>,

        /// Ingest the Notion workspace visible to the integration
        #[arg(long)]
        notion: bool,

        /// Read the manifest from a YAML or JSON file instead
        #[arg(long, conflicts_with_all = ["website", "onedrive", "notion"])]
        manifest: Option<PathBuf>,
    },
    /// List knowledge sources
    List,
    /// Show source details
    Show {
        /// Source name
        name: String,
    },
    /// Request a new sync by bumping the sync generation
    Resync {
        /// Source name
        name: String,
    },
    /// Delete a source and its file records (the workspace is kept)
    Delete {
        /// Source name
        name: String,
    },
}

#[derive(Debug, serde::Serialize)]
pub struct SourceSummary {
    pub name: String,
    pub source_type: Option<String>,
    pub sync_state: SyncState,
    pub sync_generation: i64,
    pub observed_generation: i64,
    pub status: String,
    pub error: Option<String>,
    pub last_sync_end_time: Option<String>,
}

impl From<&KnowledgeSource> for SourceSummary {
    fn from(source: &KnowledgeSource) -> Self {
        Self {
            name: source.name.clone(),
            source_type: source.manifest.source_type().map(|t| t.as_str().to_string()),
            sync_state: source.status.sync_state,
            sync_generation: source.sync_generation,
            observed_generation: source.status.sync_generation,
            status: source.status.status.clone(),
            error: source.status.error.clone(),
            last_sync_end_time: source.status.last_sync_end_time.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct SourceListOutput {
    pub sources: Vec<SourceSummary>,
    pub total: usize,
}

impl CommandOutput for SourceListOutput {
    fn to_human(&self) -> String {
        if self.sources.is_empty() {
            return "No knowledge sources found.".to_string();
        }

        let mut table = new_table(&["NAME", "TYPE", "STATE", "GEN", "STATUS", "LAST SYNC"]);
        for source in &self.sources {
            let status = source.error.as_deref().unwrap_or(&source.status);
            table.add_row(vec![
                Cell::new(&source.name),
                Cell::new(source.source_type.as_deref().unwrap_or("-")),
                state_cell(source.sync_state),
                Cell::new(format!("{}/{}", source.observed_generation, source.sync_generation)),
                Cell::new(truncate(status, 40)),
                Cell::new(source.last_sync_end_time.as_deref().unwrap_or("-")),
            ]);
        }
        format!("Found {} knowledge source(s):\n{table}", self.total)
    }
}

#[derive(Debug, serde::Serialize)]
pub struct SourceDetailOutput {
    #[serde(flatten)]
    pub summary: SourceSummary,
    pub manifest: SourceManifest,
    pub workspace_name: Option<String>,
    pub thread_name: Option<String>,
    pub run_name: Option<String>,
    pub last_sync_start_time: Option<String>,
    pub file_count: usize,
    pub sync_details: serde_json::Value,
}

impl CommandOutput for SourceDetailOutput {
    fn to_human(&self) -> String {
        let s = &self.summary;
        let mut lines = vec![
            format!("Knowledge Source: {}", s.name),
            format!("Type: {}", s.source_type.as_deref().unwrap_or("unresolved")),
            format!("State: {}", s.sync_state),
            format!("Generation: {} (observed {})", s.sync_generation, s.observed_generation),
            format!("Files: {}", self.file_count),
        ];

        if !s.status.is_empty() {
            lines.push(format!("Status: {}", s.status));
        }
        if let Some(ref error) = s.error {
            lines.push(format!("Error: {error}"));
        }
        if let Some(ref workspace) = self.workspace_name {
            lines.push(format!("Workspace: {workspace}"));
        }
        if let Some(ref thread) = self.thread_name {
            lines.push(format!("Thread: {thread}"));
        }
        if let Some(ref run) = self.run_name {
            lines.push(format!("Run: {run}"));
        }
        if let Some(ref started) = self.last_sync_start_time {
            lines.push(format!("Last Sync Started: {started}"));
        }
        if let Some(ref ended) = s.last_sync_end_time {
            lines.push(format!("Last Sync Ended: {ended}"));
        }

        lines.push(format!(
            "\nManifest:\n{}",
            serde_json::to_string_pretty(&self.manifest).unwrap_or_default()
        ));
        lines.join("\n")
    }
}

#[derive(Debug, serde::Serialize)]
pub struct SourceActionOutput {
    pub success: bool,
    pub message: String,
    pub name: String,
}

impl CommandOutput for SourceActionOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }
}

pub async fn execute(args: SourceArgs, config: &Config, json_mode: bool) -> Result<()> {
    let ctx = AppContext::open(config).await?;

    match args.command {
        SourceCommands::Create {
            name,
            website,
            onedrive,
            notion,
            manifest,
        } => {
            let manifest = match manifest {
                Some(path) => read_manifest(&path).await?,
                None => manifest_from_flags(website, onedrive, notion)?,
            };
            let mut source = KnowledgeSource::new(name, manifest)?;
            ctx.sources.create(&mut source).await?;

            output(
                &SourceActionOutput {
                    success: true,
                    message: format!("Created knowledge source {}", source.name),
                    name: source.name,
                },
                json_mode,
            );
        }

        SourceCommands::List => {
            let sources = ctx.sources.list().await?;
            let out = SourceListOutput {
                total: sources.len(),
                sources: sources.iter().map(SourceSummary::from).collect(),
            };
            output(&out, json_mode);
        }

        SourceCommands::Show { name } => {
            let source = ctx.require_source(&name).await?;
            let file_count = ctx.files.list_for_source(&name).await?.len();
            let sync_details = decompress_sync_details(&source.status.sync_details)?;

            let out = SourceDetailOutput {
                summary: SourceSummary::from(&source),
                manifest: source.manifest.clone(),
                workspace_name: source.status.workspace_name.clone(),
                thread_name: source.status.thread_name.clone(),
                run_name: source.status.run_name.clone(),
                last_sync_start_time: source.status.last_sync_start_time.map(|t| t.to_rfc3339()),
                file_count,
                sync_details,
            };
            output(&out, json_mode);
        }

        SourceCommands::Resync { name } => {
            let source = bump_generation(ctx.sources.as_ref(), &name).await?;
            output(
                &SourceActionOutput {
                    success: true,
                    message: format!(
                        "Requested resync of {} (generation {})",
                        source.name, source.sync_generation
                    ),
                    name: source.name,
                },
                json_mode,
            );
        }

        SourceCommands::Delete { name } => {
            ctx.files.delete_for_source(&name).await?;
            ctx.sources.delete(&name).await?;
            output(
                &SourceActionOutput {
                    success: true,
                    message: format!("Deleted knowledge source {name}"),
                    name,
                },
                json_mode,
            );
        }
    }

    Ok(())
}

fn manifest_from_flags(
    website: Vec<String>,
    onedrive: Vec<String>,
    notion: bool,
) -> Result<SourceManifest> {
    let manifest = SourceManifest {
        website: (!website.is_empty()).then_some(WebsiteConfig { urls: website }),
        onedrive: (!onedrive.is_empty()).then_some(OneDriveConfig { shared_links: onedrive }),
        notion: notion.then_some(NotionConfig {}),
    };

    let configured = [
        manifest.website.is_some(),
        manifest.onedrive.is_some(),
        manifest.notion.is_some(),
    ]
    .into_iter()
    .filter(|set| *set)
    .count();

    match configured {
        0 => bail!("Specify one of --website, --onedrive, --notion or --manifest"),
        1 => Ok(manifest),
        _ => bail!("A knowledge source has exactly one type"),
    }
}

async fn read_manifest(path: &Path) -> Result<SourceManifest> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    serde_yaml::from_str(&contents)
        .with_context(|| format!("Failed to parse manifest {}", path.display()))
}

/// Bump the desired generation, re-reading on write conflicts.
async fn bump_generation(
    sources: &dyn KnowledgeSourceRepository,
    name: &str,
) -> Result<KnowledgeSource> {
    for _ in 0..MAX_CONFLICT_RETRIES {
        let mut source = sources
            .get(name)
            .await?
            .ok_or_else(|| DomainError::SourceNotFound(name.to_string()))?;
        source.sync_generation += 1;

        match sources.update_spec(&mut source).await {
            Ok(()) => return Ok(source),
            Err(DomainError::ConcurrencyConflict { .. }) => continue,
            Err(err) => return Err(err.into()),
        }
    }
    bail!("Gave up requesting resync of {name}: source kept changing")
}
