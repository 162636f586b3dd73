//! Knowledge source domain model.
//!
//! A knowledge source is an external content origin (a website, a OneDrive
//! share, a Notion workspace) that gets ingested into a workspace by a
//! long-running data source task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::{DomainError, DomainResult};

/// Lifecycle state of a knowledge source sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Waiting for a sync to be started
    Pending,
    /// A data source task is running
    Syncing,
    /// Last sync finished without error
    Synced,
    /// Last sync finished with an error
    Error,
}

impl Default for SyncState {
    fn default() -> Self {
        Self::Pending
    }
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Error => "error",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "syncing" => Some(Self::Syncing),
            "synced" => Some(Self::Synced),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Terminal for the current generation.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Synced | Self::Error)
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kinds of source a manifest can describe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceType {
    Website,
    OneDrive,
    Notion,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Website => "website",
            Self::OneDrive => "onedrive",
            Self::Notion => "notion",
        }
    }

    /// Name of the data source task that ingests this type.
    pub fn task_name(&self) -> &'static str {
        match self {
            Self::Website => "website-data-source",
            Self::OneDrive => "onedrive-data-source",
            Self::Notion => "notion-data-source",
        }
    }
}

/// Crawl configuration for website sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteConfig {
    #[serde(default)]
    pub urls: Vec<String>,
}

/// Shared links for OneDrive sources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OneDriveConfig {
    #[serde(default)]
    pub shared_links: Vec<String>,
}

/// Notion sources ingest every page the integration can see.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotionConfig {}

/// Source-type-specific configuration. At most one variant is expected to
/// be set; the first one present wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<WebsiteConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onedrive: Option<OneDriveConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notion: Option<NotionConfig>,
}

impl SourceManifest {
    /// Resolve the source type, `None` when no variant is configured.
    pub fn source_type(&self) -> Option<SourceType> {
        if self.website.is_some() {
            Some(SourceType::Website)
        } else if self.onedrive.is_some() {
            Some(SourceType::OneDrive)
        } else if self.notion.is_some() {
            Some(SourceType::Notion)
        } else {
            None
        }
    }

    /// JSON input handed to the data source task.
    pub fn task_input(&self) -> DomainResult<String> {
        let input = match self.source_type() {
            Some(SourceType::Website) => serde_json::to_value(&self.website)?,
            Some(SourceType::OneDrive) => serde_json::to_value(&self.onedrive)?,
            Some(SourceType::Notion) => serde_json::to_value(&self.notion)?,
            None => serde_json::Value::Object(serde_json::Map::new()),
        };
        Ok(input.to_string())
    }
}

/// Observed sync status of a knowledge source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeSourceStatus {
    pub sync_state: SyncState,
    /// Last generation that finished processing
    pub sync_generation: i64,
    pub workspace_name: Option<String>,
    pub thread_name: Option<String>,
    pub run_name: Option<String>,
    pub last_sync_start_time: Option<DateTime<Utc>>,
    pub last_sync_end_time: Option<DateTime<Utc>>,
    pub next_sync_time: Option<DateTime<Utc>>,
    pub error: Option<String>,
    /// Short human summary reported by the data source task
    pub status: String,
    /// Compressed per-item sync state, see `services::compression`
    #[serde(skip)]
    pub sync_details: Vec<u8>,
}

/// A managed knowledge source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeSource {
    pub name: String,
    pub manifest: SourceManifest,
    /// Desired sync epoch, bumped by clients to request a resync
    pub sync_generation: i64,
    pub status: KnowledgeSourceStatus,
    /// Optimistic concurrency token, advanced on every write
    pub resource_version: i64,
    pub created_at: DateTime<Utc>,
}

impl KnowledgeSource {
    pub fn new(name: impl Into<String>, manifest: SourceManifest) -> DomainResult<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self {
            name,
            manifest,
            sync_generation: 0,
            status: KnowledgeSourceStatus::default(),
            resource_version: 0,
            created_at: Utc::now(),
        })
    }

    /// A terminal state is stale when a newer generation was requested or
    /// the state was forced back to pending.
    pub fn needs_rerun(&self) -> bool {
        self.sync_generation > self.status.sync_generation
            || self.status.sync_state == SyncState::Pending
    }
}

fn validate_name(name: &str) -> DomainResult<()> {
    if name.is_empty() {
        return Err(DomainError::ValidationFailed(
            "knowledge source name cannot be empty".to_string(),
        ));
    }
    let valid = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    if !valid {
        return Err(DomainError::ValidationFailed(format!(
            "invalid knowledge source name '{name}': use lowercase letters, digits, '-' and '.'"
        )));
    }
    Ok(())
}
