//! Knowledge file records and the sync metadata they are derived from.
//!
//! Data source tasks write a `.metadata.json` document into their workspace
//! describing every item discovered so far. The controller turns that
//! document into one `KnowledgeFile` child record per item.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::naming;

/// Name of the metadata document inside a workspace.
pub const METADATA_FILE: &str = ".metadata.json";

/// Per-item details reported by a data source task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDetails {
    /// Stable item id within the source (often a URL or remote id)
    pub id: String,
    #[serde(default, alias = "filePath")]
    pub file_path: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, alias = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default, alias = "sizeInBytes")]
    pub size_in_bytes: i64,
}

/// Contents of the workspace metadata document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncMetadata {
    /// Items in discovery order
    #[serde(default)]
    pub files: Vec<FileDetails>,
    /// Short human status, e.g. "crawled 12 of 40 pages"
    #[serde(default)]
    pub status: String,
    /// Task-defined structured state
    #[serde(default)]
    pub state: serde_json::Value,
}

/// Child record of a knowledge source representing one ingested item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeFile {
    pub name: String,
    pub source_name: String,
    pub file_name: String,
    pub url: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub checksum: Option<String>,
    pub size_in_bytes: i64,
    /// Position in discovery order
    pub discovered_index: i64,
}

impl KnowledgeFile {
    pub fn from_details(source_name: &str, index: usize, details: &FileDetails) -> Self {
        Self {
            name: naming::knowledge_file_name(source_name, &details.id),
            source_name: source_name.to_string(),
            file_name: details.file_path.clone(),
            url: details.url.clone(),
            updated_at: details.updated_at,
            checksum: details.checksum.clone(),
            size_in_bytes: details.size_in_bytes,
            discovered_index: i64::try_from(index).unwrap_or(i64::MAX),
        }
    }
}

impl SyncMetadata {
    /// Derive child records, one per distinct item id, in discovery order.
    pub fn knowledge_files(&self, source_name: &str) -> Vec<KnowledgeFile> {
        let mut seen = std::collections::HashSet::new();
        self.files
            .iter()
            .filter(|details| seen.insert(details.id.as_str()))
            .enumerate()
            .map(|(index, details)| KnowledgeFile::from_details(source_name, index, details))
            .collect()
    }
}
