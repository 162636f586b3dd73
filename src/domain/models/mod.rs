pub mod config;
pub mod knowledge_file;
pub mod knowledge_source;
pub mod naming;
pub mod thread;

pub use config::{
    Config, DatabaseConfig, LoggingConfig, ReconcilerConfig, SchedulerConfig, TaskCommandConfig,
};
pub use knowledge_file::{FileDetails, KnowledgeFile, SyncMetadata, METADATA_FILE};
pub use knowledge_source::{
    KnowledgeSource, KnowledgeSourceStatus, NotionConfig, OneDriveConfig, SourceManifest,
    SourceType, SyncState, WebsiteConfig,
};
pub use thread::{Thread, Workspace};
