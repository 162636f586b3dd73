//! Knowledge source sync controller
//!
//! Keeps a set of knowledge sources (websites, OneDrive shares, Notion
//! workspaces) ingested into per-source workspaces. Each source is driven
//! through `Pending -> Syncing -> Synced | Error` by a reconciler that
//! starts a data source task, checkpoints its progress into knowledge file
//! records and recovers from interrupted runs.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, errors and port traits
//! - **Service Layer** (`services`): reconciliation, progress persistence, scheduling
//! - **Adapters** (`adapters`): SQLite storage, local process tasks, workspace metadata
//! - **Infrastructure Layer** (`infrastructure`): configuration and logging
//! - **CLI Layer** (`cli`): command-line interface

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

pub use domain::models::{
    Config, KnowledgeFile, KnowledgeSource, KnowledgeSourceStatus, SourceManifest, SourceType,
    SyncState, Thread, Workspace,
};
pub use domain::ports::{
    KnowledgeFileRepository, KnowledgeSourceRepository, Logger, MetadataReader, Provisioner,
    TaskHandle, TaskInvoker,
};
pub use domain::{DomainError, DomainResult};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{ProgressPersister, ReconcileOutcome, ReconcileScheduler, Reconciler};
