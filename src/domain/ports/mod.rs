//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that adapters must implement:
//! - KnowledgeSourceRepository: versioned source records
//! - KnowledgeFileRepository: per-item child records
//! - Provisioner: workspace and thread create-or-get
//! - TaskInvoker: starts data source tasks by name
//! - MetadataReader: reads task-written sync metadata
//! - Logger: structured logging capability

pub mod knowledge_file_repository;
pub mod knowledge_source_repository;
pub mod logger;
pub mod metadata_reader;
pub mod provisioner;
pub mod task_invoker;

pub use knowledge_file_repository::{ApplyMode, ApplyReport, KnowledgeFileRepository};
pub use knowledge_source_repository::KnowledgeSourceRepository;
pub use logger::{Level, Logger};
pub use metadata_reader::MetadataReader;
pub use provisioner::Provisioner;
pub use task_invoker::{
    ClosingHandle, TaskEvent, TaskHandle, TaskInvoker, TaskOptions, TaskResult,
};
