//! Infrastructure adapters for external systems.

pub mod fs_metadata_reader;
pub mod process_invoker;
pub mod sqlite;

pub use fs_metadata_reader::FsMetadataReader;
pub use process_invoker::ProcessTaskInvoker;
