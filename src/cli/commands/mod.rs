//! CLI command implementations.

pub mod file;
pub mod init;
pub mod reconcile;
pub mod run;
pub mod source;
