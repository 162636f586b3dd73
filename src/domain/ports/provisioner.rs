//! Workspace and thread provisioning port.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Thread, Workspace};

/// Creates-or-fetches the workspace and thread that back a knowledge source.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Create the source's workspace, or return the existing one.
    async fn ensure_workspace(&self, source_name: &str) -> DomainResult<Workspace>;

    /// Create the source's thread if it is absent. An existing thread is
    /// returned as stored, never replaced.
    async fn ensure_thread(&self, source_name: &str, workspace: &Workspace) -> DomainResult<Thread>;

    /// Block until the thread reports a workspace id, re-reading it on every
    /// poll. Fails with `DomainError::ThreadNotReady` after `timeout`.
    async fn wait_for_thread_ready(&self, thread: &Thread, timeout: Duration) -> DomainResult<Thread>;
}
