//! Task invocation port.
//!
//! A task is an opaque long-running job started by name on a thread. The
//! handle's event channel is closed by the invoker when the task finishes;
//! closure is the only completion signal.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::errors::DomainResult;
use crate::domain::models::Thread;

/// Options for starting a system task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskOptions {
    /// Credential namespaces the task may read from
    pub credential_context_ids: Vec<String>,
}

/// Progress event emitted by a running task. Content is informational only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEvent {
    pub content: String,
}

/// Terminal outcome reported by a task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskResult {
    /// Error reported by the task itself, `None` on success
    pub error: Option<String>,
}

/// Live reference to a started task, owned by the pass that started it.
#[async_trait]
pub trait TaskHandle: Send {
    /// Identifier of the run backing this task.
    fn run_name(&self) -> &str;

    /// Event stream, closed when the task finishes.
    fn events(&mut self) -> &mut mpsc::Receiver<TaskEvent>;

    /// Fetch the terminal outcome. Only meaningful after the event stream
    /// has closed.
    async fn result(&mut self) -> DomainResult<TaskResult>;

    /// Release the task's resources.
    fn close(&mut self);
}

/// Starts named tasks on a thread.
#[async_trait]
pub trait TaskInvoker: Send + Sync {
    async fn start(
        &self,
        thread: &Thread,
        task_name: &str,
        input: &str,
        options: TaskOptions,
    ) -> DomainResult<Box<dyn TaskHandle>>;
}

/// Closes the wrapped handle exactly once, when dropped.
pub struct ClosingHandle {
    inner: Box<dyn TaskHandle>,
}

impl ClosingHandle {
    pub fn new(inner: Box<dyn TaskHandle>) -> Self {
        Self { inner }
    }
}

impl std::ops::Deref for ClosingHandle {
    type Target = dyn TaskHandle;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl std::ops::DerefMut for ClosingHandle {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.inner.as_mut()
    }
}

impl Drop for ClosingHandle {
    fn drop(&mut self) {
        self.inner.close();
    }
}
