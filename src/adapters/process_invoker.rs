//! Runs data source tasks as local child processes.
//!
//! Each task name maps to a configured command. The command runs with the
//! thread's workspace as its working directory, receives the task input on
//! stdin and reports progress as stdout lines. Exit status zero is success;
//! otherwise the tail of stderr becomes the task error.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{TaskCommandConfig, Thread};
use crate::domain::ports::{TaskEvent, TaskHandle, TaskInvoker, TaskOptions, TaskResult};

const EVENT_BUFFER: usize = 64;
const STDERR_TAIL_LINES: usize = 20;
const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// Environment variable carrying the comma-separated credential namespaces.
pub const CREDENTIAL_CONTEXT_ENV: &str = "KSYNC_CREDENTIAL_CONTEXT";
/// Environment variable carrying the run name.
pub const RUN_NAME_ENV: &str = "KSYNC_RUN_NAME";
/// Environment variable carrying the workspace id.
pub const WORKSPACE_ENV: &str = "KSYNC_WORKSPACE";

pub struct ProcessTaskInvoker {
    commands: HashMap<String, TaskCommandConfig>,
}

impl ProcessTaskInvoker {
    pub fn new(commands: HashMap<String, TaskCommandConfig>) -> Self {
        Self { commands }
    }
}

#[async_trait]
impl TaskInvoker for ProcessTaskInvoker {
    async fn start(
        &self,
        thread: &Thread,
        task_name: &str,
        input: &str,
        options: TaskOptions,
    ) -> DomainResult<Box<dyn TaskHandle>> {
        let workspace_id = thread
            .workspace_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or_else(|| DomainError::ThreadNotReady(thread.name.clone()))?;
        let config = self.commands.get(task_name).ok_or_else(|| {
            DomainError::TaskLaunchFailed(format!("no command configured for task {task_name}"))
        })?;
        let run_name = format!("run-{}", Uuid::new_v4());

        let mut child = Command::new(&config.command)
            .args(&config.args)
            .envs(&config.env)
            .env(CREDENTIAL_CONTEXT_ENV, options.credential_context_ids.join(","))
            .env(RUN_NAME_ENV, &run_name)
            .env(WORKSPACE_ENV, workspace_id)
            .current_dir(workspace_id)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DomainError::TaskLaunchFailed(format!("{task_name}: {e}")))?;

        let (Some(stdin), Some(stdout), Some(stderr)) =
            (child.stdin.take(), child.stdout.take(), child.stderr.take())
        else {
            return Err(DomainError::TaskLaunchFailed(format!(
                "{task_name}: missing stdio handles"
            )));
        };

        // Written concurrently with the stdout reader so a task that talks
        // before it reads can never fill both pipes
        tokio::spawn(write_input(stdin, input.to_string(), task_name.to_string()));

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let (result_tx, result_rx) = oneshot::channel();
        let closed = CancellationToken::new();
        tokio::spawn(supervise(child, stdout, stderr, events_tx, result_tx, closed.clone()));

        tracing::debug!(task = task_name, run = %run_name, thread = %thread.name, "task started");
        Ok(Box::new(ProcessTaskHandle {
            run_name,
            events: events_rx,
            result: Some(result_rx),
            closed,
        }))
    }
}

struct ProcessTaskHandle {
    run_name: String,
    events: mpsc::Receiver<TaskEvent>,
    result: Option<oneshot::Receiver<TaskResult>>,
    closed: CancellationToken,
}

#[async_trait]
impl TaskHandle for ProcessTaskHandle {
    fn run_name(&self) -> &str {
        &self.run_name
    }

    fn events(&mut self) -> &mut mpsc::Receiver<TaskEvent> {
        &mut self.events
    }

    async fn result(&mut self) -> DomainResult<TaskResult> {
        let rx = self.result.take().ok_or_else(|| {
            DomainError::TaskResultUnavailable(format!("{}: result already taken", self.run_name))
        })?;
        rx.await.map_err(|_| {
            DomainError::TaskResultUnavailable(format!("{}: runner exited without a result", self.run_name))
        })
    }

    fn close(&mut self) {
        self.closed.cancel();
    }
}

/// Owns the child for its whole life. The event sender is dropped only after
/// the result is sent, so a closed stream always has a result behind it.
async fn supervise(
    mut child: Child,
    stdout: ChildStdout,
    stderr: ChildStderr,
    events: mpsc::Sender<TaskEvent>,
    result_tx: oneshot::Sender<TaskResult>,
    closed: CancellationToken,
) {
    let stderr_tail = tokio::spawn(read_tail(stderr));

    let finished = tokio::select! {
        biased;
        () = closed.cancelled() => None,
        status = forward_then_wait(&mut child, stdout, &events) => Some(status),
    };

    let result = match finished {
        Some(Ok(status)) if status.success() => TaskResult::default(),
        Some(Ok(status)) => {
            let tail = stderr_tail.await.unwrap_or_default();
            TaskResult { error: Some(failure_message(status, &tail)) }
        }
        Some(Err(e)) => TaskResult { error: Some(format!("failed to supervise task: {e}")) },
        None => {
            stderr_tail.abort();
            terminate(&mut child).await;
            TaskResult { error: Some("task closed before completion".to_string()) }
        }
    };

    let _ = result_tx.send(result);
    drop(events);
}

async fn forward_then_wait(
    child: &mut Child,
    stdout: ChildStdout,
    events: &mpsc::Sender<TaskEvent>,
) -> std::io::Result<ExitStatus> {
    let mut reader = BufReader::new(stdout);
    let mut buf = Vec::new();
    while let Some(line) = next_line_lossy(&mut reader, &mut buf).await? {
        if line.trim().is_empty() {
            continue;
        }
        // Keep draining after the receiver is gone so the child never blocks
        // on a full pipe
        let _ = events.send(TaskEvent { content: line }).await;
    }
    child.wait().await
}

async fn read_tail(stderr: ChildStderr) -> String {
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut reader = BufReader::new(stderr);
    let mut buf = Vec::new();
    while let Ok(Some(line)) = next_line_lossy(&mut reader, &mut buf).await {
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail.into_iter().collect::<Vec<_>>().join("\n")
}

/// Task output is not required to be UTF-8; invalid bytes are replaced
/// rather than ending the stream.
async fn next_line_lossy<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(buf);
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
}

async fn write_input(mut stdin: ChildStdin, input: String, task_name: String) {
    // A task that exits without reading its input surfaces through its
    // exit status, not here
    if let Err(e) = stdin.write_all(input.as_bytes()).await {
        tracing::debug!(task = %task_name, error = %e, "task did not read its input");
    }
}

fn failure_message(status: ExitStatus, stderr_tail: &str) -> String {
    let code = status
        .code()
        .map_or_else(|| "signal".to_string(), |code| code.to_string());
    if stderr_tail.trim().is_empty() {
        format!("task exited with status {code}")
    } else {
        format!("task exited with status {code}: {}", stderr_tail.trim())
    }
}

/// SIGTERM first, SIGKILL if the task is still alive after the grace period.
async fn terminate(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) {
            if kill(Pid::from_raw(pid), Signal::SIGTERM).is_ok()
                && tokio::time::timeout(TERMINATE_GRACE, child.wait()).await.is_ok()
            {
                return;
            }
        }
    }

    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "failed to kill task process");
    }
}
