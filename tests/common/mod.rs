//! Common test utilities for integration tests
//!
//! In-memory implementations of the reconciler's ports plus a harness that
//! wires them together. Each fake records what was asked of it so tests can
//! assert on writes, launches and releases.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use knowledge_sync::domain::models::{
    FileDetails, KnowledgeFile, KnowledgeSource, SourceManifest, SyncMetadata, SyncState, Thread,
    WebsiteConfig, Workspace,
};
use knowledge_sync::domain::ports::{
    ApplyMode, ApplyReport, KnowledgeFileRepository, KnowledgeSourceRepository, Level, Logger,
    MetadataReader, Provisioner, TaskEvent, TaskHandle, TaskInvoker, TaskOptions, TaskResult,
};
use knowledge_sync::services::{ProgressPersister, Reconciler, ReconcilerSettings};
use knowledge_sync::{DomainError, DomainResult};

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// A website source with a fixed crawl target.
pub fn website_source(name: &str) -> KnowledgeSource {
    let manifest = SourceManifest {
        website: Some(WebsiteConfig {
            urls: vec!["https://docs.example.com".to_string()],
        }),
        ..Default::default()
    };
    KnowledgeSource::new(name, manifest).expect("valid source name")
}

/// Metadata describing `ids` as discovered files.
pub fn metadata_with(ids: &[&str], status: &str) -> SyncMetadata {
    SyncMetadata {
        files: ids
            .iter()
            .map(|id| FileDetails {
                id: (*id).to_string(),
                file_path: format!("{id}.html"),
                size_in_bytes: 100,
                ..Default::default()
            })
            .collect(),
        status: status.to_string(),
        state: serde_json::json!({ "seen": ids.len() }),
    }
}

// ============================================================================
// Source repository
// ============================================================================

/// Source store with resource-version compare-and-swap.
#[derive(Default)]
pub struct InMemorySources {
    sources: Mutex<BTreeMap<String, KnowledgeSource>>,
    /// `sync_state` after every successful status write
    status_writes: Mutex<Vec<SyncState>>,
    /// Number of upcoming `list` calls that fail
    list_failures: AtomicUsize,
    /// Number of upcoming `update_status` calls that fail
    status_failures: AtomicUsize,
}

impl InMemorySources {
    /// Store `source` and return the stored copy (with its version).
    pub fn insert(&self, mut source: KnowledgeSource) -> KnowledgeSource {
        source.resource_version = 1;
        self.sources
            .lock()
            .unwrap()
            .insert(source.name.clone(), source.clone());
        source
    }

    pub fn fail_next_lists(&self, count: usize) {
        self.list_failures.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_status_writes(&self, count: usize) {
        self.status_failures.store(count, Ordering::SeqCst);
    }

    pub fn stored(&self, name: &str) -> KnowledgeSource {
        self.sources
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .expect("source is stored")
    }

    pub fn status_writes(&self) -> Vec<SyncState> {
        self.status_writes.lock().unwrap().clone()
    }

    pub fn status_write_count(&self) -> usize {
        self.status_writes.lock().unwrap().len()
    }

    fn check_version<'a>(
        sources: &'a mut BTreeMap<String, KnowledgeSource>,
        source: &KnowledgeSource,
    ) -> DomainResult<&'a mut KnowledgeSource> {
        let stored = sources
            .get_mut(&source.name)
            .ok_or_else(|| DomainError::SourceNotFound(source.name.clone()))?;
        if stored.resource_version != source.resource_version {
            return Err(DomainError::ConcurrencyConflict {
                entity: "knowledge_source".to_string(),
                id: source.name.clone(),
            });
        }
        Ok(stored)
    }
}

#[async_trait]
impl KnowledgeSourceRepository for InMemorySources {
    async fn create(&self, source: &mut KnowledgeSource) -> DomainResult<()> {
        let mut sources = self.sources.lock().unwrap();
        if sources.contains_key(&source.name) {
            return Err(DomainError::SourceAlreadyExists(source.name.clone()));
        }
        source.resource_version = 1;
        sources.insert(source.name.clone(), source.clone());
        Ok(())
    }

    async fn get(&self, name: &str) -> DomainResult<Option<KnowledgeSource>> {
        Ok(self.sources.lock().unwrap().get(name).cloned())
    }

    async fn list(&self) -> DomainResult<Vec<KnowledgeSource>> {
        if self
            .list_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(DomainError::DatabaseError("database is locked".to_string()));
        }
        Ok(self.sources.lock().unwrap().values().cloned().collect())
    }

    async fn update_spec(&self, source: &mut KnowledgeSource) -> DomainResult<()> {
        let mut sources = self.sources.lock().unwrap();
        let stored = Self::check_version(&mut sources, source)?;
        stored.manifest = source.manifest.clone();
        stored.sync_generation = source.sync_generation;
        stored.resource_version += 1;
        source.resource_version = stored.resource_version;
        Ok(())
    }

    async fn update_status(&self, source: &mut KnowledgeSource) -> DomainResult<()> {
        if self
            .status_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(DomainError::DatabaseError("disk I/O error".to_string()));
        }
        let mut sources = self.sources.lock().unwrap();
        let stored = Self::check_version(&mut sources, source)?;
        stored.status = source.status.clone();
        stored.resource_version += 1;
        source.resource_version = stored.resource_version;
        self.status_writes
            .lock()
            .unwrap()
            .push(source.status.sync_state);
        Ok(())
    }

    async fn delete(&self, name: &str) -> DomainResult<()> {
        self.sources
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| DomainError::SourceNotFound(name.to_string()))
    }
}

// ============================================================================
// File repository
// ============================================================================

#[derive(Default)]
pub struct InMemoryFiles {
    files: Mutex<HashMap<String, BTreeMap<String, KnowledgeFile>>>,
    modes: Mutex<Vec<ApplyMode>>,
}

impl InMemoryFiles {
    pub fn file_names(&self, source_name: &str) -> Vec<String> {
        self.files
            .lock()
            .unwrap()
            .get(source_name)
            .map(|files| files.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn file_count(&self, source_name: &str) -> usize {
        self.file_names(source_name).len()
    }

    /// Modes of every `apply` call, in order.
    pub fn modes(&self) -> Vec<ApplyMode> {
        self.modes.lock().unwrap().clone()
    }
}

#[async_trait]
impl KnowledgeFileRepository for InMemoryFiles {
    async fn list_for_source(&self, source_name: &str) -> DomainResult<Vec<KnowledgeFile>> {
        let mut files: Vec<KnowledgeFile> = self
            .files
            .lock()
            .unwrap()
            .get(source_name)
            .map(|files| files.values().cloned().collect())
            .unwrap_or_default();
        files.sort_by_key(|file| file.discovered_index);
        Ok(files)
    }

    async fn apply(
        &self,
        source_name: &str,
        files: &[KnowledgeFile],
        mode: ApplyMode,
    ) -> DomainResult<ApplyReport> {
        self.modes.lock().unwrap().push(mode);
        let mut all = self.files.lock().unwrap();
        let stored = all.entry(source_name.to_string()).or_default();

        let mut report = ApplyReport::default();
        for file in files {
            stored.insert(file.name.clone(), file.clone());
            report.upserted += 1;
        }
        if mode == ApplyMode::Prune {
            let desired: HashSet<&str> = files.iter().map(|file| file.name.as_str()).collect();
            let before = stored.len();
            stored.retain(|name, _| desired.contains(name.as_str()));
            report.pruned = (before - stored.len()) as u64;
        }
        Ok(report)
    }

    async fn delete_for_source(&self, source_name: &str) -> DomainResult<u64> {
        Ok(self
            .files
            .lock()
            .unwrap()
            .remove(source_name)
            .map_or(0, |files| files.len() as u64))
    }
}

// ============================================================================
// Provisioner
// ============================================================================

/// Provisions workspaces instantly. Sources named in `not_ready` get a
/// thread that never receives a workspace id.
#[derive(Default)]
pub struct FakeProvisioner {
    not_ready: Mutex<HashSet<String>>,
    threads_ensured: AtomicUsize,
}

impl FakeProvisioner {
    pub fn set_not_ready(&self, source_name: &str) {
        self.not_ready
            .lock()
            .unwrap()
            .insert(source_name.to_string());
    }

    pub fn threads_ensured(&self) -> usize {
        self.threads_ensured.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provisioner for FakeProvisioner {
    async fn ensure_workspace(&self, source_name: &str) -> DomainResult<Workspace> {
        let mut workspace = Workspace::for_source(source_name);
        workspace.workspace_id = Some(format!("/workspaces/{}", workspace.name));
        Ok(workspace)
    }

    async fn ensure_thread(&self, source_name: &str, workspace: &Workspace) -> DomainResult<Thread> {
        self.threads_ensured.fetch_add(1, Ordering::SeqCst);
        let mut thread = Thread::for_source(source_name, &workspace.name);
        if !self.not_ready.lock().unwrap().contains(source_name) {
            thread.workspace_id = workspace.workspace_id.clone();
        }
        Ok(thread)
    }

    async fn wait_for_thread_ready(&self, thread: &Thread, _timeout: Duration) -> DomainResult<Thread> {
        if thread.is_ready() {
            Ok(thread.clone())
        } else {
            Err(DomainError::ThreadNotReady(thread.name.clone()))
        }
    }
}

// ============================================================================
// Task invoker
// ============================================================================

/// How a started task behaves.
#[derive(Debug, Clone)]
pub enum Script {
    /// Emit `events`, close the channel, then report `error`.
    Complete {
        events: Vec<String>,
        error: Option<String>,
    },
    /// Keep the channel open until the test drops the sender taken with
    /// [`ScriptedInvoker::take_sender`]; the result is success.
    Controlled,
    /// Close the channel, then fail to produce a result.
    ResultUnavailable,
    /// Refuse to start.
    LaunchFails,
}

impl Script {
    pub fn success() -> Self {
        Self::Complete {
            events: vec!["started".to_string()],
            error: None,
        }
    }

    pub fn failure(message: &str) -> Self {
        Self::Complete {
            events: Vec::new(),
            error: Some(message.to_string()),
        }
    }
}

pub struct ScriptedInvoker {
    script: Mutex<Script>,
    starts: AtomicUsize,
    closes: Arc<AtomicUsize>,
    inputs: Mutex<Vec<(String, String, TaskOptions)>>,
    sender: Mutex<Option<mpsc::Sender<TaskEvent>>>,
}

impl ScriptedInvoker {
    pub fn new(script: Script) -> Self {
        Self {
            script: Mutex::new(script),
            starts: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
            inputs: Mutex::new(Vec::new()),
            sender: Mutex::new(None),
        }
    }

    pub fn set_script(&self, script: Script) {
        *self.script.lock().unwrap() = script;
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// `(task_name, input, options)` of every start.
    pub fn inputs(&self) -> Vec<(String, String, TaskOptions)> {
        self.inputs.lock().unwrap().clone()
    }

    /// The event sender of the latest `Controlled` task.
    pub fn take_sender(&self) -> Option<mpsc::Sender<TaskEvent>> {
        self.sender.lock().unwrap().take()
    }
}

#[async_trait]
impl TaskInvoker for ScriptedInvoker {
    async fn start(
        &self,
        thread: &Thread,
        task_name: &str,
        input: &str,
        options: TaskOptions,
    ) -> DomainResult<Box<dyn TaskHandle>> {
        let script = self.script.lock().unwrap().clone();
        if matches!(script, Script::LaunchFails) {
            return Err(DomainError::TaskLaunchFailed(format!(
                "{task_name} refused on {}",
                thread.name
            )));
        }

        let index = self.starts.fetch_add(1, Ordering::SeqCst);
        self.inputs
            .lock()
            .unwrap()
            .push((task_name.to_string(), input.to_string(), options));

        let (tx, rx) = mpsc::channel(16);
        let result = match script {
            Script::Complete { events, error } => {
                for content in events {
                    let _ = tx.try_send(TaskEvent { content });
                }
                Ok(TaskResult { error })
            }
            Script::Controlled => {
                *self.sender.lock().unwrap() = Some(tx);
                Ok(TaskResult::default())
            }
            Script::ResultUnavailable => Err("result store unreachable".to_string()),
            Script::LaunchFails => unreachable!(),
        };

        Ok(Box::new(ScriptedHandle {
            run_name: format!("run-{index}"),
            events: rx,
            result: Some(result),
            closes: Arc::clone(&self.closes),
            closed: false,
        }))
    }
}

struct ScriptedHandle {
    run_name: String,
    events: mpsc::Receiver<TaskEvent>,
    result: Option<Result<TaskResult, String>>,
    closes: Arc<AtomicUsize>,
    closed: bool,
}

#[async_trait]
impl TaskHandle for ScriptedHandle {
    fn run_name(&self) -> &str {
        &self.run_name
    }

    fn events(&mut self) -> &mut mpsc::Receiver<TaskEvent> {
        &mut self.events
    }

    async fn result(&mut self) -> DomainResult<TaskResult> {
        match self.result.take() {
            Some(Ok(result)) => Ok(result),
            Some(Err(message)) => Err(DomainError::TaskResultUnavailable(message)),
            None => Err(DomainError::TaskResultUnavailable(
                "result already taken".to_string(),
            )),
        }
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}

// ============================================================================
// Metadata reader
// ============================================================================

/// Serves a fixed metadata document; the next `failures` reads fail.
pub struct ScriptedMetadata {
    metadata: Mutex<SyncMetadata>,
    failures: AtomicUsize,
    reads: AtomicUsize,
}

impl ScriptedMetadata {
    pub fn new(metadata: SyncMetadata) -> Self {
        Self {
            metadata: Mutex::new(metadata),
            failures: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, metadata: SyncMetadata) {
        *self.metadata.lock().unwrap() = metadata;
    }

    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub fn fail_always(&self) {
        self.fail_next(usize::MAX);
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataReader for ScriptedMetadata {
    async fn read_metadata(&self, workspace_id: &str) -> DomainResult<SyncMetadata> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n > 0).then(|| if n == usize::MAX { n } else { n - 1 })
            })
            .is_ok();
        if failing {
            return Err(DomainError::SerializationError(format!(
                "metadata in {workspace_id} is unreadable"
            )));
        }
        Ok(self.metadata.lock().unwrap().clone())
    }
}

// ============================================================================
// Logger
// ============================================================================

#[derive(Default)]
pub struct CapturingLogger {
    entries: Mutex<Vec<(Level, String, HashMap<String, Value>)>>,
}

impl CapturingLogger {
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _, _)| *l == level)
            .map(|(_, message, _)| message.clone())
            .collect()
    }
}

#[async_trait]
impl Logger for CapturingLogger {
    async fn log(&self, level: Level, message: &str, fields: HashMap<String, Value>) {
        self.entries
            .lock()
            .unwrap()
            .push((level, message.to_string(), fields));
    }
}

// ============================================================================
// Harness
// ============================================================================

/// All fakes plus a reconciler built on them.
pub struct Harness {
    pub sources: Arc<InMemorySources>,
    pub files: Arc<InMemoryFiles>,
    pub provisioner: Arc<FakeProvisioner>,
    pub invoker: Arc<ScriptedInvoker>,
    pub metadata: Arc<ScriptedMetadata>,
    pub logger: Arc<CapturingLogger>,
    pub reconciler: Arc<Reconciler>,
}

impl Harness {
    pub fn new(script: Script) -> Self {
        let sources = Arc::new(InMemorySources::default());
        let files = Arc::new(InMemoryFiles::default());
        let provisioner = Arc::new(FakeProvisioner::default());
        let invoker = Arc::new(ScriptedInvoker::new(script));
        let metadata = Arc::new(ScriptedMetadata::new(metadata_with(
            &["intro", "guide"],
            "crawled 2 pages",
        )));
        let logger = Arc::new(CapturingLogger::default());

        let progress = ProgressPersister::new(sources.clone(), files.clone(), metadata.clone());
        let reconciler = Arc::new(Reconciler::new(
            sources.clone(),
            provisioner.clone(),
            invoker.clone(),
            progress,
            logger.clone(),
            ReconcilerSettings {
                checkpoint_interval: Duration::from_secs(15),
                thread_ready_timeout: Duration::from_secs(1),
            },
        ));

        Self {
            sources,
            files,
            provisioner,
            invoker,
            metadata,
            logger,
            reconciler,
        }
    }

    pub fn persister(&self) -> ProgressPersister {
        ProgressPersister::new(
            self.sources.clone(),
            self.files.clone(),
            self.metadata.clone(),
        )
    }
}
