//! Progress persistence tests against in-memory ports.

mod common;

use common::{metadata_with, website_source, Harness, Script};
use knowledge_sync::domain::models::{Thread, Workspace};
use knowledge_sync::services::decompress_sync_details;
use knowledge_sync::DomainError;

fn ready_thread(source_name: &str) -> Thread {
    let workspace = Workspace::for_source(source_name);
    let mut thread = Thread::for_source(source_name, &workspace.name);
    thread.workspace_id = Some(format!("/workspaces/{}", workspace.name));
    thread
}

#[tokio::test]
async fn test_partial_saves_never_prune() {
    let h = Harness::new(Script::success());
    let persister = h.persister();
    let mut source = h.sources.insert(website_source("docs"));
    let thread = ready_thread("docs");

    h.metadata.set(metadata_with(&["a", "b", "c"], "3 pages"));
    let first = persister.save_progress(&mut source, &thread, false).await.unwrap();
    assert_eq!(first.files, 3);
    assert_eq!(first.apply.upserted, 3);

    h.metadata.set(metadata_with(&["a"], "restarted"));
    let partial = persister.save_progress(&mut source, &thread, false).await.unwrap();
    assert_eq!(partial.apply.pruned, 0);
    assert_eq!(h.files.file_count("docs"), 3);

    let complete = persister.save_progress(&mut source, &thread, true).await.unwrap();
    assert_eq!(complete.apply.pruned, 2);
    assert_eq!(h.files.file_count("docs"), 1);
}

#[tokio::test]
async fn test_unchanged_status_is_not_rewritten() {
    let h = Harness::new(Script::success());
    let persister = h.persister();
    let mut source = h.sources.insert(website_source("docs"));
    let thread = ready_thread("docs");

    let first = persister.save_progress(&mut source, &thread, false).await.unwrap();
    let second = persister.save_progress(&mut source, &thread, false).await.unwrap();

    assert!(first.status_written);
    assert!(!second.status_written);
    assert_eq!(h.sources.status_write_count(), 1);
    assert_eq!(source.status.status, "crawled 2 pages");
    assert_eq!(
        decompress_sync_details(&source.status.sync_details).unwrap(),
        serde_json::json!({ "seen": 2 })
    );
}

#[tokio::test]
async fn test_failed_status_write_is_retried_on_next_save() {
    let h = Harness::new(Script::success());
    let persister = h.persister();
    let mut source = h.sources.insert(website_source("docs"));
    let thread = ready_thread("docs");
    h.sources.fail_next_status_writes(1);

    let err = persister
        .save_progress(&mut source, &thread, false)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::DatabaseError(_)));
    assert_eq!(source.status.status, "");
    assert!(source.status.sync_details.is_empty());

    let retry = persister.save_progress(&mut source, &thread, false).await.unwrap();

    assert!(retry.status_written);
    assert_eq!(h.sources.status_write_count(), 1);
    assert_eq!(h.sources.stored("docs").status.status, "crawled 2 pages");
}

#[tokio::test]
async fn test_changed_state_alone_is_written() {
    let h = Harness::new(Script::success());
    let persister = h.persister();
    let mut source = h.sources.insert(website_source("docs"));
    let thread = ready_thread("docs");

    persister.save_progress(&mut source, &thread, false).await.unwrap();

    let mut metadata = metadata_with(&["intro", "guide"], "crawled 2 pages");
    metadata.state = serde_json::json!({ "seen": 2, "cursor": "page-3" });
    h.metadata.set(metadata);
    let outcome = persister.save_progress(&mut source, &thread, false).await.unwrap();

    assert!(outcome.status_written);
    assert_eq!(
        decompress_sync_details(&h.sources.stored("docs").status.sync_details).unwrap()["cursor"],
        "page-3"
    );
}

#[tokio::test]
async fn test_duplicate_items_collapse_to_one_file() {
    let h = Harness::new(Script::success());
    let persister = h.persister();
    let mut source = h.sources.insert(website_source("docs"));

    h.metadata.set(metadata_with(&["a", "b", "a"], "3 items"));
    let outcome = persister
        .save_progress(&mut source, &ready_thread("docs"), true)
        .await
        .unwrap();

    assert_eq!(outcome.files, 2);
    assert_eq!(h.files.file_count("docs"), 2);
}

#[tokio::test]
async fn test_thread_without_workspace_is_rejected() {
    let h = Harness::new(Script::success());
    let persister = h.persister();
    let mut source = h.sources.insert(website_source("docs"));
    let thread = Thread::for_source("docs", "w1-docs");

    let err = persister
        .save_progress(&mut source, &thread, true)
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::ThreadNotReady(_)));
    assert_eq!(h.metadata.reads(), 0);
    assert_eq!(h.sources.status_write_count(), 0);
}
