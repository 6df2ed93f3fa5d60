//! Integration tests for the job store.
//!
//! These tests verify JobStore operations against a real SQLite database file.

use std::sync::Arc;

use mediafetch_core::{Database, JobFormat, JobStatus, JobStore, NewJob};
use tempfile::TempDir;

/// Helper to create a test database with migrations applied.
async fn setup_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("jobs.db");

    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");

    (db, temp_dir)
}

fn new_job<'a>(url: &'a str, filepath: &'a str) -> NewJob<'a> {
    NewJob {
        url,
        filename: "report.pdf",
        filepath,
        format: JobFormat::File,
    }
}

#[tokio::test]
async fn test_records_survive_reopening_the_database() {
    let (db, temp_dir) = setup_test_db().await;
    let store = JobStore::new(db.clone());

    let running = store
        .create(&new_job("https://example.com/a.pdf", "/tmp/a.pdf"))
        .await
        .unwrap();
    store.mark_downloading(&running).await.unwrap();
    store.record_progress(&running, 204_800, 40).await.unwrap();

    let done = store
        .create(&new_job("https://example.com/b.pdf", "/tmp/b.pdf"))
        .await
        .unwrap();
    store.mark_downloading(&done).await.unwrap();
    store.mark_completed(&done, 12).await.unwrap();
    db.close().await;

    let reopened = JobStore::new(Database::new(&temp_dir.path().join("jobs.db")).await.unwrap());

    let running = reopened.get(&running).await.unwrap().unwrap();
    assert_eq!(running.status(), JobStatus::Downloading);
    assert_eq!(running.progress, 40);
    assert_eq!(running.downloaded, 204_800);
    assert!(running.completed_at.is_none());

    let done = reopened.get(&done).await.unwrap().unwrap();
    assert_eq!(done.status(), JobStatus::Completed);
    assert_eq!(done.progress, 100);
    assert!(done.completed_at.is_some());

    assert_eq!(reopened.list().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_ids_are_unique() {
    let (db, _temp_dir) = setup_test_db().await;
    let store = JobStore::new(db);

    let mut ids = std::collections::HashSet::new();
    for i in 0..50 {
        let path = format!("/tmp/{i}.bin");
        let id = store
            .create(&new_job("https://example.com/x", &path))
            .await
            .unwrap();
        assert_eq!(id.len(), 16);
        assert!(ids.insert(id));
    }
}

#[tokio::test]
async fn test_concurrent_writers_on_different_jobs() {
    let (db, _temp_dir) = setup_test_db().await;
    let store = Arc::new(JobStore::new(db));

    let mut ids = Vec::new();
    for i in 0..8 {
        let path = format!("/tmp/{i}.bin");
        let id = store
            .create(&new_job("https://example.com/x", &path))
            .await
            .unwrap();
        store.mark_downloading(&id).await.unwrap();
        ids.push(id);
    }

    let mut handles = Vec::new();
    for id in ids.clone() {
        let store = Arc::clone(&store);
        handles.push(tokio::spawn(async move {
            for step in 1..=20_u8 {
                store
                    .record_progress(&id, u64::from(step) * 1000, step * 4)
                    .await
                    .unwrap();
            }
            store.mark_completed(&id, 20_000).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for id in ids {
        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.status(), JobStatus::Completed);
        assert_eq!(record.progress, 100);
        assert_eq!(record.downloaded, 20_000);
    }
}

#[tokio::test]
async fn test_list_reflects_deletion() {
    let (db, _temp_dir) = setup_test_db().await;
    let store = JobStore::new(db);

    let keep = store
        .create(&new_job("https://example.com/a", "/tmp/a"))
        .await
        .unwrap();
    let drop = store
        .create(&new_job("https://example.com/b", "/tmp/b"))
        .await
        .unwrap();

    let outcome = store.delete(&drop).await.unwrap();
    assert!(outcome.record_removed);

    let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![keep]);
    assert!(!store.claimed_filepaths().await.unwrap().contains("/tmp/b"));
}
