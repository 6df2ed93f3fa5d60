//! Job store: durable job records backed by `SQLite`.
//!
//! The store is the only shared mutable state in the crate. Every operation
//! is a single SQL statement, so reads and writes on different jobs never
//! wait on each other beyond `SQLite`'s own locking.
//!
//! # Overview
//!
//! - [`JobStore`] - insert, typed updates, queries, deletion and clearing
//! - [`JobRecord`] / [`JobView`] - persisted row and its caller-facing projection
//! - [`JobStatus`] / [`JobFormat`] / [`FormatHint`] - lifecycle and output kinds
//! - [`JobRepository`] - the seam the fetch executors write through
//! - [`StoreError`] - storage failures
//!
//! Updates are guarded by status predicates so that a job's status only moves
//! forward, `progress` and `downloaded` never decrease, and `completed_at` is
//! written exactly once. An update for an unknown id is a no-op.
//!
//! # Example
//!
//! ```ignore
//! use mediafetch_core::{Database, JobFormat, JobStore, NewJob};
//! use std::path::Path;
//!
//! let db = Database::new(Path::new("jobs.db")).await?;
//! let store = JobStore::new(db);
//!
//! let id = store
//!     .create(&NewJob {
//!         url: "https://example.com/report.pdf",
//!         filename: "report.pdf",
//!         filepath: "/srv/downloads/report.pdf",
//!         format: JobFormat::File,
//!     })
//!     .await?;
//! store.mark_downloading(&id).await?;
//! ```

mod error;
mod record;
mod repository;

pub use error::{StoreDbErrorKind, StoreError};
pub use record::{FormatHint, JobFormat, JobRecord, JobStatus, JobView, NewJob};
pub use repository::JobRepository;

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use rand::Rng;
use sqlx::Row;
use tracing::{debug, instrument};

use crate::db::Database;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Highest progress value persisted while a job is still running.
const MAX_IN_FLIGHT_PROGRESS: i64 = 99;

/// Error text stored when a failure carries no message.
const UNKNOWN_ERROR: &str = "unknown error";

/// Outcome of [`JobStore::delete`].
#[derive(Debug, Default)]
pub struct DeleteOutcome {
    /// Whether a record with the id existed and was removed.
    pub record_removed: bool,
    /// Whether a backing file was removed from local storage.
    pub file_removed: bool,
    /// Set when the backing file existed but could not be removed.
    pub file_error: Option<std::io::Error>,
}

/// Outcome of [`JobStore::delete_all`].
#[derive(Debug, Default)]
pub struct ClearOutcome {
    /// Number of records removed.
    pub records_removed: usize,
    /// Number of backing files removed.
    pub files_removed: usize,
    /// Files that existed but could not be removed.
    pub file_errors: Vec<(PathBuf, std::io::Error)>,
}

/// Persistent job store.
///
/// Cheap to clone; clones share the same connection pool.
#[derive(Debug, Clone)]
pub struct JobStore {
    db: Database,
}

impl JobStore {
    /// Creates a store over the given database connection.
    #[must_use]
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Inserts a fresh `queued` record and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the insert fails.
    #[instrument(skip(self, job), fields(url = %job.url, filename = %job.filename))]
    pub async fn create(&self, job: &NewJob<'_>) -> Result<String> {
        let id = generate_job_id();
        sqlx::query(
            r"INSERT INTO jobs (
                id, url, filename, filepath, status, progress, size, downloaded, format, created_at
              )
              VALUES (?, ?, ?, ?, ?, 0, 0, 0, ?, ?)",
        )
        .bind(&id)
        .bind(job.url)
        .bind(job.filename)
        .bind(job.filepath)
        .bind(JobStatus::Queued.as_str())
        .bind(job.format.as_str())
        .bind(now_timestamp())
        .execute(self.db.pool())
        .await?;

        debug!(job_id = %id, "job record created");
        Ok(id)
    }

    /// Gets a job record by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Option<JobRecord>> {
        let record = sqlx::query_as::<_, JobRecord>(r"SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(record)
    }

    /// Lists all jobs, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<JobRecord>> {
        let records = sqlx::query_as::<_, JobRecord>(
            r"SELECT * FROM jobs ORDER BY created_at DESC, rowid DESC",
        )
        .fetch_all(self.db.pool())
        .await?;

        Ok(records)
    }

    /// Returns the filepaths currently claimed by job records.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the query fails.
    #[instrument(skip(self))]
    pub async fn claimed_filepaths(&self) -> Result<HashSet<String>> {
        let rows = sqlx::query(r"SELECT filepath FROM jobs")
            .fetch_all(self.db.pool())
            .await?;

        Ok(rows
            .iter()
            .map(|row| row.get::<String, _>("filepath"))
            .collect())
    }

    /// Moves a job from `queued` to `downloading`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the update fails.
    #[instrument(skip(self))]
    pub async fn mark_downloading(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(r"UPDATE jobs SET status = ? WHERE id = ? AND status = ?")
            .bind(JobStatus::Downloading.as_str())
            .bind(id)
            .bind(JobStatus::Queued.as_str())
            .execute(self.db.pool())
            .await?;

        Ok(applied(id, "mark_downloading", result.rows_affected()))
    }

    /// Records the declared size of a running job.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the update fails.
    #[instrument(skip(self))]
    pub async fn set_size(&self, id: &str, size: u64) -> Result<bool> {
        let result = sqlx::query(r"UPDATE jobs SET size = ? WHERE id = ? AND status = ?")
            .bind(to_db_bytes(size))
            .bind(id)
            .bind(JobStatus::Downloading.as_str())
            .execute(self.db.pool())
            .await?;

        Ok(applied(id, "set_size", result.rows_affected()))
    }

    /// Records bytes written and percent complete for a running job.
    ///
    /// Neither value ever decreases, and progress stays below 100 until the
    /// job completes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the update fails.
    #[instrument(skip(self))]
    pub async fn record_progress(&self, id: &str, downloaded: u64, progress: u8) -> Result<bool> {
        let result = sqlx::query(
            r"UPDATE jobs
              SET downloaded = MAX(downloaded, ?),
                  progress = MAX(progress, MIN(?, ?))
              WHERE id = ? AND status = ?",
        )
        .bind(to_db_bytes(downloaded))
        .bind(i64::from(progress))
        .bind(MAX_IN_FLIGHT_PROGRESS)
        .bind(id)
        .bind(JobStatus::Downloading.as_str())
        .execute(self.db.pool())
        .await?;

        Ok(applied(id, "record_progress", result.rows_affected()))
    }

    /// Records percent complete for a running job without a byte count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the update fails.
    #[instrument(skip(self))]
    pub async fn set_progress(&self, id: &str, progress: u8) -> Result<bool> {
        let result = sqlx::query(
            r"UPDATE jobs
              SET progress = MAX(progress, MIN(?, ?))
              WHERE id = ? AND status = ?",
        )
        .bind(i64::from(progress))
        .bind(MAX_IN_FLIGHT_PROGRESS)
        .bind(id)
        .bind(JobStatus::Downloading.as_str())
        .execute(self.db.pool())
        .await?;

        Ok(applied(id, "set_progress", result.rows_affected()))
    }

    /// Rewrites the output name once the real file is known, and takes its
    /// on-disk size as both `size` and `downloaded`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the update fails.
    #[instrument(skip(self))]
    pub async fn record_output(
        &self,
        id: &str,
        filename: &str,
        filepath: &str,
        size: u64,
    ) -> Result<bool> {
        let size = to_db_bytes(size);
        let result = sqlx::query(
            r"UPDATE jobs
              SET filename = ?, filepath = ?, size = ?, downloaded = MAX(downloaded, ?)
              WHERE id = ? AND status = ?",
        )
        .bind(filename)
        .bind(filepath)
        .bind(size)
        .bind(size)
        .bind(id)
        .bind(JobStatus::Downloading.as_str())
        .execute(self.db.pool())
        .await?;

        Ok(applied(id, "record_output", result.rows_affected()))
    }

    /// Marks a job completed: `progress = 100` and `completed_at = now`,
    /// together with the final byte count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the update fails.
    #[instrument(skip(self))]
    pub async fn mark_completed(&self, id: &str, downloaded: u64) -> Result<bool> {
        let result = sqlx::query(
            r"UPDATE jobs
              SET status = ?, progress = 100, downloaded = MAX(downloaded, ?), completed_at = ?
              WHERE id = ? AND status IN (?, ?)",
        )
        .bind(JobStatus::Completed.as_str())
        .bind(to_db_bytes(downloaded))
        .bind(now_timestamp())
        .bind(id)
        .bind(JobStatus::Queued.as_str())
        .bind(JobStatus::Downloading.as_str())
        .execute(self.db.pool())
        .await?;

        Ok(applied(id, "mark_completed", result.rows_affected()))
    }

    /// Marks a job failed with the given cause and sets `completed_at`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the update fails.
    #[instrument(skip(self, error), fields(error = %error))]
    pub async fn mark_failed(&self, id: &str, error: &str) -> Result<bool> {
        let error = if error.trim().is_empty() {
            UNKNOWN_ERROR
        } else {
            error
        };
        let result = sqlx::query(
            r"UPDATE jobs
              SET status = ?, error = ?, completed_at = ?
              WHERE id = ? AND status IN (?, ?)",
        )
        .bind(JobStatus::Failed.as_str())
        .bind(error)
        .bind(now_timestamp())
        .bind(id)
        .bind(JobStatus::Queued.as_str())
        .bind(JobStatus::Downloading.as_str())
        .execute(self.db.pool())
        .await?;

        Ok(applied(id, "mark_failed", result.rows_affected()))
    }

    /// Removes a job record, deleting its backing file first.
    ///
    /// File removal is best effort: a failure is reported in the outcome and
    /// does not prevent the record from being deleted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the lookup or delete fails.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<DeleteOutcome> {
        let mut outcome = DeleteOutcome::default();

        if let Some(record) = self.get(id).await? {
            match remove_job_file(&record.path()).await {
                Ok(removed) => outcome.file_removed = removed,
                Err(e) => outcome.file_error = Some(e),
            }
        }

        let result = sqlx::query(r"DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?;
        outcome.record_removed = result.rows_affected() > 0;

        Ok(outcome)
    }

    /// Removes every job record, then each removed record's file.
    ///
    /// The records go in one statement, so a job submitted concurrently is
    /// either cleared with its file or kept intact.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn delete_all(&self) -> Result<ClearOutcome> {
        let rows = sqlx::query(r"DELETE FROM jobs RETURNING filepath")
            .fetch_all(self.db.pool())
            .await?;

        let mut outcome = ClearOutcome {
            records_removed: rows.len(),
            ..ClearOutcome::default()
        };
        for row in rows {
            let path = PathBuf::from(row.get::<String, _>("filepath"));
            match remove_job_file(&path).await {
                Ok(true) => outcome.files_removed += 1,
                Ok(false) => {}
                Err(e) => outcome.file_errors.push((path, e)),
            }
        }

        debug!(
            records = outcome.records_removed,
            files = outcome.files_removed,
            "job store cleared"
        );
        Ok(outcome)
    }
}

/// Deletes a job's backing file if it is a regular file.
///
/// Returns whether a file was removed. A file that is already gone is not an
/// error.
pub(crate) async fn remove_job_file(path: &Path) -> std::io::Result<bool> {
    let is_file = tokio::fs::metadata(path)
        .await
        .is_ok_and(|meta| meta.is_file());
    if !is_file {
        return Ok(false);
    }
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Generates a 16-hex-digit job id.
fn generate_job_id() -> String {
    let value: u64 = rand::thread_rng().r#gen();
    format!("{value:016x}")
}

/// Current time as a fixed-width RFC 3339 string, so text order is time order.
fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn to_db_bytes(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn applied(id: &str, operation: &str, rows_affected: u64) -> bool {
    if rows_affected == 0 {
        debug!(job_id = %id, operation, "update skipped: job absent or status does not allow it");
        false
    } else {
        true
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    async fn store() -> JobStore {
        JobStore::new(Database::new_in_memory().await.unwrap())
    }

    async fn create(store: &JobStore, filepath: &str) -> String {
        store
            .create(&NewJob {
                url: "https://example.com/report.pdf",
                filename: "report.pdf",
                filepath,
                format: JobFormat::File,
            })
            .await
            .unwrap()
    }

    #[test]
    fn test_generate_job_id_is_sixteen_hex_chars() {
        let id = generate_job_id();
        assert_eq!(id.len(), 16);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_now_timestamp_is_fixed_width() {
        let a = now_timestamp();
        let b = now_timestamp();
        assert_eq!(a.len(), b.len());
        assert!(a.ends_with('Z'));
    }

    #[tokio::test]
    async fn test_create_inserts_queued_record_with_zeroed_counters() {
        let store = store().await;
        let id = create(&store, "/tmp/report.pdf").await;

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.status(), JobStatus::Queued);
        assert_eq!(record.progress, 0);
        assert_eq!(record.size, 0);
        assert_eq!(record.downloaded, 0);
        assert!(record.error.is_none());
        assert!(record.completed_at.is_none());
        assert_eq!(record.format(), JobFormat::File);
    }

    #[tokio::test]
    async fn test_get_unknown_id_returns_none() {
        let store = store().await;
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_orders_newest_first() {
        let store = store().await;
        let first = create(&store, "/tmp/a").await;
        let second = create(&store, "/tmp/b").await;
        let third = create(&store, "/tmp/c").await;

        let ids: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![third, second, first]);
    }

    #[tokio::test]
    async fn test_updates_on_unknown_id_are_noops() {
        let store = store().await;
        assert!(!store.mark_downloading("missing").await.unwrap());
        assert!(!store.record_progress("missing", 10, 10).await.unwrap());
        assert!(!store.mark_completed("missing", 10).await.unwrap());
        assert!(!store.mark_failed("missing", "boom").await.unwrap());
    }

    #[tokio::test]
    async fn test_progress_never_decreases() {
        let store = store().await;
        let id = create(&store, "/tmp/p").await;
        store.mark_downloading(&id).await.unwrap();

        store.record_progress(&id, 500, 50).await.unwrap();
        store.record_progress(&id, 200, 20).await.unwrap();

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.progress, 50);
        assert_eq!(record.downloaded, 500);
    }

    #[tokio::test]
    async fn test_in_flight_progress_capped_below_hundred() {
        let store = store().await;
        let id = create(&store, "/tmp/p").await;
        store.mark_downloading(&id).await.unwrap();

        store.set_progress(&id, 100).await.unwrap();

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.progress, 99);
        assert_eq!(record.status(), JobStatus::Downloading);
    }

    #[tokio::test]
    async fn test_progress_ignored_before_downloading() {
        let store = store().await;
        let id = create(&store, "/tmp/p").await;

        assert!(!store.record_progress(&id, 10, 10).await.unwrap());
        assert_eq!(store.get(&id).await.unwrap().unwrap().progress, 0);
    }

    #[tokio::test]
    async fn test_mark_completed_sets_hundred_and_completed_at() {
        let store = store().await;
        let id = create(&store, "/tmp/p").await;
        store.mark_downloading(&id).await.unwrap();

        assert!(store.mark_completed(&id, 12).await.unwrap());

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.status(), JobStatus::Completed);
        assert_eq!(record.progress, 100);
        assert_eq!(record.downloaded, 12);
        assert!(record.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_terminal_status_is_final() {
        let store = store().await;
        let id = create(&store, "/tmp/p").await;
        store.mark_downloading(&id).await.unwrap();
        store.mark_failed(&id, "HTTP 500").await.unwrap();
        let failed_at = store.get(&id).await.unwrap().unwrap().completed_at;

        assert!(!store.mark_completed(&id, 1).await.unwrap());
        assert!(!store.mark_failed(&id, "again").await.unwrap());
        assert!(!store.mark_downloading(&id).await.unwrap());

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.status(), JobStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("HTTP 500"));
        assert_eq!(record.completed_at, failed_at);
    }

    #[tokio::test]
    async fn test_mark_failed_with_blank_error_stores_placeholder() {
        let store = store().await;
        let id = create(&store, "/tmp/p").await;

        store.mark_failed(&id, "  ").await.unwrap();

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.error.as_deref(), Some(UNKNOWN_ERROR));
    }

    #[tokio::test]
    async fn test_record_output_rewrites_name_and_sizes() {
        let store = store().await;
        let id = create(&store, "/tmp/media_abc.mp3").await;
        store.mark_downloading(&id).await.unwrap();

        store
            .record_output(&id, "Song.mp3", "/tmp/Song.mp3", 4096)
            .await
            .unwrap();

        let record = store.get(&id).await.unwrap().unwrap();
        assert_eq!(record.filename, "Song.mp3");
        assert_eq!(record.filepath, "/tmp/Song.mp3");
        assert_eq!(record.size, 4096);
        assert_eq!(record.downloaded, 4096);
    }

    #[tokio::test]
    async fn test_claimed_filepaths_lists_every_record() {
        let store = store().await;
        create(&store, "/tmp/a").await;
        create(&store, "/tmp/b").await;

        let claimed = store.claimed_filepaths().await.unwrap();
        assert!(claimed.contains("/tmp/a"));
        assert!(claimed.contains("/tmp/b"));
        assert_eq!(claimed.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_removes_record_and_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("report.pdf");
        std::fs::write(&file, b"pdf").unwrap();

        let store = store().await;
        let id = create(&store, file.to_str().unwrap()).await;

        let outcome = store.delete(&id).await.unwrap();
        assert!(outcome.record_removed);
        assert!(outcome.file_removed);
        assert!(outcome.file_error.is_none());
        assert!(!file.exists());
        assert!(store.get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_without_backing_file_succeeds() {
        let store = store().await;
        let id = create(&store, "/nonexistent/dir/report.pdf").await;

        let outcome = store.delete(&id).await.unwrap();
        assert!(outcome.record_removed);
        assert!(!outcome.file_removed);
        assert!(outcome.file_error.is_none());
    }

    #[tokio::test]
    async fn test_delete_unknown_id_is_not_an_error() {
        let store = store().await;
        let outcome = store.delete("missing").await.unwrap();
        assert!(!outcome.record_removed);
    }

    #[tokio::test]
    async fn test_delete_all_removes_records_and_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let first = temp_dir.path().join("a.bin");
        let second = temp_dir.path().join("b.bin");
        std::fs::write(&first, b"a").unwrap();
        std::fs::write(&second, b"b").unwrap();

        let store = store().await;
        create(&store, first.to_str().unwrap()).await;
        create(&store, second.to_str().unwrap()).await;
        create(&store, "/nonexistent/dir/c.bin").await;

        let outcome = store.delete_all().await.unwrap();
        assert_eq!(outcome.records_removed, 3);
        assert_eq!(outcome.files_removed, 2);
        assert!(outcome.file_errors.is_empty());
        assert!(!first.exists());
        assert!(!second.exists());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_all_on_empty_store() {
        let store = store().await;
        let outcome = store.delete_all().await.unwrap();
        assert_eq!(outcome.records_removed, 0);
        assert_eq!(outcome.files_removed, 0);
    }

    #[tokio::test]
    async fn test_delete_leaves_directories_alone() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = store().await;
        let id = create(&store, temp_dir.path().to_str().unwrap()).await;

        let outcome = store.delete(&id).await.unwrap();
        assert!(outcome.record_removed);
        assert!(!outcome.file_removed);
        assert!(temp_dir.path().is_dir());
    }

    #[tokio::test]
    async fn test_schema_violation_is_classified_as_constraint() {
        let store = store().await;
        let id = create(&store, "/tmp/a").await;

        let err = sqlx::query(r"UPDATE jobs SET progress = 150 WHERE id = ?")
            .bind(&id)
            .execute(store.db.pool())
            .await
            .unwrap_err();

        assert_eq!(StoreError::from(err).kind(), StoreDbErrorKind::Constraint);
    }
}
