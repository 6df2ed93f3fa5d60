//! `SQLite` pool for the job store.
//!
//! Every pooled connection is opened with the same options: WAL journal so
//! list/get readers run alongside job writers, a busy timeout so concurrent
//! job tasks wait instead of failing, and `synchronous = NORMAL`. The `jobs`
//! schema is applied from the embedded migrations on open.
//!
//! ```no_run
//! use mediafetch_core::{Database, JobStore};
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = JobStore::new(Database::new(Path::new("jobs.db")).await?);
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use thiserror::Error;
use tracing::{debug, instrument};

/// Pool size for a file database. Job tasks mostly wait on the network, so a
/// handful of connections covers many concurrent jobs.
const MAX_CONNECTIONS: u32 = 5;

/// How long a connection waits on a locked database before `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors opening the job database.
#[derive(Error, Debug)]
pub enum DbError {
    /// Could not open or configure a connection.
    #[error("failed to open job database: {0}")]
    Connection(#[from] sqlx::Error),

    /// The `jobs` schema could not be applied.
    #[error("failed to apply job schema: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// The directory holding the database file could not be created.
    #[error("failed to create database directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Shared handle to the job database. Clones share one pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the job database at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Directory`] if the parent directory cannot be
    /// created, [`DbError::Connection`] if the file cannot be opened, or
    /// [`DbError::Migration`] if the schema cannot be applied.
    #[instrument(skip(db_path), fields(path = %db_path.display()))]
    pub async fn new(db_path: &Path) -> Result<Self, DbError> {
        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| DbError::Directory {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await?;

        Self::migrated(pool).await
    }

    /// Opens a private in-memory database, used by unit tests.
    ///
    /// The pool holds exactly one connection that is never recycled, since
    /// the data lives only as long as that connection.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Connection`] or [`DbError::Migration`].
    #[instrument]
    pub async fn new_in_memory() -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::migrated(pool).await
    }

    async fn migrated(pool: SqlitePool) -> Result<Self, DbError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        debug!("job schema up to date");
        Ok(Self { pool })
    }

    /// Returns the underlying pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Closes every pooled connection.
    #[instrument(skip(self))]
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const INSERT_JOB: &str = "INSERT INTO jobs (id, url, filename, filepath, status, progress, created_at)
         VALUES ('abc', 'https://example.com/a.bin', 'a.bin', '/tmp/a.bin', ?, ?, '2026-01-01T00:00:00Z')";

    #[tokio::test]
    async fn test_in_memory_database_accepts_job_rows() {
        let db = Database::new_in_memory().await.unwrap();

        let result = sqlx::query(INSERT_JOB)
            .bind("queued")
            .bind(0)
            .execute(db.pool())
            .await;

        assert!(result.is_ok(), "jobs table should exist after migration");
    }

    #[tokio::test]
    async fn test_schema_rejects_unknown_status() {
        let db = Database::new_in_memory().await.unwrap();

        let result = sqlx::query(INSERT_JOB)
            .bind("paused")
            .bind(0)
            .execute(db.pool())
            .await;

        assert!(result.is_err(), "CHECK constraint should reject 'paused'");
    }

    #[tokio::test]
    async fn test_schema_rejects_progress_over_hundred() {
        let db = Database::new_in_memory().await.unwrap();

        let result = sqlx::query(INSERT_JOB)
            .bind("downloading")
            .bind(101)
            .execute(db.pool())
            .await;

        assert!(result.is_err(), "progress must stay within 0..=100");
    }

    #[tokio::test]
    async fn test_file_database_creates_nested_parent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("state").join("nested").join("jobs.db");

        let db = Database::new(&db_path).await.unwrap();

        assert!(db_path.exists());
        db.close().await;
    }

    #[tokio::test]
    async fn test_every_pooled_connection_gets_wal_and_busy_timeout() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db = Database::new(&temp_dir.path().join("jobs.db")).await.unwrap();

        // Hold two connections at once so the pool has to open a second one.
        let mut first = db.pool().acquire().await.unwrap();
        let mut second = db.pool().acquire().await.unwrap();

        for conn in [&mut *first, &mut *second] {
            let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode")
                .fetch_one(&mut *conn)
                .await
                .unwrap();
            let (timeout_ms,): (i64,) = sqlx::query_as("PRAGMA busy_timeout")
                .fetch_one(&mut *conn)
                .await
                .unwrap();
            assert!(mode.eq_ignore_ascii_case("wal"));
            assert_eq!(timeout_ms, 5000);
        }
    }

    #[tokio::test]
    async fn test_in_memory_data_survives_between_queries() {
        let db = Database::new_in_memory().await.unwrap();
        sqlx::query(INSERT_JOB)
            .bind("queued")
            .bind(0)
            .execute(db.pool())
            .await
            .unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count.0, 1);
    }
}
