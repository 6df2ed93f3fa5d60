//! Storage failures surfaced by [`JobStore`](super::JobStore).

use std::fmt;

use sqlx::error::ErrorKind;
use thiserror::Error;

/// Primary `SQLite` result codes that mean another connection holds the lock.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Coarse cause of a storage failure, logged with job-task storage errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreDbErrorKind {
    /// The database stayed locked past the busy timeout.
    Contention,
    /// A row broke a schema constraint (`CHECK`, `NOT NULL`, primary key).
    Constraint,
    /// The pool is closed or had no free connection in time.
    Unavailable,
    /// Anything else.
    Other,
}

impl StoreDbErrorKind {
    /// Classifies a sqlx error.
    #[must_use]
    pub fn from_sqlx(error: &sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => Self::Unavailable,
            sqlx::Error::Database(db_error) => {
                // Extended result codes keep the primary code in the low byte.
                let primary = db_error
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .map(|code| code & 0xff);
                if matches!(primary, Some(SQLITE_BUSY | SQLITE_LOCKED)) {
                    Self::Contention
                } else if matches!(
                    db_error.kind(),
                    ErrorKind::CheckViolation
                        | ErrorKind::NotNullViolation
                        | ErrorKind::UniqueViolation
                ) {
                    Self::Constraint
                } else {
                    Self::Other
                }
            }
            _ => Self::Other,
        }
    }

    /// Short label used in messages and log fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Contention => "contention",
            Self::Constraint => "constraint",
            Self::Unavailable => "unavailable",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for StoreDbErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A job store operation failed at the database.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("database error ({kind}): {message}")]
    Database {
        kind: StoreDbErrorKind,
        message: String,
    },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database {
            kind: StoreDbErrorKind::from_sqlx(&err),
            message: err.to_string(),
        }
    }
}

impl StoreError {
    /// Returns the failure classification.
    #[must_use]
    pub fn kind(&self) -> StoreDbErrorKind {
        match self {
            Self::Database { kind, .. } => *kind,
        }
    }
}
