//! Job record types, status and format definitions.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lifecycle status of a job.
///
/// Transitions only move forward: `queued → downloading → completed | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Record created, executor not started yet.
    Queued,
    /// Executor is fetching.
    Downloading,
    /// Fetch finished and the file is on local storage.
    Completed,
    /// Fetch failed; `error` holds the cause.
    Failed,
}

impl JobStatus {
    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Returns true for `completed` and `failed`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "downloading" => Ok(Self::Downloading),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("invalid job status: {s}")),
        }
    }
}

/// Nominal output kind of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobFormat {
    /// Raw bytes of the remote resource.
    File,
    /// Best-quality video with audio, muxed to mp4.
    Mp4,
    /// Audio-only extraction to mp3.
    Mp3,
}

impl JobFormat {
    /// Returns the database string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Mp4 => "mp4",
            Self::Mp3 => "mp3",
        }
    }

    /// File extension produced by the extraction path, without the dot.
    #[must_use]
    pub fn extension(self) -> Option<&'static str> {
        match self {
            Self::File => None,
            Self::Mp4 => Some("mp4"),
            Self::Mp3 => Some("mp3"),
        }
    }
}

impl fmt::Display for JobFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for JobFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(Self::File),
            "mp4" => Ok(Self::Mp4),
            "mp3" => Ok(Self::Mp3),
            _ => Err(format!("invalid job format: {s}")),
        }
    }
}

/// Format requested by the caller at submission time.
///
/// `Auto` lets the URL classifier decide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatHint {
    /// No preference.
    #[default]
    Auto,
    /// Raw file.
    File,
    /// Audio extraction.
    Mp3,
    /// Video extraction.
    Mp4,
}

impl fmt::Display for FormatHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Auto => "auto",
            Self::File => "file",
            Self::Mp3 => "mp3",
            Self::Mp4 => "mp4",
        };
        write!(f, "{label}")
    }
}

impl std::str::FromStr for FormatHint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::Auto),
            "file" => Ok(Self::File),
            "mp3" => Ok(Self::Mp3),
            "mp4" => Ok(Self::Mp4),
            other => Err(format!(
                "invalid format '{other}': expected one of auto, file, mp3, mp4"
            )),
        }
    }
}

/// Values needed to insert a fresh job row.
#[derive(Debug, Clone)]
pub struct NewJob<'a> {
    /// Source URL.
    pub url: &'a str,
    /// Advisory local filename.
    pub filename: &'a str,
    /// Full local path for the filename.
    pub filepath: &'a str,
    /// Nominal output kind.
    pub format: JobFormat,
}

/// A single persisted job row.
#[derive(Debug, Clone, FromRow)]
pub struct JobRecord {
    /// Opaque unique identifier.
    pub id: String,
    /// Source URL.
    pub url: String,
    /// Local filename.
    pub filename: String,
    /// Local file path.
    pub filepath: String,
    /// Lifecycle status (stored as text, parsed via `status()`).
    #[sqlx(rename = "status")]
    pub status_str: String,
    /// Percent complete, 0..=100.
    pub progress: i64,
    /// Declared size in bytes, 0 when unknown.
    pub size: i64,
    /// Bytes written so far.
    pub downloaded: i64,
    /// Failure cause, only set when failed.
    pub error: Option<String>,
    /// Output kind (stored as text, parsed via `format()`).
    #[sqlx(rename = "format")]
    pub format_str: String,
    /// Insert time.
    pub created_at: DateTime<Utc>,
    /// Time the job reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Returns the parsed status enum.
    ///
    /// Falls back to `Failed` if the stored string is not recognized, so a
    /// corrupted row never looks like it is still running.
    #[must_use]
    pub fn status(&self) -> JobStatus {
        self.status_str.parse().unwrap_or(JobStatus::Failed)
    }

    /// Returns the parsed format enum, defaulting to `File`.
    #[must_use]
    pub fn format(&self) -> JobFormat {
        self.format_str.parse().unwrap_or(JobFormat::File)
    }

    /// Local path as a `PathBuf`.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        PathBuf::from(&self.filepath)
    }
}

impl fmt::Display for JobRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "JobRecord {{ id: {}, url: {}, status: {}, progress: {} }}",
            self.id,
            self.url,
            self.status(),
            self.progress
        )
    }
}

/// Caller-facing projection of a [`JobRecord`] with typed fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobView {
    pub id: String,
    pub url: String,
    pub filename: String,
    pub filepath: String,
    pub status: JobStatus,
    pub progress: u8,
    pub size: u64,
    pub downloaded: u64,
    pub error: Option<String>,
    pub format: JobFormat,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<JobRecord> for JobView {
    fn from(record: JobRecord) -> Self {
        let status = record.status();
        let format = record.format();
        Self {
            progress: u8::try_from(record.progress.clamp(0, 100)).unwrap_or(0),
            size: u64::try_from(record.size).unwrap_or(0),
            downloaded: u64::try_from(record.downloaded).unwrap_or(0),
            id: record.id,
            url: record.url,
            filename: record.filename,
            filepath: record.filepath,
            status,
            error: record.error,
            format,
            created_at: record.created_at,
            completed_at: record.completed_at,
        }
    }
}
