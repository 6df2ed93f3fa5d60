//! Error types for the fetch executors.
//!
//! A [`FetchError`] never escapes a running job: the executor turns it into
//! the record's `error` text. Variants carry the URL, path, or program they
//! concern so that text is useful on its own.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::store::StoreError;

/// Coarse grouping of fetch failures, used as a log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Network, timeout, HTTP status, or malformed URL.
    Transport,
    /// External extraction tool could not run or exited non-zero.
    Tool,
    /// The fetch reported success but produced no output.
    Postcondition,
    /// Local file could not be created or written.
    LocalIo,
    /// Job store failure.
    Storage,
}

impl ErrorCategory {
    /// Returns the log label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Tool => "tool",
            Self::Postcondition => "postcondition",
            Self::LocalIo => "local_io",
            Self::Storage => "storage",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can occur while a job is being fetched.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Connect or read timed out.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Non-success HTTP response.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// File system error while writing the output.
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The extraction tool could not be started or its output could not be read.
    #[error("failed to run {program}: {source}")]
    ToolSpawn {
        /// Program name or path.
        program: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The extraction tool exited unsuccessfully.
    #[error("{program} {detail}")]
    ToolExit {
        /// Program name or path.
        program: String,
        /// Exit code, absent when the process was killed by a signal.
        code: Option<i32>,
        /// Exit description, with the last stderr line when there was one.
        detail: String,
    },

    /// The tool exited successfully but no output file was found.
    #[error("file not found after completion in {dir}")]
    OutputMissing {
        /// Directory that was scanned.
        dir: PathBuf,
    },

    /// Writing job state failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl FetchError {
    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            return Self::timeout(url);
        }
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a tool spawn error.
    pub fn tool_spawn(program: impl Into<String>, source: std::io::Error) -> Self {
        Self::ToolSpawn {
            program: program.into(),
            source,
        }
    }

    /// Creates a tool exit error from the exit code and the last stderr line.
    pub fn tool_exit(
        program: impl Into<String>,
        code: Option<i32>,
        stderr_tail: Option<&str>,
    ) -> Self {
        let mut detail = match code {
            Some(code) => format!("exited with code {code}"),
            None => "terminated by signal".to_string(),
        };
        if let Some(tail) = stderr_tail.map(str::trim).filter(|tail| !tail.is_empty()) {
            detail.push_str(": ");
            detail.push_str(tail);
        }
        Self::ToolExit {
            program: program.into(),
            code,
            detail,
        }
    }

    /// Creates an output-missing error.
    pub fn output_missing(dir: impl Into<PathBuf>) -> Self {
        Self::OutputMissing { dir: dir.into() }
    }

    /// Returns the failure category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Network { .. } | Self::Timeout { .. } | Self::HttpStatus { .. } => {
                ErrorCategory::Transport
            }
            Self::ToolSpawn { .. } | Self::ToolExit { .. } => ErrorCategory::Tool,
            Self::OutputMissing { .. } => ErrorCategory::Postcondition,
            Self::Io { .. } => ErrorCategory::LocalIo,
            Self::Store(_) => ErrorCategory::Storage,
        }
    }
}
