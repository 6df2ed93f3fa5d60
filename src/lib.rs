//! Mediafetch Core Library
//!
//! Background fetch jobs for URLs: a generic file is streamed to disk, and a
//! link on a known media host is handed to an external extraction tool.
//! Every job is a record in a `SQLite` store, so its status and progress can
//! be read at any time, including after a restart.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`db`] - Database connection and schema management
//! - [`store`] - Job records and their typed, forward-only updates
//! - [`download`] - URL classification, filenames, and the fetch executors
//! - [`dispatcher`] - Job submission and the caller-facing job API
//! - [`config`] - Directories, timeouts, and the extraction tool

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod db;
pub mod dispatcher;
pub mod download;
pub mod store;

// Re-export commonly used types
pub use config::{ConfigError, FileConfig, ManagerConfig, default_config_path};
pub use db::{Database, DbError};
pub use dispatcher::{DispatchError, Dispatcher};
pub use download::{ErrorCategory, FetchError};
pub use store::{
    ClearOutcome, DeleteOutcome, FormatHint, JobFormat, JobRecord, JobRepository, JobStatus,
    JobStore, JobView, NewJob, StoreDbErrorKind, StoreError,
};
