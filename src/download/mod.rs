//! Fetch executors and the helpers they share.
//!
//! A job is fetched by exactly one executor, chosen once at submission by
//! [`classify`]:
//!
//! - [`StreamingFetch`] streams an HTTP body straight to disk
//! - [`ExternalExtraction`] delegates media-hosting URLs to an external tool
//!
//! Both run under [`run_job`], which owns the status transitions and turns
//! every [`FetchError`] into the job's `error` text.
//!
//! # Example
//!
//! ```no_run
//! use mediafetch_core::download::{FetchJob, HttpClient, StreamingFetch, run_job};
//! use mediafetch_core::{JobFormat, JobStore};
//!
//! # async fn example(store: JobStore, id: String) -> Result<(), Box<dyn std::error::Error>> {
//! let executor = StreamingFetch::new(HttpClient::new()?);
//! let job = FetchJob {
//!     id,
//!     url: "https://example.com/paper.pdf".to_string(),
//!     filepath: "./downloads/paper.pdf".into(),
//!     format: JobFormat::File,
//! };
//! run_job(&executor, &store, &job).await;
//! # Ok(())
//! # }
//! ```

mod classify;
mod client;
pub mod constants;
mod error;
mod executor;
mod extract;
pub(crate) mod filename;
mod progress;
mod stream;

pub use classify::{Classification, FetchPath, classify, is_media_host, media_id};
pub use client::HttpClient;
pub use error::{ErrorCategory, FetchError};
pub use executor::{FetchExecutor, FetchJob, run_job};
pub use extract::ExternalExtraction;
pub use progress::{parse_percent, percent};
pub use stream::StreamingFetch;
