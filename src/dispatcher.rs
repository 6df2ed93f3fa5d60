//! Job submission and the caller-facing job API.
//!
//! [`Dispatcher::submit`] validates a URL, picks the fetch path, reserves an
//! advisory filename, inserts a `queued` record, and spawns the job as an
//! independent task. It never waits on the fetch itself. Everything else
//! ([`list`](Dispatcher::list), [`get`](Dispatcher::get),
//! [`remove`](Dispatcher::remove), [`resolve_file`](Dispatcher::resolve_file))
//! reads or deletes records in the store.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::ManagerConfig;
use crate::db::{Database, DbError};
use crate::download::filename::{
    fallback_media_filename, filename_from_title, filename_from_url, resolve_unique_path,
};
use crate::download::{
    ExternalExtraction, FetchExecutor, FetchJob, FetchPath, HttpClient, StreamingFetch, classify,
    media_id, run_job,
};
use crate::store::{FormatHint, JobFormat, JobStatus, JobStore, JobView, NewJob, StoreError};

/// Errors returned by synchronous dispatcher calls.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The submitted URL was rejected before any record was created.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Job store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Database could not be opened or migrated.
    #[error(transparent)]
    Database(#[from] DbError),

    /// Download directory could not be created.
    #[error("failed to create download directory {path}: {source}")]
    DownloadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Entry point for submitting and inspecting jobs.
pub struct Dispatcher {
    store: JobStore,
    download_dir: PathBuf,
    streaming: Arc<StreamingFetch>,
    extraction: Arc<ExternalExtraction>,
    title_probe_timeout: Duration,
    // Held across name resolution and insert only.
    submit_lock: Mutex<()>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("download_dir", &self.download_dir)
            .field("title_probe_timeout", &self.title_probe_timeout)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Opens the job database and prepares the download directory.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::DownloadDir`] if the download directory
    /// cannot be created, [`DispatchError::Database`] if the database cannot
    /// be opened, or [`DispatchError::HttpClient`] if the client fails to build.
    #[instrument(skip(config), fields(download_dir = %config.download_dir.display()))]
    pub async fn new(config: &ManagerConfig) -> Result<Self, DispatchError> {
        let db = Database::new(&config.database_path).await?;
        Self::with_store(JobStore::new(db), config)
    }

    /// Builds a dispatcher over an existing store.
    ///
    /// # Errors
    ///
    /// Same as [`Dispatcher::new`], minus database errors.
    pub fn with_store(store: JobStore, config: &ManagerConfig) -> Result<Self, DispatchError> {
        std::fs::create_dir_all(&config.download_dir).map_err(|source| {
            DispatchError::DownloadDir {
                path: config.download_dir.clone(),
                source,
            }
        })?;

        let client = HttpClient::with_timeouts(config.connect_timeout, config.read_timeout)
            .map_err(DispatchError::HttpClient)?;

        Ok(Self {
            store,
            download_dir: config.download_dir.clone(),
            streaming: Arc::new(StreamingFetch::new(client)),
            extraction: Arc::new(ExternalExtraction::new(
                config.extractor_program.clone(),
                config.download_dir.clone(),
            )),
            title_probe_timeout: config.title_probe_timeout,
            submit_lock: Mutex::new(()),
        })
    }

    /// Directory jobs write into.
    #[must_use]
    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Submits a URL and returns the new job id immediately.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::InvalidInput`] for an empty or non-HTTP(S)
    /// URL, or [`DispatchError::Store`] if the record cannot be created.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn submit(&self, url: &str, format_hint: FormatHint) -> Result<String, DispatchError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(DispatchError::InvalidInput("URL must not be empty".to_string()));
        }
        let parsed = Url::parse(url)
            .map_err(|e| DispatchError::InvalidInput(format!("invalid URL '{url}': {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(DispatchError::InvalidInput(format!(
                "unsupported URL scheme '{}': expected http or https",
                parsed.scheme()
            )));
        }

        let classification = classify(&parsed, format_hint);
        let preferred = match classification.path {
            FetchPath::Streaming => filename_from_url(&parsed),
            FetchPath::Extraction => self.extraction_filename(&parsed, classification.format).await,
        };

        let (id, filepath) = {
            let _guard = self.submit_lock.lock().await;
            let claimed = self.store.claimed_filepaths().await?;
            let filepath = resolve_unique_path(&self.download_dir, &preferred, |candidate| {
                claimed.contains(&*candidate.to_string_lossy())
            });
            let filename = filepath
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| preferred.clone());
            let id = self
                .store
                .create(&NewJob {
                    url,
                    filename: &filename,
                    filepath: &filepath.to_string_lossy(),
                    format: classification.format,
                })
                .await?;
            (id, filepath)
        };

        info!(
            job_id = %id,
            format = %classification.format,
            path = %filepath.display(),
            "job submitted"
        );

        let executor: Arc<dyn FetchExecutor> = match classification.path {
            FetchPath::Streaming => Arc::clone(&self.streaming) as Arc<dyn FetchExecutor>,
            FetchPath::Extraction => Arc::clone(&self.extraction) as Arc<dyn FetchExecutor>,
        };
        let repo = self.store.clone();
        let job = FetchJob {
            id: id.clone(),
            url: url.to_string(),
            filepath,
            format: classification.format,
        };
        tokio::spawn(async move {
            run_job(executor.as_ref(), &repo, &job).await;
        });

        Ok(id)
    }

    async fn extraction_filename(&self, url: &Url, format: JobFormat) -> String {
        let title = self
            .extraction
            .probe_title(url.as_str(), self.title_probe_timeout)
            .await;
        match title.as_deref().and_then(|t| filename_from_title(t, format)) {
            Some(name) => name,
            None => {
                debug!(url = %url, "no usable title, using media id");
                fallback_media_filename(&media_id(url), format)
            }
        }
    }

    /// Lists all jobs, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Store`] if the query fails.
    pub async fn list(&self) -> Result<Vec<JobView>, DispatchError> {
        let records = self.store.list().await?;
        Ok(records.into_iter().map(JobView::from).collect())
    }

    /// Gets one job.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Store`] if the query fails.
    pub async fn get(&self, id: &str) -> Result<Option<JobView>, DispatchError> {
        Ok(self.store.get(id).await?.map(JobView::from))
    }

    /// Deletes a job and its file. Unknown ids are not an error.
    ///
    /// Returns whether a record was removed.
    ///
    /// # Known limitations
    ///
    /// A running job is not stopped. Its later writes find no record and do
    /// nothing, and the file it finishes writing is deleted when its task
    /// ends, so until then the file can still appear on disk.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Store`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: &str) -> Result<bool, DispatchError> {
        let outcome = self.store.delete(id).await?;
        if let Some(e) = &outcome.file_error {
            warn!(job_id = %id, error = %e, "failed to remove job file");
        }
        if outcome.record_removed {
            info!(job_id = %id, file_removed = outcome.file_removed, "job removed");
        }
        Ok(outcome.record_removed)
    }

    /// Deletes every job and its file. Returns the number of jobs removed.
    ///
    /// Running jobs behave as with [`remove`](Self::remove).
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Store`] if the delete fails.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<usize, DispatchError> {
        let outcome = self.store.delete_all().await?;
        for (path, e) in &outcome.file_errors {
            warn!(path = %path.display(), error = %e, "failed to remove job file");
        }
        info!(
            jobs = outcome.records_removed,
            files = outcome.files_removed,
            "jobs cleared"
        );
        Ok(outcome.records_removed)
    }

    /// Local path of a completed job whose file still exists.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Store`] if the lookup fails.
    pub async fn resolve_file(&self, id: &str) -> Result<Option<PathBuf>, DispatchError> {
        let Some(record) = self.store.get(id).await? else {
            return Ok(None);
        };
        if record.status() != JobStatus::Completed {
            return Ok(None);
        }
        let path = record.path();
        let exists = tokio::fs::metadata(&path)
            .await
            .is_ok_and(|meta| meta.is_file());
        Ok(exists.then_some(path))
    }

    /// Polls until the job is terminal or gone.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Store`] if a poll fails.
    pub async fn wait_for_terminal(
        &self,
        id: &str,
        poll_interval: Duration,
    ) -> Result<Option<JobView>, DispatchError> {
        self.watch(id, poll_interval, |_| {}).await
    }

    /// Like [`wait_for_terminal`](Self::wait_for_terminal), calling
    /// `on_poll` with every observed state, the final one included.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Store`] if a poll fails.
    pub async fn watch<F>(
        &self,
        id: &str,
        poll_interval: Duration,
        mut on_poll: F,
    ) -> Result<Option<JobView>, DispatchError>
    where
        F: FnMut(&JobView),
    {
        loop {
            let Some(view) = self.get(id).await? else {
                return Ok(None);
            };
            on_poll(&view);
            if view.status.is_terminal() {
                return Ok(Some(view));
            }
            tokio::time::sleep(poll_interval).await;
        }
    }
}
