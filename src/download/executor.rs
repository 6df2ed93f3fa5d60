//! Fetch executor seam and the per-job lifecycle driver.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, error, info, instrument, warn};

use super::error::FetchError;
use crate::store::{JobFormat, JobRepository, StoreError, remove_job_file};

/// Immutable inputs of one job, handed to its executor.
#[derive(Debug, Clone)]
pub struct FetchJob {
    /// Job id in the store.
    pub id: String,
    /// Source URL.
    pub url: String,
    /// Advisory output path chosen at submission.
    pub filepath: PathBuf,
    /// Nominal output kind.
    pub format: JobFormat,
}

/// What a successful fetch left on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOutput {
    /// File the executor wrote.
    pub path: PathBuf,
    /// Bytes in that file.
    pub downloaded: u64,
}

/// One way of turning a URL into a local file.
///
/// Implementations write intermediate progress through `repo` and report the
/// file they produced; status transitions are owned by [`run_job`].
#[async_trait]
pub trait FetchExecutor: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Fetches the job's resource.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] describing why the job failed.
    async fn fetch(
        &self,
        job: &FetchJob,
        repo: &dyn JobRepository,
    ) -> Result<FetchOutput, FetchError>;
}

/// Drives one job from `queued` to a terminal status.
///
/// Fetch failures are recorded on the job. Storage failures cannot be
/// recorded anywhere else, so they are logged. If the job was removed while
/// it ran, the file it wrote is deleted instead of being left unowned.
#[instrument(skip(executor, repo, job), fields(job_id = %job.id, executor = executor.name()))]
pub async fn run_job(executor: &dyn FetchExecutor, repo: &dyn JobRepository, job: &FetchJob) {
    if let Err(e) = drive(executor, repo, job).await {
        error!(job_id = %job.id, kind = %e.kind(), error = %e, "failed to record job state");
    }
}

async fn drive(
    executor: &dyn FetchExecutor,
    repo: &dyn JobRepository,
    job: &FetchJob,
) -> Result<(), StoreError> {
    if !repo.mark_downloading(&job.id).await? {
        debug!("job no longer queued, not starting");
        return Ok(());
    }

    match executor.fetch(job, repo).await {
        Ok(output) => {
            if repo.mark_completed(&job.id, output.downloaded).await? {
                info!(downloaded = output.downloaded, "job completed");
            } else {
                discard_orphan(&output.path).await;
            }
            Ok(())
        }
        Err(FetchError::Store(store_error)) => {
            // The store may still accept the terminal write.
            if let Err(e) = repo.mark_failed(&job.id, &store_error.to_string()).await {
                warn!(error = %e, "failed to mark job failed after storage error");
            }
            Err(store_error)
        }
        Err(e) => {
            warn!(category = %e.category(), error = %e, "job failed");
            if !repo.mark_failed(&job.id, &e.to_string()).await? {
                discard_orphan(&job.filepath).await;
            }
            Ok(())
        }
    }
}

/// Removes a file written by a job whose record no longer exists.
async fn discard_orphan(path: &Path) {
    match remove_job_file(path).await {
        Ok(true) => debug!(path = %path.display(), "job removed while running, file discarded"),
        Ok(false) => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to discard file of removed job"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod testing {
    //! Recording [`JobRepository`] double shared by executor tests.

    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::store::{JobRepository, Result};

    /// One write issued by an executor.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(crate) enum Update {
        Downloading,
        Size(u64),
        Progress { downloaded: u64, progress: u8 },
        Percent(u8),
        Output { filename: String, size: u64 },
        Completed(u64),
        Failed(String),
    }

    /// Accepts every write and remembers the order.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingRepository {
        pub(crate) updates: Mutex<Vec<Update>>,
    }

    impl RecordingRepository {
        pub(crate) fn updates(&self) -> Vec<Update> {
            self.updates.lock().unwrap().clone()
        }

        fn push(&self, update: Update) -> Result<bool> {
            self.updates.lock().unwrap().push(update);
            Ok(true)
        }
    }

    #[async_trait]
    impl JobRepository for RecordingRepository {
        async fn mark_downloading(&self, _id: &str) -> Result<bool> {
            self.push(Update::Downloading)
        }

        async fn set_size(&self, _id: &str, size: u64) -> Result<bool> {
            self.push(Update::Size(size))
        }

        async fn record_progress(&self, _id: &str, downloaded: u64, progress: u8) -> Result<bool> {
            self.push(Update::Progress {
                downloaded,
                progress,
            })
        }

        async fn set_progress(&self, _id: &str, progress: u8) -> Result<bool> {
            self.push(Update::Percent(progress))
        }

        async fn record_output(
            &self,
            _id: &str,
            filename: &str,
            _filepath: &str,
            size: u64,
        ) -> Result<bool> {
            self.push(Update::Output {
                filename: filename.to_string(),
                size,
            })
        }

        async fn mark_completed(&self, _id: &str, downloaded: u64) -> Result<bool> {
            self.push(Update::Completed(downloaded))
        }

        async fn mark_failed(&self, _id: &str, error: &str) -> Result<bool> {
            self.push(Update::Failed(error.to_string()))
        }
    }
}
