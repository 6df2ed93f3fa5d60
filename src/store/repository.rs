//! Repository seam for job record updates.
//!
//! Fetch executors write progress and terminal state through this trait
//! rather than through [`JobStore`] directly, so tests can observe the exact
//! sequence of updates an executor issues.

use async_trait::async_trait;

use super::{JobStore, Result};

/// Data-access contract used by fetch executors.
///
/// Every update returns `true` when it was applied and `false` when the job
/// was absent or its status did not allow the change.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Moves a job from `queued` to `downloading`.
    async fn mark_downloading(&self, id: &str) -> Result<bool>;

    /// Records the declared size of a running job.
    async fn set_size(&self, id: &str, size: u64) -> Result<bool>;

    /// Records bytes written and percent complete.
    async fn record_progress(&self, id: &str, downloaded: u64, progress: u8) -> Result<bool>;

    /// Records percent complete when no byte count is available.
    async fn set_progress(&self, id: &str, progress: u8) -> Result<bool>;

    /// Rewrites the output name and size once the real file is known.
    async fn record_output(
        &self,
        id: &str,
        filename: &str,
        filepath: &str,
        size: u64,
    ) -> Result<bool>;

    /// Marks a job completed.
    async fn mark_completed(&self, id: &str, downloaded: u64) -> Result<bool>;

    /// Marks a job failed with a cause.
    async fn mark_failed(&self, id: &str, error: &str) -> Result<bool>;
}

#[async_trait]
impl JobRepository for JobStore {
    async fn mark_downloading(&self, id: &str) -> Result<bool> {
        JobStore::mark_downloading(self, id).await
    }

    async fn set_size(&self, id: &str, size: u64) -> Result<bool> {
        JobStore::set_size(self, id, size).await
    }

    async fn record_progress(&self, id: &str, downloaded: u64, progress: u8) -> Result<bool> {
        JobStore::record_progress(self, id, downloaded, progress).await
    }

    async fn set_progress(&self, id: &str, progress: u8) -> Result<bool> {
        JobStore::set_progress(self, id, progress).await
    }

    async fn record_output(
        &self,
        id: &str,
        filename: &str,
        filepath: &str,
        size: u64,
    ) -> Result<bool> {
        JobStore::record_output(self, id, filename, filepath, size).await
    }

    async fn mark_completed(&self, id: &str, downloaded: u64) -> Result<bool> {
        JobStore::mark_completed(self, id, downloaded).await
    }

    async fn mark_failed(&self, id: &str, error: &str) -> Result<bool> {
        JobStore::mark_failed(self, id, error).await
    }
}
