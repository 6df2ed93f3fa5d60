//! Streaming fetch: write an HTTP response body straight to disk.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use super::client::HttpClient;
use super::constants::CHUNK_SIZE;
use super::error::FetchError;
use super::executor::{FetchExecutor, FetchJob, FetchOutput};
use super::progress::ProgressTracker;
use crate::store::JobRepository;

/// Executor for generic URLs.
///
/// `Content-Length` becomes the job's `size` (0 when absent), and progress is
/// persisted every time the running byte count crosses a 100 KiB boundary.
/// A partial file is left in place when the transfer fails.
#[derive(Debug, Clone)]
pub struct StreamingFetch {
    client: HttpClient,
}

impl StreamingFetch {
    /// Creates an executor sharing the given client.
    #[must_use]
    pub fn new(client: HttpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl FetchExecutor for StreamingFetch {
    fn name(&self) -> &'static str {
        "streaming"
    }

    async fn fetch(
        &self,
        job: &FetchJob,
        repo: &dyn JobRepository,
    ) -> Result<FetchOutput, FetchError> {
        let response = self.client.get(&job.url).await?;

        let size = response.content_length().unwrap_or(0);
        if size > 0 {
            repo.set_size(&job.id, size).await?;
        }
        debug!(job_id = %job.id, size, path = %job.filepath.display(), "streaming body");

        let file = File::create(&job.filepath)
            .await
            .map_err(|e| FetchError::io(&job.filepath, e))?;
        let mut writer = BufWriter::new(file);
        let mut tracker = ProgressTracker::new(size);
        let mut stream = response.bytes_stream();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result.map_err(|e| FetchError::network(&job.url, e))?;

            for slice in chunk.chunks(CHUNK_SIZE) {
                writer
                    .write_all(slice)
                    .await
                    .map_err(|e| FetchError::io(&job.filepath, e))?;

                if tracker.advance(slice.len() as u64) {
                    repo.record_progress(&job.id, tracker.downloaded(), tracker.percent())
                        .await?;
                }
            }
        }

        writer
            .flush()
            .await
            .map_err(|e| FetchError::io(&job.filepath, e))?;

        Ok(FetchOutput {
            path: job.filepath.clone(),
            downloaded: tracker.downloaded(),
        })
    }
}
