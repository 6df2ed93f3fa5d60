//! External extraction: delegate media URLs to a `yt-dlp` compatible tool.
//!
//! The tool writes into the download directory under a name of its own
//! choosing, so on success the newest file with the target extension is
//! taken as the output. Two extraction jobs finishing close together in the
//! same directory can pick up each other's file.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, instrument, trace};

use super::error::FetchError;
use super::executor::{FetchExecutor, FetchJob, FetchOutput};
use super::progress::parse_percent;
use crate::store::{JobFormat, JobRepository};

/// Executor for media-hosting URLs.
#[derive(Debug, Clone)]
pub struct ExternalExtraction {
    program: String,
    download_dir: PathBuf,
}

impl ExternalExtraction {
    /// Creates an executor running `program` with output into `download_dir`.
    #[must_use]
    pub fn new(program: impl Into<String>, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            download_dir: download_dir.into(),
        }
    }

    /// Asks the tool for the media title without downloading.
    ///
    /// Returns `None` on any failure, including the timeout elapsing.
    #[instrument(skip(self))]
    pub async fn probe_title(&self, url: &str, timeout: Duration) -> Option<String> {
        let mut command = Command::new(&self.program);
        command
            .args(["--skip-download", "--no-playlist", "--print", "title", url])
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                debug!(error = %e, "title probe could not run");
                return None;
            }
            Err(_) => {
                debug!(timeout_secs = timeout.as_secs(), "title probe timed out");
                return None;
            }
        };

        if !output.status.success() {
            debug!(code = ?output.status.code(), "title probe failed");
            return None;
        }

        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    }
}

/// Command-line arguments for one extraction run.
pub(crate) fn extraction_args(download_dir: &Path, format: JobFormat, url: &str) -> Vec<String> {
    let template = download_dir.join("%(title)s.%(ext)s");
    let mut args = vec![
        "-o".to_string(),
        template.to_string_lossy().into_owned(),
        "--newline".to_string(),
        "--no-playlist".to_string(),
    ];
    match format {
        JobFormat::Mp3 => args.extend(
            ["-x", "--audio-format", "mp3", "--audio-quality", "0"].map(str::to_string),
        ),
        JobFormat::Mp4 | JobFormat::File => args.extend(
            [
                "-f",
                "bestvideo+bestaudio/best",
                "--merge-output-format",
                "mp4",
            ]
            .map(str::to_string),
        ),
    }
    args.push(url.to_string());
    args
}

#[async_trait]
impl FetchExecutor for ExternalExtraction {
    fn name(&self) -> &'static str {
        "extraction"
    }

    async fn fetch(
        &self,
        job: &FetchJob,
        repo: &dyn JobRepository,
    ) -> Result<FetchOutput, FetchError> {
        let spawn_error = |e| FetchError::tool_spawn(&self.program, e);

        let mut child = Command::new(&self.program)
            .args(extraction_args(&self.download_dir, job.format, &job.url))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(spawn_error)?;
        debug!(job_id = %job.id, program = %self.program, "extractor started");

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_error(std::io::Error::other("stdout was not captured")))?;
        let stderr_tail = child.stderr.take().map(|stderr| tokio::spawn(last_line(stderr)));

        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            let read = reader.read_until(b'\n', &mut buf).await.map_err(spawn_error)?;
            if read == 0 {
                break;
            }
            let line = String::from_utf8_lossy(&buf);
            trace!(job_id = %job.id, line = %line.trim_end(), "extractor output");
            if let Some(progress) = parse_percent(&line) {
                repo.set_progress(&job.id, progress).await?;
            }
        }

        let status = child.wait().await.map_err(spawn_error)?;
        let tail = match stderr_tail {
            Some(handle) => handle.await.ok().flatten(),
            None => None,
        };
        if !status.success() {
            return Err(FetchError::tool_exit(
                &self.program,
                status.code(),
                tail.as_deref(),
            ));
        }

        let output = newest_output(&self.download_dir, job.format)
            .await
            .map_err(|e| FetchError::io(&self.download_dir, e))?
            .ok_or_else(|| FetchError::output_missing(&self.download_dir))?;

        let filename = output
            .path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        repo.record_output(
            &job.id,
            &filename,
            &output.path.to_string_lossy(),
            output.size,
        )
        .await?;

        Ok(FetchOutput {
            downloaded: output.size,
            path: output.path,
        })
    }
}

/// Reads a stream to the end and returns its last non-empty line.
async fn last_line<R>(stream: R) -> Option<String>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    let mut last = None;
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim();
                if !line.is_empty() {
                    last = Some(line.to_string());
                }
            }
        }
    }
    last
}

#[derive(Debug, Clone)]
struct OutputFile {
    path: PathBuf,
    size: u64,
    modified: SystemTime,
}

/// Finds the most recently modified regular file in `dir` with the format's
/// extension, or the most recent regular file of any kind if none match.
async fn newest_output(dir: &Path, format: JobFormat) -> std::io::Result<Option<OutputFile>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut best_match: Option<OutputFile> = None;
    let mut best_any: Option<OutputFile> = None;

    while let Some(entry) = entries.next_entry().await? {
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let candidate = OutputFile {
            path: entry.path(),
            size: meta.len(),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        };

        let matches_ext = format.extension().is_some_and(|ext| {
            candidate
                .path
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case(ext))
        });
        if matches_ext && is_newer(&candidate, best_match.as_ref()) {
            best_match = Some(candidate.clone());
        }
        if is_newer(&candidate, best_any.as_ref()) {
            best_any = Some(candidate);
        }
    }

    Ok(best_match.or(best_any))
}

fn is_newer(candidate: &OutputFile, current: Option<&OutputFile>) -> bool {
    current.is_none_or(|current| candidate.modified > current.modified)
}
