//! Integration tests for the external extraction path.
//!
//! A small shell script stands in for the extraction tool so the tests can
//! control its output, exit code, and the files it leaves behind.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;

use mediafetch_core::{Dispatcher, FormatHint, JobFormat, JobStatus, JobView, ManagerConfig};
use tempfile::TempDir;

/// Answers the title probe, reports progress, and writes an mp3.
const SUCCESS_SCRIPT: &str = r#"#!/bin/sh
for arg in "$@"; do
    if [ "$arg" = "--print" ]; then
        echo "Fake Title"
        exit 0
    fi
done
out=""
prev=""
for arg in "$@"; do
    if [ "$prev" = "-o" ]; then
        out="$arg"
    fi
    prev="$arg"
done
dir=$(dirname "$out")
echo "[download]  25.0% of 1.00MiB"
echo "[download]  50.0% of 1.00MiB"
echo "[download] 100.0% of 1.00MiB"
printf 'audio' > "$dir/Fake Title.mp3"
"#;

const FAILING_SCRIPT: &str = r#"#!/bin/sh
echo "ERROR: Unsupported URL" >&2
exit 1
"#;

const SILENT_SCRIPT: &str = r#"#!/bin/sh
for arg in "$@"; do
    if [ "$arg" = "--print" ]; then
        echo "Nothing Here"
        exit 0
    fi
done
echo "[download] 100.0% of 1.00MiB"
exit 0
"#;

fn write_script(dir: &Path, body: &str) -> String {
    let path = dir.join("fake-extractor.sh");
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}

async fn setup_dispatcher(script: Option<&str>) -> (Dispatcher, TempDir) {
    let temp_dir = TempDir::new().expect("failed to create temp dir");
    let mut config = ManagerConfig::new(
        temp_dir.path().join("downloads"),
        temp_dir.path().join("jobs.db"),
    );
    config.extractor_program = match script {
        Some(body) => write_script(temp_dir.path(), body),
        None => temp_dir.path().join("missing-tool").to_string_lossy().into_owned(),
    };
    config.title_probe_timeout = Duration::from_secs(5);

    let dispatcher = Dispatcher::new(&config)
        .await
        .expect("failed to create dispatcher");
    (dispatcher, temp_dir)
}

async fn wait(dispatcher: &Dispatcher, id: &str) -> JobView {
    tokio::time::timeout(
        Duration::from_secs(20),
        dispatcher.wait_for_terminal(id, Duration::from_millis(20)),
    )
    .await
    .expect("job did not finish in time")
    .unwrap()
    .expect("job record disappeared")
}

#[tokio::test]
async fn test_media_url_with_mp3_hint_completes() {
    let (dispatcher, _temp_dir) = setup_dispatcher(Some(SUCCESS_SCRIPT)).await;

    let id = dispatcher
        .submit("https://www.youtube.com/watch?v=abc123", FormatHint::Mp3)
        .await
        .unwrap();

    let queued = dispatcher.get(&id).await.unwrap().unwrap();
    assert_eq!(queued.filename, "Fake Title.mp3");
    assert_eq!(queued.format, JobFormat::Mp3);

    let job = wait(&dispatcher, &id).await;
    assert_eq!(job.status, JobStatus::Completed, "error: {:?}", job.error);
    assert_eq!(job.format, JobFormat::Mp3);
    assert_eq!(job.progress, 100);
    assert_eq!(job.filename, "Fake Title.mp3");
    assert!(job.filepath.ends_with(".mp3"));
    assert_eq!(job.size, 5);
    assert_eq!(job.downloaded, 5);

    let path = dispatcher.resolve_file(&id).await.unwrap().unwrap();
    assert_eq!(std::fs::read(path).unwrap(), b"audio");
}

#[tokio::test]
async fn test_media_url_without_hint_is_mp4() {
    let (dispatcher, _temp_dir) = setup_dispatcher(Some(SILENT_SCRIPT)).await;

    let id = dispatcher
        .submit("https://vimeo.com/12345", FormatHint::Auto)
        .await
        .unwrap();

    let job = dispatcher.get(&id).await.unwrap().unwrap();
    assert_eq!(job.format, JobFormat::Mp4);
    assert_eq!(job.filename, "Nothing Here.mp4");
}

#[tokio::test]
async fn test_extractor_nonzero_exit_fails_job() {
    let (dispatcher, _temp_dir) = setup_dispatcher(Some(FAILING_SCRIPT)).await;

    let id = dispatcher
        .submit("https://youtu.be/broken", FormatHint::Auto)
        .await
        .unwrap();

    // The title probe failed too, so the name comes from the media id.
    let queued = dispatcher.get(&id).await.unwrap().unwrap();
    assert_eq!(queued.filename, "media_broken.mp4");

    let job = wait(&dispatcher, &id).await;
    assert_eq!(job.status, JobStatus::Failed);
    let error = job.error.unwrap();
    assert!(error.contains("code 1"), "unexpected error: {error}");
    assert!(error.contains("Unsupported URL"), "unexpected error: {error}");
    assert!(job.completed_at.is_some());
}

#[tokio::test]
async fn test_extractor_success_without_output_fails_job() {
    let (dispatcher, _temp_dir) = setup_dispatcher(Some(SILENT_SCRIPT)).await;

    let id = dispatcher
        .submit("https://soundcloud.com/artist/track", FormatHint::Mp3)
        .await
        .unwrap();
    let job = wait(&dispatcher, &id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(
        job.error
            .as_deref()
            .unwrap()
            .starts_with("file not found after completion")
    );
    assert!(job.progress < 100);
}

#[tokio::test]
async fn test_missing_extractor_fails_job() {
    let (dispatcher, _temp_dir) = setup_dispatcher(None).await;

    let id = dispatcher
        .submit("https://www.tiktok.com/@user/video/42", FormatHint::Auto)
        .await
        .unwrap();
    let job = wait(&dispatcher, &id).await;

    assert_eq!(job.status, JobStatus::Failed);
    assert!(job.error.unwrap().contains("missing-tool"));
    assert!(dispatcher.resolve_file(&id).await.unwrap().is_none());
}
