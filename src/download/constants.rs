//! Constants for the download module (timeouts, chunking, progress cadence).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (30 seconds between body reads).
pub const READ_TIMEOUT_SECS: u64 = 30;

/// Default timeout for the extractor title probe (10 seconds).
pub const TITLE_PROBE_TIMEOUT_SECS: u64 = 10;

/// Write granularity for the streaming body, in bytes.
pub const CHUNK_SIZE: usize = 8 * 1024;

/// Progress is persisted each time the byte count crosses a multiple of this.
pub const PROGRESS_PERSIST_INTERVAL: u64 = 100 * 1024;

/// Extraction tool invoked for media-hosting URLs.
pub const DEFAULT_EXTRACTOR_PROGRAM: &str = "yt-dlp";

/// Longest title-derived stem, in bytes, before the extension is appended.
pub const MAX_TITLE_STEM_BYTES: usize = 200;
