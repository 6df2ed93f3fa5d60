//! Progress accounting for both fetch paths.

use std::sync::LazyLock;

use regex::Regex;

use super::constants::PROGRESS_PERSIST_INTERVAL;

/// Percentage marker in extractor output, e.g. `[download]  45.3% of 10MiB`.
#[allow(clippy::expect_used)]
static PERCENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d{1,3}(?:\.\d+)?)%").expect("percent regex is valid") // Static pattern, safe to panic
});

/// Whole percent of `downloaded` over `size`, floored; 0 when the size is unknown.
#[must_use]
pub fn percent(downloaded: u64, size: u64) -> u8 {
    if size == 0 {
        return 0;
    }
    let pct = u128::from(downloaded) * 100 / u128::from(size);
    u8::try_from(pct.min(100)).unwrap_or(100)
}

/// Extracts the first percentage marker from a line of tool output.
///
/// Fractions are floored and values above 100 are ignored.
#[must_use]
pub fn parse_percent(line: &str) -> Option<u8> {
    let captures = PERCENT_PATTERN.captures(line)?;
    let whole = captures.get(1)?.as_str().split('.').next()?;
    let value: u16 = whole.parse().ok()?;
    u8::try_from(value).ok().filter(|v| *v <= 100)
}

/// Byte counter for a streaming body that says when progress is due to be
/// persisted.
#[derive(Debug, Clone)]
pub(crate) struct ProgressTracker {
    size: u64,
    downloaded: u64,
    persisted_boundary: u64,
}

impl ProgressTracker {
    pub(crate) fn new(size: u64) -> Self {
        Self {
            size,
            downloaded: 0,
            persisted_boundary: 0,
        }
    }

    /// Adds written bytes. Returns true when the running total crossed a
    /// persistence boundary since the last time this returned true.
    pub(crate) fn advance(&mut self, bytes: u64) -> bool {
        self.downloaded = self.downloaded.saturating_add(bytes);
        let boundary = self.downloaded / PROGRESS_PERSIST_INTERVAL;
        if boundary > self.persisted_boundary {
            self.persisted_boundary = boundary;
            true
        } else {
            false
        }
    }

    pub(crate) fn downloaded(&self) -> u64 {
        self.downloaded
    }

    pub(crate) fn percent(&self) -> u8 {
        percent(self.downloaded, self.size)
    }
}
