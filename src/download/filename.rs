//! Local filename derivation and collision handling.
//!
//! Names are advisory: uniqueness is checked against the destination
//! directory and against names already claimed by job records, but nothing
//! reserves the name on disk.

use std::path::{Component, Path, PathBuf};

use url::Url;

use super::constants::MAX_TITLE_STEM_BYTES;
use crate::store::JobFormat;

/// Highest numeric suffix tried before falling back to a timestamp.
const MAX_COLLISION_SUFFIX: usize = 10_000;

/// Sanitizes a filename for safe filesystem storage.
///
/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > |
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    if sanitized.is_empty() {
        return "_".to_string();
    }

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized
            .chars()
            .map(|c| if c == '.' { '_' } else { c })
            .collect()
    }
}

fn is_safe_filename_segment(name: &str) -> bool {
    !Path::new(name).components().any(|component| {
        matches!(
            component,
            Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Filename for a generic fetch: the percent-decoded last path segment of
/// the URL, or `download_<unix-seconds>` when the path has none.
pub(crate) fn filename_from_url(url: &Url) -> String {
    if let Some(mut segments) = url.path_segments()
        && let Some(last) = segments.next_back()
        && !last.is_empty()
    {
        let decoded = urlencoding::decode(last)
            .map_or_else(|_| last.to_string(), std::borrow::Cow::into_owned);
        if !decoded.trim().is_empty() {
            return sanitize_filename(&decoded);
        }
    }

    format!("download_{}", unix_seconds())
}

/// Filename for an extraction job from a display title.
///
/// Illegal characters become spaces, whitespace runs collapse, and the stem is
/// capped before the format's extension is appended. Returns `None` when
/// nothing usable is left.
pub(crate) fn filename_from_title(title: &str, format: JobFormat) -> Option<String> {
    let replaced: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => ' ',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();
    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");
    let stem = truncate_on_char_boundary(&collapsed, MAX_TITLE_STEM_BYTES)
        .trim_end()
        .trim_matches('.');
    if stem.is_empty() {
        return None;
    }

    Some(match format.extension() {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem.to_string(),
    })
}

/// Synthetic name for an extraction job whose title could not be probed.
pub(crate) fn fallback_media_filename(media_id: &str, format: JobFormat) -> String {
    let stem = format!("media_{}", sanitize_filename(media_id));
    match format.extension() {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem,
    }
}

/// Resolves a path in `dir` that neither exists nor is claimed, appending
/// `_1`, `_2`, … before the extension as needed.
pub(crate) fn resolve_unique_path<F>(dir: &Path, filename: &str, is_claimed: F) -> PathBuf
where
    F: Fn(&Path) -> bool,
{
    let filename = {
        let sanitized = sanitize_filename(filename);
        if sanitized.trim_matches('_').is_empty() {
            format!("download_{}", unix_seconds())
        } else {
            sanitized
        }
    };
    let taken = |path: &Path| path.exists() || is_claimed(path);

    let base_path = dir.join(&filename);
    if !taken(&base_path) {
        return base_path;
    }

    let (stem, ext) = match filename.rfind('.') {
        Some(pos) if pos > 0 => (&filename[..pos], &filename[pos..]),
        _ => (filename.as_str(), ""),
    };

    for i in 1..MAX_COLLISION_SUFFIX {
        let candidate = dir.join(format!("{stem}_{i}{ext}"));
        if !taken(&candidate) {
            return candidate;
        }
    }

    dir.join(format!("{stem}_{}{ext}", unix_seconds()))
}

fn truncate_on_char_boundary(value: &str, max_bytes: usize) -> &str {
    if value.len() <= max_bytes {
        return value;
    }
    let mut end = max_bytes;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

fn unix_seconds() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
