//! URL classification: generic streaming fetch vs. external extraction.

use url::Url;

use crate::store::{FormatHint, JobFormat};

/// Hosts served by the external extraction tool. A URL matches when its host
/// equals an entry or is a subdomain of one.
const MEDIA_HOST_DOMAINS: &[&str] = &[
    "youtube.com",
    "youtu.be",
    "vimeo.com",
    "dailymotion.com",
    "soundcloud.com",
    "twitch.tv",
    "tiktok.com",
    "instagram.com",
    "x.com",
    "twitter.com",
    "facebook.com",
    "bilibili.com",
];

/// Which executor handles a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPath {
    /// Stream the response body straight to disk.
    Streaming,
    /// Delegate to the external extraction tool.
    Extraction,
}

/// Result of classifying a submitted URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub path: FetchPath,
    pub format: JobFormat,
}

/// Returns true when the URL's host is a known media-hosting domain.
#[must_use]
pub fn is_media_host(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    MEDIA_HOST_DOMAINS
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")))
}

/// Picks the executor and nominal output format for a URL.
///
/// Media hosts produce `mp3` when asked for it and `mp4` otherwise; every
/// other URL is a plain `file` fetch whatever the hint.
#[must_use]
pub fn classify(url: &Url, hint: FormatHint) -> Classification {
    if is_media_host(url) {
        let format = if hint == FormatHint::Mp3 {
            JobFormat::Mp3
        } else {
            JobFormat::Mp4
        };
        Classification {
            path: FetchPath::Extraction,
            format,
        }
    } else {
        Classification {
            path: FetchPath::Streaming,
            format: JobFormat::File,
        }
    }
}

/// Stable identifier for a media URL, used in fallback names.
///
/// Recognizes YouTube's `v=` parameter, `youtu.be/<id>` and `/shorts/<id>`;
/// otherwise takes the last non-empty path segment, and finally a timestamp.
#[must_use]
pub fn media_id(url: &Url) -> String {
    if let Some((_, v)) = url.query_pairs().find(|(key, _)| key == "v")
        && !v.is_empty()
    {
        return v.into_owned();
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    if let Some(pos) = segments.iter().position(|s| *s == "shorts")
        && let Some(id) = segments.get(pos + 1)
    {
        return (*id).to_string();
    }

    if let Some(last) = segments.last() {
        return (*last).to_string();
    }

    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
        .to_string()
}
