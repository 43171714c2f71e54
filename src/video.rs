//! Video reference parsing and normalization.
//!
//! Every URL form that names a YouTube video collapses to the same
//! [`VideoReference`], so the content cache never holds two entries for one
//! video.

use crate::error::{Result, SmartEdError};
use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;
use url::Url;

const YOUTUBE_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
    "youtube-nocookie.com",
    "www.youtube-nocookie.com",
];

/// Path prefixes that carry the video id as the next segment.
const ID_PATH_PREFIXES: &[&str] = &["embed", "v", "shorts", "live", "e"];

fn video_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("valid video id regex"))
}

/// Canonical identifier of a YouTube video.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct VideoReference(String);

impl VideoReference {
    /// Parse a user-supplied URL or bare video id.
    ///
    /// Never touches the network. Anything that does not resolve to an
    /// 11-character id is rejected with [`SmartEdError::InvalidReference`].
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(SmartEdError::InvalidReference("empty input".to_string()));
        }

        if video_id_regex().is_match(input) {
            return Ok(Self(input.to_string()));
        }

        let url = parse_url(input)
            .ok_or_else(|| SmartEdError::InvalidReference(format!("not a URL: {}", input)))?;

        extract_from_url(&url)
            .map(Self)
            .ok_or_else(|| {
                SmartEdError::InvalidReference(format!("no YouTube video id in: {}", input))
            })
    }

    /// The bare video id.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch URL for this video.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for VideoReference {
    type Err = SmartEdError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn parse_url(input: &str) -> Option<Url> {
    if input.contains("://") {
        Url::parse(input).ok()
    } else {
        Url::parse(&format!("https://{}", input)).ok()
    }
}

fn extract_from_url(url: &Url) -> Option<String> {
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    let host = url.host_str()?.to_ascii_lowercase();
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());

    let candidate = if host == "youtu.be" {
        segments.next().map(str::to_string)
    } else if YOUTUBE_HOSTS.contains(&host.as_str()) {
        match segments.next() {
            Some("watch") | None => url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
            Some(prefix) if ID_PATH_PREFIXES.contains(&prefix) => {
                segments.next().map(str::to_string)
            }
            Some(_) => None,
        }
    } else {
        None
    };

    candidate.filter(|id| video_id_regex().is_match(id))
}
