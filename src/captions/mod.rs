//! Caption retrieval abstraction.
//!
//! A [`CaptionSource`] exposes the caption tracks an upstream holds for a
//! video and fetches any one of them as timed lines.

mod youtube;

pub use youtube::YoutubeCaptionSource;

use crate::error::Result;
use crate::video::VideoReference;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A caption track advertised by the upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionTrack {
    /// BCP-47-ish language code, e.g. `en` or `pt-BR`.
    pub language_code: String,
    /// Track name, when the uploader gave one.
    pub name: Option<String>,
    /// Track kind; `asr` for auto-generated captions.
    pub kind: Option<String>,
    /// Whether the upstream marks this track as the default.
    pub is_default: bool,
}

impl std::fmt::Display for CaptionTrack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.language_code)?;
        if let Some(kind) = &self.kind {
            write!(f, "/{}", kind)?;
        }
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            write!(f, " \"{}\"", name)?;
        }
        Ok(())
    }
}

/// Which track to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSelector {
    /// The track for a language code.
    Language(String),
    /// Whatever the upstream serves by default.
    Default,
    /// A specific listed track.
    Track(CaptionTrack),
}

impl std::fmt::Display for TrackSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackSelector::Language(lang) => write!(f, "{}", lang),
            TrackSelector::Default => write!(f, "any"),
            TrackSelector::Track(track) => write!(f, "{}", track),
        }
    }
}

/// One timed caption line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionLine {
    pub text: String,
    /// Start time in seconds.
    pub start: f64,
    /// Duration in seconds.
    pub duration: f64,
}

/// Trait for caption providers.
#[async_trait]
pub trait CaptionSource: Send + Sync {
    /// List every caption track available for a video.
    async fn list_tracks(&self, reference: &VideoReference) -> Result<Vec<CaptionTrack>>;

    /// Fetch one track as timed lines.
    async fn fetch_track(
        &self,
        reference: &VideoReference,
        selector: &TrackSelector,
    ) -> Result<Vec<CaptionLine>>;
}

/// Render caption lines as `[MM:SS] text`, one per line.
pub fn format_caption_lines(lines: &[CaptionLine]) -> String {
    lines
        .iter()
        .filter(|l| !l.text.trim().is_empty())
        .map(|l| format!("[{}] {}", format_timestamp(l.start), l.text.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format seconds as MM:SS or HH:MM:SS.
pub fn format_timestamp(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0) as u32;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}
