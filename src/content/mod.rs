//! Video content acquisition and caching.
//!
//! - [`ContentFetcher`] runs the ordered acquisition strategies.
//! - [`ContentCache`] keeps one record per video with single-flight population.

mod cache;
mod fetcher;

pub use cache::ContentCache;
pub use fetcher::{ContentFetcher, FetchPolicy};

use crate::credential::Credential;
use crate::error::{Result, SmartEdError};
use crate::video::VideoReference;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// How content was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AcquisitionStrategy {
    /// Captions in a preferred language (or the upstream default).
    Captions { selector: String },
    /// A track found by listing everything the upstream has.
    ListedTrack { track: String },
    /// The primary language after a backoff delay.
    Retry { attempt: u32 },
    /// The generation backend transcribed the video itself.
    Transcription,
}

impl std::fmt::Display for AcquisitionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcquisitionStrategy::Captions { selector } => write!(f, "captions[{}]", selector),
            AcquisitionStrategy::ListedTrack { track } => write!(f, "listed track {}", track),
            AcquisitionStrategy::Retry { attempt } => write!(f, "retry #{}", attempt),
            AcquisitionStrategy::Transcription => write!(f, "transcription"),
        }
    }
}

/// Outcome of an acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AcquisitionStatus {
    Success,
    /// Every strategy failed; one cause per failed attempt.
    Failed { causes: Vec<String> },
}

/// The cached artifact for one video.
#[derive(Debug, Clone, Serialize)]
pub struct ContentRecord {
    pub reference: VideoReference,
    /// Timestamped transcript text. Empty when failed.
    pub content: String,
    pub status: AcquisitionStatus,
    pub acquired_at: DateTime<Utc>,
    /// Strategy that succeeded; None when failed.
    pub strategy: Option<AcquisitionStrategy>,
}

impl ContentRecord {
    pub fn success(
        reference: VideoReference,
        content: String,
        strategy: AcquisitionStrategy,
    ) -> Self {
        Self {
            reference,
            content,
            status: AcquisitionStatus::Success,
            acquired_at: Utc::now(),
            strategy: Some(strategy),
        }
    }

    pub fn failed(reference: VideoReference, causes: Vec<String>) -> Self {
        Self {
            reference,
            content: String::new(),
            status: AcquisitionStatus::Failed { causes },
            acquired_at: Utc::now(),
            strategy: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, AcquisitionStatus::Success)
    }

    /// The content, or [`SmartEdError::AcquisitionFailed`] for a failed record.
    pub fn content(&self) -> Result<&str> {
        match &self.status {
            AcquisitionStatus::Success => Ok(&self.content),
            AcquisitionStatus::Failed { causes } => Err(SmartEdError::AcquisitionFailed {
                reference: self.reference.to_string(),
                causes: causes.clone(),
            }),
        }
    }
}

/// Anything that can acquire content for a video.
///
/// The cache is generic over this so it never depends on how content is
/// obtained.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Acquire content. Never errors; failures come back as a failed record.
    async fn fetch(&self, reference: &VideoReference, credential: &Credential) -> ContentRecord;
}
