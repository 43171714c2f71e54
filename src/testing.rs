//! Scripted upstream doubles shared by unit tests.

use crate::captions::{CaptionLine, CaptionSource, CaptionTrack, TrackSelector};
use crate::credential::Credential;
use crate::error::{Result, SmartEdError};
use crate::generation::{ContentGenerator, Feature, GenerationRequest};
use crate::video::VideoReference;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Caption source that serves canned tracks and counts calls.
#[derive(Default)]
pub(crate) struct ScriptedCaptions {
    available: HashMap<String, Vec<CaptionLine>>,
    listed: Option<Vec<CaptionTrack>>,
    transient_failures: AtomicU32,
    delay: Option<Duration>,
    pub list_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    attempts: Mutex<Vec<String>>,
}

impl ScriptedCaptions {
    /// No captions at all; listing fails too.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Serve `text` as a single line for `language`.
    pub fn with_language(mut self, language: &str, text: &str) -> Self {
        self.available.insert(
            language.to_string(),
            vec![CaptionLine {
                text: text.to_string(),
                start: 0.0,
                duration: 5.0,
            }],
        );
        self
    }

    /// Advertise these tracks when listed.
    pub fn with_listing(mut self, tracks: Vec<CaptionTrack>) -> Self {
        self.listed = Some(tracks);
        self
    }

    /// Fail the first `n` fetches no matter what.
    pub fn failing_first(self, n: u32) -> Self {
        self.transient_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Selectors tried so far, in order.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn total_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst) + self.fetch_calls.load(Ordering::SeqCst)
    }
}

pub(crate) fn track(language: &str, is_default: bool) -> CaptionTrack {
    CaptionTrack {
        language_code: language.to_string(),
        name: None,
        kind: None,
        is_default,
    }
}

#[async_trait]
impl CaptionSource for ScriptedCaptions {
    async fn list_tracks(&self, _reference: &VideoReference) -> Result<Vec<CaptionTrack>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.listed
            .clone()
            .ok_or_else(|| SmartEdError::Upstream("transcripts disabled".to_string()))
    }

    async fn fetch_track(
        &self,
        _reference: &VideoReference,
        selector: &TrackSelector,
    ) -> Result<Vec<CaptionLine>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.attempts.lock().unwrap().push(selector.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(SmartEdError::Upstream("429 Too Many Requests".to_string()));
        }

        let language = match selector {
            TrackSelector::Language(lang) => Some(lang.clone()),
            TrackSelector::Track(track) => Some(track.language_code.clone()),
            TrackSelector::Default => self.listed.as_ref().and_then(|tracks| {
                tracks
                    .iter()
                    .find(|t| t.is_default)
                    .or_else(|| tracks.first())
                    .map(|t| t.language_code.clone())
            }),
        };

        language
            .and_then(|lang| self.available.get(&lang).cloned())
            .ok_or_else(|| SmartEdError::Upstream(format!("no '{}' captions", selector)))
    }
}

/// Generator that returns canned responses per feature and records calls.
#[derive(Default)]
pub(crate) struct ScriptedGenerator {
    video: bool,
    responses: HashMap<Feature, std::result::Result<String, String>>,
    delay: Option<Duration>,
    calls: Mutex<Vec<(GenerationRequest, String)>>,
}

impl ScriptedGenerator {
    /// A generator that can watch videos.
    pub fn new() -> Self {
        Self {
            video: true,
            ..Self::default()
        }
    }

    pub fn text_only(mut self) -> Self {
        self.video = false;
        self
    }

    pub fn respond(mut self, feature: Feature, text: &str) -> Self {
        self.responses.insert(feature, Ok(text.to_string()));
        self
    }

    pub fn fail(mut self, feature: Feature, message: &str) -> Self {
        self.responses.insert(feature, Err(message.to_string()));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self, feature: Feature) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| r.feature == feature)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn last_request(&self, feature: Feature) -> Option<GenerationRequest> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(r, _)| r.feature == feature)
            .map(|(r, _)| r.clone())
    }

    /// Raw keys seen, in call order.
    pub fn credentials_seen(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(_, k)| k.clone()).collect()
    }
}

#[async_trait]
impl ContentGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    fn supports_video(&self) -> bool {
        self.video
    }

    async fn generate(&self, request: &GenerationRequest, credential: &Credential) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((request.clone(), credential.expose().to_string()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.responses.get(&request.feature) {
            Some(Ok(text)) => Ok(text.clone()),
            Some(Err(message)) => Err(SmartEdError::GenerationFailed(message.clone())),
            None => Err(SmartEdError::GenerationFailed(format!(
                "no scripted response for {}",
                request.feature
            ))),
        }
    }
}
