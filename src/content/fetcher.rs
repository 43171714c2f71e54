//! Multi-strategy content acquisition.
//!
//! Strategies run in order and the first success wins:
//!
//! 1. Captions in each preferred language, then the upstream default track.
//! 2. Every track the upstream lists, one by one.
//! 3. The primary language again after a randomized, growing backoff.
//! 4. The generation backend transcribing the video itself.
//!
//! Each failure is recorded; if all stages fail the record carries every
//! cause. Every upstream call is bounded by a timeout.

use super::{AcquisitionStrategy, ContentRecord, ContentSource};
use crate::captions::{format_caption_lines, CaptionSource, TrackSelector};
use crate::config::{CaptionSettings, Prompts};
use crate::credential::Credential;
use crate::error::Result;
use crate::generation::{ContentGenerator, Feature, GenerationRequest, PromptPart, ResponseFormat};
use crate::video::VideoReference;
use async_trait::async_trait;
use rand::Rng;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Retry and timeout policy for acquisition.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    /// Language variants for stage 1, most preferred first.
    pub languages: Vec<String>,
    /// Stage 3 attempts.
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    /// Bound on each caption call.
    pub caption_timeout: Duration,
    /// Bound on the transcription call.
    pub transcription_timeout: Duration,
}

impl FetchPolicy {
    pub fn from_settings(captions: &CaptionSettings, generation_timeout: Duration) -> Self {
        Self {
            languages: captions.languages.clone(),
            max_retries: captions.max_retries,
            retry_base_delay: captions.retry_base_delay(),
            caption_timeout: captions.request_timeout(),
            transcription_timeout: generation_timeout,
        }
    }

    /// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)` scaled
    /// by a random factor in `[1, 2)`. Saturates at `Duration::MAX`.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as i32;
        let factor: f64 = rand::thread_rng().gen_range(1.0..2.0);
        let secs = self.retry_base_delay.as_secs_f64() * 2f64.powi(exponent) * factor;
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self::from_settings(&CaptionSettings::default(), Duration::from_secs(300))
    }
}

/// Acquires a textual representation of a video's content.
pub struct ContentFetcher {
    captions: Arc<dyn CaptionSource>,
    generator: Arc<dyn ContentGenerator>,
    prompts: Arc<Prompts>,
    policy: FetchPolicy,
}

impl ContentFetcher {
    pub fn new(
        captions: Arc<dyn CaptionSource>,
        generator: Arc<dyn ContentGenerator>,
        prompts: Arc<Prompts>,
        policy: FetchPolicy,
    ) -> Self {
        Self {
            captions,
            generator,
            prompts,
            policy,
        }
    }

    /// Run the strategy chain for one video.
    #[instrument(skip(self, credential), fields(video = %reference))]
    pub async fn fetch(&self, reference: &VideoReference, credential: &Credential) -> ContentRecord {
        let mut failures = Vec::new();

        // Stage 1: preferred languages, then whatever is default.
        let mut selectors: Vec<TrackSelector> = self
            .policy
            .languages
            .iter()
            .map(|lang| TrackSelector::Language(lang.clone()))
            .collect();
        selectors.push(TrackSelector::Default);

        for selector in &selectors {
            let strategy = AcquisitionStrategy::Captions {
                selector: selector.to_string(),
            };
            if let Some(content) = self.try_captions(reference, selector, &strategy, &mut failures).await {
                return self.succeed(reference, content, strategy);
            }
        }

        // Stage 2: everything the upstream lists.
        match bounded(self.policy.caption_timeout, self.captions.list_tracks(reference)).await {
            Ok(tracks) if tracks.is_empty() => failures.push("list tracks: none available".to_string()),
            Ok(tracks) => {
                debug!("Trying {} listed caption tracks", tracks.len());
                for track in tracks {
                    let strategy = AcquisitionStrategy::ListedTrack {
                        track: track.to_string(),
                    };
                    let selector = TrackSelector::Track(track);
                    if let Some(content) =
                        self.try_captions(reference, &selector, &strategy, &mut failures).await
                    {
                        return self.succeed(reference, content, strategy);
                    }
                }
            }
            Err(e) => failures.push(format!("list tracks: {}", e)),
        }

        // Stage 3: primary retrieval again after backoff.
        let primary = selectors[0].clone();
        for attempt in 1..=self.policy.max_retries {
            let delay = self.policy.backoff_delay(attempt);
            debug!("Retrying captions[{}] in {:?}", primary, delay);
            tokio::time::sleep(delay).await;

            let strategy = AcquisitionStrategy::Retry { attempt };
            if let Some(content) = self.try_captions(reference, &primary, &strategy, &mut failures).await {
                return self.succeed(reference, content, strategy);
            }
        }

        // Stage 4: let the generator transcribe the video.
        match self.transcribe(reference, credential).await {
            Ok(content) => return self.succeed(reference, content, AcquisitionStrategy::Transcription),
            Err(cause) => failures.push(format!("{}: {}", AcquisitionStrategy::Transcription, cause)),
        }

        warn!("All acquisition strategies failed ({} causes)", failures.len());
        ContentRecord::failed(reference.clone(), failures)
    }

    async fn try_captions(
        &self,
        reference: &VideoReference,
        selector: &TrackSelector,
        strategy: &AcquisitionStrategy,
        failures: &mut Vec<String>,
    ) -> Option<String> {
        let result = bounded(
            self.policy.caption_timeout,
            self.captions.fetch_track(reference, selector),
        )
        .await
        .map(|lines| format_caption_lines(&lines));

        match result {
            Ok(text) if !text.trim().is_empty() => Some(text),
            Ok(_) => {
                failures.push(format!("{}: empty transcript", strategy));
                None
            }
            Err(e) => {
                debug!("{} failed: {}", strategy, e);
                failures.push(format!("{}: {}", strategy, e));
                None
            }
        }
    }

    async fn transcribe(
        &self,
        reference: &VideoReference,
        credential: &Credential,
    ) -> std::result::Result<String, String> {
        if !self.generator.supports_video() {
            return Err(format!("{} backend cannot ingest video", self.generator.name()));
        }

        let mut vars = HashMap::new();
        vars.insert("video_url".to_string(), reference.watch_url());

        let request = GenerationRequest {
            feature: Feature::Transcribe,
            system_instruction: self
                .prompts
                .render_with_custom(&self.prompts.transcribe.system, &vars),
            parts: vec![
                PromptPart::Video(reference.clone()),
                PromptPart::Text(
                    self.prompts
                        .render_with_custom(&self.prompts.transcribe.user, &vars),
                ),
            ],
            response_format: ResponseFormat::Text,
        };

        info!("Captions unavailable, asking {} to transcribe", self.generator.name());
        match bounded(
            self.policy.transcription_timeout,
            self.generator.generate(&request, credential),
        )
        .await
        {
            Ok(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            Ok(_) => Err("empty transcript".to_string()),
            Err(e) => Err(e.to_string()),
        }
    }

    fn succeed(
        &self,
        reference: &VideoReference,
        content: String,
        strategy: AcquisitionStrategy,
    ) -> ContentRecord {
        info!("Acquired {} characters via {}", content.len(), strategy);
        ContentRecord::success(reference.clone(), content, strategy)
    }
}

#[async_trait]
impl ContentSource for ContentFetcher {
    async fn fetch(&self, reference: &VideoReference, credential: &Credential) -> ContentRecord {
        ContentFetcher::fetch(self, reference, credential).await
    }
}

/// Run an upstream call under a timeout; elapsing is an ordinary failure.
async fn bounded<T, F>(limit: Duration, fut: F) -> std::result::Result<T, String>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!("timed out after {:?}", limit)),
    }
}
