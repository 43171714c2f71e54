//! Content orchestrator for SmartEd.
//!
//! Every feature follows the same path: resolve the caller's credential,
//! normalize the video reference, get the content through the cache, then
//! make exactly one generation call.

use crate::captions::{CaptionSource, YoutubeCaptionSource};
use crate::config::{FeatureDefaults, Prompts, Settings};
use crate::content::{ContentCache, ContentFetcher, ContentRecord, FetchPolicy};
use crate::credential::{self, Credential};
use crate::error::{Result, SmartEdError};
use crate::generation::{create_generator, ContentGenerator, Feature, GenerationRequest, ResponseFormat};
use crate::quiz::Quiz;
use crate::video::VideoReference;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// One earlier exchange in an `ask` conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub question: String,
    pub answer: String,
}

/// Summary and quiz produced together.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub summary: String,
    pub quiz: Quiz,
}

/// Facade over the cache, the fetcher and the generator.
pub struct ContentOrchestrator {
    cache: Arc<ContentCache>,
    fetcher: Arc<ContentFetcher>,
    generator: Arc<dyn ContentGenerator>,
    prompts: Arc<Prompts>,
    defaults: FeatureDefaults,
}

impl ContentOrchestrator {
    /// Build the production stack from settings.
    pub fn new(settings: &Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let captions: Arc<dyn CaptionSource> = Arc::new(YoutubeCaptionSource::with_config(
            settings.captions.request_timeout(),
            settings.captions.proxy_url.as_deref(),
        )?);
        let generator = create_generator(&settings.generation)?;
        info!(
            "Using {} generation ({})",
            generator.name(),
            settings.generation.model
        );

        let policy = FetchPolicy::from_settings(
            &settings.captions,
            Duration::from_secs(settings.generation.timeout_secs),
        );

        Ok(Self::with_components(
            captions,
            generator,
            prompts,
            policy,
            ContentCache::from_settings(&settings.cache),
            settings.defaults.clone(),
        ))
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        captions: Arc<dyn CaptionSource>,
        generator: Arc<dyn ContentGenerator>,
        prompts: Prompts,
        policy: FetchPolicy,
        cache: ContentCache,
        defaults: FeatureDefaults,
    ) -> Self {
        let prompts = Arc::new(prompts);
        let fetcher = Arc::new(ContentFetcher::new(
            captions,
            generator.clone(),
            prompts.clone(),
            policy,
        ));
        Self {
            cache: Arc::new(cache),
            fetcher,
            generator,
            prompts,
            defaults,
        }
    }

    pub fn defaults(&self) -> &FeatureDefaults {
        &self.defaults
    }

    /// Markdown summary of roughly `max_length` words.
    #[instrument(skip(self))]
    pub async fn summarize(&self, url: &str, max_length: u32) -> Result<String> {
        let (credential, record) = self.content_for(url).await?;
        let content = record.content()?;

        let mut vars = HashMap::new();
        vars.insert("content".to_string(), content.to_string());
        vars.insert("max_length".to_string(), max_length.to_string());

        let request = GenerationRequest::text(
            Feature::Summarize,
            self.prompts.render_with_custom(&self.prompts.summary.system, &vars),
            self.prompts.render_with_custom(&self.prompts.summary.user, &vars),
        );
        self.generator.generate(&request, &credential).await
    }

    /// Exactly `question_count` validated multiple-choice questions.
    #[instrument(skip(self))]
    pub async fn quiz(&self, url: &str, question_count: u32) -> Result<Quiz> {
        if question_count == 0 {
            return Err(SmartEdError::InvalidRequest(
                "quiz needs at least one question".to_string(),
            ));
        }

        let (credential, record) = self.content_for(url).await?;
        let content = record.content()?;

        let mut vars = HashMap::new();
        vars.insert("content".to_string(), content.to_string());
        vars.insert("question_count".to_string(), question_count.to_string());

        let mut request = GenerationRequest::text(
            Feature::Quiz,
            self.prompts.render_with_custom(&self.prompts.quiz.system, &vars),
            self.prompts.render_with_custom(&self.prompts.quiz.user, &vars),
        );
        request.response_format = ResponseFormat::JsonSchema {
            name: "quiz".to_string(),
            schema: Quiz::response_schema(),
        };

        let response = self.generator.generate(&request, &credential).await?;
        let quiz = Quiz::parse(&response, question_count as usize);
        if let Err(e) = &quiz {
            warn!("Rejected quiz output: {}", e);
        }
        quiz
    }

    /// Answer `question`, using the video content when it is relevant.
    #[instrument(skip(self, prior_turns), fields(turns = prior_turns.len()))]
    pub async fn ask(
        &self,
        url: &str,
        question: &str,
        prior_turns: &[ConversationTurn],
    ) -> Result<String> {
        if question.trim().is_empty() {
            return Err(SmartEdError::InvalidRequest("question is empty".to_string()));
        }

        let (credential, record) = self.content_for(url).await?;
        let content = record.content()?;

        let mut vars = HashMap::new();
        vars.insert("content".to_string(), content.to_string());
        vars.insert("history".to_string(), format_history(prior_turns));
        vars.insert("question".to_string(), question.to_string());

        let request = GenerationRequest::text(
            Feature::Ask,
            self.prompts.render_with_custom(&self.prompts.ask.system, &vars),
            self.prompts.render_with_custom(&self.prompts.ask.user, &vars),
        );
        self.generator.generate(&request, &credential).await
    }

    /// Populate the cache. Returns whether usable content is now cached.
    #[instrument(skip(self))]
    pub async fn preload(&self, url: &str) -> Result<bool> {
        let (_, record) = self.content_for(url).await?;
        Ok(record.is_success())
    }

    /// The cached record itself; a failed record is returned as an error.
    #[instrument(skip(self))]
    pub async fn transcript(&self, url: &str) -> Result<Arc<ContentRecord>> {
        let (_, record) = self.content_for(url).await?;
        record.content()?;
        Ok(record)
    }

    /// Preload, then summary and quiz with the configured defaults.
    #[instrument(skip(self))]
    pub async fn complete_analysis(&self, url: &str) -> Result<Analysis> {
        let (_, record) = self.content_for(url).await?;
        record.content()?;

        let summary = self.summarize(url, self.defaults.summary_max_length).await?;
        let quiz = self.quiz(url, self.defaults.quiz_questions).await?;
        Ok(Analysis { summary, quiz })
    }

    /// Video ids with live cache entries, sorted.
    pub fn cached_references(&self) -> Vec<VideoReference> {
        self.cache.list_cached_references()
    }

    /// Drop the cached record for `url`. Returns whether one existed.
    pub async fn invalidate(&self, url: &str) -> Result<bool> {
        let reference = VideoReference::parse(url)?;
        Ok(self.cache.invalidate(&reference).await)
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Credential first, then the reference, then the cache.
    async fn content_for(&self, url: &str) -> Result<(Credential, Arc<ContentRecord>)> {
        let credential = credential::require()?;
        let reference = VideoReference::parse(url)?;
        let record = self
            .cache
            .get_or_fetch(&reference, &credential, self.fetcher.as_ref())
            .await;
        Ok((credential, record))
    }
}

/// Numbered Q/A pairs for the prompt.
fn format_history(turns: &[ConversationTurn]) -> String {
    if turns.is_empty() {
        return "(none)".to_string();
    }
    turns
        .iter()
        .enumerate()
        .map(|(i, turn)| format!("Q{n}: {}\nA{n}: {}", turn.question, turn.answer, n = i + 1))
        .collect::<Vec<_>>()
        .join("\n\n")
}
