//! Content generation capability.
//!
//! The orchestrator and the fetcher's transcription fallback talk to an
//! opaque [`ContentGenerator`]. Two backends exist: Gemini, which can watch a
//! YouTube video directly, and any OpenAI-compatible chat endpoint, which
//! works on text only.

mod gemini;
mod openai;

pub use gemini::GeminiGenerator;
pub use openai::OpenAIGenerator;

use crate::config::{GenerationProvider, GenerationSettings};
use crate::credential::Credential;
use crate::error::Result;
use crate::video::VideoReference;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Which feature a generation call serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    Summarize,
    Quiz,
    Ask,
    Transcribe,
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Feature::Summarize => write!(f, "summarize"),
            Feature::Quiz => write!(f, "quiz"),
            Feature::Ask => write!(f, "ask"),
            Feature::Transcribe => write!(f, "transcribe"),
        }
    }
}

/// One piece of the user prompt.
#[derive(Debug, Clone, PartialEq)]
pub enum PromptPart {
    Text(String),
    /// The video itself, for backends that can ingest it.
    Video(VideoReference),
}

/// Shape of the expected response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseFormat {
    Text,
    /// JSON constrained by a JSON schema.
    JsonSchema {
        name: String,
        schema: serde_json::Value,
    },
}

/// A single call to the generation backend.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub feature: Feature,
    pub system_instruction: String,
    pub parts: Vec<PromptPart>,
    pub response_format: ResponseFormat,
}

impl GenerationRequest {
    /// A plain-text request with a single text part.
    pub fn text(feature: Feature, system_instruction: String, prompt: String) -> Self {
        Self {
            feature,
            system_instruction,
            parts: vec![PromptPart::Text(prompt)],
            response_format: ResponseFormat::Text,
        }
    }

    /// Whether any part references the video directly.
    pub fn has_video(&self) -> bool {
        self.parts.iter().any(|p| matches!(p, PromptPart::Video(_)))
    }
}

/// Trait for text/structured-output generators.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    /// Whether [`PromptPart::Video`] is understood natively.
    fn supports_video(&self) -> bool;

    /// Run one generation call with the caller's credential.
    ///
    /// Any upstream fault is reported as
    /// [`SmartEdError::GenerationFailed`](crate::error::SmartEdError::GenerationFailed).
    async fn generate(&self, request: &GenerationRequest, credential: &Credential) -> Result<String>;
}

/// Build the generator selected in settings.
pub fn create_generator(settings: &GenerationSettings) -> Result<Arc<dyn ContentGenerator>> {
    let generator: Arc<dyn ContentGenerator> = match settings.provider {
        GenerationProvider::Gemini => Arc::new(GeminiGenerator::with_config(settings)?),
        GenerationProvider::OpenAI => Arc::new(OpenAIGenerator::with_config(settings)?),
    };
    Ok(generator)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_video() {
        let mut request = GenerationRequest::text(Feature::Ask, "sys".into(), "q".into());
        assert!(!request.has_video());
        request
            .parts
            .push(PromptPart::Video(VideoReference::parse("dQw4w9WgXcQ").unwrap()));
        assert!(request.has_video());
    }

    #[test]
    fn test_create_generator_by_provider() {
        let mut settings = GenerationSettings::default();
        settings.provider = GenerationProvider::Gemini;
        let generator = create_generator(&settings).unwrap();
        assert!(generator.supports_video());

        settings.provider = GenerationProvider::OpenAI;
        let generator = create_generator(&settings).unwrap();
        assert!(!generator.supports_video());
    }
}
