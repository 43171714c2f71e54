//! Gemini `generateContent` backend.
//!
//! Gemini accepts a YouTube URL as a `fileData` part, which is what makes the
//! transcription fallback possible.

use super::{ContentGenerator, GenerationRequest, PromptPart, ResponseFormat};
use crate::config::GenerationSettings;
use crate::credential::Credential;
use crate::error::{Result, SmartEdError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Generator backed by the Gemini REST API.
pub struct GeminiGenerator {
    http: reqwest::Client,
    model: String,
    api_base: String,
    temperature: f32,
}

impl GeminiGenerator {
    /// Create a generator from settings.
    pub fn with_config(settings: &GenerationSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        let api_base = settings
            .api_base
            .clone()
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Ok(Self {
            http,
            model: settings.model.clone(),
            api_base: api_base.trim_end_matches('/').to_string(),
            temperature: settings.temperature,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }

    fn build_body(&self, request: &GenerationRequest) -> GenerateContentBody {
        let parts = request
            .parts
            .iter()
            .map(|part| match part {
                PromptPart::Text(text) => Part {
                    text: Some(text.clone()),
                    file_data: None,
                },
                PromptPart::Video(reference) => Part {
                    text: None,
                    file_data: Some(FileData {
                        file_uri: reference.watch_url(),
                    }),
                },
            })
            .collect();

        let (response_mime_type, response_json_schema) = match &request.response_format {
            ResponseFormat::Text => (None, None),
            ResponseFormat::JsonSchema { schema, .. } => {
                (Some("application/json".to_string()), Some(schema.clone()))
            }
        };

        GenerateContentBody {
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: Some(request.system_instruction.clone()),
                    file_data: None,
                }],
            },
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                response_mime_type,
                response_json_schema,
            },
        }
    }
}

#[async_trait]
impl ContentGenerator for GeminiGenerator {
    fn name(&self) -> &str {
        "gemini"
    }

    fn supports_video(&self) -> bool {
        true
    }

    #[instrument(skip(self, request, credential), fields(feature = %request.feature, model = %self.model))]
    async fn generate(&self, request: &GenerationRequest, credential: &Credential) -> Result<String> {
        let body = self.build_body(request);

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", credential.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| SmartEdError::GenerationFailed(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SmartEdError::GenerationFailed(format!("Gemini response unreadable: {}", e)))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(SmartEdError::GenerationFailed(format!(
                "Gemini API error ({}): {}",
                status, message
            )));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text).map_err(|e| {
            SmartEdError::GenerationFailed(format!("Unexpected Gemini response: {}", e))
        })?;

        let output = parsed.text().ok_or_else(|| {
            let reason = parsed
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates".to_string());
            SmartEdError::GenerationFailed(format!("Empty response from Gemini: {}", reason))
        })?;

        debug!("Generated {} characters", output.len());
        Ok(output)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentBody {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none", default)]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    file_data: Option<FileData>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileData {
    file_uri: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_json_schema: Option<serde_json::Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        Some(text).filter(|t| !t.trim().is_empty())
    }
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}
