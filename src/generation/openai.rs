//! OpenAI-compatible chat completion backend.

use super::{ContentGenerator, GenerationRequest, PromptPart, ResponseFormat};
use crate::config::GenerationSettings;
use crate::credential::Credential;
use crate::error::{Result, SmartEdError};
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    ResponseFormat as OpenAIResponseFormat, ResponseFormatJsonSchema,
};
use async_openai::Client;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};

/// Generator backed by the chat completions API.
///
/// Works with api.openai.com or any compatible endpoint via `api_base`.
/// Cannot watch videos; video parts are passed along as their URL.
pub struct OpenAIGenerator {
    http: reqwest::Client,
    model: String,
    api_base: Option<String>,
    temperature: f32,
}

impl OpenAIGenerator {
    /// Create a generator from settings.
    pub fn with_config(settings: &GenerationSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            model: settings.model.clone(),
            api_base: settings.api_base.clone().filter(|b| !b.is_empty()),
            temperature: settings.temperature,
        })
    }

    /// A client bound to this call's credential.
    fn client(&self, credential: &Credential) -> Client<OpenAIConfig> {
        let mut config = OpenAIConfig::new().with_api_key(credential.expose());
        if let Some(base) = &self.api_base {
            config = config.with_api_base(base);
        }
        Client::with_config(config).with_http_client(self.http.clone())
    }

    fn render_parts(parts: &[PromptPart]) -> String {
        parts
            .iter()
            .map(|part| match part {
                PromptPart::Text(text) => text.clone(),
                PromptPart::Video(reference) => format!("VIDEO URL: {}", reference.watch_url()),
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[async_trait]
impl ContentGenerator for OpenAIGenerator {
    fn name(&self) -> &str {
        "openai"
    }

    fn supports_video(&self) -> bool {
        false
    }

    #[instrument(skip(self, request, credential), fields(feature = %request.feature, model = %self.model))]
    async fn generate(&self, request: &GenerationRequest, credential: &Credential) -> Result<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(request.system_instruction.clone())
                .build()
                .map_err(|e| SmartEdError::GenerationFailed(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(Self::render_parts(&request.parts))
                .build()
                .map_err(|e| SmartEdError::GenerationFailed(e.to_string()))?
                .into(),
        ];

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature);

        if let ResponseFormat::JsonSchema { name, schema } = &request.response_format {
            builder.response_format(OpenAIResponseFormat::JsonSchema {
                json_schema: ResponseFormatJsonSchema {
                    description: None,
                    name: name.clone(),
                    schema: Some(schema.clone()),
                    strict: Some(true),
                },
            });
        }

        let chat_request = builder
            .build()
            .map_err(|e| SmartEdError::GenerationFailed(e.to_string()))?;

        let response = self
            .client(credential)
            .chat()
            .create(chat_request)
            .await
            .map_err(|e| SmartEdError::GenerationFailed(format!("OpenAI API error: {}", e)))?;

        let text = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| SmartEdError::GenerationFailed("Empty response from LLM".to_string()))?
            .clone();

        debug!("Generated {} characters", text.len());
        Ok(text)
    }
}
