//! Configuration settings for SmartEd.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub server: ServerSettings,
    pub captions: CaptionSettings,
    pub cache: CacheSettings,
    pub generation: GenerationSettings,
    pub defaults: FeatureDefaults,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Caption retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionSettings {
    /// Language variants tried in order before falling back to any track.
    pub languages: Vec<String>,
    /// Optional HTTP(S) proxy for caption requests.
    pub proxy_url: Option<String>,
    /// Timeout for a single caption request.
    pub request_timeout_secs: u64,
    /// Retries of the primary language after a randomized backoff.
    pub max_retries: u32,
    /// Base backoff delay; each retry waits between base and twice base,
    /// doubling per attempt.
    pub retry_base_delay_ms: u64,
}

impl Default for CaptionSettings {
    fn default() -> Self {
        Self {
            languages: vec!["en".to_string(), "en-US".to_string(), "en-GB".to_string()],
            proxy_url: None,
            request_timeout_secs: 20,
            max_retries: 2,
            retry_base_delay_ms: 1000,
        }
    }
}

impl CaptionSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

/// Content cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// How long a failed acquisition is served from cache.
    pub failure_ttl_secs: u64,
    /// How long successful content is kept. None = process lifetime.
    pub success_ttl_secs: Option<u64>,
    /// Upper bound on cached videos; least recently used go first.
    pub max_entries: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            failure_ttl_secs: 300,
            success_ttl_secs: None,
            max_entries: 10_000,
        }
    }
}

impl CacheSettings {
    pub fn failure_ttl(&self) -> Duration {
        Duration::from_secs(self.failure_ttl_secs)
    }

    pub fn success_ttl(&self) -> Option<Duration> {
        self.success_ttl_secs.map(Duration::from_secs)
    }
}

/// Generation backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    /// Google Gemini (default; can ingest YouTube videos directly).
    #[default]
    Gemini,
    /// OpenAI or any compatible chat completions endpoint.
    #[serde(rename = "openai")]
    OpenAI,
}

impl std::str::FromStr for GenerationProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gemini" | "google" => Ok(GenerationProvider::Gemini),
            "openai" => Ok(GenerationProvider::OpenAI),
            _ => Err(format!("Unknown generation provider: {}", s)),
        }
    }
}

impl std::fmt::Display for GenerationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GenerationProvider::Gemini => write!(f, "gemini"),
            GenerationProvider::OpenAI => write!(f, "openai"),
        }
    }
}

/// Generation backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub provider: GenerationProvider,
    /// Model used for every feature.
    pub model: String,
    /// Override of the provider's API base URL.
    pub api_base: Option<String>,
    /// Timeout for a single generation call.
    pub timeout_secs: u64,
    pub temperature: f32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            provider: GenerationProvider::Gemini,
            model: "gemini-2.0-flash".to_string(),
            api_base: None,
            timeout_secs: 300,
            temperature: 0.4,
        }
    }
}

/// Defaults for feature parameters the caller leaves out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureDefaults {
    /// Summary length target in words.
    pub summary_max_length: u32,
    pub quiz_questions: u32,
}

impl Default for FeatureDefaults {
    fn default() -> Self {
        Self {
            summary_max_length: 800,
            quiz_questions: 5,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::SmartEdError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("smarted")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }
}
