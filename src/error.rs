//! Error types for SmartEd.

use thiserror::Error;

/// Library-level error type for SmartEd operations.
#[derive(Error, Debug)]
pub enum SmartEdError {
    #[error("Invalid video reference: {0}")]
    InvalidReference(String),

    #[error("Content acquisition failed for {reference}: {}", .causes.join("; "))]
    AcquisitionFailed {
        reference: String,
        causes: Vec<String>,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("No API key provided for this request. Pass X-API-Key or --api-key.")]
    NoCredential,

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("Malformed generation output: {0}")]
    MalformedGenerationOutput(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Coarse classification used by front ends to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller sent something unusable.
    BadInput,
    /// No credential was established for the request.
    Unauthenticated,
    /// The video's content could not be acquired.
    ContentUnavailable,
    /// The generation backend failed or produced unusable output.
    GenerationUnavailable,
    /// Anything else.
    Internal,
}

impl SmartEdError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SmartEdError::InvalidReference(_) | SmartEdError::InvalidRequest(_) => {
                ErrorKind::BadInput
            }
            SmartEdError::NoCredential => ErrorKind::Unauthenticated,
            SmartEdError::AcquisitionFailed { .. } => ErrorKind::ContentUnavailable,
            SmartEdError::GenerationFailed(_) | SmartEdError::MalformedGenerationOutput(_) => {
                ErrorKind::GenerationUnavailable
            }
            _ => ErrorKind::Internal,
        }
    }
}

/// Result type alias for SmartEd operations.
pub type Result<T> = std::result::Result<T, SmartEdError>;
