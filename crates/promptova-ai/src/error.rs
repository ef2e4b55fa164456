//! AI provider error types.

use thiserror::Error;

/// Result type for AI provider calls.
pub type AiResult<T> = Result<T, AiError>;

#[derive(Debug, Error)]
pub enum AiError {
    /// No API key configured.
    #[error("AI provider not configured: {0}")]
    NotConfigured(String),

    /// The provider answered with a non-success status.
    #[error("AI provider returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The provider answered 2xx without the expected content.
    #[error("AI provider returned no {0}")]
    EmptyResponse(&'static str),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AiError {
    /// True when the provider rejected the prompt itself (content policy,
    /// malformed input) rather than failing.
    pub fn is_rejected_input(&self) -> bool {
        matches!(self, AiError::Api { status, .. } if *status == 400)
    }

    /// Status label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AiError::NotConfigured(_) => "not_configured",
            AiError::Api { .. } => "api",
            AiError::EmptyResponse(_) => "empty",
            AiError::Network(_) => "network",
            AiError::Json(_) => "json",
        }
    }
}
