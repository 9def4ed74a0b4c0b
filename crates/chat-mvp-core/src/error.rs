use std::time::Duration;

/// Errors surfaced by a chat request.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Upstream error: {0}")]
    Upstream(#[from] ProviderError),

    #[error("Upstream returned no choices")]
    EmptyResponse,

    #[error("Timed out after {} seconds", .0.as_secs())]
    Timeout(Duration),

    #[error("Request cancelled")]
    Cancelled,
}

impl ChatError {
    /// Whether the caller should see this as "service temporarily unavailable".
    pub fn is_unavailable(&self) -> bool {
        !matches!(self, ChatError::Validation(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("No API key configured for provider")]
    NoApiKey,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No API key configured (set OPENAI_API_KEY)")]
    NoApiKey,
}

pub type Result<T> = std::result::Result<T, ChatError>;
