//! LLM error types.

/// Errors that can occur while routing or performing a chat call.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The provider needs a credential that was not supplied at startup
    #[error("{provider} API key not configured")]
    Configuration { provider: String },
    /// The provider answered with a non-success status
    #[error("{provider} API error: {status} {reason}")]
    Remote {
        provider: String,
        status: u16,
        reason: String,
    },
    /// A success response did not carry the expected field
    #[error("unexpected {provider} response: {detail}")]
    Shape { provider: String, detail: String },
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
    #[error("invalid chat request: {0}")]
    InvalidRequest(String),
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl LlmError {
    pub fn shape(provider: &str, detail: impl Into<String>) -> Self {
        LlmError::Shape {
            provider: provider.to_string(),
            detail: detail.into(),
        }
    }

    /// Short label used for metrics and API status mapping
    pub fn kind(&self) -> &'static str {
        match self {
            LlmError::Configuration { .. } => "configuration",
            LlmError::Remote { .. } => "remote",
            LlmError::Shape { .. } => "shape",
            LlmError::UnknownProvider(_) => "unknown_provider",
            LlmError::InvalidRequest(_) => "invalid_request",
            LlmError::Transport(_) => "transport",
        }
    }
}
