use thiserror::Error;

/// Top-level error type for the relay's outbound collaborators.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("LLM provider error ({provider}): {message}")]
    LlmError { provider: String, message: String },

    #[error("LLM provider {0} returned no completion choices")]
    EmptyCompletion(String),

    #[error("Slack API error ({method}): {message}")]
    SlackApi { method: String, message: String },

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
