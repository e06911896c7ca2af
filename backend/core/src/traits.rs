use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Trait for LLM providers that turn a user message into a reply.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g., "openai", "mock").
    fn name(&self) -> &str;

    /// Send a completion request and return the response text.
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse>;
}

/// Request to an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Response from an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub provider: String,
    pub model: String,
    pub tokens_used: u64,
    pub latency_ms: u64,
}

/// Outbound chat client used to deliver a reply into a channel.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Post `text` to `channel`.
    async fn post_message(&self, channel: &str, text: &str) -> Result<PostedMessage>;
}

/// Acknowledgement returned by the messaging platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: Option<String>,
}
