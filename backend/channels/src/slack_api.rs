//! Slack Web API client used to deliver replies (`chat.postMessage`).

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use slackrelay_core::{MessagingClient, PostedMessage, RelayError};

pub const DEFAULT_API_BASE: &str = "https://slack.com/api";
const POST_MESSAGE: &str = "chat.postMessage";

#[derive(Serialize)]
struct SlackPostMessage<'a> {
    channel: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct SlackChatMessageResponse {
    ok: bool,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Bot-token authenticated Slack Web API client.
#[derive(Clone)]
pub struct SlackApiClient {
    http: Client,
    api_base: String,
    bot_token: String,
}

impl SlackApiClient {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            bot_token: bot_token.into(),
        }
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn api_error(message: impl Into<String>) -> RelayError {
        RelayError::SlackApi {
            method: POST_MESSAGE.to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl MessagingClient for SlackApiClient {
    async fn post_message(&self, channel: &str, text: &str) -> Result<PostedMessage> {
        let res = self
            .http
            .post(format!("{}/{POST_MESSAGE}", self.api_base))
            .bearer_auth(&self.bot_token)
            .json(&SlackPostMessage { channel, text })
            .send()
            .await
            .context("Slack chat.postMessage request failed")?;

        let status = res.status();
        if !status.is_success() {
            let err = res.text().await.unwrap_or_default();
            error!(%status, "[Slack] chat.postMessage failed: {}", err);
            return Err(Self::api_error(format!("{status}: {err}")).into());
        }

        let body: SlackChatMessageResponse = res
            .json()
            .await
            .context("Failed to parse chat.postMessage response")?;
        if !body.ok {
            let err = body.error.unwrap_or_else(|| "unknown_error".to_string());
            error!("[Slack] chat.postMessage rejected: {}", err);
            return Err(Self::api_error(err).into());
        }

        info!("[Slack] Sent message to channel {}", channel);
        Ok(PostedMessage {
            channel: body.channel.unwrap_or_else(|| channel.to_string()),
            ts: body.ts,
        })
    }
}
