//! Slack channel adapter.
//!
//! Receives Slack Events API webhooks and hands them to the
//! [`SlackDispatcher`], which replies via the Slack Web API (`chat.postMessage`).
//!
//! Required env vars:
//!   SLACK_SIGNING_SECRET: used to verify X-Slack-Signature HMAC
//!   SLACK_BOT_TOKEN     : Bot User OAuth Token (xoxb-...)
//!   SLACK_WEBHOOK_PATH  : path to mount the webhook (default: /slack/events)

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};

use crate::dispatcher::SlackDispatcher;
use crate::ChannelAdapter;

// ---------------------------------------------------------------------------
// Axum state
// ---------------------------------------------------------------------------

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<SlackDispatcher>,
}

// ---------------------------------------------------------------------------
// Adapter struct
// ---------------------------------------------------------------------------

pub struct SlackAdapter {
    webhook_path: String,
    dispatcher: Arc<SlackDispatcher>,
}

impl SlackAdapter {
    pub fn new(webhook_path: impl Into<String>, dispatcher: Arc<SlackDispatcher>) -> Self {
        Self {
            webhook_path: webhook_path.into(),
            dispatcher,
        }
    }
}

// ---------------------------------------------------------------------------
// Webhook handler
// ---------------------------------------------------------------------------

async fn handle_slack_event(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match state.dispatcher.handle(&headers, &body).await {
        Ok(outcome) => outcome.into_response(),
        Err(err) => err.into_response(),
    }
}

// ---------------------------------------------------------------------------
// ChannelAdapter impl
// ---------------------------------------------------------------------------

impl ChannelAdapter for SlackAdapter {
    fn name(&self) -> &str {
        "slack"
    }

    fn build_router(&self) -> Router {
        let state = AppState {
            dispatcher: Arc::clone(&self.dispatcher),
        };
        Router::new()
            .route(&self.webhook_path, post(handle_slack_event))
            .with_state(state)
    }
}
