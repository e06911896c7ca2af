//! Event dispatcher: the whole inbound path for one Slack webhook delivery.
//!
//! verify → parse → handshake → dedupe → bot guard → classify → generate → deliver.
//! Every expected condition ends in a fixed textual acknowledgement; only
//! malformed payloads and collaborator failures surface as [`DispatchError`].

use std::sync::Arc;

use axum::{
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use slackrelay_core::{LlmProvider, LlmRequest, MessagingClient, PostedMessage};
use slackrelay_logging::{DispatchLogger, DispatchRecord};

use crate::dedup::EventRegistry;
use crate::slack_events::{EventClass, SlackEnvelope};
use crate::slack_signature::SignatureVerifier;

/// Generation parameters applied to every reply.
#[derive(Debug, Clone)]
pub struct ReplySettings {
    pub model: String,
    pub system_prompt: String,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

/// Terminal state of a successfully handled delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Signature check failed.
    Rejected,
    /// Endpoint handshake; echo the challenge.
    Challenge(String),
    /// `event_id` already processed.
    Duplicate,
    /// Posted by a bot.
    IgnoredBot,
    /// Not a top-level mention or DM, or nothing to say.
    Ignored,
    /// Reply generated and delivered.
    Replied(PostedMessage),
}

impl DispatchOutcome {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchOutcome::Rejected => StatusCode::FORBIDDEN,
            _ => StatusCode::OK,
        }
    }

    pub fn body(&self) -> &str {
        match self {
            DispatchOutcome::Rejected => "Invalid request",
            DispatchOutcome::Challenge(challenge) => challenge,
            DispatchOutcome::Duplicate => "Duplicate event",
            DispatchOutcome::IgnoredBot => "Ignore bot message",
            DispatchOutcome::Ignored | DispatchOutcome::Replied(_) => "ok",
        }
    }
}

impl IntoResponse for DispatchOutcome {
    fn into_response(self) -> Response {
        (self.status(), self.body().to_string()).into_response()
    }
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("malformed event payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),

    #[error("qualifying event {event_id:?} has no channel")]
    MissingChannel { event_id: Option<String> },

    #[error("reply generation failed: {0:#}")]
    Generation(anyhow::Error),

    #[error("reply delivery failed: {0:#}")]
    Delivery(anyhow::Error),
}

impl DispatchError {
    pub fn status(&self) -> StatusCode {
        match self {
            DispatchError::MalformedPayload(_) | DispatchError::MissingChannel { .. } => {
                StatusCode::BAD_REQUEST
            }
            DispatchError::Generation(_) | DispatchError::Delivery(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn body(&self) -> &'static str {
        match self.status() {
            StatusCode::BAD_REQUEST => "Invalid payload",
            _ => "Internal error",
        }
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        (self.status(), self.body()).into_response()
    }
}

/// Handles Slack webhook deliveries against injected collaborators.
pub struct SlackDispatcher {
    verifier: Arc<dyn SignatureVerifier>,
    registry: Arc<EventRegistry>,
    provider: Arc<dyn LlmProvider>,
    messenger: Arc<dyn MessagingClient>,
    settings: ReplySettings,
}

impl SlackDispatcher {
    pub fn new(
        verifier: Arc<dyn SignatureVerifier>,
        registry: Arc<EventRegistry>,
        provider: Arc<dyn LlmProvider>,
        messenger: Arc<dyn MessagingClient>,
        settings: ReplySettings,
    ) -> Self {
        Self {
            verifier,
            registry,
            provider,
            messenger,
            settings,
        }
    }

    /// Handle one raw delivery. The registry entry for an event stays in
    /// place even when generation or delivery later fails.
    #[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4()))]
    pub async fn handle(
        &self,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<DispatchOutcome, DispatchError> {
        if !self.verifier.is_valid(body, headers) {
            warn!("[Slack] Invalid signature, rejecting webhook");
            DispatchLogger::log(DispatchRecord::Rejected);
            return Ok(DispatchOutcome::Rejected);
        }

        let envelope: SlackEnvelope = serde_json::from_slice(body).map_err(|e| {
            error!("[Slack] Failed to parse event envelope: {}", e);
            DispatchLogger::log(DispatchRecord::Failed {
                event_id: None,
                error_msg: e.to_string(),
            });
            DispatchError::MalformedPayload(e)
        })?;

        if envelope.is_url_verification() {
            info!("[Slack] Answering url_verification handshake");
            DispatchLogger::log(DispatchRecord::Challenge);
            return Ok(DispatchOutcome::Challenge(
                envelope.challenge.unwrap_or_default(),
            ));
        }

        let event_id = envelope.event_id();
        let key = envelope.dedup_key();
        if !self.registry.check_and_record(&key).await {
            DispatchLogger::log(DispatchRecord::Duplicate { event_id: key });
            return Ok(DispatchOutcome::Duplicate);
        }

        let event = envelope.event.unwrap_or_default();
        match event.classify() {
            EventClass::BotOriginated => {
                DispatchLogger::log(DispatchRecord::IgnoredBot { event_id });
                return Ok(DispatchOutcome::IgnoredBot);
            }
            EventClass::NotAddressed => {
                DispatchLogger::log(DispatchRecord::Ignored {
                    event_id,
                    event_type: event.event_type,
                });
                return Ok(DispatchOutcome::Ignored);
            }
            EventClass::TopLevelMention | EventClass::DirectMessage => {}
        }

        let Some(channel) = event.channel.filter(|c| !c.is_empty()) else {
            let err = DispatchError::MissingChannel { event_id };
            warn!("[Slack] {}", err);
            return Err(err);
        };
        let text = event.text.unwrap_or_default();

        let reply = match self.generate(&text).await {
            Ok(reply) => reply,
            Err(e) => return Err(self.fail(event_id, DispatchError::Generation(e))),
        };
        if reply.is_empty() {
            warn!(channel = %channel, "Model returned an empty reply; nothing to post");
            DispatchLogger::log(DispatchRecord::Ignored {
                event_id,
                event_type: event.event_type,
            });
            return Ok(DispatchOutcome::Ignored);
        }

        let posted = match self.messenger.post_message(&channel, &reply).await {
            Ok(posted) => posted,
            Err(e) => return Err(self.fail(event_id, DispatchError::Delivery(e))),
        };

        DispatchLogger::log(DispatchRecord::Replied {
            event_id,
            channel,
            text,
            reply,
        });
        Ok(DispatchOutcome::Replied(posted))
    }

    async fn generate(&self, text: &str) -> anyhow::Result<String> {
        let request = LlmRequest {
            model: self.settings.model.clone(),
            system_prompt: self.settings.system_prompt.clone(),
            user_prompt: text.to_string(),
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        };
        let response = self.provider.complete(&request).await?;
        info!(
            provider = %response.provider,
            model = %response.model,
            tokens = response.tokens_used,
            latency_ms = response.latency_ms,
            "Generated reply"
        );
        Ok(response.content.trim().to_string())
    }

    fn fail(&self, event_id: Option<String>, err: DispatchError) -> DispatchError {
        error!("[Slack] {}", err);
        DispatchLogger::log(DispatchRecord::Failed {
            event_id,
            error_msg: err.to_string(),
        });
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slack_events::MISSING_EVENT_ID;
    use crate::slack_signature::{SIGNATURE_HEADER, SlackSignatureVerifier, TIMESTAMP_HEADER};
    use anyhow::{Result, anyhow};
    use async_trait::async_trait;
    use axum::http::HeaderValue;
    use serde_json::json;
    use slackrelay_core::LlmResponse;
    use std::sync::Mutex;

    const SECRET: &str = "test-signing-secret";

    #[derive(Default)]
    struct RecordingProvider {
        reply: String,
        fail: bool,
        prompts: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl LlmProvider for RecordingProvider {
        fn name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, req: &LlmRequest) -> Result<LlmResponse> {
            self.prompts
                .lock()
                .unwrap()
                .push((req.system_prompt.clone(), req.user_prompt.clone()));
            if self.fail {
                return Err(anyhow!("model unavailable"));
            }
            Ok(LlmResponse {
                content: self.reply.clone(),
                provider: "recording".into(),
                model: req.model.clone(),
                tokens_used: 1,
                latency_ms: 1,
            })
        }
    }

    #[derive(Default)]
    struct RecordingMessenger {
        fail: bool,
        posts: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl MessagingClient for RecordingMessenger {
        async fn post_message(&self, channel: &str, text: &str) -> Result<PostedMessage> {
            self.posts
                .lock()
                .unwrap()
                .push((channel.to_string(), text.to_string()));
            if self.fail {
                return Err(anyhow!("channel_not_found"));
            }
            Ok(PostedMessage {
                channel: channel.to_string(),
                ts: Some("1.1".into()),
            })
        }
    }

    struct Harness {
        dispatcher: SlackDispatcher,
        provider: Arc<RecordingProvider>,
        messenger: Arc<RecordingMessenger>,
        registry: Arc<EventRegistry>,
    }

    impl Harness {
        fn build(provider: RecordingProvider, messenger: RecordingMessenger) -> Self {
            let provider = Arc::new(provider);
            let messenger = Arc::new(messenger);
            let registry = Arc::new(EventRegistry::new());
            let dispatcher = SlackDispatcher::new(
                Arc::new(SlackSignatureVerifier::new(SECRET)),
                Arc::clone(&registry),
                provider.clone(),
                messenger.clone(),
                ReplySettings {
                    model: "gpt-4".into(),
                    system_prompt: "be a coach".into(),
                    max_tokens: None,
                    temperature: None,
                },
            );
            Self {
                dispatcher,
                provider,
                messenger,
                registry,
            }
        }

        fn new() -> Self {
            Self::build(
                RecordingProvider {
                    reply: "  pick one thing and finish it.\n".into(),
                    ..Default::default()
                },
                RecordingMessenger::default(),
            )
        }

        async fn send(&self, payload: &serde_json::Value) -> Result<DispatchOutcome, DispatchError> {
            let body = serde_json::to_vec(payload).unwrap();
            self.dispatcher.handle(&signed_headers(&body), &body).await
        }

        fn prompts(&self) -> Vec<(String, String)> {
            self.provider.prompts.lock().unwrap().clone()
        }

        fn posts(&self) -> Vec<(String, String)> {
            self.messenger.posts.lock().unwrap().clone()
        }
    }

    fn signed_headers(body: &[u8]) -> HeaderMap {
        let ts = chrono::Utc::now().timestamp().to_string();
        let sig = SlackSignatureVerifier::new(SECRET).sign(&ts, body);
        let mut headers = HeaderMap::new();
        headers.insert(TIMESTAMP_HEADER, HeaderValue::from_str(&ts).unwrap());
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&sig).unwrap());
        headers
    }

    fn mention(event_id: &str, text: &str, channel: &str) -> serde_json::Value {
        json!({
            "type": "event_callback",
            "event_id": event_id,
            "event": {"type": "app_mention", "text": text, "channel": channel, "ts": "1.0"}
        })
    }

    #[tokio::test]
    async fn invalid_signature_is_rejected_without_recording() {
        let h = Harness::new();
        let body = serde_json::to_vec(&mention("Ev1", "hi", "C1")).unwrap();
        let mut headers = signed_headers(b"something else");
        headers.insert("x-extra", HeaderValue::from_static("1"));

        let outcome = h.dispatcher.handle(&headers, &body).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Rejected);
        assert_eq!(outcome.status(), StatusCode::FORBIDDEN);
        assert_eq!(outcome.body(), "Invalid request");
        assert!(h.registry.is_empty().await);
        assert!(h.prompts().is_empty());
    }

    #[tokio::test]
    async fn unsigned_request_is_rejected() {
        let h = Harness::new();
        let body = serde_json::to_vec(&mention("Ev1", "hi", "C1")).unwrap();
        let outcome = h.dispatcher.handle(&HeaderMap::new(), &body).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Rejected);
        assert!(h.registry.is_empty().await);
    }

    #[tokio::test]
    async fn handshake_echoes_challenge() {
        let h = Harness::new();
        let outcome = h
            .send(&json!({"type": "url_verification", "challenge": "abc123", "event_id": "EvH"}))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Challenge("abc123".into()));
        assert_eq!(outcome.status(), StatusCode::OK);
        assert_eq!(outcome.body(), "abc123");
    }

    #[tokio::test]
    async fn repeated_handshake_is_not_a_duplicate() {
        let h = Harness::new();
        let payload = json!({"type": "url_verification", "challenge": "abc123"});
        for _ in 0..2 {
            assert_eq!(
                h.send(&payload).await.unwrap(),
                DispatchOutcome::Challenge("abc123".into())
            );
        }
        assert!(h.registry.is_empty().await);
    }

    #[tokio::test]
    async fn top_level_mention_gets_trimmed_reply() {
        let h = Harness::new();
        let outcome = h
            .send(&mention("Ev1", "what should I focus on today", "C1"))
            .await
            .unwrap();

        assert!(matches!(outcome, DispatchOutcome::Replied(_)));
        assert_eq!(outcome.body(), "ok");
        assert_eq!(outcome.status(), StatusCode::OK);
        assert_eq!(
            h.prompts(),
            vec![("be a coach".to_string(), "what should I focus on today".to_string())]
        );
        assert_eq!(
            h.posts(),
            vec![("C1".to_string(), "pick one thing and finish it.".to_string())]
        );
    }

    #[tokio::test]
    async fn duplicate_delivery_triggers_nothing() {
        let h = Harness::new();
        let payload = mention("Ev1", "hello", "C1");
        h.send(&payload).await.unwrap();

        for _ in 0..3 {
            let outcome = h.send(&payload).await.unwrap();
            assert_eq!(outcome, DispatchOutcome::Duplicate);
            assert_eq!(outcome.body(), "Duplicate event");
        }
        assert_eq!(h.prompts().len(), 1);
        assert_eq!(h.posts().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_redeliveries_reply_once() {
        let h = Arc::new(Harness::new());
        let payload = mention("EvRace", "hello", "C1");
        let mut handles = Vec::new();
        for _ in 0..16 {
            let h = Arc::clone(&h);
            let payload = payload.clone();
            handles.push(tokio::spawn(async move { h.send(&payload).await.unwrap() }));
        }
        let mut replied = 0;
        for handle in handles {
            if matches!(handle.await.unwrap(), DispatchOutcome::Replied(_)) {
                replied += 1;
            }
        }
        assert_eq!(replied, 1);
        assert_eq!(h.posts().len(), 1);
    }

    #[tokio::test]
    async fn bot_message_is_ignored() {
        let h = Harness::new();
        let outcome = h
            .send(&json!({
                "type": "event_callback",
                "event_id": "EvBot",
                "event": {"type": "message", "channel_type": "im", "bot_id": "B1", "text": "hi", "channel": "D1"}
            }))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::IgnoredBot);
        assert_eq!(outcome.body(), "Ignore bot message");
        assert!(h.prompts().is_empty());
        assert!(h.posts().is_empty());
        assert!(h.registry.contains("EvBot").await);
    }

    #[tokio::test]
    async fn threaded_mention_is_ignored() {
        let h = Harness::new();
        let outcome = h
            .send(&json!({
                "type": "event_callback",
                "event_id": "EvT",
                "event": {"type": "app_mention", "thread_ts": "1700000000.0001", "text": "hi", "channel": "C1"}
            }))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Ignored);
        assert_eq!(outcome.body(), "ok");
        assert!(h.prompts().is_empty());
        assert!(h.posts().is_empty());
    }

    #[tokio::test]
    async fn direct_message_replies_even_in_thread() {
        let h = Harness::new();
        let outcome = h
            .send(&json!({
                "type": "event_callback",
                "event_id": "EvDM",
                "event": {"type": "message", "channel_type": "im", "thread_ts": "1.0", "text": "stuck", "channel": "D1"}
            }))
            .await
            .unwrap();
        assert!(matches!(outcome, DispatchOutcome::Replied(_)));
        assert_eq!(h.prompts()[0].1, "stuck");
        assert_eq!(h.posts()[0].0, "D1");
    }

    #[tokio::test]
    async fn plain_channel_message_is_ignored() {
        let h = Harness::new();
        let outcome = h
            .send(&json!({
                "type": "event_callback",
                "event_id": "EvC",
                "event": {"type": "message", "channel_type": "channel", "text": "hi", "channel": "C1"}
            }))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Ignored);
        assert!(h.posts().is_empty());
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let h = Harness::new();
        let body = b"{not json";
        let err = h
            .dispatcher
            .handle(&signed_headers(body), body)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::MalformedPayload(_)));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(h.registry.is_empty().await);
    }

    #[tokio::test]
    async fn mention_without_channel_is_bad_request() {
        let h = Harness::new();
        let err = h
            .send(&json!({
                "type": "event_callback",
                "event_id": "EvNoChan",
                "event": {"type": "app_mention", "text": "hi"}
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::MissingChannel { .. }));
        assert!(h.prompts().is_empty());
    }

    #[tokio::test]
    async fn generation_failure_is_internal_error_and_stays_recorded() {
        let h = Harness::build(
            RecordingProvider {
                fail: true,
                ..Default::default()
            },
            RecordingMessenger::default(),
        );
        let payload = mention("EvFail", "hi", "C1");
        let err = h.send(&payload).await.unwrap_err();
        assert!(matches!(err, DispatchError::Generation(_)));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.body(), "Internal error");
        assert!(h.posts().is_empty());

        // The platform's retry is swallowed as a duplicate.
        assert_eq!(h.send(&payload).await.unwrap(), DispatchOutcome::Duplicate);
    }

    #[tokio::test]
    async fn delivery_failure_is_internal_error() {
        let h = Harness::build(
            RecordingProvider {
                reply: "go".into(),
                ..Default::default()
            },
            RecordingMessenger {
                fail: true,
                ..Default::default()
            },
        );
        let err = h.send(&mention("EvDeliver", "hi", "C1")).await.unwrap_err();
        assert!(matches!(err, DispatchError::Delivery(_)));
        assert_eq!(h.posts().len(), 1);
    }

    #[tokio::test]
    async fn blank_reply_is_not_posted() {
        let h = Harness::build(
            RecordingProvider {
                reply: "  \n ".into(),
                ..Default::default()
            },
            RecordingMessenger::default(),
        );
        let outcome = h.send(&mention("EvBlank", "hi", "C1")).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Ignored);
        assert_eq!(h.prompts().len(), 1);
        assert!(h.posts().is_empty());
    }

    #[tokio::test]
    async fn events_without_id_share_one_registry_slot() {
        let h = Harness::new();
        let payload = json!({
            "type": "event_callback",
            "event": {"type": "app_mention", "text": "hi", "channel": "C1"}
        });
        assert!(matches!(h.send(&payload).await.unwrap(), DispatchOutcome::Replied(_)));
        let second = h.send(&payload).await.unwrap();
        assert_eq!(second, DispatchOutcome::Duplicate);
        assert_eq!(second.body(), "Duplicate event");
        assert!(h.registry.contains(MISSING_EVENT_ID).await);
        assert_eq!(h.prompts().len(), 1);
        assert_eq!(h.posts().len(), 1);
    }

    #[tokio::test]
    async fn null_bot_id_is_ignored_as_bot() {
        let h = Harness::new();
        let outcome = h
            .send(&json!({
                "type": "event_callback",
                "event_id": "EvNullBot",
                "event": {"type": "message", "channel_type": "im", "bot_id": null, "text": "hi", "channel": "D1"}
            }))
            .await
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::IgnoredBot);
        assert_eq!(outcome.body(), "Ignore bot message");
        assert!(h.prompts().is_empty());
        assert!(h.posts().is_empty());
    }
}
