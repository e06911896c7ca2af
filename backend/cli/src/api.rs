use std::sync::Arc;

use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use slackrelay_channels::{
    ChannelAdapter, EventRegistry, ReplySettings, SlackAdapter, SlackApiClient, SlackDispatcher,
    SlackSignatureVerifier,
};
use slackrelay_config::ResolvedConfig;
use slackrelay_providers::OpenAiProvider;

/// Shared application state for API handlers.
pub struct AppState {
    pub registry: Arc<EventRegistry>,
}

/// Wire the real collaborators from config into a Slack adapter.
pub fn build_slack_adapter(config: &ResolvedConfig, registry: Arc<EventRegistry>) -> SlackAdapter {
    let verifier = SlackSignatureVerifier::new(&config.slack_signing_secret)
        .with_tolerance(config.timestamp_tolerance_secs);
    let provider =
        OpenAiProvider::new(&config.openai_api_key).with_base_url(&config.openai_base_url);
    let messenger =
        SlackApiClient::new(&config.slack_bot_token).with_api_base(&config.slack_api_base);

    let dispatcher = SlackDispatcher::new(
        Arc::new(verifier),
        registry,
        Arc::new(provider),
        Arc::new(messenger),
        ReplySettings {
            model: config.model.clone(),
            system_prompt: config.system_prompt.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        },
    );
    SlackAdapter::new(&config.webhook_path, Arc::new(dispatcher))
}

/// Build the Axum router: health route plus every adapter's webhook routes.
pub fn build_router(state: Arc<AppState>, adapters: &[&dyn ChannelAdapter]) -> Router {
    let mut app = Router::new()
        .route("/api/health", get(health))
        .with_state(state);

    for adapter in adapters {
        tracing::info!(adapter = adapter.name(), "Mounting channel adapter");
        app = app.merge(adapter.build_router());
    }

    app.layer(TraceLayer::new_for_http())
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "slackrelay",
        "version": env!("CARGO_PKG_VERSION"),
        "processedEvents": state.registry.len().await,
        "dedupCapacity": state.registry.max_entries(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use slackrelay_config::{apply_all_defaults, RelayConfig};
    use tower::ServiceExt;

    fn router() -> (Router, Arc<EventRegistry>) {
        let config = apply_all_defaults(RelayConfig::default());
        let registry = Arc::new(EventRegistry::bounded(10));
        let adapter = build_slack_adapter(&config, Arc::clone(&registry));
        let state = Arc::new(AppState {
            registry: Arc::clone(&registry),
        });
        (build_router(state, &[&adapter]), registry)
    }

    #[tokio::test]
    async fn health_reports_registry() {
        let (app, registry) = router();
        registry.check_and_record("Ev1").await;

        let response = app
            .oneshot(Request::get("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["processedEvents"], 1);
        assert_eq!(body["dedupCapacity"], 10);
    }

    #[tokio::test]
    async fn webhook_is_mounted_at_default_path() {
        let (app, registry) = router();
        let response = app
            .oneshot(
                Request::post("/slack/events")
                    .body(Body::from(r#"{"type":"url_verification","challenge":"c"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        // Unsigned, so rejected by the real verifier.
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(registry.is_empty().await);
    }
}
