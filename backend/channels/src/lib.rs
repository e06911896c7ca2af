use axum::Router;

pub mod dedup;
pub mod dispatcher;
pub mod slack;
pub mod slack_api;
pub mod slack_events;
pub mod slack_signature;

pub use dedup::EventRegistry;
pub use dispatcher::{DispatchError, DispatchOutcome, ReplySettings, SlackDispatcher};
pub use slack::SlackAdapter;
pub use slack_api::SlackApiClient;
pub use slack_events::{EventClass, SlackEnvelope, SlackEvent};
pub use slack_signature::{SignatureVerifier, SlackSignatureVerifier};

/// All channel adapters implement this trait.
pub trait ChannelAdapter: Send + Sync {
    /// Human-readable adapter name for logging.
    fn name(&self) -> &str;

    /// Build the Axum sub-router for the adapter's inbound webhook endpoints.
    fn build_router(&self) -> Router;
}
