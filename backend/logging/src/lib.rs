//! Structured logging for the Slack relay.
//!
//! Handles subscriber setup (console plus rolling NDJSON file), redaction of
//! tokens and keys, and one structured record per dispatched webhook.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{DispatchLogEntry, DispatchLogger, DispatchRecord};
pub use logger::{LoggerGuard, init_logger};
pub use redact::redact_sensitive_data;
