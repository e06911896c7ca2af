//! Dispatch Event Logger
//!
//! One structured record per handled webhook, emitted through `tracing` under
//! the `dispatch_events` target so it lands in the NDJSON file.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::redact::redact_sensitive_data;

/// What happened to a single webhook delivery.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DispatchRecord {
    Rejected,
    Challenge,
    Duplicate {
        event_id: String,
    },
    IgnoredBot {
        event_id: Option<String>,
    },
    Ignored {
        event_id: Option<String>,
        event_type: Option<String>,
    },
    Replied {
        event_id: Option<String>,
        channel: String,
        text: String,
        reply: String,
    },
    Failed {
        event_id: Option<String>,
        error_msg: String,
    },
}

#[derive(Debug, Serialize)]
pub struct DispatchLogEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub record: DispatchRecord,
}

pub struct DispatchLogger;

impl DispatchLogger {
    /// Redacts free-form strings and logs the record.
    pub fn log(mut record: DispatchRecord) -> DispatchLogEntry {
        match &mut record {
            DispatchRecord::Replied { text, reply, .. } => {
                *text = redact_sensitive_data(text);
                *reply = redact_sensitive_data(reply);
            }
            DispatchRecord::Failed { error_msg, .. } => {
                *error_msg = redact_sensitive_data(error_msg);
            }
            _ => {}
        }

        let entry = DispatchLogEntry {
            timestamp: Utc::now(),
            record,
        };

        match serde_json::to_string(&entry) {
            Ok(json) => info!(target: "dispatch_events", event = %json, "Dispatch event"),
            Err(_) => info!(target: "dispatch_events", event = ?entry, "Dispatch event"),
        }
        entry
    }
}
