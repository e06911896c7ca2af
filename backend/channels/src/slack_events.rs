//! Slack Events API wire types
//!
//! The envelope Slack POSTs to the webhook and the nested event, plus the
//! routing policy deciding which events deserve a reply.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Envelope `type` of the one-time endpoint handshake.
pub const URL_VERIFICATION: &str = "url_verification";
/// Nested event `type` for `@bot` mentions.
pub const APP_MENTION: &str = "app_mention";
/// `channel_type` of a direct message.
pub const DIRECT_MESSAGE_CHANNEL: &str = "im";
/// Registry key shared by every envelope that arrives without an `event_id`.
pub const MISSING_EVENT_ID: &str = "<no event_id>";

/// Top-level event envelope from the Slack Events API.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct SlackEnvelope {
    #[serde(rename = "type", default)]
    pub envelope_type: Option<String>,
    /// Unique per event; redeliveries of the same event reuse it. Kept as raw
    /// JSON so unexpected shapes still dedupe instead of failing the parse.
    #[serde(default)]
    pub event_id: Option<Value>,
    /// Present on `url_verification` handshakes.
    #[serde(default)]
    pub challenge: Option<String>,
    /// Present on `event_callback`.
    #[serde(default)]
    pub event: Option<SlackEvent>,
    #[serde(default)]
    pub team_id: Option<String>,
}

impl SlackEnvelope {
    pub fn is_url_verification(&self) -> bool {
        self.envelope_type.as_deref() == Some(URL_VERIFICATION)
    }

    /// Event id as text; non-string ids are rendered as their JSON.
    pub fn event_id(&self) -> Option<String> {
        match self.event_id.as_ref()? {
            Value::String(id) => Some(id.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Key recorded in the registry. Envelopes without an id all share
    /// [`MISSING_EVENT_ID`], so only the first of them is processed.
    pub fn dedup_key(&self) -> String {
        self.event_id().unwrap_or_else(|| MISSING_EVENT_ID.to_string())
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct SlackEvent {
    #[serde(rename = "type", default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub channel_type: Option<String>,
    #[serde(default)]
    pub ts: Option<String>,
    /// Thread parent timestamp; set when the message is a reply in a thread.
    #[serde(default)]
    pub thread_ts: Option<String>,
    /// Set on messages posted by a bot, including this one. Only the key's
    /// presence matters: `"bot_id": null` still marks a bot message.
    #[serde(default, deserialize_with = "present")]
    pub bot_id: Option<Value>,
}

/// Deserializes a field that is present in the payload as `Some`, even when
/// its value is `null`. Pair with `#[serde(default)]` for absent keys.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Routing decision for a nested event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    BotOriginated,
    TopLevelMention,
    DirectMessage,
    NotAddressed,
}

impl EventClass {
    pub fn wants_reply(self) -> bool {
        matches!(self, EventClass::TopLevelMention | EventClass::DirectMessage)
    }
}

impl SlackEvent {
    pub fn is_from_bot(&self) -> bool {
        self.bot_id.is_some()
    }

    pub fn is_threaded(&self) -> bool {
        self.thread_ts.as_deref().is_some_and(|ts| !ts.is_empty())
    }

    pub fn is_top_level_mention(&self) -> bool {
        self.event_type.as_deref() == Some(APP_MENTION) && !self.is_threaded()
    }

    pub fn is_direct_message(&self) -> bool {
        self.channel_type.as_deref() == Some(DIRECT_MESSAGE_CHANNEL)
    }

    /// Bot messages are never answered; otherwise top-level mentions and DMs
    /// (threaded or not) are.
    pub fn classify(&self) -> EventClass {
        if self.is_from_bot() {
            EventClass::BotOriginated
        } else if self.is_top_level_mention() {
            EventClass::TopLevelMention
        } else if self.is_direct_message() {
            EventClass::DirectMessage
        } else {
            EventClass::NotAddressed
        }
    }
}
