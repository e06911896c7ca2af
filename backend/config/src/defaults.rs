//! Config defaults: collapses the optional schema into a fully-populated
//! [`ResolvedConfig`] the runtime can use without further `Option` handling.

use serde::Serialize;

use crate::schema::RelayConfig;

pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_WEBHOOK_PATH: &str = "/slack/events";
pub const DEFAULT_SLACK_API_BASE: &str = "https://slack.com/api";

/// Requests older than this are rejected as possible replays.
pub const DEFAULT_TIMESTAMP_TOLERANCE_SECS: u64 = 300;

pub const DEFAULT_MODEL: &str = "gpt-4";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_LOG_LEVEL: &str = "info";
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Persona used when `openai.systemPrompt` is not set.
pub const DEFAULT_SYSTEM_PROMPT: &str = "\
you are a slack bot acting as a coach for students. your job is to challenge them to think deeper, \
reflect sharper, or take action, in less than 2 lines.

you never greet people. you cut straight to the point. always speak in lowercase. \
no slang, no emojis. your tone is grounded, human, sometimes sharp, always real.

never sound like a chatbot. never ramble. no disclaimers. just say what matters. \
be useful or push the student to go further.";

/// Fully-defaulted runtime configuration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    pub bind: String,
    pub port: u16,
    pub slack_bot_token: String,
    pub slack_signing_secret: String,
    pub webhook_path: String,
    pub slack_api_base: String,
    pub timestamp_tolerance_secs: u64,
    pub openai_api_key: String,
    pub openai_base_url: String,
    pub model: String,
    pub system_prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedup_max_entries: Option<usize>,
    pub log_level: String,
    pub log_dir: String,
}

/// Apply all defaults to a loaded config.
///
/// Missing secrets become empty strings; [`crate::validate`] is what reports them.
pub fn apply_all_defaults(config: RelayConfig) -> ResolvedConfig {
    let server = config.server();
    let slack = config.slack();
    let openai = config.openai();
    let logging = config.logging();

    ResolvedConfig {
        bind: server.bind.unwrap_or_else(|| DEFAULT_BIND.to_string()),
        port: server.port.unwrap_or(DEFAULT_PORT),
        slack_bot_token: slack.bot_token.unwrap_or_default(),
        slack_signing_secret: slack.signing_secret.unwrap_or_default(),
        webhook_path: slack
            .webhook_path
            .unwrap_or_else(|| DEFAULT_WEBHOOK_PATH.to_string()),
        slack_api_base: slack
            .api_base
            .unwrap_or_else(|| DEFAULT_SLACK_API_BASE.to_string()),
        timestamp_tolerance_secs: slack
            .timestamp_tolerance_secs
            .unwrap_or(DEFAULT_TIMESTAMP_TOLERANCE_SECS),
        openai_api_key: openai.api_key.unwrap_or_default(),
        openai_base_url: openai
            .base_url
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
        model: openai.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        system_prompt: openai
            .system_prompt
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
        max_tokens: openai.max_tokens,
        temperature: openai.temperature,
        dedup_max_entries: config.dedup.and_then(|d| d.max_entries),
        log_level: logging.level.unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        log_dir: logging.dir.unwrap_or_else(|| DEFAULT_LOG_DIR.to_string()),
    }
}
