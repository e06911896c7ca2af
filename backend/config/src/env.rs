//! Environment handling for config values.
//!
//! Two mechanisms, applied in this order at load time:
//! - `${VAR_NAME}` references inside YAML string values are substituted.
//!   Only uppercase `[A-Z_][A-Z0-9_]*` names match; `$${VAR}` escapes to a literal `${VAR}`.
//! - Well-known variables (`SLACK_BOT_TOKEN`, `OPENAI_API_KEY`, ...) override
//!   the matching fields outright, so a deployment needs no config file at all.

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;

use crate::schema::{OpenAiConfig, RelayConfig, ServerConfig, SlackConfig, LoggingConfig};

/// `$${NAME}` (escaped) or `${NAME}` (reference).
static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$?\$\{([A-Z_][A-Z0-9_]*)\}").unwrap());

pub const SLACK_BOT_TOKEN: &str = "SLACK_BOT_TOKEN";
pub const SLACK_SIGNING_SECRET: &str = "SLACK_SIGNING_SECRET";
pub const SLACK_WEBHOOK_PATH: &str = "SLACK_WEBHOOK_PATH";
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const OPENAI_MODEL: &str = "OPENAI_MODEL";
pub const OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
pub const BIND_VAR: &str = "SLACKRELAY_BIND";
pub const PORT_VAR: &str = "SLACKRELAY_PORT";
pub const LOG_LEVEL_VAR: &str = "RUST_LOG";

/// Error returned for missing env vars.
#[derive(Debug, thiserror::Error)]
#[error("Missing env var \"{var_name}\" referenced at config path: {config_path}")]
pub struct MissingEnvVarError {
    pub var_name: String,
    pub config_path: String,
}

/// Snapshot the process environment.
pub fn process_env() -> HashMap<String, String> {
    std::env::vars().collect()
}

/// Load a `.env` file from the working directory, if any, into the process env.
///
/// Variables already set in the environment win over the file.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Failed to load .env file"),
    }
}

/// Substitute `${VAR}` references in a config JSON value tree.
pub fn resolve_env_vars(value: &Value) -> Result<Value> {
    resolve_env_vars_with(value, &process_env())
}

/// Substitute env vars using a provided map.
///
/// Walks the tree recursively; only string leaves are processed. A referenced
/// var that is unset or empty is an error.
pub fn resolve_env_vars_with(value: &Value, env: &HashMap<String, String>) -> Result<Value> {
    substitute_value(value, env, "")
}

fn substitute_value(value: &Value, env: &HashMap<String, String>, path: &str) -> Result<Value> {
    match value {
        Value::String(s) => Ok(Value::String(substitute_string(s, env, path)?)),
        Value::Array(arr) => arr
            .iter()
            .enumerate()
            .map(|(i, v)| substitute_value(v, env, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut result = serde_json::Map::new();
            for (k, v) in map {
                let child_path = if path.is_empty() {
                    k.clone()
                } else {
                    format!("{path}.{k}")
                };
                result.insert(k.clone(), substitute_value(v, env, &child_path)?);
            }
            Ok(Value::Object(result))
        }
        other => Ok(other.clone()),
    }
}

fn substitute_string(s: &str, env: &HashMap<String, String>, path: &str) -> Result<String> {
    if !s.contains('$') {
        return Ok(s.to_string());
    }

    let mut missing: Option<MissingEnvVarError> = None;
    let substituted = ENV_VAR_PATTERN.replace_all(s, |caps: &regex::Captures| {
        let whole = &caps[0];
        let var_name = &caps[1];
        if whole.starts_with("$$") {
            return format!("${{{var_name}}}");
        }
        match env.get(var_name) {
            Some(val) if !val.is_empty() => val.clone(),
            _ => {
                missing.get_or_insert_with(|| MissingEnvVarError {
                    var_name: var_name.to_string(),
                    config_path: path.to_string(),
                });
                String::new()
            }
        }
    });

    if let Some(err) = missing {
        bail!(err);
    }
    Ok(substituted.into_owned())
}

/// Check whether a string contains any env var references.
pub fn contains_env_var_reference(s: &str) -> bool {
    ENV_VAR_PATTERN
        .captures_iter(s)
        .any(|caps| !caps[0].starts_with("$$"))
}

/// Overlay well-known environment variables onto the config.
///
/// Empty values are treated as unset.
pub fn apply_env_overrides(mut config: RelayConfig, env: &HashMap<String, String>) -> RelayConfig {
    let get = |name: &str| env.get(name).filter(|v| !v.is_empty()).cloned();

    {
        let slack = config.slack.get_or_insert_with(SlackConfig::default);
        if let Some(v) = get(SLACK_BOT_TOKEN) {
            slack.bot_token = Some(v);
        }
        if let Some(v) = get(SLACK_SIGNING_SECRET) {
            slack.signing_secret = Some(v);
        }
        if let Some(v) = get(SLACK_WEBHOOK_PATH) {
            slack.webhook_path = Some(v);
        }
    }

    {
        let openai = config.openai.get_or_insert_with(OpenAiConfig::default);
        if let Some(v) = get(OPENAI_API_KEY) {
            openai.api_key = Some(v);
        }
        if let Some(v) = get(OPENAI_MODEL) {
            openai.model = Some(v);
        }
        if let Some(v) = get(OPENAI_BASE_URL) {
            openai.base_url = Some(v);
        }
    }

    {
        let server = config.server.get_or_insert_with(ServerConfig::default);
        if let Some(v) = get(BIND_VAR) {
            server.bind = Some(v);
        }
        match get(PORT_VAR).map(|p| p.parse::<u16>()) {
            Some(Ok(port)) => server.port = Some(port),
            Some(Err(e)) => tracing::warn!(error = %e, "Ignoring invalid {PORT_VAR}"),
            None => {}
        }
    }

    if let Some(v) = get(LOG_LEVEL_VAR) {
        config.logging.get_or_insert_with(LoggingConfig::default).level = Some(v);
    }

    config
}
