//! Config validation with path-tagged, user-facing messages.

use crate::schema::RelayConfig;
use thiserror::Error;

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &RelayConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_slack(config, &mut report);
    validate_openai(config, &mut report);
    validate_server(config, &mut report);
    validate_dedup(config, &mut report);
    report
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(|v| v.trim().is_empty()).unwrap_or(true)
}

fn validate_slack(config: &RelayConfig, report: &mut ValidationReport) {
    let slack = config.slack();
    if is_blank(slack.bot_token.as_deref()) {
        report.error("slack.botToken", "Slack bot token is required (SLACK_BOT_TOKEN)");
    } else if slack.bot_token.as_deref().is_some_and(|t| !t.starts_with("xoxb-")) {
        report.warn("slack.botToken", "Bot tokens normally start with 'xoxb-'");
    }
    if is_blank(slack.signing_secret.as_deref()) {
        report.error(
            "slack.signingSecret",
            "Slack signing secret is required (SLACK_SIGNING_SECRET)",
        );
    }
    if let Some(path) = &slack.webhook_path {
        if !path.starts_with('/') {
            report.error("slack.webhookPath", format!("Webhook path '{path}' must start with '/'"));
        }
    }
    if slack.timestamp_tolerance_secs == Some(0) {
        report.error("slack.timestampToleranceSecs", "Tolerance must be > 0");
    }
}

fn validate_openai(config: &RelayConfig, report: &mut ValidationReport) {
    let openai = config.openai();
    if is_blank(openai.api_key.as_deref()) {
        report.error("openai.apiKey", "Completion API key is required (OPENAI_API_KEY)");
    }
    if openai.model.as_deref().is_some_and(|m| m.trim().is_empty()) {
        report.error("openai.model", "Model id cannot be empty");
    }
    if let Some(t) = openai.temperature {
        if !(0.0..=2.0).contains(&t) {
            report.error("openai.temperature", format!("Temperature {t} is outside 0.0..=2.0"));
        }
    }
    if openai.max_tokens == Some(0) {
        report.error("openai.maxTokens", "maxTokens must be >= 1");
    }
}

fn validate_server(config: &RelayConfig, report: &mut ValidationReport) {
    if let Some(port) = config.server().port {
        if port == 0 {
            report.error("server.port", "Port must be > 0");
        } else if port < 1024 && port != 80 && port != 443 {
            report.warn(
                "server.port",
                format!("Port {port} requires elevated privileges; consider using a port >= 1024"),
            );
        }
    }
}

fn validate_dedup(config: &RelayConfig, report: &mut ValidationReport) {
    match config.dedup_max_entries() {
        Some(0) => report.error("dedup.maxEntries", "maxEntries must be >= 1 when set"),
        None => report.warn(
            "dedup.maxEntries",
            "Processed-event registry is unbounded and grows for the life of the process",
        ),
        Some(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{DedupConfig, OpenAiConfig, ServerConfig, SlackConfig};

    fn complete() -> RelayConfig {
        RelayConfig {
            slack: Some(SlackConfig {
                bot_token: Some("xoxb-1".into()),
                signing_secret: Some("s".into()),
                ..Default::default()
            }),
            openai: Some(OpenAiConfig {
                api_key: Some("sk-1".into()),
                ..Default::default()
            }),
            dedup: Some(DedupConfig { max_entries: Some(1000) }),
            ..Default::default()
        }
    }

    #[test]
    fn complete_config_is_clean() {
        let report = validate(&complete());
        assert!(report.is_valid(), "errors: {:?}", report.errors);
        assert!(report.warnings.is_empty(), "warnings: {:?}", report.warnings);
    }

    #[test]
    fn unbounded_registry_is_a_warning() {
        let mut cfg = complete();
        cfg.dedup = None;
        let report = validate(&cfg);
        assert!(report.is_valid());
        assert_eq!(report.warnings[0].path, "dedup.maxEntries");
    }

    #[test]
    fn relative_webhook_path_is_error() {
        let mut cfg = complete();
        cfg.slack.as_mut().unwrap().webhook_path = Some("slack/events".into());
        let report = validate(&cfg);
        assert!(report.errors.iter().any(|e| e.path == "slack.webhookPath"));
    }

    #[test]
    fn zero_port_is_error() {
        let mut cfg = complete();
        cfg.server = Some(ServerConfig { bind: None, port: Some(0) });
        assert!(!validate(&cfg).is_valid());
    }

    #[test]
    fn out_of_range_temperature_is_error() {
        let mut cfg = complete();
        cfg.openai.as_mut().unwrap().temperature = Some(3.5);
        let report = validate(&cfg);
        assert!(report.errors.iter().any(|e| e.path == "openai.temperature"));
    }
}
