//! Log Redaction Layer
//!
//! Scrubs API keys, Slack tokens, and bearer credentials from strings prior to logging.

use regex::Regex;
use std::sync::LazyLock;

static API_KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(sk-[A-Za-z0-9_\-]{16,})|(Bearer\s+[A-Za-z0-9\-\._~+/]+=*)").unwrap()
});
static SLACK_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"xox[abposr]-[A-Za-z0-9\-]+").unwrap());

/// Redacts sensitive patterns in a string.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = API_KEY_RE.replace_all(input, "[REDACTED_TOKEN]");
    SLACK_TOKEN_RE
        .replace_all(&redacted, "[REDACTED_TOKEN]")
        .into_owned()
}
