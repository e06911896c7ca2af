//! Config redaction: safe-to-print config snapshots with secrets masked.

use serde_json::Value;

/// Exact key names that always hold secrets.
static SECRET_KEYS: &[&str] = &["token", "secret", "password", "apiKey", "api_key"];

/// Key suffixes (case-insensitive) that mark a secret, e.g. `botToken`, `slackSigningSecret`.
static SECRET_SUFFIXES: &[&str] = &["token", "secret", "apikey", "api_key", "password"];

/// Redact a config JSON value, masking every sensitive string.
///
/// Keeps the first four characters as a hint (`xoxb***`), enough to tell
/// token kinds apart without leaking them.
pub fn redact(value: &Value) -> Value {
    redact_recursive(value, "")
}

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SECRET_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key))
        || SECRET_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

fn mask(s: &str) -> String {
    if s.chars().count() > 8 {
        format!("{}***", s.chars().take(4).collect::<String>())
    } else {
        "***".to_string()
    }
}

fn redact_recursive(value: &Value, key: &str) -> Value {
    match value {
        Value::String(s) if !s.is_empty() && is_sensitive_key(key) => Value::String(mask(s)),
        Value::Array(arr) => Value::Array(arr.iter().map(|v| redact_recursive(v, key)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), redact_recursive(v, k)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Collect all field paths that [`redact`] would mask.
pub fn collect_redacted_paths(value: &Value) -> Vec<String> {
    let mut paths = Vec::new();
    collect_paths_recursive(value, "", "", &mut paths);
    paths
}

fn collect_paths_recursive(value: &Value, key: &str, path: &str, out: &mut Vec<String>) {
    match value {
        Value::String(s) if !s.is_empty() && is_sensitive_key(key) => out.push(path.to_string()),
        Value::Array(arr) => {
            for (i, v) in arr.iter().enumerate() {
                collect_paths_recursive(v, key, &format!("{path}[{i}]"), out);
            }
        }
        Value::Object(map) => {
            for (k, v) in map {
                let child_path = if path.is_empty() {
                    k.clone()
                } else {
                    format!("{path}.{k}")
                };
                collect_paths_recursive(v, k, &child_path, out);
            }
        }
        _ => {}
    }
}
