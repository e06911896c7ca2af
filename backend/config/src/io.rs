//! Config file location and loading.

use crate::schema::RelayConfig;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Default config file name within the config directory.
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Resolve the relay config directory.
/// Priority: `SLACKRELAY_CONFIG_DIR` env > `~/.slackrelay/` > `./.slackrelay`
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("SLACKRELAY_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    match dirs::home_dir() {
        Some(home) => home.join(".slackrelay"),
        None => PathBuf::from(".slackrelay"),
    }
}

/// Resolve the full path to the main config file.
pub fn config_file_path(config_dir: &Path) -> PathBuf {
    config_dir.join(CONFIG_FILE_NAME)
}

/// Load and parse the config from disk.
///
/// Returns `Ok(Default::default())` if the file doesn't exist; the relay is
/// normally configured from the environment alone.
pub async fn load_config(path: &Path) -> Result<RelayConfig> {
    if !fs::try_exists(path).await.unwrap_or(false) {
        debug!(path = %path.display(), "Config file does not exist; using environment only");
        return Ok(RelayConfig::default());
    }

    let raw = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&raw)
        .with_context(|| format!("Failed to parse config YAML at: {}", path.display()))?;

    info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Parse a YAML document. An empty document yields the default config.
pub fn parse_config(raw: &str) -> Result<RelayConfig> {
    if raw.trim().is_empty() {
        return Ok(RelayConfig::default());
    }
    Ok(serde_yaml::from_str(raw)?)
}

/// Render a config (usually already redacted) as YAML.
pub fn to_yaml(value: &serde_json::Value) -> Result<String> {
    serde_yaml::to_string(value).context("Failed to serialize config to YAML")
}
