//! Config loading for the binary: `.env`, optional YAML file, env overrides.

use std::path::{Path, PathBuf};

use anyhow::Result;
use slackrelay_config::{ResolvedConfig, ValidationReport};

/// Explicit `--config` path, or `<config dir>/config.yaml`.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    match explicit {
        Some(path) => path.to_path_buf(),
        None => slackrelay_config::config_file_path(&slackrelay_config::config_dir()),
    }
}

/// Load configuration with `.env` applied first.
pub async fn load(explicit: Option<&Path>) -> Result<(ResolvedConfig, ValidationReport)> {
    slackrelay_config::load_dotenv();
    let path = resolve_config_path(explicit);
    slackrelay_config::load_and_prepare(&path).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_path_wins() {
        let path = resolve_config_path(Some(Path::new("/tmp/relay.yaml")));
        assert_eq!(path, PathBuf::from("/tmp/relay.yaml"));
    }

    #[test]
    fn default_path_is_config_yaml() {
        let path = resolve_config_path(None);
        assert!(path.ends_with("config.yaml"));
    }
}
