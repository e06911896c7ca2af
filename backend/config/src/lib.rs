//! `slackrelay-config`: relay runtime configuration.
//!
//! Provides:
//! - Typed config schema (server, Slack, completion service, dedup, logging)
//! - Optional YAML file plus `.env` loading
//! - `${ENV_VAR}` substitution and well-known env var overrides
//! - Default value application
//! - Validation with path-tagged errors
//! - Redaction for safe display

pub mod defaults;
pub mod env;
pub mod io;
pub mod redact;
pub mod schema;
pub mod validation;

pub use defaults::{apply_all_defaults, ResolvedConfig};
pub use env::{
    apply_env_overrides, contains_env_var_reference, load_dotenv, resolve_env_vars,
    resolve_env_vars_with, MissingEnvVarError,
};
pub use io::{config_dir, config_file_path, load_config, parse_config, to_yaml};
pub use redact::{collect_redacted_paths, redact};
pub use schema::RelayConfig;
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Load, substitute env vars, overlay env overrides, and apply defaults.
///
/// This is the main entry point for loading a config at runtime. The
/// validation report is returned alongside so callers decide how fatal errors are.
pub async fn load_and_prepare(path: &Path) -> Result<(ResolvedConfig, ValidationReport)> {
    let raw_config = load_config(path).await?;
    prepare(raw_config, &env::process_env())
}

/// The pure half of [`load_and_prepare`], driven by an explicit env map.
pub fn prepare(
    raw_config: RelayConfig,
    env: &HashMap<String, String>,
) -> Result<(ResolvedConfig, ValidationReport)> {
    let value: Value =
        serde_json::to_value(&raw_config).context("Failed to serialize config for processing")?;
    let value = resolve_env_vars_with(&value, env).context("Failed to resolve env vars in config")?;
    let config: RelayConfig =
        serde_json::from_value(value).context("Failed to deserialize config after processing")?;

    let config = apply_env_overrides(config, env);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }

    Ok((apply_all_defaults(config), report))
}
