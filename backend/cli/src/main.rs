mod api;
mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use slackrelay_channels::EventRegistry;
use slackrelay_config::{ResolvedConfig, ValidationReport};
use slackrelay_core::RelayError;

use api::AppState;

#[derive(Parser)]
#[command(name = "slackrelay")]
#[command(about = "Slack Events API relay that answers mentions and DMs with a language model")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
        /// Config file (default: ~/.slackrelay/config.yaml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Query a running server's health endpoint
    Status {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print the resolved configuration with secrets redacted
    Config {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, config } => {
            let (mut resolved, report) = config::load(config.as_deref()).await?;
            if let Some(port) = port {
                resolved.port = port;
            }
            run_server(resolved, report).await?;
        }
        Commands::Status { port } => {
            let (resolved, _) = config::load(None).await?;
            let port = port.unwrap_or(resolved.port);
            let client = reqwest::Client::new();
            match client
                .get(format!("http://localhost:{port}/api/health"))
                .send()
                .await
            {
                Ok(resp) => {
                    let body: serde_json::Value = resp.json().await?;
                    println!("{}", serde_json::to_string_pretty(&body)?);
                }
                Err(_) => {
                    println!("slackrelay is not running on port {port}");
                }
            }
        }
        Commands::Config { config } => {
            let (resolved, report) = config::load(config.as_deref()).await?;
            let value = serde_json::to_value(&resolved)?;
            print!("{}", slackrelay_config::to_yaml(&slackrelay_config::redact(&value))?);
            for warning in &report.warnings {
                println!("# warning: {warning}");
            }
            for err in &report.errors {
                println!("# error: {err}");
            }
        }
    }

    Ok(())
}

async fn run_server(config: ResolvedConfig, report: ValidationReport) -> Result<()> {
    let _log_guard = slackrelay_logging::init_logger(&config.log_dir, &config.log_level)?;

    for warning in &report.warnings {
        warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    if !report.is_valid() {
        for err in &report.errors {
            error!(path = %err.path, message = %err.message, "Config error");
        }
        return Err(RelayError::ConfigError(format!(
            "{} configuration error(s); see `slackrelay config`",
            report.errors.len()
        ))
        .into());
    }

    info!(
        port = config.port,
        bind = %config.bind,
        model = %config.model,
        webhook = %config.webhook_path,
        "Starting slackrelay"
    );

    let registry = Arc::new(EventRegistry::with_capacity(config.dedup_max_entries));
    let slack = api::build_slack_adapter(&config, Arc::clone(&registry));
    let state = Arc::new(AppState { registry });
    let app = api::build_router(state, &[&slack]);

    let addr = format!("{}:{}", config.bind, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(addr = %addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
