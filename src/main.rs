//! Escrow service entry point
//!
//! Loads configuration, resumes monitoring of transfers that were active
//! when the previous process stopped, and serves Prometheus metrics until
//! interrupted.

use account_escrow::{
    init_tracing, AppConfig, ConfigLoader, EscrowPlatform, LoggingNotifier, RandomProbe,
};
use account_escrow_config::ENV_PREFIX;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (TOML, YAML or JSON); environment variables override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Prefix for environment overrides
    #[arg(long, default_value = ENV_PREFIX)]
    env_prefix: String,
}

fn load_config(args: &Args) -> anyhow::Result<AppConfig> {
    let config = match &args.config {
        Some(path) => ConfigLoader::from_file_with_env(path, &args.env_prefix)?,
        None => ConfigLoader::from_env_with_prefix(&args.env_prefix)?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    init_tracing(&config.logging.level, config.logging.json)?;
    info!(config_file = ?args.config, "Starting account escrow service");

    let platform = EscrowPlatform::builder(config)
        .with_probe(Arc::new(RandomProbe::default()))
        .with_notifier(Arc::new(LoggingNotifier))
        .build()
        .await?;
    platform.start().await?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let metrics_task = platform.metrics_server().map(|server| {
        tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = server.serve_with_shutdown(shutdown).await {
                error!(error = %e, "Metrics server exited");
            }
        })
    });

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    let _ = shutdown_tx.send(());
    if let Some(task) = metrics_task {
        let _ = task.await;
    }

    Ok(())
}
