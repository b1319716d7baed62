mod config;
mod setup;
mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use config::Config;
use setup::{ensure_database_directory_from_config, initialize_app};
use telemetry::{init_telemetry, log_config_validation, log_startup_info};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "agent-orchestrator")]
#[command(about = "Multi-agent orchestration server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Port to listen on (overrides config/env)
    #[arg(long)]
    port: Option<u16>,

    /// Listen address to bind (overrides config/env)
    #[arg(long, env = "LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "CONFIG_FILE")]
    config: Option<String>,

    /// SQLite database path (overrides config/env; see DATABASE_PATH)
    #[arg(long, env = "DATABASE_PATH")]
    database_path: Option<String>,

    /// Log level override (see LOG_LEVEL)
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(config_file) => {
            info!(config_file, "loading configuration from file");
            Config::from_file(config_file)?
        }
        None => {
            info!("loading configuration from environment");
            Config::from_env()?
        }
    };

    if let Some(ref database_path) = cli.database_path {
        config.database.path = Some(database_path.clone());
    }
    if let Some(ref listen_addr) = cli.listen_addr {
        config.server.listen_addr = listen_addr.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(ref log_level) = cli.log_level {
        config.logging.level = log_level.clone();
    }

    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let config = load_config(&cli).context("failed to load configuration")?;

    let _telemetry_guard = init_telemetry(&config.logging).context("failed to initialize telemetry")?;

    log_config_validation(&config);
    if let Err(e) = config.validate() {
        error!(error = %e, "configuration validation failed");
        std::process::exit(1);
    }

    log_startup_info(&config);

    ensure_database_directory_from_config(&config)
        .context("failed to create database directory")?;

    let (server, background) = initialize_app(&config)
        .await
        .context("failed to initialize application")?;

    info!(address = %config.server_address(), "agent-orchestrator ready");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            let mut sigterm =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                    .expect("failed to register SIGTERM handler");
            let mut sigint =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt())
                    .expect("failed to register SIGINT handler");

            tokio::select! {
                _ = sigterm.recv() => info!("received SIGTERM, initiating graceful shutdown"),
                _ = sigint.recv() => info!("received SIGINT, initiating graceful shutdown"),
            }
        }

        #[cfg(windows)]
        {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to listen for ctrl+c");
            info!("received Ctrl+C, initiating graceful shutdown");
        }

        let _ = shutdown_tx.send(());
    });

    let server_addr = config.server_address();
    let result = tokio::select! {
        result = server.serve(&server_addr) => result.map_err(|e| anyhow::anyhow!(e.to_string())),
        _ = shutdown_rx => {
            info!("shutdown signal received, stopping server");
            Ok(())
        }
    };

    background.shutdown().await;

    match result {
        Ok(()) => {
            info!("agent-orchestrator shut down cleanly");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "server error");
            std::process::exit(3);
        }
    }
}
