//! Hivewatch Binary Entry Point
//!
//! Runs the snapshot agent until interrupted.
//! Core functionality is provided by the `hivewatch` library crate.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use hivewatch::{
    agent,
    config::{AppConfig, parse_interval},
    server::{self, AppState},
};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Hivewatch - Registry Snapshot Agent
#[derive(Parser, Debug)]
#[command(name = "hivewatch", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        default_value = "configs/agent.yaml",
        env = "HIVEWATCH_CONFIG"
    )]
    config: String,

    /// Sweep interval, e.g. "6h" (overrides config file)
    #[arg(long, env = "HIVEWATCH_INTERVAL")]
    interval: Option<String>,

    /// Local log file (overrides config file)
    #[arg(long, env = "HIVEWATCH_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Run a single sweep and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,hivewatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Hivewatch - Registry Snapshot Agent");

    let cli = Cli::parse();

    tracing::info!("Loading configuration from: {}", cli.config);
    let mut config = AppConfig::load(&cli.config)?;

    // Apply CLI/env overrides (CLI > ENV > config file)
    if let Some(ref interval) = cli.interval {
        config.interval = parse_interval(interval)?;
    }
    if let Some(log_file) = cli.log_file {
        config.log_file = log_file;
    }

    let scheduler = match agent::start(&config) {
        Ok(scheduler) => scheduler,
        Err(e) => {
            tracing::error!("Failed to start agent: {}", e);
            return Err(e.into());
        }
    };

    if cli.once {
        let mut scheduler = scheduler;
        let report = scheduler.sweep().await;
        tracing::info!(
            "Single sweep finished: {} attempted, {} pushed, {} skipped, {} push failures",
            report.attempted,
            report.pushed,
            report.skipped,
            report.push_failed
        );
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = match config.server {
        Some(ref server_config) => {
            let addr: SocketAddr =
                format!("{}:{}", server_config.bind, server_config.port).parse()?;
            let state = AppState {
                status: scheduler.status(),
            };
            let rx = shutdown_rx.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = server::serve(addr, state, rx).await {
                    tracing::error!("Health server failed: {}", e);
                }
            }))
        }
        None => None,
    };

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    tracing::info!("Press Ctrl+C to shutdown");
    scheduler.run(shutdown_rx).await;

    if let Some(server) = server
        && let Err(e) = server.await
    {
        tracing::error!("Health server task panicked: {}", e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal");
        }
    }
}
