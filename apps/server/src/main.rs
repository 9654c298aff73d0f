//! Radiocast Server - standalone daemon for Radiocast.
//!
//! Serves the HTTP/WebSocket API for starting radio sessions on local output
//! or on UPnP renderers, and runs until Ctrl+C or SIGTERM.

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use radiocast_core::{bootstrap_services, start_server, AppState};
use tokio::signal;

use crate::config::ServerConfig;

/// Radiocast Server - headless internet radio casting daemon.
#[derive(Parser, Debug)]
#[command(name = "radiocast-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "RADIOCAST_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Bind port (overrides config file).
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Volume step in percent points (overrides config file).
    #[arg(long)]
    volume_step: Option<u8>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Radiocast Server v{}", env!("CARGO_PKG_VERSION"));

    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // CLI flags win over file and environment
    if let Some(port) = args.port {
        config.bind_port = port;
    }
    if let Some(step) = args.volume_step {
        config.volume_step = step;
    }

    log::info!(
        "Configuration: bind_port={}, radios={}, renderers={}",
        config.bind_port,
        config.radios.len(),
        config.renderers.len()
    );

    let core_config = config.to_core_config();
    let services = bootstrap_services(&core_config).context("Failed to bootstrap services")?;
    log::info!("Services bootstrapped successfully");

    let app_state = AppState::new(&services, core_config.preferred_port);
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(app_state).await {
            log::error!("Server error: {}", e);
        }
    });

    shutdown_signal().await;
    log::info!("Shutdown signal received, cleaning up...");

    // Cancels the server's graceful-shutdown token as well
    services.shutdown().await;
    if let Err(e) = server_handle.await {
        log::warn!("Server task ended abnormally: {}", e);
    }

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
