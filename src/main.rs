//! Impressions API - geofence time attribution service
//!
//! Attributes advertising impressions to vehicle routes from the time each
//! route spends inside a campaign's rectangular geofence.
//!
//! Module structure:
//! - `domain/` - Value types, geometry, typed errors
//! - `services/` - Attribution pipeline (pure, synchronous)
//! - `io/` - HTTP API, wire parsing, report output
//! - `infra/` - Config, Metrics

use clap::Parser;
use geofence_impressions::infra::{Config, Metrics};
use geofence_impressions::io::ApiContext;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// Impressions API - geofence impression attribution service
#[derive(Parser, Debug)]
#[command(name = "impressions-api", version, about)]
struct Args {
    /// Path to TOML configuration file (falls back to CONFIG_FILE, then config/dev.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Override the listening port from config
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for per-request detail
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(
        version = %env!("CARGO_PKG_VERSION"),
        git = %env!("GIT_HASH"),
        "impressions-api starting"
    );

    let args = Args::parse();

    let config_path = args.config.unwrap_or_else(Config::resolve_config_path);
    let mut config = Config::load_from_path(&config_path);
    if let Some(port) = args.port {
        config = config.with_port(port);
    }

    info!(
        config_file = %config.config_file(),
        bind_address = %config.bind_address(),
        port = %config.port(),
        max_body_bytes = %config.max_body_bytes(),
        return_intervals_default = %config.return_intervals_default(),
        metrics_enabled = %config.metrics_enabled(),
        "config_loaded"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let metrics = Arc::new(Metrics::new());

    // Periodic metrics log line
    if config.metrics_enabled() && config.metrics_interval_secs() > 0 {
        let metrics_clone = metrics.clone();
        let metrics_interval = config.metrics_interval_secs();
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
            // First tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                metrics_clone.report().log();
            }
        });
    }

    // Handle shutdown on Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    let ctx = Arc::new(ApiContext::new(config, metrics));
    geofence_impressions::io::start_server(ctx, shutdown_rx).await?;

    info!("impressions-api shutdown complete");
    Ok(())
}
