//! Sensorcast Server
//!
//! Run with: cargo run --bin sensorcast
//!
//! # Configuration
//!
//! Read from `--config`, or the first of
//! `~/.config/sensorcast/config.toml`, `/etc/sensorcast/config.toml`,
//! `./config.toml`. Environment variables override file values:
//! - `SENSORCAST_DATA_DIR`: Data directory
//! - `SENSORCAST_HOST` / `SENSORCAST_PORT` (or `PORT`): Bind address
//! - `SENSORCAST_STATIC_DIR`: Serve a dashboard from this directory
//! - `DISCORD_WEBHOOK_URL`: Enables temperature alerts
//! - `SENSORCAST_ALERT_THRESHOLD`: Alert threshold in °C (default: 30)
//! - `RUST_LOG`: Log filter (default: sensorcast=info)

use anyhow::Context;
use clap::Parser;
use sensorcast::alert::AlertNotifier;
use sensorcast::api::{serve, AppState};
use sensorcast::config::{generate_default_config, Config};
use sensorcast::logging;
use sensorcast::storage::ReadingStore;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sensorcast")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Sensor reading ingestion server with live WebSocket updates")]
struct Args {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Print a default config file and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.print_config {
        print!("{}", generate_default_config());
        return Ok(());
    }

    let (mut config, source) = Config::resolve(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.api.host = host;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }
    if let Some(data_dir) = args.data_dir {
        config.storage.data_dir = data_dir;
    }

    logging::init(&config.logging).context("Failed to initialize logging")?;

    tracing::info!("Starting Sensorcast v{}", env!("CARGO_PKG_VERSION"));
    for rejected in &config.rejected_overrides {
        tracing::warn!(key = rejected.key, value = %rejected.value, "Ignoring invalid override");
    }
    match &source {
        Some(path) => tracing::info!("Loaded config from {:?}", path),
        None => tracing::info!("Using default config with environment overrides"),
    }
    tracing::info!("Data directory: {:?}", config.storage.data_dir);

    let store = ReadingStore::open(&config.storage).context("Failed to open reading store")?;

    let notifier =
        AlertNotifier::from_config(&config.alert).context("Failed to set up alert channel")?;
    if notifier.is_enabled() {
        tracing::info!(
            threshold = notifier.threshold(),
            "Temperature alerts enabled"
        );
    } else {
        tracing::info!("Temperature alerts disabled (set DISCORD_WEBHOOK_URL to enable)");
    }

    let state = AppState::start(store, config.hub.clone(), notifier, config.api.clone());
    serve(state, &config.api).await?;

    tracing::info!("Sensorcast stopped");
    Ok(())
}
