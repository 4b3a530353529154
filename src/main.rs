//! GPIO GW - Scratch 2 extension for WebIOPi
//!
//! Serves the Scratch polling protocol and drives Raspberry Pi GPIO pins
//! through the WebIOPi REST service.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gpio_gw::api::{self, ApiState};
use gpio_gw::{AppConfig, Bridge};

/// GPIO Gateway - Drive Raspberry Pi GPIO pins from Scratch through WebIOPi
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "gpio-gw.yaml")]
    config: String,

    /// Port Scratch connects to (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log every request and device reply
    #[arg(short, long)]
    debug: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let config_found = Path::new(&args.config).exists();
    let mut config = AppConfig::load_or_default(&args.config).await?;
    if let Some(port) = args.port {
        config.port = port;
    }
    config.debug |= args.debug;

    let level = if config.debug { "debug" } else { args.log_level.as_str() };
    init_logging(level)?;

    info!("Starting GPIO GW v{}...", env!("CARGO_PKG_VERSION"));
    if config_found {
        info!("Configuration file: {}", args.config);
    } else {
        warn!("Config file {} not found, using defaults", args.config);
    }
    if config.debug {
        info!("Debug mode on");
    }

    info!(
        "Connecting to Raspberry Pi at {}:{} (revision {:?})",
        config.device.host, config.device.port, config.device.revision
    );
    let bridge = Arc::new(Bridge::new(&config.device).context("Failed to create WebIOPi client")?);
    bridge.init().await;

    let state = Arc::new(ApiState {
        bridge,
        port: config.port,
    });

    tokio::select! {
        result = api::start_server(state, config.port) => result?,
        _ = shutdown_signal() => {}
    }

    info!("GPIO GW shutdown complete");
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutdown signal received");
}
