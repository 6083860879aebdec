//! Price-relay bot - entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Relays item price changes from the upstream stream to webhook destinations.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via RELAY_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    relay_ws::init_crypto();

    let args = Args::parse();

    relay_telemetry::init_logging()?;

    info!("Starting price-relay bot v{}", env!("CARGO_PKG_VERSION"));

    // Determine config path: CLI arg > RELAY_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("RELAY_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");

    let config = relay_bot::AppConfig::from_file(&config_path)?;
    info!(
        destinations = config.webhook_urls.len(),
        ws_url = %config.ws_url,
        "Configuration loaded"
    );

    let app = relay_bot::Application::new(config)?;
    app.run().await?;

    Ok(())
}
