//! # pulse-runner
//!
//! Entry point for the crypto dashboard feed.
//!
//! Loads an optional JSON configuration file, builds the Finnhub client and
//! runs the feed either once or until Ctrl+C.
//!
//! # Usage
//!
//! ```bash
//! FINNHUB_API_KEY=... pulse-runner --once
//! FINNHUB_API_KEY=... pulse-runner -c feed.json -o /var/www/crypto.json --log-level debug
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use pulse_core::config::AppConfig;
use pulse_md::finnhub::FinnhubClient;
use pulse_md::Feed;
use tokio::sync::watch;
use tracing::{error, info};

/// Crypto dashboard feed: 24h summaries, live trades and headlines into one JSON file.
#[derive(Parser)]
#[command(name = "pulse-runner", about = "Crypto dashboard market data feed")]
struct Cli {
    /// Fetch once, publish once and exit.
    #[arg(long)]
    once: bool,

    /// Configuration file path (JSON). Defaults apply without one.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the output path from the config.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Optional log directory for file output.
    #[arg(long)]
    log_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // 1. Initialize logging
    pulse_core::logging::init_logging(&cli.log_level, cli.log_dir.as_deref(), "pulse-runner");

    // 2. Load configuration
    let mut config = match cli.config {
        Some(ref path) => {
            info!("loading config from {}", path.display());
            pulse_core::config::load_config(path)?
        }
        None => AppConfig::default(),
    };
    if let Some(output) = cli.output {
        config.output_path = output;
    }
    config.validate()?;

    info!(
        "pulse-runner starting — mode={}, symbols={}, output={}",
        if cli.once { "once" } else { "continuous" },
        config.symbols.len(),
        config.output_path.display(),
    );

    // 3. Credentials and provider
    let api_key = config.provider.api_key_from_env();
    if api_key.is_none() {
        error!("{} is not set — provider requests will be rejected", config.provider.api_key_env);
    }
    let client = FinnhubClient::new(config.provider.rest_url.clone(), api_key.clone(), config.provider.request_timeout())?;
    let feed = Feed::new(config, Arc::new(client), api_key);

    // 4. Run
    if cli.once {
        let summary = feed.run_once().await;
        info!("one-shot run done — {summary:?}");
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(forward_shutdown(tokio::signal::ctrl_c(), shutdown_tx));

    let summary = feed.run_continuous(shutdown_rx).await;
    info!("feed stopped — {summary:?}");
    Ok(())
}

/// Flip `shutdown` once `signal` fires.
///
/// If the signal handler cannot be installed the feed keeps running until the
/// process is killed.
async fn forward_shutdown(signal: impl Future<Output = std::io::Result<()>>, shutdown: watch::Sender<bool>) {
    if let Err(e) = signal.await {
        error!("failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
    let _ = shutdown.send(true);
}
