//! Main entry point for mint-pulse
//!
//! Runs the discovery and collection loops and the rate dashboard, together
//! or one at a time.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use mint_pulse::config::{TrackerConfig, CONFIG_FILE_PATH};
use mint_pulse::tracker::dashboard;
use mint_pulse::tracker::{Poller, TickOutcome, TrackerBuilder};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn, Level};

#[derive(Debug, Parser)]
#[command(name = "mint-pulse", version, about = "Track how fast new mints gain holders")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = CONFIG_FILE_PATH)]
    config: PathBuf,

    /// Override the configured log level
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run discovery, collection and the dashboard
    Run,
    /// Run the mint discovery loop only
    Discover {
        /// Run a single poll and exit
        #[arg(long)]
        once: bool,
    },
    /// Run the holder snapshot loop only
    Collect {
        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },
    /// Serve the dashboard only
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let file_config = TrackerConfig::read_file(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    // Initialize logging
    let level_name = cli
        .log_level
        .as_deref()
        .or(file_config.as_ref().map(|c| c.log_level.as_str()))
        .unwrap_or("info");
    let level = Level::from_str(level_name).unwrap_or(Level::INFO);
    tracing_subscriber::fmt().with_max_level(level).init();

    let config = match file_config {
        Some(config) => config,
        None => {
            warn!("Config file '{}' not found, using default values", cli.config.display());
            TrackerConfig::default()
        }
    }
    .finalize()
    .context("Invalid configuration")?;

    info!("Starting mint-pulse ({:?})", cli.command);

    let tracker = TrackerBuilder::from_config(config)
        .build()
        .context("Failed to build tracker")?;

    let (run_discovery, run_collector, run_dashboard) = match cli.command {
        Command::Discover { once: true } => return run_once(tracker.discovery_poller()).await,
        Command::Collect { once: true } => return run_once(tracker.collector_poller()).await,
        Command::Run => (true, true, true),
        Command::Discover { once: false } => (true, false, false),
        Command::Collect { once: false } => (false, true, false),
        Command::Serve => (false, false, true),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut handles: Vec<JoinHandle<()>> = Vec::new();

    if run_discovery {
        let poller = Arc::new(tracker.discovery_poller());
        handles.push(tokio::spawn(poller.run(shutdown_rx.clone())));
    }

    if run_collector {
        let poller = Arc::new(tracker.collector_poller());
        handles.push(tokio::spawn(poller.run(shutdown_rx.clone())));
    }

    if run_dashboard {
        let addr = tracker.config.dashboard.listen_addr.clone();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind dashboard to {}", addr))?;
        let state = tracker.dashboard.clone();
        let mut rx = shutdown_rx.clone();

        handles.push(tokio::spawn(async move {
            let shutdown = async move {
                let _ = rx.changed().await;
            };
            if let Err(e) = dashboard::serve(listener, state, shutdown).await {
                error!("Dashboard server failed: {}", e);
            }
        }));
    }

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;
    info!("Shutdown requested, stopping loops");
    shutdown_tx.send(true).context("Failed to signal shutdown")?;

    for handle in handles {
        if let Err(e) = handle.await {
            error!("Task ended abnormally: {}", e);
        }
    }

    info!("mint-pulse stopped");
    Ok(())
}

/// Run a single iteration of a loop, for cron-style use.
async fn run_once(poller: Poller) -> Result<()> {
    match poller.tick().await {
        TickOutcome::Completed => Ok(()),
        outcome => bail!("{} iteration did not complete: {:?}", poller.name(), outcome),
    }
}
