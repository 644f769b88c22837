//! cycle-twin: cycle-time digital twin daemon.
//!
//! Connects to a JSON-lines broker, turns `top`/`base` transitions into
//! cycles and publishes `twin/state` telemetry until interrupted.
//!
//! Run: `cycle-twin --url 127.0.0.1:3000`

use anyhow::{Context, Result};
use clap::Parser;
use cycle_twin::twin::{App, Config, Recorder, TcpTransport};
use std::path::PathBuf;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// cycle-twin: cycle-time digital twin
#[derive(Parser, Debug)]
#[command(name = "cycle-twin")]
#[command(version)]
#[command(about = "Cycle-time digital twin for reciprocating machines", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Broker address (host:port), overrides config and TWIN_URL
    #[arg(short, long)]
    url: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Append every inbound and outbound message to this JSON-lines file
    #[arg(long)]
    record: Option<PathBuf>,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match (&cli.config, Config::default_path()) {
        (Some(path), _) => {
            Config::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        (None, Some(path)) => Config::load_or_default(path),
        (None, None) => Config::new(),
    };

    config.apply_env(std::env::vars())?;

    if let Some(url) = &cli.url {
        config.transport.url.clone_from(url);
    }
    if let Some(path) = &cli.record {
        config.record_path = Some(path.clone());
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let config = load_config(&cli)?;
    info!(
        url = %config.transport.url,
        ideal_cycle_ms = config.ideal_ms(),
        tolerance_ms = config.cycle.tolerance_ms,
        window_n = config.cycle.window_n,
        "cycle-twin starting"
    );

    let mut app = App::new(&config);
    if let Some(path) = &config.record_path {
        app = app.with_recorder(Recorder::open(path)?);
        info!(path = %path.display(), "recording messages");
    }

    let url = config.transport.url.clone();
    let policy = config.reconnect_policy();

    tokio::select! {
        result = app.run(|| TcpTransport::connect(url.clone()), policy) => {
            if let Err(e) = &result {
                warn!(error = %e, "twin stopped");
            }
            result?;
        }
        _ = signal::ctrl_c() => info!("Received Ctrl+C"),
    }

    let counters = app.counters();
    info!(
        received = counters.received,
        accepted = counters.accepted,
        rejected = counters.rejected,
        out_of_spec = counters.out_of_spec,
        heartbeats = counters.heartbeats,
        "cycle-twin stopped"
    );
    Ok(())
}
