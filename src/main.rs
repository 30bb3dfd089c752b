// =============================================================================
// fxpulse — Main Entry Point
// =============================================================================
//
// Loads configuration once, wires the data source and sinks together and runs
// the refresh scheduler until `max_cycles` is reached or Ctrl+C is pressed.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod error;
mod indicators;
mod market_data;
mod report;
mod runtime_config;
mod scheduler;
mod session;
mod signals;
mod sinks;
mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::market_data::{BarSource, ReplaySource, YahooSource};
use crate::runtime_config::{RuntimeConfig, SinkConfig, SourceConfig};
use crate::scheduler::Scheduler;
use crate::session::SystemClock;
use crate::sinks::{AlertSink, FanoutSink, JsonLinesSink, TableSink};

const DEFAULT_CONFIG_PATH: &str = "fxpulse.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & logging ─────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "fxpulse starting up");

    // ── 2. Configuration ─────────────────────────────────────────────────
    let config = load_config()?;

    info!(
        instruments = ?config.instruments,
        interval = %config.interval,
        lookback = config.lookback,
        cycle_secs = config.cycle_interval_secs,
        "Configured instruments"
    );

    // ── 3. Collaborators ─────────────────────────────────────────────────
    let source = build_source(&config.source)?;
    let sink = build_sinks(&config.sinks);
    if sink.is_empty() {
        warn!("No sinks enabled; signals will only appear in debug logs");
    }

    let mut scheduler = Scheduler::new(config, source, Box::new(sink), Arc::new(SystemClock))
        .context("invalid configuration")?;

    // ── 4. Run until done or interrupted ─────────────────────────────────
    let (trigger, shutdown) = scheduler::shutdown_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Shutdown signal received, stopping after the current instrument");
            trigger.trigger();
        }
    });

    let stats = scheduler.run(shutdown).await;

    info!(
        run_id = scheduler.run_id(),
        cycles = stats.cycles,
        reports = stats.reports,
        "fxpulse shut down complete"
    );
    Ok(())
}

/// Read the JSON config (path from `FXPULSE_CONFIG`), apply environment
/// overrides and validate.  A missing file falls back to defaults; an
/// unreadable or invalid one is fatal.
fn load_config() -> anyhow::Result<RuntimeConfig> {
    let path = std::env::var("FXPULSE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let mut config = if Path::new(&path).exists() {
        RuntimeConfig::load(&path)?
    } else {
        warn!(path = %path, "Config file not found, using defaults");
        RuntimeConfig::default()
    };

    config
        .apply_overrides(|key| std::env::var(key).ok())
        .context("invalid environment override")?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn build_source(config: &SourceConfig) -> anyhow::Result<Box<dyn BarSource>> {
    let source: Box<dyn BarSource> = match config {
        SourceConfig::Yahoo {
            base_url,
            timeout_secs,
            max_retries,
        } => Box::new(YahooSource::new(base_url.clone(), *timeout_secs, *max_retries)?),
        SourceConfig::Replay { path, warmup } => Box::new(ReplaySource::load(path, *warmup)?),
    };
    info!(source = source.name(), "Data source ready");
    Ok(source)
}

fn build_sinks(config: &SinkConfig) -> FanoutSink {
    let mut sink = FanoutSink::new();
    if config.table {
        sink = sink.with(TableSink::new());
    }
    if config.json_lines {
        sink = sink.with(JsonLinesSink::stdout());
    }
    if config.alerts {
        sink = sink.with(AlertSink::new());
    }
    sink
}
