// =============================================================================
// Refresh Scheduler — fetch → compute → classify → emit → idle, per cycle
// =============================================================================
//
// The scheduler is the only stateful, long-running component.  It owns every
// instrument's `BarSeries` outright; fetches fan out with bounded concurrency
// but their results are merged one by one on the scheduler task, so no other
// task ever touches a series.
//
// Cycle:
//   1. Consult the session clock (optionally skip the cycle when closed).
//   2. Fetch all instruments, at most `max_concurrent_fetches` in flight.
//   3. For each result, in instrument order: merge, compute the indicator
//      snapshot, classify, emit.  A failed or empty fetch emits NO_DATA for
//      that instrument only.
//   4. Hand the whole cycle to the sink, then idle for the cycle interval.
//
// Shutdown is observed between instruments and during the idle wait.  A
// series is either fully merged or untouched.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{ConfigError, FetchError};
use crate::indicators::IndicatorSnapshot;
use crate::market_data::{Bar, BarSeries, BarSource};
use crate::report::{CycleSummary, SignalReport};
use crate::runtime_config::RuntimeConfig;
use crate::session::{canonical_session, Clock, Session};
use crate::signals::classify;
use crate::sinks::SignalSink;
use crate::types::Signal;

// =============================================================================
// Shutdown signal
// =============================================================================

/// Requests a clean stop of the scheduler.
#[derive(Debug)]
pub struct ShutdownTrigger(watch::Sender<bool>);

impl ShutdownTrigger {
    pub fn trigger(&self) {
        // Only fails when every receiver is gone, i.e. nobody is listening.
        let _ = self.0.send(true);
    }
}

/// Receiving side of the shutdown signal, held by the scheduler.
#[derive(Debug, Clone)]
pub struct Shutdown(watch::Receiver<bool>);

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once shutdown has been requested.  If the trigger is dropped
    /// without firing, this never resolves.
    pub async fn wait(&mut self) {
        while !*self.0.borrow_and_update() {
            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger(tx), Shutdown(rx))
}

// =============================================================================
// Scheduler
// =============================================================================

/// Totals for one scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub cycles: u64,
    pub reports: u64,
    pub interrupted: bool,
}

pub struct Scheduler {
    config: RuntimeConfig,
    source: Box<dyn BarSource>,
    sink: Box<dyn SignalSink>,
    clock: Arc<dyn Clock>,
    series: HashMap<String, BarSeries>,
    run_id: String,
}

impl Scheduler {
    /// Build a scheduler.  The configuration is validated here so an invalid
    /// parameter fails before the first fetch.
    pub fn new(
        config: RuntimeConfig,
        source: Box<dyn BarSource>,
        sink: Box<dyn SignalSink>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            source,
            sink,
            clock,
            series: HashMap::new(),
            run_id: uuid::Uuid::new_v4().to_string(),
        })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Retained series for `instrument`, if any fetch has succeeded yet.
    #[cfg(test)]
    pub fn series(&self, instrument: &str) -> Option<&BarSeries> {
        self.series.get(instrument)
    }

    /// Run cycles until `max_cycles` is reached or shutdown is requested.
    pub async fn run(&mut self, mut shutdown: Shutdown) -> RunStats {
        let cycle_interval = Duration::from_secs(self.config.cycle_interval_secs);
        let mut stats = RunStats::default();

        info!(
            run_id = %self.run_id,
            source = self.source.name(),
            sink = self.sink.name(),
            instruments = self.config.instruments.len(),
            interval = %self.config.interval,
            cycle_secs = self.config.cycle_interval_secs,
            max_cycles = ?self.config.max_cycles,
            "scheduler starting"
        );

        loop {
            if shutdown.is_triggered() {
                stats.interrupted = true;
                break;
            }

            let cycle = stats.cycles + 1;
            let summary = self.run_cycle(cycle, &mut shutdown).await;
            stats.cycles = cycle;
            stats.reports += summary.signals.values().sum::<usize>() as u64;

            if summary.interrupted {
                stats.interrupted = true;
                break;
            }
            if self.config.max_cycles.is_some_and(|max| cycle >= max) {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(cycle_interval) => {}
                _ = shutdown.wait() => {
                    stats.interrupted = true;
                    break;
                }
            }
        }

        info!(
            run_id = %self.run_id,
            cycles = stats.cycles,
            reports = stats.reports,
            interrupted = stats.interrupted,
            "scheduler stopped"
        );
        stats
    }

    /// Run one full cycle and return its summary.
    pub async fn run_cycle(&mut self, cycle: u64, shutdown: &mut Shutdown) -> CycleSummary {
        let started_at = self.clock.now();
        let session = canonical_session(started_at);
        let interval = self.config.interval;
        let mut reports = Vec::with_capacity(self.config.instruments.len());
        let mut interrupted = false;

        if self.config.skip_out_of_hours && session == Session::OutOfHours {
            debug!(cycle, "session closed, skipping fetches");
            for instrument in &self.config.instruments {
                let report = SignalReport::no_data(
                    cycle,
                    instrument,
                    interval,
                    "SessionClosed",
                    "market session closed",
                    started_at,
                );
                emit(self.sink.as_ref(), &report).await;
                reports.push(report);
            }
        } else {
            let source = self.source.as_ref();
            let lookback = self.config.lookback;
            let mut fetches = futures_util::stream::iter(self.config.instruments.iter().cloned())
                .map(move |instrument| async move {
                    let result = source.fetch(&instrument, interval, lookback).await;
                    (instrument, result)
                })
                .buffered(self.config.max_concurrent_fetches);

            loop {
                let next = tokio::select! {
                    biased;
                    _ = shutdown.wait() => {
                        interrupted = true;
                        break;
                    }
                    next = fetches.next() => next,
                };
                let Some((instrument, result)) = next else {
                    break;
                };
                // A fetch that completed alongside the shutdown request is dropped.
                if shutdown.is_triggered() {
                    interrupted = true;
                    break;
                }

                let report = evaluate_instrument(
                    &mut self.series,
                    &self.config,
                    self.clock.now(),
                    cycle,
                    &instrument,
                    result,
                );
                emit(self.sink.as_ref(), &report).await;
                reports.push(report);
            }
        }

        let finished_at = self.clock.now();
        let summary = CycleSummary::from_reports(
            &self.run_id,
            cycle,
            started_at,
            finished_at,
            &reports,
            interrupted,
        );

        if let Err(e) = self.sink.end_cycle(&summary, &reports).await {
            warn!(sink = self.sink.name(), cycle, error = %e, "sink end_cycle failed");
        }

        info!(
            cycle,
            session = %summary.session,
            buy = summary.count(Signal::Buy),
            sell = summary.count(Signal::Sell),
            hold = summary.count(Signal::Hold),
            no_data = summary.count(Signal::NoData),
            failed = summary.failed.len(),
            interrupted,
            "cycle complete"
        );

        summary
    }
}

async fn emit(sink: &dyn SignalSink, report: &SignalReport) {
    if let Err(e) = sink.emit(report).await {
        warn!(sink = sink.name(), instrument = %report.instrument, error = %e, "sink emit failed");
    }
}

/// Merge one fetch result into the instrument's series and classify it.
///
/// Empty, stale and failed fetches leave the series untouched and produce a
/// NO_DATA report.
fn evaluate_instrument(
    series: &mut HashMap<String, BarSeries>,
    config: &RuntimeConfig,
    now: DateTime<Utc>,
    cycle: u64,
    instrument: &str,
    result: Result<Vec<Bar>, FetchError>,
) -> SignalReport {
    let interval = config.interval;

    let bars = match result {
        Ok(bars) if bars.is_empty() => {
            debug!(instrument, "fetch returned no bars");
            return SignalReport::no_data(
                cycle,
                instrument,
                interval,
                "DataUnavailable",
                "no bars returned",
                now,
            );
        }
        Ok(bars) => bars,
        Err(e) => {
            warn!(instrument, kind = e.kind(), error = %e, "fetch failed");
            return SignalReport::no_data(cycle, instrument, interval, e.kind(), e.to_string(), now);
        }
    };

    if let Some(max_bars) = config.max_staleness_bars {
        let newest = bars.iter().map(|b| b.timestamp).max();
        let limit = chrono::Duration::seconds(interval.seconds() * i64::from(max_bars));
        if let Some(newest) = newest.filter(|ts| now - *ts > limit) {
            debug!(instrument, newest = %newest, "fetch is stale");
            return SignalReport::no_data(
                cycle,
                instrument,
                interval,
                "DataUnavailable",
                format!("stale data: newest bar at {newest}"),
                now,
            );
        }
    }

    let entry = series
        .entry(instrument.to_string())
        .or_insert_with(|| BarSeries::new(instrument, config.series_capacity));
    let merged = entry.merge(&bars);
    if merged.is_noop() {
        debug!(instrument, ignored = merged.ignored, "fetch brought no new bars");
    }

    if entry.is_empty() {
        series.remove(instrument);
        return SignalReport::no_data(
            cycle,
            instrument,
            interval,
            "DataUnavailable",
            "no valid bars in fetch",
            now,
        );
    }

    let closes = entry.closes();
    let last = entry.last().copied();
    let latest_price = last.map(|b| b.close);
    let snapshot = IndicatorSnapshot::compute(&closes, &config.indicators);
    let signal = classify(&snapshot, latest_price, &config.thresholds);

    debug!(
        instrument,
        bars = closes.len(),
        rsi = ?snapshot.rsi,
        macd_hist = ?snapshot.macd_histogram,
        %signal,
        "instrument evaluated"
    );

    SignalReport::classified(
        cycle,
        instrument,
        interval,
        last.map(|b| b.timestamp),
        latest_price,
        snapshot,
        signal,
        now,
    )
}
