// =============================================================================
// Signal Report — one record per instrument per cycle
// =============================================================================
//
// Every instrument produces exactly one report per cycle, healthy or not.  A
// report for a failed fetch carries `NO_DATA`, the error category and a
// human-readable reason, so sinks can render failures next to healthy rows.
// =============================================================================

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::indicators::IndicatorSnapshot;
use crate::session::Session;
use crate::types::{Interval, Signal};

/// Per-instrument, per-cycle result handed to every sink.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalReport {
    /// Cycle number, starting at 1.
    pub cycle: u64,

    pub instrument: String,
    pub interval: Interval,

    /// Timestamp of the latest retained bar.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bar_time: Option<DateTime<Utc>>,

    /// Latest close price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_price: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<IndicatorSnapshot>,

    pub signal: Signal,

    /// Canonical session at emission time.
    pub session: Session,

    /// Every session open at emission time, in priority order.
    pub active_sessions: Vec<Session>,

    /// Error category when the instrument could not be evaluated
    /// (`DataUnavailable`, `TransportError`, `SessionClosed`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    pub emitted_at: DateTime<Utc>,
}

impl SignalReport {
    /// Report for an instrument whose indicators were computed this cycle.
    #[allow(clippy::too_many_arguments)]
    pub fn classified(
        cycle: u64,
        instrument: impl Into<String>,
        interval: Interval,
        bar_time: Option<DateTime<Utc>>,
        latest_price: Option<f64>,
        snapshot: IndicatorSnapshot,
        signal: Signal,
        emitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            cycle,
            instrument: instrument.into(),
            interval,
            bar_time,
            latest_price,
            snapshot: Some(snapshot),
            signal,
            session: crate::session::canonical_session(emitted_at),
            active_sessions: crate::session::active_sessions(emitted_at),
            error_kind: None,
            reason: None,
            emitted_at,
        }
    }

    /// NO_DATA report for an instrument that could not be evaluated.
    pub fn no_data(
        cycle: u64,
        instrument: impl Into<String>,
        interval: Interval,
        error_kind: impl Into<String>,
        reason: impl Into<String>,
        emitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            cycle,
            instrument: instrument.into(),
            interval,
            bar_time: None,
            latest_price: None,
            snapshot: None,
            signal: Signal::NoData,
            session: crate::session::canonical_session(emitted_at),
            active_sessions: crate::session::active_sessions(emitted_at),
            error_kind: Some(error_kind.into()),
            reason: Some(reason.into()),
            emitted_at,
        }
    }
}

/// Aggregate view of one finished cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleSummary {
    /// Identifier of the scheduler run (UUID v4), shared by all cycles.
    pub run_id: String,
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub session: Session,
    /// Number of reports per signal.
    pub signals: BTreeMap<Signal, usize>,
    /// Instruments that reported an error this cycle.
    pub failed: Vec<String>,
    /// True when shutdown interrupted the cycle before every instrument ran.
    pub interrupted: bool,
}

impl CycleSummary {
    pub fn from_reports(
        run_id: &str,
        cycle: u64,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        reports: &[SignalReport],
        interrupted: bool,
    ) -> Self {
        let mut signals = BTreeMap::new();
        for report in reports {
            *signals.entry(report.signal).or_insert(0) += 1;
        }
        let failed = reports
            .iter()
            .filter(|r| r.error_kind.is_some())
            .map(|r| r.instrument.clone())
            .collect();

        Self {
            run_id: run_id.to_string(),
            cycle,
            started_at,
            finished_at,
            session: crate::session::canonical_session(started_at),
            signals,
            failed,
            interrupted,
        }
    }

    pub fn count(&self, signal: Signal) -> usize {
        self.signals.get(&signal).copied().unwrap_or(0)
    }
}
