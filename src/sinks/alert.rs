// =============================================================================
// Alert sink — raises an alert when an instrument turns BUY or SELL
// =============================================================================
//
// Alerts fire on transitions only: an instrument that stays BUY for several
// cycles alerts once.  Going back to HOLD or NO_DATA re-arms it.  The
// transition memory lives here, on the sink side; classification itself stays
// stateless.
// =============================================================================

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::warn;

use super::SignalSink;
use crate::report::SignalReport;
use crate::types::{Interval, Signal};

/// Maximum number of recent alerts to retain.
const MAX_RECENT_ALERTS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub instrument: String,
    pub interval: Interval,
    pub signal: Signal,
    pub price: Option<f64>,
    pub at: DateTime<Utc>,
}

impl std::fmt::Display for Alert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.price {
            Some(price) => write!(
                f,
                "{} SIGNAL: {} ({}) at {price:.5}",
                self.signal, self.instrument, self.interval
            ),
            None => write!(f, "{} SIGNAL: {} ({})", self.signal, self.instrument, self.interval),
        }
    }
}

#[derive(Debug, Default)]
pub struct AlertSink {
    last_signal: Mutex<HashMap<String, Signal>>,
    recent: Mutex<Vec<Alert>>,
}

impl AlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent alerts, oldest first.
    pub fn recent_alerts(&self) -> Vec<Alert> {
        self.recent.lock().clone()
    }

    fn push_alert(&self, alert: Alert) {
        let mut recent = self.recent.lock();
        recent.push(alert);
        while recent.len() > MAX_RECENT_ALERTS {
            recent.remove(0);
        }
    }
}

#[async_trait]
impl SignalSink for AlertSink {
    fn name(&self) -> &str {
        "alert"
    }

    async fn emit(&self, report: &SignalReport) -> Result<()> {
        let previous = self
            .last_signal
            .lock()
            .insert(report.instrument.clone(), report.signal);

        if report.signal.is_directional() && previous != Some(report.signal) {
            let alert = Alert {
                instrument: report.instrument.clone(),
                interval: report.interval,
                signal: report.signal,
                price: report.latest_price,
                at: report.emitted_at,
            };
            warn!(
                instrument = %alert.instrument,
                signal = %alert.signal,
                price = ?alert.price,
                session = %report.session,
                "{alert}"
            );
            self.push_alert(alert);
        }
        Ok(())
    }
}
