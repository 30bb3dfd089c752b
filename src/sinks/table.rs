// =============================================================================
// Table sink — one formatted table per cycle in the log
// =============================================================================

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::SignalSink;
use crate::report::{CycleSummary, SignalReport};

#[derive(Debug, Default)]
pub struct TableSink;

impl TableSink {
    pub fn new() -> Self {
        Self
    }

    /// Render the cycle as a fixed-width text table.
    pub fn render(reports: &[SignalReport]) -> String {
        let mut out = format!(
            "{:<8} {:<9} {:>12} {:<8} {:>7} {:>12} {:<12}\n",
            "Pair", "Timeframe", "Price", "Signal", "RSI", "MACD-Sig", "Session"
        );
        for r in reports {
            let snapshot = r.snapshot.as_ref();
            let price = r.latest_price.map_or_else(|| "N/A".to_string(), |p| format!("{p:.5}"));
            let rsi = snapshot
                .and_then(|s| s.rsi)
                .map_or_else(|| "-".to_string(), |v| format!("{v:.1}"));
            let hist = snapshot
                .and_then(|s| s.macd_histogram)
                .map_or_else(|| "-".to_string(), |v| format!("{v:+.6}"));

            out.push_str(&format!(
                "{:<8} {:<9} {:>12} {:<8} {:>7} {:>12} {:<12}\n",
                r.instrument,
                r.interval.to_string(),
                price,
                r.signal.to_string(),
                rsi,
                hist,
                r.session.to_string(),
            ));
        }
        out
    }
}

#[async_trait]
impl SignalSink for TableSink {
    fn name(&self) -> &str {
        "table"
    }

    async fn emit(&self, _report: &SignalReport) -> Result<()> {
        Ok(())
    }

    async fn end_cycle(&self, summary: &CycleSummary, reports: &[SignalReport]) -> Result<()> {
        info!(
            cycle = summary.cycle,
            session = %summary.session,
            failed = summary.failed.len(),
            "cycle results\n{}",
            Self::render(reports)
        );
        Ok(())
    }
}
