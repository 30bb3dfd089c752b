// =============================================================================
// JSON Lines sink — one serialised report per line
// =============================================================================

use std::io::Write;

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

use super::SignalSink;
use crate::report::SignalReport;

pub struct JsonLinesSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl JsonLinesSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

#[async_trait]
impl<W: Write + Send> SignalSink for JsonLinesSink<W> {
    fn name(&self) -> &str {
        "json_lines"
    }

    async fn emit(&self, report: &SignalReport) -> Result<()> {
        let line = serde_json::to_string(report).context("failed to serialise report")?;
        let mut writer = self.writer.lock();
        writeln!(writer, "{line}").context("failed to write report line")?;
        writer.flush().context("failed to flush report line")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Interval;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn writes_one_object_per_line() {
        let at = Utc.with_ymd_and_hms(2024, 3, 6, 23, 0, 0).unwrap();
        let sink = JsonLinesSink::new(Vec::new());

        sink.emit(&SignalReport::no_data(1, "EURUSD", Interval::M5, "DataUnavailable", "empty", at))
            .await
            .unwrap();
        sink.emit(&SignalReport::no_data(1, "GBPUSD", Interval::M5, "DataUnavailable", "empty", at))
            .await
            .unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["instrument"], "EURUSD");
        assert_eq!(first["session"], "SYDNEY");
        assert_eq!(first["error_kind"], "DataUnavailable");
    }
}
