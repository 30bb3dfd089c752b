// =============================================================================
// Replay source — plays a recorded bar file back like a live feed
// =============================================================================
//
// File format: a JSON object keyed by instrument, each value an array of bars
// (oldest first):
//
//   { "EURUSD": [ { "timestamp": "2024-03-04T00:00:00Z",
//                   "open": 1.085, "high": 1.086, "low": 1.084, "close": 1.0855 },
//                 ... ] }
//
// The first fetch for an instrument reveals `warmup` bars; every later fetch
// reveals one more, until the recording is exhausted.
// =============================================================================

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::FetchError;
use crate::market_data::{Bar, BarSource};
use crate::types::Interval;

pub struct ReplaySource {
    recordings: HashMap<String, Vec<Bar>>,
    cursors: Mutex<HashMap<String, usize>>,
    warmup: usize,
}

impl ReplaySource {
    pub fn from_bars(recordings: HashMap<String, Vec<Bar>>, warmup: usize) -> Self {
        let recordings = recordings
            .into_iter()
            .map(|(instrument, mut bars)| {
                bars.sort_by_key(|b| b.timestamp);
                (instrument.to_uppercase(), bars)
            })
            .collect();

        Self {
            recordings,
            cursors: Mutex::new(HashMap::new()),
            warmup: warmup.max(1),
        }
    }

    pub fn from_json_str(json: &str, warmup: usize) -> Result<Self> {
        let recordings: HashMap<String, Vec<Bar>> =
            serde_json::from_str(json).context("failed to parse replay recording")?;
        Ok(Self::from_bars(recordings, warmup))
    }

    pub fn load(path: impl AsRef<Path>, warmup: usize) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read replay file {}", path.display()))?;
        let source = Self::from_json_str(&content, warmup)
            .with_context(|| format!("invalid replay file {}", path.display()))?;

        info!(
            path = %path.display(),
            instruments = source.recordings.len(),
            "replay recording loaded"
        );
        Ok(source)
    }

    /// Advance the cursor for `instrument` and return how many bars are now
    /// visible.
    fn advance(&self, instrument: &str, available: usize) -> usize {
        let mut cursors = self.cursors.lock();
        let cursor = cursors
            .entry(instrument.to_string())
            .and_modify(|c| *c = (*c + 1).min(available))
            .or_insert_with(|| self.warmup.min(available));
        *cursor
    }
}

#[async_trait]
impl BarSource for ReplaySource {
    fn name(&self) -> &str {
        "replay"
    }

    async fn fetch(
        &self,
        instrument: &str,
        interval: Interval,
        lookback: usize,
    ) -> Result<Vec<Bar>, FetchError> {
        let key = instrument.to_uppercase();
        let Some(recording) = self.recordings.get(&key) else {
            return Err(FetchError::unavailable(instrument, "instrument not in recording"));
        };

        let visible = self.advance(&key, recording.len());
        let start = visible.saturating_sub(lookback);
        let bars = recording[start..visible].to_vec();

        debug!(instrument, %interval, visible, returned = bars.len(), "replay fetch");
        Ok(bars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn recording(n: usize) -> HashMap<String, Vec<Bar>> {
        let start = Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap();
        let bars = (0..n)
            .map(|i| {
                let p = 1.08 + i as f64 * 0.0001;
                Bar::new(start + chrono::Duration::minutes(5 * i as i64), p, p, p, p)
            })
            .collect();
        HashMap::from([("eurusd".to_string(), bars)])
    }

    #[tokio::test]
    async fn reveals_warmup_then_one_bar_per_fetch() {
        let source = ReplaySource::from_bars(recording(10), 5);

        let first = source.fetch("EURUSD", Interval::M5, 100).await.unwrap();
        assert_eq!(first.len(), 5);

        let second = source.fetch("EURUSD", Interval::M5, 100).await.unwrap();
        assert_eq!(second.len(), 6);
        assert!(second.last().unwrap().timestamp > first.last().unwrap().timestamp);
    }

    #[tokio::test]
    async fn lookback_limits_returned_window() {
        let source = ReplaySource::from_bars(recording(10), 8);
        let bars = source.fetch("EURUSD", Interval::M5, 3).await.unwrap();
        assert_eq!(bars.len(), 3);
        assert!((bars[2].close - (1.08 + 7.0 * 0.0001)).abs() < 1e-12);
    }

    #[tokio::test]
    async fn exhausted_recording_stays_at_end() {
        let source = ReplaySource::from_bars(recording(3), 2);
        for _ in 0..5 {
            source.fetch("EURUSD", Interval::M5, 100).await.unwrap();
        }
        let bars = source.fetch("EURUSD", Interval::M5, 100).await.unwrap();
        assert_eq!(bars.len(), 3);
    }

    #[tokio::test]
    async fn unknown_instrument_is_unavailable() {
        let source = ReplaySource::from_bars(recording(3), 2);
        let err = source.fetch("GBPUSD", Interval::M5, 100).await.unwrap_err();
        assert_eq!(err.kind(), "DataUnavailable");
    }

    #[test]
    fn parses_json_recording() {
        let json = r#"{ "GBPUSD": [
            { "timestamp": "2024-03-04T08:05:00Z", "open": 1.27, "high": 1.271, "low": 1.269, "close": 1.2705 },
            { "timestamp": "2024-03-04T08:00:00Z", "open": 1.26, "high": 1.27,  "low": 1.259, "close": 1.27 }
        ] }"#;
        let source = ReplaySource::from_json_str(json, 10).unwrap();
        let bars = &source.recordings["GBPUSD"];
        assert_eq!(bars.len(), 2);
        assert!(bars[0].timestamp < bars[1].timestamp);
    }
}
