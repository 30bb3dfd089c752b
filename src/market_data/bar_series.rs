use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// A single OHLC bar for one interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Bar {
    pub fn new(timestamp: DateTime<Utc>, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
        }
    }

    /// Prices are finite and positive, and the high/low range is coherent.
    pub fn is_valid(&self) -> bool {
        let prices = [self.open, self.high, self.low, self.close];
        prices.iter().all(|p| p.is_finite() && *p > 0.0) && self.high >= self.low
    }
}

/// Outcome of merging one fetch into a [`BarSeries`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub appended: usize,
    pub replaced: usize,
    pub ignored: usize,
    pub evicted: usize,
}

impl MergeStats {
    /// True when the fetch changed nothing in the series.
    pub fn is_noop(&self) -> bool {
        self.appended == 0 && self.replaced == 0
    }
}

// ---------------------------------------------------------------------------
// BarSeries -- capped, strictly increasing sequence per instrument
// ---------------------------------------------------------------------------

/// Ring of the most recent bars for one instrument.  Timestamps are strictly
/// increasing; the oldest bars are evicted once `capacity` is exceeded.
#[derive(Debug, Clone)]
pub struct BarSeries {
    instrument: String,
    bars: VecDeque<Bar>,
    capacity: usize,
}

impl BarSeries {
    pub fn new(instrument: impl Into<String>, capacity: usize) -> Self {
        Self {
            instrument: instrument.into(),
            bars: VecDeque::with_capacity(capacity + 1),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.back()
    }

    #[cfg(test)]
    pub fn bars(&self) -> impl Iterator<Item = &Bar> {
        self.bars.iter()
    }

    /// Close prices, oldest first.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Merge a freshly fetched batch into the series.
    ///
    /// * Invalid bars (non-positive or non-finite prices, `high < low`) are
    ///   ignored.
    /// * The batch is ordered by timestamp; duplicate timestamps keep the last
    ///   occurrence.
    /// * Bars older than the current last bar are ignored.
    /// * A bar with the same timestamp as the current last bar replaces it
    ///   (the in-progress bar was updated by the source).
    /// * Newer bars are appended, then the series is trimmed to `capacity`.
    ///
    /// The batch is fully sanitised before the series is touched, so the
    /// series is never observed half-merged.
    pub fn merge(&mut self, fetched: &[Bar]) -> MergeStats {
        let mut stats = MergeStats::default();

        let mut batch: Vec<Bar> = Vec::with_capacity(fetched.len());
        for bar in fetched {
            if bar.is_valid() {
                batch.push(*bar);
            } else {
                stats.ignored += 1;
            }
        }
        // Stable sort keeps arrival order among equal timestamps, so the
        // dedup below retains the last occurrence.
        batch.sort_by_key(|b| b.timestamp);
        let before_dedup = batch.len();
        batch.reverse();
        batch.dedup_by_key(|b| b.timestamp);
        batch.reverse();
        stats.ignored += before_dedup - batch.len();

        for bar in batch {
            match self.bars.back().map(|last| last.timestamp) {
                Some(last_ts) if bar.timestamp < last_ts => stats.ignored += 1,
                Some(last_ts) if bar.timestamp == last_ts => {
                    if let Some(last) = self.bars.back_mut() {
                        if *last != bar {
                            *last = bar;
                            stats.replaced += 1;
                        } else {
                            stats.ignored += 1;
                        }
                    }
                }
                _ => {
                    self.bars.push_back(bar);
                    stats.appended += 1;
                }
            }
        }

        while self.bars.len() > self.capacity {
            self.bars.pop_front();
            stats.evicted += 1;
        }

        debug!(
            instrument = %self.instrument,
            appended = stats.appended,
            replaced = stats.replaced,
            ignored = stats.ignored,
            evicted = stats.evicted,
            len = self.bars.len(),
            "bar series merged"
        );

        stats
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
