// =============================================================================
// Runtime Configuration — read once at startup
// =============================================================================
//
// Every tunable parameter of the engine lives here.  The file is JSON and is
// read exactly once before the scheduler starts; it is never reloaded or
// written back.  All fields carry `#[serde(default)]` so a partial (or empty)
// file is valid and falls back to the documented defaults.
//
// `validate` is the fail-fast gate: an invalid parameter aborts startup with
// a `ConfigError` before any fetch is issued.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::indicators::rsi::RsiSmoothing;
use crate::types::Interval;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_true() -> bool {
    true
}

fn default_instruments() -> Vec<String> {
    [
        "EURUSD", "GBPUSD", "USDJPY", "AUDUSD", "USDCAD", "USDCHF", "NZDUSD", "EURGBP", "EURJPY",
        "EURCHF", "EURAUD", "EURNZD", "EURCAD", "GBPJPY", "GBPCHF", "GBPAUD", "GBPCAD", "GBPNZD",
        "AUDJPY", "AUDCHF", "AUDCAD", "AUDNZD", "CADJPY", "CADCHF", "CHFJPY", "NZDJPY", "NZDCHF",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_lookback() -> usize {
    100
}

fn default_series_capacity() -> usize {
    500
}

fn default_cycle_interval_secs() -> u64 {
    5
}

fn default_max_concurrent_fetches() -> usize {
    4
}

fn default_sma_windows() -> Vec<usize> {
    vec![20, 50]
}

fn default_ema_windows() -> Vec<usize> {
    vec![9, 21]
}

fn default_rsi_period() -> usize {
    14
}

fn default_macd_fast() -> usize {
    12
}

fn default_macd_slow() -> usize {
    26
}

fn default_macd_signal() -> usize {
    9
}

fn default_bollinger_window() -> usize {
    20
}

fn default_bollinger_k() -> f64 {
    2.0
}

fn default_buy_below() -> f64 {
    30.0
}

fn default_sell_above() -> f64 {
    70.0
}

fn default_http_timeout_secs() -> u64 {
    10
}

fn default_max_retries() -> u32 {
    2
}

fn default_replay_warmup() -> usize {
    60
}

// =============================================================================
// IndicatorParams
// =============================================================================

/// Parameters of every indicator family in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorParams {
    /// SMA windows reported in the snapshot.
    #[serde(default = "default_sma_windows")]
    pub sma_windows: Vec<usize>,

    /// EMA windows reported in the snapshot.
    #[serde(default = "default_ema_windows")]
    pub ema_windows: Vec<usize>,

    #[serde(default = "default_rsi_period")]
    pub rsi_period: usize,

    #[serde(default)]
    pub rsi_smoothing: RsiSmoothing,

    #[serde(default = "default_macd_fast")]
    pub macd_fast: usize,

    #[serde(default = "default_macd_slow")]
    pub macd_slow: usize,

    #[serde(default = "default_macd_signal")]
    pub macd_signal: usize,

    #[serde(default = "default_bollinger_window")]
    pub bollinger_window: usize,

    /// Band half-width in standard deviations.
    #[serde(default = "default_bollinger_k")]
    pub bollinger_k: f64,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            sma_windows: default_sma_windows(),
            ema_windows: default_ema_windows(),
            rsi_period: default_rsi_period(),
            rsi_smoothing: RsiSmoothing::default(),
            macd_fast: default_macd_fast(),
            macd_slow: default_macd_slow(),
            macd_signal: default_macd_signal(),
            bollinger_window: default_bollinger_window(),
            bollinger_k: default_bollinger_k(),
        }
    }
}

impl IndicatorParams {
    /// Closes needed before the signal-relevant indicators (RSI, MACD signal
    /// line) are defined.
    pub fn signal_lookback(&self) -> usize {
        (self.rsi_period + 1).max(self.macd_slow + self.macd_signal - 1)
    }

    /// Closes needed before every indicator in the snapshot is defined.
    pub fn full_lookback(&self) -> usize {
        self.sma_windows
            .iter()
            .chain(&self.ema_windows)
            .copied()
            .chain([self.bollinger_window, self.signal_lookback()])
            .max()
            .unwrap_or(0)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sma_windows.iter().any(|&w| w == 0) {
            return Err(ConfigError::invalid("indicators.sma_windows", "windows must be >= 1"));
        }
        if self.ema_windows.iter().any(|&w| w == 0) {
            return Err(ConfigError::invalid("indicators.ema_windows", "windows must be >= 1"));
        }
        if self.rsi_period == 0 {
            return Err(ConfigError::invalid("indicators.rsi_period", "must be >= 1"));
        }
        if self.macd_fast == 0 || self.macd_slow == 0 || self.macd_signal == 0 {
            return Err(ConfigError::invalid("indicators.macd", "periods must be >= 1"));
        }
        if self.macd_fast >= self.macd_slow {
            return Err(ConfigError::invalid(
                "indicators.macd_fast",
                format!(
                    "fast period {} must be shorter than slow period {}",
                    self.macd_fast, self.macd_slow
                ),
            ));
        }
        if self.bollinger_window == 0 {
            return Err(ConfigError::invalid("indicators.bollinger_window", "must be >= 1"));
        }
        if !(self.bollinger_k.is_finite() && self.bollinger_k > 0.0) {
            return Err(ConfigError::invalid(
                "indicators.bollinger_k",
                format!("must be a positive number, got {}", self.bollinger_k),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// SignalThresholds
// =============================================================================

/// RSI levels used by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalThresholds {
    /// BUY requires RSI strictly below this level.
    #[serde(default = "default_buy_below")]
    pub buy_below: f64,

    /// SELL requires RSI strictly above this level.
    #[serde(default = "default_sell_above")]
    pub sell_above: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            buy_below: default_buy_below(),
            sell_above: default_sell_above(),
        }
    }
}

impl SignalThresholds {
    fn validate(&self) -> Result<(), ConfigError> {
        let in_range = |v: f64| v.is_finite() && (0.0..=100.0).contains(&v);
        if !in_range(self.buy_below) {
            return Err(ConfigError::invalid("thresholds.buy_below", "must be within [0, 100]"));
        }
        if !in_range(self.sell_above) {
            return Err(ConfigError::invalid("thresholds.sell_above", "must be within [0, 100]"));
        }
        if self.buy_below >= self.sell_above {
            return Err(ConfigError::invalid(
                "thresholds",
                format!(
                    "buy_below ({}) must be lower than sell_above ({})",
                    self.buy_below, self.sell_above
                ),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Collaborator selection
// =============================================================================

/// Which data source feeds the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    Yahoo {
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default = "default_http_timeout_secs")]
        timeout_secs: u64,
        #[serde(default = "default_max_retries")]
        max_retries: u32,
    },
    Replay {
        path: String,
        #[serde(default = "default_replay_warmup")]
        warmup: usize,
    },
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::Yahoo {
            base_url: None,
            timeout_secs: default_http_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

/// Which sinks receive the per-cycle reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Log a formatted table per cycle.
    #[serde(default = "default_true")]
    pub table: bool,

    /// Write one JSON object per report to stdout.
    #[serde(default)]
    pub json_lines: bool,

    /// Alert when an instrument transitions into BUY or SELL.
    #[serde(default = "default_true")]
    pub alerts: bool,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            table: true,
            json_lines: false,
            alerts: true,
        }
    }
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// Top-level configuration for the fxpulse engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Instruments & feed -------------------------------------------------

    /// Currency pairs polled every cycle.
    #[serde(default = "default_instruments")]
    pub instruments: Vec<String>,

    /// Bar interval requested from the source.
    #[serde(default)]
    pub interval: Interval,

    /// Bars requested per fetch.
    #[serde(default = "default_lookback")]
    pub lookback: usize,

    /// Maximum bars retained per instrument.
    #[serde(default = "default_series_capacity")]
    pub series_capacity: usize,

    // --- Scheduler ----------------------------------------------------------

    /// Idle time between cycles, in seconds.
    #[serde(default = "default_cycle_interval_secs")]
    pub cycle_interval_secs: u64,

    /// Stop after this many cycles.  `None` runs until shutdown.
    #[serde(default)]
    pub max_cycles: Option<u64>,

    /// Upper bound on concurrent fetches within one cycle.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,

    /// Treat a fetch as stale when its newest bar is older than this many
    /// intervals.  `None` disables the check.
    #[serde(default)]
    pub max_staleness_bars: Option<u32>,

    /// Skip fetching while the session clock reports OUT_OF_HOURS.
    #[serde(default)]
    pub skip_out_of_hours: bool,

    // --- Engine parameters --------------------------------------------------

    #[serde(default)]
    pub indicators: IndicatorParams,

    #[serde(default)]
    pub thresholds: SignalThresholds,

    // --- Collaborators ------------------------------------------------------

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub sinks: SinkConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            instruments: default_instruments(),
            interval: Interval::default(),
            lookback: default_lookback(),
            series_capacity: default_series_capacity(),
            cycle_interval_secs: default_cycle_interval_secs(),
            max_cycles: None,
            max_concurrent_fetches: default_max_concurrent_fetches(),
            max_staleness_bars: None,
            skip_out_of_hours: false,
            indicators: IndicatorParams::default(),
            thresholds: SignalThresholds::default(),
            source: SourceConfig::default(),
            sinks: SinkConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config from {}", path.display()))?;

        info!(
            path = %path.display(),
            instruments = config.instruments.len(),
            interval = %config.interval,
            "config loaded"
        );

        Ok(config)
    }

    /// Apply `FXPULSE_INSTRUMENTS` / `FXPULSE_INTERVAL` style overrides.
    /// `lookup` is `std::env::var` in production.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(list) = lookup("FXPULSE_INSTRUMENTS") {
            self.instruments = list
                .split(',')
                .map(|s| s.trim().to_uppercase())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(raw) = lookup("FXPULSE_INTERVAL") {
            self.interval = raw
                .parse()
                .map_err(|reason: String| ConfigError::invalid("interval", reason))?;
        }
        Ok(())
    }

    /// Reject parameters the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.instruments.is_empty() {
            return Err(ConfigError::NoInstruments);
        }
        if let Some(bad) = self.instruments.iter().find(|s| s.trim().is_empty()) {
            return Err(ConfigError::invalid("instruments", format!("blank instrument {bad:?}")));
        }
        if self.lookback == 0 {
            return Err(ConfigError::invalid("lookback", "must be >= 1"));
        }
        if self.cycle_interval_secs == 0 {
            return Err(ConfigError::invalid("cycle_interval_secs", "must be >= 1"));
        }
        if self.max_concurrent_fetches == 0 {
            return Err(ConfigError::invalid("max_concurrent_fetches", "must be >= 1"));
        }
        if self.max_cycles == Some(0) {
            return Err(ConfigError::invalid("max_cycles", "must be >= 1 when set"));
        }
        if self.max_staleness_bars == Some(0) {
            return Err(ConfigError::invalid("max_staleness_bars", "must be >= 1 when set"));
        }

        self.indicators.validate()?;
        self.thresholds.validate()?;

        let required = self.indicators.full_lookback();
        if self.series_capacity < required {
            return Err(ConfigError::invalid(
                "series_capacity",
                format!(
                    "{} bars cannot hold the longest indicator lookback of {required}",
                    self.series_capacity
                ),
            ));
        }
        if self.lookback < required {
            warn!(
                lookback = self.lookback,
                required,
                "lookback is shorter than the longest indicator window; \
                 some indicators stay undefined until history accumulates"
            );
        }

        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_expected_values() {
        let cfg = RuntimeConfig::default();
        assert_eq!(cfg.instruments.len(), 27);
        assert_eq!(cfg.instruments[0], "EURUSD");
        assert_eq!(cfg.interval, Interval::M5);
        assert_eq!(cfg.lookback, 100);
        assert_eq!(cfg.cycle_interval_secs, 5);
        assert_eq!(cfg.indicators.rsi_period, 14);
        assert_eq!(cfg.indicators.macd_slow, 26);
        assert!((cfg.thresholds.buy_below - 30.0).abs() < f64::EPSILON);
        assert!((cfg.thresholds.sell_above - 70.0).abs() < f64::EPSILON);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn deserialise_empty_json_uses_defaults() {
        let cfg: RuntimeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, RuntimeConfig::default());
    }

    #[test]
    fn deserialise_partial_json_fills_defaults() {
        let json = r#"{
            "instruments": ["EURUSD", "GBPJPY"],
            "interval": "4h",
            "indicators": { "rsi_period": 7, "rsi_smoothing": "simple" },
            "source": { "kind": "replay", "path": "bars.json" }
        }"#;
        let cfg: RuntimeConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.instruments, vec!["EURUSD", "GBPJPY"]);
        assert_eq!(cfg.interval, Interval::H4);
        assert_eq!(cfg.indicators.rsi_period, 7);
        assert_eq!(cfg.indicators.rsi_smoothing, RsiSmoothing::Simple);
        assert_eq!(cfg.indicators.macd_fast, 12);
        assert_eq!(
            cfg.source,
            SourceConfig::Replay {
                path: "bars.json".into(),
                warmup: 60
            }
        );
    }

    #[test]
    fn lookback_requirements() {
        let params = IndicatorParams::default();
        assert_eq!(params.signal_lookback(), 34);
        assert_eq!(params.full_lookback(), 50);
    }

    #[test]
    fn rejects_empty_instruments() {
        let cfg = RuntimeConfig {
            instruments: vec![],
            ..RuntimeConfig::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::NoInstruments));
    }

    #[test]
    fn rejects_zero_windows() {
        let mut cfg = RuntimeConfig::default();
        cfg.indicators.rsi_period = 0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidParameter { field: "indicators.rsi_period", .. })
        ));

        let mut cfg = RuntimeConfig::default();
        cfg.indicators.sma_windows = vec![20, 0];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_inverted_macd_periods() {
        let mut cfg = RuntimeConfig::default();
        cfg.indicators.macd_fast = 26;
        cfg.indicators.macd_slow = 12;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidParameter { field: "indicators.macd_fast", .. })
        ));
    }

    #[test]
    fn rejects_bad_thresholds() {
        let mut cfg = RuntimeConfig::default();
        cfg.thresholds.buy_below = 80.0;
        assert!(cfg.validate().is_err());

        let mut cfg = RuntimeConfig::default();
        cfg.thresholds.sell_above = 120.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_negative_window_in_json() {
        let json = r#"{ "indicators": { "bollinger_window": -20 } }"#;
        assert!(serde_json::from_str::<RuntimeConfig>(json).is_err());
    }

    #[test]
    fn rejects_capacity_below_lookback_requirement() {
        let cfg = RuntimeConfig {
            series_capacity: 40,
            ..RuntimeConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidParameter { field: "series_capacity", .. })
        ));
    }

    #[test]
    fn rejects_zero_cycle_interval_and_k() {
        let cfg = RuntimeConfig {
            cycle_interval_secs: 0,
            ..RuntimeConfig::default()
        };
        assert!(cfg.validate().is_err());

        let mut cfg = RuntimeConfig::default();
        cfg.indicators.bollinger_k = -1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn env_overrides() {
        let mut cfg = RuntimeConfig::default();
        cfg.apply_overrides(|key| match key {
            "FXPULSE_INSTRUMENTS" => Some("eurusd, usdjpy ,".to_string()),
            "FXPULSE_INTERVAL" => Some("1h".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(cfg.instruments, vec!["EURUSD", "USDJPY"]);
        assert_eq!(cfg.interval, Interval::H1);

        let err = cfg
            .apply_overrides(|key| (key == "FXPULSE_INTERVAL").then(|| "1d".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParameter { field: "interval", .. }));
    }
}
