// =============================================================================
// Indicator Snapshot — every indicator at the latest bar of one series
// =============================================================================
//
// The snapshot is a pure function of the close prices it is given: no state
// survives between calls, so recomputing over an unchanged series yields
// bit-identical values.  Undefined indicators (too little history) are `None`.
// =============================================================================

use serde::Serialize;

use super::bollinger::calculate_bollinger;
use super::ema::current_ema;
use super::macd::calculate_macd;
use super::rsi::current_rsi;
use super::sma::calculate_sma;
use crate::runtime_config::IndicatorParams;

/// A moving average at one window length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowValue {
    pub window: usize,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    /// Number of bars the snapshot was computed from.
    pub bars: usize,
    pub sma: Vec<WindowValue>,
    pub ema: Vec<WindowValue>,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub bollinger_upper: Option<f64>,
    pub bollinger_middle: Option<f64>,
    pub bollinger_lower: Option<f64>,
    pub bollinger_width: Option<f64>,
}

impl IndicatorSnapshot {
    /// Compute every configured indicator over `closes` (oldest first).
    pub fn compute(closes: &[f64], params: &IndicatorParams) -> Self {
        let sma = params
            .sma_windows
            .iter()
            .map(|&window| WindowValue {
                window,
                value: calculate_sma(closes, window),
            })
            .collect();

        let ema = params
            .ema_windows
            .iter()
            .map(|&window| WindowValue {
                window,
                value: current_ema(closes, window),
            })
            .collect();

        let rsi = current_rsi(closes, params.rsi_period, params.rsi_smoothing);
        let macd = calculate_macd(closes, params.macd_fast, params.macd_slow, params.macd_signal);
        let bb = calculate_bollinger(closes, params.bollinger_window, params.bollinger_k);

        Self {
            bars: closes.len(),
            sma,
            ema,
            rsi,
            macd: macd.map(|m| m.macd),
            macd_signal: macd.and_then(|m| m.signal),
            macd_histogram: macd.and_then(|m| m.histogram),
            bollinger_upper: bb.map(|b| b.upper),
            bollinger_middle: bb.map(|b| b.middle),
            bollinger_lower: bb.map(|b| b.lower),
            bollinger_width: bb.and_then(|b| b.width),
        }
    }

    pub fn sma(&self, window: usize) -> Option<f64> {
        self.sma.iter().find(|w| w.window == window)?.value
    }

    pub fn ema(&self, window: usize) -> Option<f64> {
        self.ema.iter().find(|w| w.window == window)?.value
    }
}
