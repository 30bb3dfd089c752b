// =============================================================================
// Relative Strength Index (RSI)
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether an asset is overbought or oversold.
//
// Step 1 — Compute price changes (deltas) from consecutive closes.
// Step 2 — Average the gains and losses over `period` deltas, either
//          Wilder-smoothed (SMA seed, then
//            avg = (prev_avg * (period - 1) + current) / period)
//          or as a plain rolling mean over the last `period` deltas.
// Step 3 — RS  = avg_gain / avg_loss
//          RSI = 100 - 100 / (1 + RS)
//
// Both averages zero (flat market) maps to 50; zero average loss maps to 100.
// =============================================================================

use serde::{Deserialize, Serialize};

/// How gains and losses are averaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RsiSmoothing {
    /// Wilder's recursive smoothing.
    #[default]
    Wilder,
    /// Simple rolling mean over the last `period` deltas.
    Simple,
}

/// Compute the full RSI series for the given `closes` and `period`.
///
/// The returned vector has one RSI value for each close starting at index
/// `period` (the first `period` deltas are consumed to seed the averages).
///
/// # Edge cases
/// - `period == 0` => empty vec
/// - `closes.len() < period + 1` => empty vec
/// - Non-finite results truncate the series.
pub fn calculate_rsi(closes: &[f64], period: usize, smoothing: RsiSmoothing) -> Vec<f64> {
    if period == 0 || closes.len() < period + 1 {
        return Vec::new();
    }

    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    match smoothing {
        RsiSmoothing::Wilder => wilder_rsi(&deltas, period),
        RsiSmoothing::Simple => rolling_rsi(&deltas, period),
    }
}

/// Most recent RSI value, if defined.
pub fn current_rsi(closes: &[f64], period: usize, smoothing: RsiSmoothing) -> Option<f64> {
    calculate_rsi(closes, period, smoothing).last().copied()
}

fn split(delta: f64) -> (f64, f64) {
    if delta > 0.0 {
        (delta, 0.0)
    } else {
        (0.0, -delta)
    }
}

fn wilder_rsi(deltas: &[f64], period: usize) -> Vec<f64> {
    let (sum_gain, sum_loss) = deltas[..period].iter().fold((0.0_f64, 0.0_f64), |(g, l), &d| {
        let (gain, loss) = split(d);
        (g + gain, l + loss)
    });

    let period_f = period as f64;
    let mut avg_gain = sum_gain / period_f;
    let mut avg_loss = sum_loss / period_f;

    let mut result = Vec::with_capacity(deltas.len() - period + 1);
    match rsi_from_averages(avg_gain, avg_loss) {
        Some(rsi) => result.push(rsi),
        None => return result,
    }

    for &delta in &deltas[period..] {
        let (gain, loss) = split(delta);
        avg_gain = (avg_gain * (period_f - 1.0) + gain) / period_f;
        avg_loss = (avg_loss * (period_f - 1.0) + loss) / period_f;

        match rsi_from_averages(avg_gain, avg_loss) {
            Some(rsi) => result.push(rsi),
            None => break,
        }
    }

    result
}

fn rolling_rsi(deltas: &[f64], period: usize) -> Vec<f64> {
    let period_f = period as f64;
    let mut result = Vec::with_capacity(deltas.len() - period + 1);

    for window in deltas.windows(period) {
        let (g, l) = window.iter().fold((0.0_f64, 0.0_f64), |(g, l), &d| {
            let (gain, loss) = split(d);
            (g + gain, l + loss)
        });
        match rsi_from_averages(g / period_f, l / period_f) {
            Some(rsi) => result.push(rsi),
            None => break,
        }
    }

    result
}

/// Convert average gain / average loss into an RSI value in [0, 100].
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let rsi = if avg_loss == 0.0 && avg_gain == 0.0 {
        50.0
    } else if avg_loss == 0.0 {
        100.0
    } else {
        let rs = avg_gain / avg_loss;
        100.0 - 100.0 / (1.0 + rs)
    };

    rsi.is_finite().then_some(rsi.clamp(0.0, 100.0))
}
