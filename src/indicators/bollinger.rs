// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Bollinger Bands consist of a middle band (SMA), an upper band (SMA + k*σ),
// and a lower band (SMA - k*σ), with σ the population standard deviation of
// the window.  The Band Width is the normalised distance
// (upper - lower) / middle * 100.

use serde::Serialize;

/// Result of a Bollinger Band calculation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BollingerResult {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    /// `None` when the middle band is zero.
    pub width: Option<f64>,
}

/// Calculate Bollinger Bands over the last `period` closes.
///
/// Returns `None` when there are fewer than `period` data points, the period
/// is zero, or the result is non-finite.
pub fn calculate_bollinger(closes: &[f64], period: usize, num_std: f64) -> Option<BollingerResult> {
    if period == 0 || closes.len() < period {
        return None;
    }

    let window = &closes[closes.len() - period..];
    let middle = window.iter().sum::<f64>() / period as f64;

    let variance = window.iter().map(|x| (x - middle).powi(2)).sum::<f64>() / period as f64;
    let std_dev = variance.sqrt();

    let upper = middle + num_std * std_dev;
    let lower = middle - num_std * std_dev;
    if !(upper.is_finite() && lower.is_finite()) {
        return None;
    }

    let width = (middle != 0.0)
        .then(|| (upper - lower) / middle * 100.0)
        .filter(|w| w.is_finite());

    Some(BollingerResult {
        upper,
        middle,
        lower,
        width,
    })
}
