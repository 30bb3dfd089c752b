// =============================================================================
// Simple Moving Average (SMA)
// =============================================================================

/// Mean of the last `period` closes.
///
/// Returns `None` when `period == 0` or fewer than `period` closes exist.
pub fn calculate_sma(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }
    let window = &closes[closes.len() - period..];
    let mean = window.iter().sum::<f64>() / period as f64;
    mean.is_finite().then_some(mean)
}
