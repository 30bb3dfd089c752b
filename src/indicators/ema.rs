// =============================================================================
// Exponential Moving Average (EMA)
// =============================================================================
//
//   alpha  = 2 / (window + 1)
//   EMA_0  = mean(closes[0..window])
//   EMA_t  = alpha * close_t + (1 - alpha) * EMA_{t-1}
//
// Element `i` of the returned series lines up with close `window - 1 + i`, so
// the last element is always the EMA at the latest bar.  MACD relies on that
// tail alignment when subtracting two EMA series of different windows.
// =============================================================================

/// Full EMA series over `closes`, seeded with the SMA of the first `window`
/// closes.  Empty when `window` is zero or longer than the input.
///
/// A non-finite value stops the series at the last good element.
pub fn calculate_ema(closes: &[f64], window: usize) -> Vec<f64> {
    if window == 0 || closes.len() < window {
        return Vec::new();
    }

    let seed = closes[..window].iter().sum::<f64>() / window as f64;
    if !seed.is_finite() {
        return Vec::new();
    }

    let alpha = 2.0 / (window as f64 + 1.0);
    let mut series = Vec::with_capacity(closes.len() - window + 1);
    series.push(seed);

    let mut prev = seed;
    for &close in &closes[window..] {
        let next = alpha * close + (1.0 - alpha) * prev;
        if !next.is_finite() {
            break;
        }
        series.push(next);
        prev = next;
    }

    series
}

/// EMA at the latest bar.
pub fn current_ema(closes: &[f64], window: usize) -> Option<f64> {
    calculate_ema(closes, window).last().copied()
}
