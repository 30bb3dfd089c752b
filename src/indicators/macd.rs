// =============================================================================
// Moving Average Convergence Divergence (MACD)
// =============================================================================
//
//   MACD      = EMA(fast) - EMA(slow)
//   Signal    = EMA(signal) of the MACD series
//   Histogram = MACD - Signal
//
// The fast and slow EMA series start at different indices; they are aligned
// on their common tail (the slow series' span).  The MACD line therefore needs
// `slow` closes and the signal line `slow + signal - 1`.
// =============================================================================

use serde::Serialize;

use super::ema::calculate_ema;

/// Latest MACD values.  `signal` and `histogram` are `None` while the MACD
/// series is still shorter than the signal period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacdResult {
    pub macd: f64,
    pub signal: Option<f64>,
    pub histogram: Option<f64>,
}

/// Full MACD line, aligned so that element `i` corresponds to close
/// `slow - 1 + i`.
pub fn macd_line(closes: &[f64], fast: usize, slow: usize) -> Vec<f64> {
    let ema_fast = calculate_ema(closes, fast);
    let ema_slow = calculate_ema(closes, slow);
    if ema_slow.is_empty() || ema_fast.len() < ema_slow.len() {
        return Vec::new();
    }

    let offset = ema_fast.len() - ema_slow.len();
    ema_fast[offset..]
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s)
        .collect()
}

/// Compute the latest MACD, signal and histogram.
///
/// Returns `None` when the MACD line itself is undefined (fewer than `slow`
/// closes, zero periods, or `fast >= slow`).
pub fn calculate_macd(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Option<MacdResult> {
    if fast == 0 || slow == 0 || fast >= slow {
        return None;
    }

    let line = macd_line(closes, fast, slow);
    let macd = *line.last()?;
    let signal = calculate_ema(&line, signal_period).last().copied();

    Some(MacdResult {
        macd,
        signal,
        histogram: signal.map(|s| macd - s),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Accelerating decline for 45 bars, then a sharp linear rebound.
    fn v_shape() -> Vec<f64> {
        let mut closes = Vec::with_capacity(60);
        let mut p = 1.25;
        for i in 0..45 {
            closes.push(p);
            p -= 0.001 + 0.00005 * i as f64;
        }
        let low = closes[44];
        for i in 0..15 {
            closes.push(low + 0.006 * (i + 1) as f64);
        }
        closes
    }

    #[test]
    fn macd_undefined_for_short_series() {
        let closes: Vec<f64> = (1..=25).map(|x| x as f64).collect();
        assert!(calculate_macd(&closes, 12, 26, 9).is_none());
    }

    #[test]
    fn signal_undefined_until_enough_macd_points() {
        // 26 closes: MACD defined (1 point), signal needs 9 points => 34 closes.
        let closes: Vec<f64> = (1..=33).map(|x| x as f64).collect();
        let r = calculate_macd(&closes, 12, 26, 9).unwrap();
        assert!(r.signal.is_none());
        assert!(r.histogram.is_none());

        let closes: Vec<f64> = (1..=34).map(|x| x as f64).collect();
        let r = calculate_macd(&closes, 12, 26, 9).unwrap();
        assert!(r.signal.is_some());
    }

    #[test]
    fn invalid_periods_are_undefined() {
        let closes: Vec<f64> = (1..=100).map(|x| x as f64).collect();
        assert!(calculate_macd(&closes, 26, 12, 9).is_none());
        assert!(calculate_macd(&closes, 0, 26, 9).is_none());
    }

    #[test]
    fn line_alignment() {
        let closes: Vec<f64> = (1..=40).map(|x| x as f64).collect();
        assert_eq!(macd_line(&closes, 12, 26).len(), 40 - 26 + 1);
    }

    #[test]
    fn flat_series_has_zero_macd() {
        let closes = vec![1.3; 60];
        let r = calculate_macd(&closes, 12, 26, 9).unwrap();
        assert!(r.macd.abs() < 1e-12);
        assert!(r.histogram.unwrap().abs() < 1e-12);
    }

    #[test]
    fn histogram_changes_sign_at_rebound() {
        let closes = v_shape();

        // Through the decline and the first rebound bar the MACD sits below
        // its signal line.
        for end in 34..=46 {
            let h = calculate_macd(&closes[..end], 12, 26, 9)
                .and_then(|r| r.histogram)
                .unwrap();
            assert!(h < 0.0, "histogram at bar {} was {h}", end - 1);
        }

        // The second rebound bar crosses it and it stays above afterwards.
        for end in 47..=60 {
            let h = calculate_macd(&closes[..end], 12, 26, 9)
                .and_then(|r| r.histogram)
                .unwrap();
            assert!(h > 0.0, "histogram at bar {} was {h}", end - 1);
        }
    }
}
