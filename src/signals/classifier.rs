// =============================================================================
// Signal Classifier
// =============================================================================
//
// Maps one indicator snapshot plus the latest close to BUY / SELL / HOLD /
// NO_DATA.  Rule set (RSI + MACD):
//
//   NO_DATA  no bars, no close, or RSI / MACD / MACD signal undefined
//   BUY      RSI < buy_below  AND MACD > signal
//   SELL     RSI > sell_above AND MACD < signal
//   HOLD     otherwise
//
// BUY is evaluated before SELL.  Bollinger and SMA values are reported in the
// snapshot but do not gate the signal.  Nothing is remembered between calls.
// =============================================================================

use crate::indicators::IndicatorSnapshot;
use crate::runtime_config::SignalThresholds;
use crate::types::Signal;

pub fn classify(
    snapshot: &IndicatorSnapshot,
    latest_close: Option<f64>,
    thresholds: &SignalThresholds,
) -> Signal {
    if snapshot.bars == 0 || !latest_close.is_some_and(|c| c.is_finite() && c > 0.0) {
        return Signal::NoData;
    }

    let (Some(rsi), Some(macd), Some(signal)) = (snapshot.rsi, snapshot.macd, snapshot.macd_signal)
    else {
        return Signal::NoData;
    };

    if rsi < thresholds.buy_below && macd > signal {
        Signal::Buy
    } else if rsi > thresholds.sell_above && macd < signal {
        Signal::Sell
    } else {
        Signal::Hold
    }
}
