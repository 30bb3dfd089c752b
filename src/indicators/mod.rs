// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Pure, side-effect-free implementations of the indicators used by the signal
// classifier.  Functions take close prices oldest-first and return `Option`
// (or an empty series) when the history is too short, so callers are forced
// to handle the undefined case.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod snapshot;

pub use snapshot::IndicatorSnapshot;
