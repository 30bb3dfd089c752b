// =============================================================================
// Data Source contract
// =============================================================================
//
// The engine depends only on this trait.  Implementations own the transport
// (HTTP, broker SDK, recorded files) and any retry/backoff policy; the
// scheduler never retries on its own.
// =============================================================================

use async_trait::async_trait;

use crate::error::FetchError;
use crate::market_data::Bar;
use crate::types::Interval;

/// Supplies raw bars on demand.
///
/// An `Ok` with an empty vector and any `Err` are both treated as EMPTY by the
/// scheduler: the instrument reports NO_DATA for the cycle and its retained
/// series is left untouched.
#[async_trait]
pub trait BarSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Fetch up to `lookback` of the most recent bars for `instrument`,
    /// oldest first.
    async fn fetch(
        &self,
        instrument: &str,
        interval: Interval,
        lookback: usize,
    ) -> Result<Vec<Bar>, FetchError>;
}
