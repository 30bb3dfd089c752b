// =============================================================================
// Sinks — where per-cycle results go
// =============================================================================
//
// The scheduler hands every report to `emit` as soon as the instrument is
// evaluated, then calls `end_cycle` once with the whole cycle.  Rendering,
// alerting and export live entirely behind this trait.
//
// Sink errors never stop the scheduler; they are logged and dropped.
// =============================================================================

pub mod alert;
pub mod fanout;
pub mod json_lines;
pub mod table;

use anyhow::Result;
use async_trait::async_trait;

use crate::report::{CycleSummary, SignalReport};

pub use alert::AlertSink;
pub use fanout::FanoutSink;
pub use json_lines::JsonLinesSink;
pub use table::TableSink;

#[async_trait]
pub trait SignalSink: Send + Sync {
    fn name(&self) -> &str;

    /// Receive one instrument's result.
    async fn emit(&self, report: &SignalReport) -> Result<()>;

    /// Called once per cycle after every instrument has been emitted.
    async fn end_cycle(&self, _summary: &CycleSummary, _reports: &[SignalReport]) -> Result<()> {
        Ok(())
    }
}
