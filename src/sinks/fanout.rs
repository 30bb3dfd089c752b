// =============================================================================
// Fan-out sink — forwards to several sinks, isolating their failures
// =============================================================================

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use super::SignalSink;
use crate::report::{CycleSummary, SignalReport};

#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn SignalSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl SignalSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl SignalSink for FanoutSink {
    fn name(&self) -> &str {
        "fanout"
    }

    async fn emit(&self, report: &SignalReport) -> Result<()> {
        for sink in &self.sinks {
            if let Err(e) = sink.emit(report).await {
                warn!(sink = sink.name(), instrument = %report.instrument, error = %e, "sink emit failed");
            }
        }
        Ok(())
    }

    async fn end_cycle(&self, summary: &CycleSummary, reports: &[SignalReport]) -> Result<()> {
        for sink in &self.sinks {
            if let Err(e) = sink.end_cycle(summary, reports).await {
                warn!(sink = sink.name(), cycle = summary.cycle, error = %e, "sink end_cycle failed");
            }
        }
        Ok(())
    }
}
