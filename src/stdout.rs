//! Metric sink printing batches to standard output.

use std::io::{
    self,
    Result,
    Write,
};

use cadence::MetricSink;

/// Writes every batch to standard output and flushes it immediately.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdoutMetricSink;

impl MetricSink for StdoutMetricSink {
    fn emit(&self, metric: &str) -> Result<usize> {
        let mut out = io::stdout().lock();
        out.write_all(metric.as_bytes())?;
        out.flush()?;
        Ok(metric.len())
    }

    fn flush(&self) -> Result<()> {
        io::stdout().lock().flush()
    }
}
