//! Builder for customizing a [`Publisher`](crate::Publisher) before starting it.

use std::fmt;

use cadence::{
    ErrorKind as MetricErrorKind,
    MetricSink,
};

use tokio::time::Duration;

use crate::{
    discard_errors,
    encoder::Encoder,
    error::{
        Error,
        Result,
    },
    publisher::Publisher,
    worker::PublisherRunner,
    ErrorHandler,
    DEFAULT_FLUSH_INTERVAL,
    DEFAULT_FLUSH_THRESHOLD,
};

/// Builder allows you to override various default parameter values before creating
/// a publisher and its runner.
pub struct Builder {
    pub(crate) sink: Box<dyn MetricSink + Send + Sync>,
    pub(crate) encoder: Encoder,
    pub(crate) flush_interval: Duration,
    pub(crate) flush_threshold: Option<usize>,
    pub(crate) error_handler: ErrorHandler,
}

impl Builder {
    pub(crate) fn new<S>(sink: S, encoder: Encoder) -> Self
    where
        S: MetricSink + Send + Sync + 'static,
    {
        Self {
            sink: Box::new(sink),
            encoder,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            flush_threshold: Some(DEFAULT_FLUSH_THRESHOLD),
            error_handler: discard_errors(),
        }
    }

    /// Sets the interval between periodic flushes (default: [DEFAULT_FLUSH_INTERVAL](crate::DEFAULT_FLUSH_INTERVAL)).
    pub fn flush_interval(&mut self, flush_interval: Duration) -> &mut Self {
        self.flush_interval = flush_interval;
        self
    }

    /// Sets the batch size that triggers an immediate flush, or `None` to only flush
    /// on ticks and requests (default: [DEFAULT_FLUSH_THRESHOLD](crate::DEFAULT_FLUSH_THRESHOLD)).
    pub fn flush_threshold(&mut self, flush_threshold: Option<usize>) -> &mut Self {
        self.flush_threshold = flush_threshold;
        self
    }

    /// Sets the handler receiving encoding and sink errors (default: [discard_errors](crate::discard_errors)).
    pub fn error_handler(&mut self, error_handler: ErrorHandler) -> &mut Self {
        self.error_handler = error_handler;
        self
    }

    /// Creates the publisher and the runner that must be polled for it to make progress.
    ///
    /// # Errors
    ///
    /// Returns an error when the flush interval or the flush threshold is zero.
    pub fn build(self) -> Result<(Publisher, PublisherRunner)> {
        if self.flush_interval.is_zero() {
            return Err(Error::from((
                MetricErrorKind::InvalidInput,
                "Flush interval must be greater than 0",
            )));
        }

        if self.flush_threshold == Some(0) {
            return Err(Error::from((
                MetricErrorKind::InvalidInput,
                "Flush threshold must be greater than 0",
            )));
        }

        Ok(self.into_parts())
    }

    pub(crate) fn into_parts(self) -> (Publisher, PublisherRunner) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let publisher = Publisher::from_parts(tx, self.encoder, self.error_handler.clone());
        let runner = PublisherRunner::new(
            rx,
            self.sink,
            self.flush_interval,
            self.flush_threshold,
            self.error_handler,
        );

        (publisher, runner)
    }
}

impl fmt::Debug for Builder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Builder")
            .field("flush_interval", &self.flush_interval)
            .field("flush_threshold", &self.flush_threshold)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence::NopMetricSink;
    use std::sync::Arc;

    use crate::encoder;

    #[test]
    fn defaults() {
        let builder = Builder::new(NopMetricSink, Arc::new(encoder::statsd));
        assert_eq!(DEFAULT_FLUSH_INTERVAL, builder.flush_interval);
        assert_eq!(Some(DEFAULT_FLUSH_THRESHOLD), builder.flush_threshold);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut builder = Builder::new(NopMetricSink, Arc::new(encoder::statsd));
        builder.flush_interval(Duration::ZERO);
        let err = builder.build().unwrap_err();
        assert_eq!(MetricErrorKind::InvalidInput, err.kind());
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let mut builder = Builder::new(NopMetricSink, Arc::new(encoder::statsd));
        builder.flush_threshold(Some(0));
        assert!(builder.build().is_err());
    }
}
