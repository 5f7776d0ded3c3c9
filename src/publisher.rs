//! The publisher: a [`Metrics`] factory that queues encoded lines for its runner.

use std::{
    fmt,
    sync::Arc,
};

use cadence::{
    ErrorKind as MetricErrorKind,
    MetricSink,
    NopMetricSink,
};

use log::trace;
use tokio::{
    sync::mpsc::UnboundedSender,
    time::Duration,
};

use crate::{
    builder::Builder,
    encoder::{
        self,
        Encoder,
    },
    error::{
        Error,
        Result,
    },
    metric::{
        Counter,
        Event,
        Gauge,
        Histogram,
        Metrics,
        Notify,
        Op,
        Timer,
    },
    stdout::StdoutMetricSink,
    tag::{
        Tag,
        Value,
    },
    worker::{
        Cmd,
        PublisherRunner,
    },
    ErrorHandler,
    FLUSH_EVERY_15S,
    FLUSH_EVERY_3S,
};

/// Metrics implementation that encodes every update and hands the line to its
/// [`PublisherRunner`], which batches lines and writes them to a metric sink.
///
/// Publishers are cheap to clone; all clones feed the same runner. Updates made
/// before the runner is polled are kept in the queue until it starts.
///
/// The queue is unbounded, so updates never block the caller. The flip side is
/// that there is no backpressure: if the runner is not polled, or its sink
/// stalls, queued lines accumulate in memory until the runner catches up.
#[derive(Clone)]
pub struct Publisher {
    shared: Arc<Shared>,
}

struct Shared {
    tx: UnboundedSender<Cmd>,
    encoder: Encoder,
    error_handler: ErrorHandler,
}

impl Shared {
    fn send(&self, cmd: Cmd) {
        if self.tx.send(cmd).is_err() {
            (self.error_handler)(Error::from((
                MetricErrorKind::IoError,
                "publisher is not running",
            )));
        }
    }
}

impl Notify for Shared {
    fn notify(&self, op: Op, name: &str, value: Value, tags: &[Tag]) {
        match (self.encoder)(name, op, &value, tags, 1.0) {
            Ok(line) => self.send(Cmd::Write(line)),
            Err(e) => (self.error_handler)(e),
        }
    }
}

impl Publisher {
    /// Creates a publisher writing to `sink`, flushing every `flush_interval`.
    /// Errors are discarded when no handler is given.
    ///
    /// # Errors
    ///
    /// Returns an error when the flush interval is zero.
    pub fn new<S>(
        sink: S,
        encoder: Encoder,
        flush_interval: Duration,
        error_handler: Option<ErrorHandler>,
    ) -> Result<(Self, PublisherRunner)>
    where
        S: MetricSink + Send + Sync + 'static,
    {
        let mut builder = Self::builder(sink, encoder);
        builder.flush_interval(flush_interval);
        if let Some(error_handler) = error_handler {
            builder.error_handler(error_handler);
        }

        builder.build()
    }

    /// Returns a builder for a publisher writing to `sink` with `encoder`.
    pub fn builder<S>(sink: S, encoder: Encoder) -> Builder
    where
        S: MetricSink + Send + Sync + 'static,
    {
        Builder::new(sink, encoder)
    }

    /// Publisher that drops everything it is given, for tests or disabled metrics.
    pub fn discard_all() -> (Self, PublisherRunner) {
        let mut builder = Self::builder(NopMetricSink, Arc::new(encoder::statsd));
        builder.flush_interval(FLUSH_EVERY_15S);
        builder.into_parts()
    }

    /// Publisher printing human readable lines to standard output.
    ///
    /// # Errors
    ///
    /// Returns an error when the flush interval is zero.
    pub fn stdout(
        flush_interval: Duration,
        error_handler: Option<ErrorHandler>,
    ) -> Result<(Self, PublisherRunner)> {
        Self::new(
            StdoutMetricSink,
            Arc::new(encoder::stdout),
            flush_interval,
            error_handler,
        )
    }

    /// Publisher printing DataDog Lambda monitoring lines to standard output.
    ///
    /// Lambda invocations are short-lived, so batches are only written on the
    /// 3 second tick, on [`flush`](Self::flush) and on shutdown, never by size.
    pub fn datadog_lambda() -> (Self, PublisherRunner) {
        let mut builder = Self::builder(StdoutMetricSink, Arc::new(encoder::datadog_lambda));
        builder.flush_interval(FLUSH_EVERY_3S);
        builder.flush_threshold(None);
        builder.into_parts()
    }

    pub(crate) fn from_parts(
        tx: UnboundedSender<Cmd>,
        encoder: Encoder,
        error_handler: ErrorHandler,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                tx,
                encoder,
                error_handler,
            }),
        }
    }

    /// Asks the runner to write out its current batch.
    ///
    /// This only signals the runner; it does not wait for the write. The request
    /// is ordered after every update previously made through this publisher.
    pub fn flush(&self) {
        trace!("flush requested");
        self.shared.send(Cmd::Flush);
    }

    fn notifier(&self) -> Arc<dyn Notify> {
        self.shared.clone()
    }
}

impl Metrics for Publisher {
    fn counter(&self, name: &str, tags: &[Tag]) -> Counter {
        Counter::new(name, tags.to_vec(), self.notifier())
    }

    fn gauge(&self, name: &str, tags: &[Tag]) -> Gauge {
        Gauge::new(name, tags.to_vec(), self.notifier())
    }

    fn event(&self, name: &str, tags: &[Tag]) -> Event {
        Event::new(name, tags.to_vec(), self.notifier())
    }

    fn timer(&self, name: &str, tags: &[Tag]) -> Timer {
        Timer::new(name, tags.to_vec(), self.notifier())
    }

    fn histogram(&self, name: &str, tags: &[Tag]) -> Histogram {
        Histogram::new(name, tags.to_vec(), self.notifier())
    }
}

impl fmt::Debug for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher")
            .field("running", &!self.shared.tx.is_closed())
            .finish()
    }
}
