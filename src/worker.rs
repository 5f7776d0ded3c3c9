//! The background loop that batches encoded lines and writes them to the sink.

use std::fmt;

use cadence::MetricSink;

use log::*;
use tokio::{
    select,
    sync::mpsc::UnboundedReceiver,
    time::{
        interval_at,
        Duration,
        Instant,
        MissedTickBehavior,
    },
};
use tokio_util::sync::CancellationToken;

use crate::{
    error::Error,
    runner::Runner,
    ErrorHandler,
    MetricFuture,
    DEFAULT_FLUSH_THRESHOLD,
};

#[derive(Clone, Debug)]
pub(crate) enum Cmd {
    Write(String),
    Flush,
}

/// Owns the batch buffer and the sink of a [`Publisher`](crate::Publisher).
///
/// Nothing is written until the runner is polled. It runs until its token is
/// cancelled or every publisher clone and handle has been dropped, and writes
/// whatever is still buffered before returning.
pub struct PublisherRunner {
    rx: UnboundedReceiver<Cmd>,
    sink: Box<dyn MetricSink + Send + Sync>,
    flush_interval: Duration,
    flush_threshold: Option<usize>,
    error_handler: ErrorHandler,
}

impl PublisherRunner {
    pub(crate) fn new(
        rx: UnboundedReceiver<Cmd>,
        sink: Box<dyn MetricSink + Send + Sync>,
        flush_interval: Duration,
        flush_threshold: Option<usize>,
        error_handler: ErrorHandler,
    ) -> Self {
        Self {
            rx,
            sink,
            flush_interval,
            flush_threshold,
            error_handler,
        }
    }

    /// Runs the batching loop until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        let Self {
            mut rx,
            sink,
            flush_interval,
            flush_threshold,
            error_handler,
        } = self;

        let mut batch = Batch {
            buf: String::with_capacity(flush_threshold.unwrap_or(DEFAULT_FLUSH_THRESHOLD)),
            threshold: flush_threshold,
            sink: sink.as_ref(),
            error_handler: &error_handler,
        };

        let mut ticker = interval_at(Instant::now() + flush_interval, flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            select! {
                cmd = rx.recv() => match cmd {
                    Some(cmd) => batch.apply(cmd),
                    None => {
                        debug!("stop: no publishers left");
                        break;
                    }
                },

                _ = ticker.tick() => {
                    trace!("tick");
                    batch.flush();
                }

                _ = cancel.cancelled() => {
                    debug!("stop: cancelled");

                    rx.close();
                    while let Ok(cmd) = rx.try_recv() {
                        batch.apply(cmd);
                    }

                    break;
                }
            }
        }

        batch.flush();
    }
}

impl Runner for PublisherRunner {
    fn run(self: Box<Self>, cancel: CancellationToken) -> MetricFuture {
        Box::pin(PublisherRunner::run(*self, cancel))
    }
}

impl fmt::Debug for PublisherRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PublisherRunner")
            .field("flush_interval", &self.flush_interval)
            .field("flush_threshold", &self.flush_threshold)
            .finish_non_exhaustive()
    }
}

struct Batch<'a> {
    buf: String,
    threshold: Option<usize>,
    sink: &'a (dyn MetricSink + Send + Sync),
    error_handler: &'a ErrorHandler,
}

impl Batch<'_> {
    fn apply(&mut self, cmd: Cmd) {
        match cmd {
            Cmd::Write(line) => {
                trace!("write: {}", line.trim_end());

                self.buf.push_str(&line);
                if matches!(self.threshold, Some(threshold) if self.buf.len() >= threshold) {
                    self.flush();
                }
            }

            Cmd::Flush => {
                trace!("flush");
                self.flush();
            }
        }
    }

    /// Writes the whole batch in one call. The batch is cleared even when the
    /// write fails; lost lines are not retried.
    fn flush(&mut self) {
        if self.buf.is_empty() {
            return;
        }

        match self.sink.emit(&self.buf) {
            Ok(n) => {
                debug!("sent {} bytes", n);
            }

            Err(e) => {
                (self.error_handler)(Error::from(e));
            }
        }

        self.buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        io::{
            Error,
            ErrorKind,
            Result,
        },
        sync::{
            atomic::{
                AtomicUsize,
                Ordering,
            },
            Arc,
            Mutex,
        },
    };

    use tokio::sync::mpsc;

    #[derive(Clone, Default)]
    struct TestSink {
        items: Arc<Mutex<Vec<String>>>,
        fail: bool,
    }

    impl MetricSink for TestSink {
        fn emit(&self, metric: &str) -> Result<usize> {
            if self.fail {
                return Err(Error::new(ErrorKind::ConnectionRefused, "unreachable"));
            }

            self.items.lock().unwrap().push(metric.to_owned());
            Ok(metric.len())
        }
    }

    fn runner(
        sink: TestSink,
        flush_interval: Duration,
        flush_threshold: Option<usize>,
        error_handler: ErrorHandler,
    ) -> (mpsc::UnboundedSender<Cmd>, PublisherRunner) {
        let (tx, rx) = mpsc::unbounded_channel();
        let runner = PublisherRunner::new(
            rx,
            Box::new(sink),
            flush_interval,
            flush_threshold,
            error_handler,
        );
        (tx, runner)
    }

    #[tokio::test]
    async fn send_single_line_on_stop() {
        let sink = TestSink::default();
        let (tx, runner) = runner(sink.clone(), Duration::from_secs(60), Some(10), crate::discard_errors());

        tx.send(Cmd::Write("test1\n".to_owned())).unwrap();
        drop(tx);

        runner.run(CancellationToken::new()).await;

        assert_eq!(vec!["test1\n".to_owned()], *sink.items.lock().unwrap());
    }

    #[tokio::test]
    async fn threshold_splits_batches() {
        let sink = TestSink::default();
        let (tx, runner) = runner(sink.clone(), Duration::from_secs(60), Some(10), crate::discard_errors());

        for line in ["abcdef\n", "ghijkl\n", "mn\n"] {
            tx.send(Cmd::Write(line.to_owned())).unwrap();
        }
        drop(tx);

        runner.run(CancellationToken::new()).await;

        assert_eq!(
            vec!["abcdef\nghijkl\n".to_owned(), "mn\n".to_owned()],
            *sink.items.lock().unwrap()
        );
    }

    #[tokio::test]
    async fn no_threshold_keeps_batching() {
        let sink = TestSink::default();
        let (tx, runner) = runner(sink.clone(), Duration::from_secs(60), None, crate::discard_errors());

        for _ in 0..100 {
            tx.send(Cmd::Write("0123456789\n".to_owned())).unwrap();
        }
        tx.send(Cmd::Flush).unwrap();
        drop(tx);

        runner.run(CancellationToken::new()).await;

        let items = sink.items.lock().unwrap();
        assert_eq!(1, items.len());
        assert_eq!(1100, items[0].len());
    }

    #[tokio::test(start_paused = true)]
    async fn tick_flushes_batch() {
        let sink = TestSink::default();
        let (tx, runner) = runner(sink.clone(), Duration::from_secs(1), None, crate::discard_errors());
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(runner.run(cancel.clone()));

        tx.send(Cmd::Write("a\n".to_owned())).unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        assert_eq!(vec!["a\n".to_owned()], *sink.items.lock().unwrap());

        cancel.cancel();
        worker.await.unwrap();
    }

    #[tokio::test]
    async fn sink_errors_are_reported_and_batch_dropped() {
        let errors = Arc::new(AtomicUsize::new(0));
        let handler: ErrorHandler = {
            let errors = errors.clone();
            Arc::new(move |e| {
                assert_eq!(cadence::ErrorKind::IoError, e.kind());
                errors.fetch_add(1, Ordering::SeqCst);
            })
        };
        let sink = TestSink {
            fail: true,
            ..TestSink::default()
        };
        let (tx, runner) = runner(sink, Duration::from_secs(60), Some(4), handler);

        tx.send(Cmd::Write("abcd\n".to_owned())).unwrap();
        tx.send(Cmd::Write("ef\n".to_owned())).unwrap();
        drop(tx);

        runner.run(CancellationToken::new()).await;

        assert_eq!(2, errors.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancel_drains_queue() {
        let sink = TestSink::default();
        let (tx, runner) = runner(sink.clone(), Duration::from_secs(60), None, crate::discard_errors());
        let cancel = CancellationToken::new();

        tx.send(Cmd::Write("a\n".to_owned())).unwrap();
        tx.send(Cmd::Write("b\n".to_owned())).unwrap();
        cancel.cancel();

        runner.run(cancel).await;

        assert_eq!(vec!["a\nb\n".to_owned()], *sink.items.lock().unwrap());
        assert!(tx.send(Cmd::Flush).is_err());
    }
}
