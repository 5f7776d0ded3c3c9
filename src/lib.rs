#![allow(clippy::type_complexity)]

//! Buffered, asynchronous metrics publishing for Tokio applications.
//!
//! Application code obtains [`Counter`], [`Gauge`], [`Event`], [`Timer`] and
//! [`Histogram`] handles from a [`Metrics`] factory. Every update is encoded
//! into a single wire-format line (StatsD, Librato, DataDog Lambda) and queued
//! for a background [`PublisherRunner`], which batches lines and writes them to
//! a [`MetricSink`](cadence::MetricSink) when the batch reaches
//! [`DEFAULT_FLUSH_THRESHOLD`] bytes, on every flush interval tick, or when
//! [`Publisher::flush`] is called.
//!
//! Reporting is best-effort: handle methods never fail, encoding and sink
//! errors go to the configured [`ErrorHandler`], and datagrams lost on the
//! way to the collector are not retried.
//!
//! ## Important!
//! The client is responsible for running the [`PublisherRunner`] (e.g., spawning it
//! in a Tokio task) and for cancelling its token on shutdown so the last batch
//! is flushed.
//!
//! ### Example
//!
//! ```no_run
//! use bsk_metrics::{with_namespace, DatadogOptions, Metrics, Publisher, Tag};
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> bsk_metrics::Result<()> {
//! let (publisher, runner) = Publisher::datadog(DatadogOptions::default())?;
//! let cancel = CancellationToken::new();
//!
//! // Spawn the runner!
//! let processing_job = tokio::spawn(runner.run(cancel.clone()));
//!
//! let metrics = with_namespace(publisher, "my_service");
//! metrics.counter("requests", &[Tag::new("route", "/")]).inc();
//! metrics.gauge("queue.len", &[]).update(7);
//!
//! let mut timer = metrics.timer("work", &[]);
//! timer.start();
//! timer.stop();
//!
//! // Cancel and wait for the final flush.
//! cancel.cancel();
//! processing_job.await.unwrap();
//! # Ok(())
//! # }
//! ```

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
};

use log::error;
use tokio::time::Duration;

pub mod builder;
pub mod dsn;
pub mod encoder;
pub mod error;
pub mod lambda;
pub mod metric;
pub mod namespaced;
pub mod publisher;
pub mod recorder;
pub mod runner;
pub mod runtime_stats;
pub mod stdout;
pub mod tag;
pub mod tagged;
pub mod udp;
pub mod unix;
pub mod worker;

pub use crate::{
    builder::Builder,
    dsn::{
        from_dsn,
        try_from_dsn,
    },
    encoder::Encoder,
    error::{
        Error,
        Result,
    },
    lambda::DataDogLambdaFuncMetrics,
    metric::{
        Counter,
        Event,
        Gauge,
        Histogram,
        Metric,
        Metrics,
        Notify,
        Op,
        Timer,
    },
    namespaced::{
        with_namespace,
        Namespaced,
    },
    publisher::Publisher,
    recorder::{
        has_tag,
        Recorder,
    },
    runner::{
        MultiRunner,
        Runner,
    },
    runtime_stats::RuntimeStatsRunner,
    stdout::StdoutMetricSink,
    tag::{
        Tag,
        Tags,
        Value,
    },
    tagged::Tagged,
    udp::DatadogOptions,
    unix::UdsMetricSink,
    worker::PublisherRunner,
};

/// Background processing future handed to the caller to poll.
pub type MetricFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Callback receiving errors raised away from the caller (encoding, sink writes).
pub type ErrorHandler = Arc<dyn Fn(Error) + Send + Sync>;

/// Batch size, in bytes, that triggers a flush regardless of the flush interval.
pub const DEFAULT_FLUSH_THRESHOLD: usize = 1024;

/// Default flush interval, matching the DataDog agent's own flush period.
pub const DEFAULT_FLUSH_INTERVAL: Duration = FLUSH_EVERY_15S;

pub const FLUSH_EVERY_3S: Duration = Duration::from_secs(3);
pub const FLUSH_EVERY_5S: Duration = Duration::from_secs(5);
pub const FLUSH_EVERY_10S: Duration = Duration::from_secs(10);
pub const FLUSH_EVERY_15S: Duration = Duration::from_secs(15);

/// Error handler that drops every error. This is the default.
pub fn discard_errors() -> ErrorHandler {
    Arc::new(|_: Error| {})
}

/// Error handler that logs every error at `error` level.
pub fn log_errors() -> ErrorHandler {
    Arc::new(|e: Error| error!("metrics error: {}", e))
}
