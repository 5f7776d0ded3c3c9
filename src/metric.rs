//! Metric handles and the factory interface that produces them.

use std::{
    fmt,
    sync::Arc,
    time::Instant,
};

use crate::tag::{
    Tag,
    Tags,
    Value,
};

/// The update operation carried by a metric notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    CounterAdd,
    GaugeUpdate,
    HistogramUpdate,
    EventSend,
    TimerStop,
}

impl Op {
    /// Position of the operation in declaration order, used by the debug encoder.
    pub fn index(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Op::CounterAdd => "counter add",
            Op::GaugeUpdate => "gauge update",
            Op::HistogramUpdate => "histogram update",
            Op::EventSend => "event send",
            Op::TimerStop => "timer stop",
        };

        f.write_str(name)
    }
}

/// Receiver of metric updates. Every handle forwards its updates here.
///
/// Implementations must not fail the caller; errors are theirs to handle.
pub trait Notify: Send + Sync {
    fn notify(&self, op: Op, name: &str, value: Value, tags: &[Tag]);
}

/// Factory of metric handles.
///
/// Tags passed here are copied into the handle; later changes to the caller's
/// slice have no effect on it.
pub trait Metrics: Send + Sync {
    /// Provides a counter with the given name and tags.
    fn counter(&self, name: &str, tags: &[Tag]) -> Counter;

    /// Provides a gauge with the given name and tags.
    fn gauge(&self, name: &str, tags: &[Tag]) -> Gauge;

    /// Provides an event with the given title and tags.
    fn event(&self, name: &str, tags: &[Tag]) -> Event;

    /// Provides a timer with the given name and tags.
    fn timer(&self, name: &str, tags: &[Tag]) -> Timer;

    /// Provides a histogram with the given name and tags.
    fn histogram(&self, name: &str, tags: &[Tag]) -> Histogram;
}

impl<M: Metrics + ?Sized> Metrics for Arc<M> {
    fn counter(&self, name: &str, tags: &[Tag]) -> Counter {
        (**self).counter(name, tags)
    }

    fn gauge(&self, name: &str, tags: &[Tag]) -> Gauge {
        (**self).gauge(name, tags)
    }

    fn event(&self, name: &str, tags: &[Tag]) -> Event {
        (**self).event(name, tags)
    }

    fn timer(&self, name: &str, tags: &[Tag]) -> Timer {
        (**self).timer(name, tags)
    }

    fn histogram(&self, name: &str, tags: &[Tag]) -> Histogram {
        (**self).histogram(name, tags)
    }
}

/// Common accessors of every metric handle.
pub trait Metric {
    fn name(&self) -> &str;
    fn tags(&self) -> &[Tag];
}

#[derive(Clone)]
struct Handle {
    name: String,
    tags: Tags,
    notify: Arc<dyn Notify>,
}

impl Handle {
    fn emit(&self, op: Op, value: Value) {
        self.notify.notify(op, &self.name, value, &self.tags);
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("name", &self.name)
            .field("tags", &self.tags)
            .finish_non_exhaustive()
    }
}

macro_rules! handle {
    ($Handle:ident { $($field:ident: $init:expr),* }) => {
        impl $Handle {
            /// Creates a handle that forwards its updates to `notify`.
            pub fn new(name: impl Into<String>, tags: Tags, notify: Arc<dyn Notify>) -> Self {
                Self {
                    handle: Handle {
                        name: name.into(),
                        tags,
                        notify,
                    },
                    $($field: $init),*
                }
            }

            /// Appends tags to this handle. Only later updates carry them.
            pub fn with_tags(mut self, tags: impl IntoIterator<Item = Tag>) -> Self {
                self.handle.tags.extend(tags);
                self
            }

            /// Appends a single tag to this handle.
            pub fn with_tag(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
                self.with_tags(Some(Tag::new(key, value)))
            }

            pub(crate) fn prefixed(mut self, namespace: &str) -> Self {
                self.handle.name = format!("{}.{}", namespace, self.handle.name);
                self
            }
        }

        impl Metric for $Handle {
            fn name(&self) -> &str {
                &self.handle.name
            }

            fn tags(&self) -> &[Tag] {
                &self.handle.tags
            }
        }
    };
}

/// A monotonically increasing count of occurrences.
#[derive(Clone, Debug)]
pub struct Counter {
    handle: Handle,
}

handle!(Counter {});

impl Counter {
    pub fn inc(&self) {
        self.add(1);
    }

    pub fn add(&self, delta: u64) {
        self.handle.emit(Op::CounterAdd, Value::Unsigned(delta));
    }
}

/// An instantaneous measurement of a value.
#[derive(Clone, Debug)]
pub struct Gauge {
    handle: Handle,
}

handle!(Gauge {});

impl Gauge {
    pub fn update(&self, value: impl Into<Value>) {
        self.handle.emit(Op::GaugeUpdate, value.into());
    }
}

/// A single titled event; the handle name is the event title.
#[derive(Clone, Debug)]
pub struct Event {
    handle: Handle,
}

handle!(Event {});

impl Event {
    pub fn send(&self) {
        self.send_with_text("");
    }

    pub fn send_with_text(&self, text: impl Into<String>) {
        self.handle.emit(Op::EventSend, Value::Text(text.into()));
    }
}

/// Measures the time between [`start`](Timer::start) and [`stop`](Timer::stop).
#[derive(Clone, Debug)]
pub struct Timer {
    handle: Handle,
    started: Option<Instant>,
}

handle!(Timer { started: None });

impl Timer {
    /// Records the reference point. Calling it again moves the reference point.
    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Reports the elapsed milliseconds since the last start, if the timer was started.
    pub fn stop(&mut self) {
        if let Some(started) = self.started.take() {
            let elapsed_ms = started.elapsed().as_secs_f64() * 1e3;
            self.handle.emit(Op::TimerStop, Value::Float(elapsed_ms));
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.is_some()
    }
}

/// A series of unsigned samples whose distribution is computed downstream.
#[derive(Clone, Debug)]
pub struct Histogram {
    handle: Handle,
}

handle!(Histogram {});

impl Histogram {
    pub fn add_value(&self, value: u64) {
        self.handle.emit(Op::HistogramUpdate, Value::Unsigned(value));
    }
}
