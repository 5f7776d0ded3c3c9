//! In-memory [`Metrics`] implementation for inspecting metrics in tests.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        PoisonError,
        RwLock,
    },
};

use crate::{
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
    tag::{
        Tag,
        Tags,
        Value,
    },
};

/// What a recorded metric has observed so far.
#[derive(Clone, Debug, PartialEq)]
pub enum Recorded {
    /// Sum of every delta added.
    Counter(u64),
    /// Last value set.
    Gauge(Option<Value>),
    /// Last event sent, as `<title>|<text>`.
    Event(Option<String>),
    /// Number of stops and the last duration in milliseconds.
    Timer { stops: u64, last_ms: Option<f64> },
    /// Every sample added, in order.
    Histogram(Vec<u64>),
}

impl Recorded {
    fn empty(op: Op) -> Self {
        match op {
            Op::CounterAdd => Recorded::Counter(0),
            Op::GaugeUpdate => Recorded::Gauge(None),
            Op::EventSend => Recorded::Event(None),
            Op::TimerStop => Recorded::Timer {
                stops: 0,
                last_ms: None,
            },
            Op::HistogramUpdate => Recorded::Histogram(Vec::new()),
        }
    }

    fn op(&self) -> Op {
        match self {
            Recorded::Counter(_) => Op::CounterAdd,
            Recorded::Gauge(_) => Op::GaugeUpdate,
            Recorded::Event(_) => Op::EventSend,
            Recorded::Timer { .. } => Op::TimerStop,
            Recorded::Histogram(_) => Op::HistogramUpdate,
        }
    }
}

/// Snapshot of a metric held by a [`Recorder`].
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedMetric {
    pub name: String,
    pub tags: Tags,
    pub value: Recorded,
}

impl Metric for RecordedMetric {
    fn name(&self) -> &str {
        &self.name
    }

    fn tags(&self) -> &[Tag] {
        &self.tags
    }
}

#[derive(Default)]
struct Registry {
    metrics: RwLock<HashMap<String, RecordedMetric>>,
}

impl Registry {
    fn register(&self, name: &str, tags: &[Tag], op: Op, replace: bool) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        let keep = !replace && metrics.get(name).map_or(false, |m| m.value.op() == op);
        if !keep {
            metrics.insert(
                name.to_owned(),
                RecordedMetric {
                    name: name.to_owned(),
                    tags: tags.to_vec(),
                    value: Recorded::empty(op),
                },
            );
        }
    }
}

impl Notify for Registry {
    fn notify(&self, op: Op, name: &str, value: Value, tags: &[Tag]) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        let metric = metrics
            .entry(name.to_owned())
            .or_insert_with(|| RecordedMetric {
                name: name.to_owned(),
                tags: Vec::new(),
                value: Recorded::empty(op),
            });

        if metric.value.op() != op {
            metric.value = Recorded::empty(op);
        }
        metric.tags = tags.to_vec();

        match &mut metric.value {
            Recorded::Counter(sum) => {
                if let Value::Unsigned(delta) = value {
                    *sum += delta;
                }
            }
            Recorded::Gauge(last) => *last = Some(value),
            Recorded::Event(last) => *last = Some(format!("{}|{}", name, value)),
            Recorded::Timer { stops, last_ms } => {
                *stops += 1;
                *last_ms = value.as_f64();
            }
            Recorded::Histogram(samples) => {
                if let Value::Unsigned(sample) = value {
                    samples.push(sample);
                }
            }
        }
    }
}

/// Metrics implementation that keeps what its handles report, keyed by name.
///
/// Counters are shared by name: asking again for an existing counter keeps its
/// accumulated value. Other kinds start over on every request. Each update also
/// stores the tags of the handle that made it.
#[derive(Clone, Default)]
pub struct Recorder {
    registry: Arc<Registry>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the metric registered under `name`.
    pub fn get(&self, name: &str) -> Option<RecordedMetric> {
        self.registry
            .metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.registry
            .metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn notifier(&self) -> Arc<dyn Notify> {
        self.registry.clone()
    }
}

impl Metrics for Recorder {
    fn counter(&self, name: &str, tags: &[Tag]) -> Counter {
        self.registry.register(name, tags, Op::CounterAdd, false);
        Counter::new(name, tags.to_vec(), self.notifier())
    }

    fn gauge(&self, name: &str, tags: &[Tag]) -> Gauge {
        self.registry.register(name, tags, Op::GaugeUpdate, true);
        Gauge::new(name, tags.to_vec(), self.notifier())
    }

    fn event(&self, name: &str, tags: &[Tag]) -> Event {
        self.registry.register(name, tags, Op::EventSend, true);
        Event::new(name, tags.to_vec(), self.notifier())
    }

    fn timer(&self, name: &str, tags: &[Tag]) -> Timer {
        self.registry.register(name, tags, Op::TimerStop, true);
        Timer::new(name, tags.to_vec(), self.notifier())
    }

    fn histogram(&self, name: &str, tags: &[Tag]) -> Histogram {
        self.registry.register(name, tags, Op::HistogramUpdate, true);
        Histogram::new(name, tags.to_vec(), self.notifier())
    }
}

/// Reports whether `metric` carries the tag `key:value`.
pub fn has_tag(metric: &impl Metric, key: &str, value: impl Into<Value>) -> bool {
    let value = value.into();
    metric
        .tags()
        .iter()
        .any(|t| t.key == key && t.value == value)
}
