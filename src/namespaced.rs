//! Decorator prefixing metric names with a namespace.

use crate::{
    metric::{
        Counter,
        Event,
        Gauge,
        Histogram,
        Metrics,
        Timer,
    },
    tag::Tag,
};

/// Metrics wrapper whose handles are named `<namespace>.<name>`.
///
/// Wrapping an already namespaced factory puts the newest namespace first:
/// `with_namespace(with_namespace(m, "a"), "b")` names `x` as `b.a.x`.
#[derive(Clone, Debug)]
pub struct Namespaced<M> {
    namespace: String,
    inner: M,
}

impl<M: Metrics> Namespaced<M> {
    pub fn new(inner: M, namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            inner,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn inner(&self) -> &M {
        &self.inner
    }
}

/// Composes `metrics` so every handle it creates is namespaced.
pub fn with_namespace<M: Metrics>(metrics: M, namespace: impl Into<String>) -> Namespaced<M> {
    Namespaced::new(metrics, namespace)
}

impl<M: Metrics> Metrics for Namespaced<M> {
    fn counter(&self, name: &str, tags: &[Tag]) -> Counter {
        self.inner.counter(name, tags).prefixed(&self.namespace)
    }

    fn gauge(&self, name: &str, tags: &[Tag]) -> Gauge {
        self.inner.gauge(name, tags).prefixed(&self.namespace)
    }

    fn event(&self, name: &str, tags: &[Tag]) -> Event {
        self.inner.event(name, tags).prefixed(&self.namespace)
    }

    fn timer(&self, name: &str, tags: &[Tag]) -> Timer {
        self.inner.timer(name, tags).prefixed(&self.namespace)
    }

    fn histogram(&self, name: &str, tags: &[Tag]) -> Histogram {
        self.inner.histogram(name, tags).prefixed(&self.namespace)
    }
}
