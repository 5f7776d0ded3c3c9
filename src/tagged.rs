//! Decorator adding a fixed set of tags to every metric.

use crate::{
    metric::{
        Counter,
        Event,
        Gauge,
        Histogram,
        Metrics,
        Timer,
    },
    tag::{
        Tag,
        Tags,
    },
};

/// Metrics wrapper whose handles always start with the same tags.
///
/// The fixed tags come first, followed by the tags given at the call site.
#[derive(Clone, Debug)]
pub struct Tagged<M> {
    inner: M,
    tags: Tags,
}

impl<M: Metrics> Tagged<M> {
    pub fn new(inner: M, tags: impl IntoIterator<Item = Tag>) -> Self {
        Self {
            inner,
            tags: tags.into_iter().collect(),
        }
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }
}

impl<M: Metrics> Metrics for Tagged<M> {
    fn counter(&self, name: &str, tags: &[Tag]) -> Counter {
        self.inner.counter(name, &self.tags).with_tags(tags.iter().cloned())
    }

    fn gauge(&self, name: &str, tags: &[Tag]) -> Gauge {
        self.inner.gauge(name, &self.tags).with_tags(tags.iter().cloned())
    }

    fn event(&self, name: &str, tags: &[Tag]) -> Event {
        self.inner.event(name, &self.tags).with_tags(tags.iter().cloned())
    }

    fn timer(&self, name: &str, tags: &[Tag]) -> Timer {
        self.inner.timer(name, &self.tags).with_tags(tags.iter().cloned())
    }

    fn histogram(&self, name: &str, tags: &[Tag]) -> Histogram {
        self.inner.histogram(name, &self.tags).with_tags(tags.iter().cloned())
    }
}
