//! Periodic reporting of Tokio runtime and process memory statistics.

use std::sync::Arc;

use log::*;
use sysinfo::{
    Pid,
    ProcessRefreshKind,
    ProcessesToUpdate,
    System,
};
use tokio::{
    runtime::{
        Handle,
        RuntimeMetrics,
    },
    select,
    time::{
        interval_at,
        Duration,
        Instant,
        MissedTickBehavior,
    },
};
use tokio_util::sync::CancellationToken;

use crate::{
    metric::{
        Gauge,
        Metrics,
    },
    runner::Runner,
    tag::{
        Tag,
        Tags,
    },
    MetricFuture,
};

struct RuntimeGauges {
    workers: Gauge,
    alive_tasks: Gauge,
    global_queue_depth: Gauge,
    resident_bytes: Gauge,
    virtual_bytes: Gauge,
}

impl RuntimeGauges {
    fn new(metrics: &dyn Metrics, tags: &[Tag]) -> Self {
        Self {
            workers: metrics.gauge("runtime.workers", tags),
            alive_tasks: metrics.gauge("runtime.alive_tasks", tags),
            global_queue_depth: metrics.gauge("runtime.global_queue_depth", tags),
            resident_bytes: metrics.gauge("process.mem.resident_bytes", tags),
            virtual_bytes: metrics.gauge("process.mem.virtual_bytes", tags),
        }
    }
}

/// Samples the current Tokio runtime and this process's memory every tick and
/// reports them as gauges, tagged with the caller's tags plus `vm:tokio`.
///
/// Only this process's memory is refreshed on each tick.
pub struct RuntimeStatsRunner {
    metrics: Arc<dyn Metrics>,
    tick: Duration,
    tags: Tags,
    system: System,
    pid: Option<Pid>,
}

impl RuntimeStatsRunner {
    pub fn new(
        metrics: impl Metrics + 'static,
        tick: Duration,
        tags: impl IntoIterator<Item = Tag>,
    ) -> Self {
        let mut tags: Tags = tags.into_iter().collect();
        tags.push(Tag::new("vm", "tokio"));

        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                warn!("process memory stats unavailable: {}", e);
                None
            }
        };

        Self {
            metrics: Arc::new(metrics),
            tick,
            tags,
            system: System::new(),
            pid,
        }
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Reports every tick until `cancel` fires. Must run inside a Tokio runtime.
    pub async fn run(mut self, cancel: CancellationToken) {
        let gauges = RuntimeGauges::new(self.metrics.as_ref(), &self.tags);
        let runtime = Handle::current().metrics();

        let mut ticker = interval_at(Instant::now() + self.tick, self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            select! {
                _ = ticker.tick() => self.collect(&gauges, &runtime),
                _ = cancel.cancelled() => {
                    debug!("runtime stats: stop");
                    break;
                }
            }
        }
    }

    fn collect(&mut self, gauges: &RuntimeGauges, runtime: &RuntimeMetrics) {
        gauges.workers.update(runtime.num_workers());
        gauges.alive_tasks.update(runtime.num_alive_tasks());
        gauges.global_queue_depth.update(runtime.global_queue_depth());

        let Some(pid) = self.pid else {
            return;
        };

        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );

        if let Some(process) = self.system.process(pid) {
            gauges.resident_bytes.update(process.memory());
            gauges.virtual_bytes.update(process.virtual_memory());
        }
    }
}

impl Runner for RuntimeStatsRunner {
    fn run(self: Box<Self>, cancel: CancellationToken) -> MetricFuture {
        Box::pin(RuntimeStatsRunner::run(*self, cancel))
    }
}
