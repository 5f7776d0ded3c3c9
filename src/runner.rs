//! Background tasks driven by a cancellation token.

use log::*;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::MetricFuture;

/// A long-lived background task that runs until its token is cancelled.
pub trait Runner: Send {
    fn run(self: Box<Self>, cancel: CancellationToken) -> MetricFuture;
}

/// Runs several runners concurrently, each on its own Tokio task, and completes
/// once all of them have returned.
#[derive(Default)]
pub struct MultiRunner {
    runners: Vec<Box<dyn Runner>>,
}

impl MultiRunner {
    pub fn new(runners: Vec<Box<dyn Runner>>) -> Self {
        Self { runners }
    }

    pub fn push(&mut self, runner: Box<dyn Runner>) -> &mut Self {
        self.runners.push(runner);
        self
    }

    pub fn len(&self) -> usize {
        self.runners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }
}

impl Runner for MultiRunner {
    fn run(self: Box<Self>, cancel: CancellationToken) -> MetricFuture {
        Box::pin(async move {
            let mut tasks = JoinSet::new();
            for runner in self.runners {
                tasks.spawn(runner.run(cancel.clone()));
            }

            while let Some(res) = tasks.join_next().await {
                if let Err(e) = res {
                    error!("runner task failed: {}", e);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{
            AtomicUsize,
            Ordering,
        },
        Arc,
    };

    use tokio::time::{
        timeout,
        Duration,
    };

    struct CountOnCancel(Arc<AtomicUsize>);

    impl Runner for CountOnCancel {
        fn run(self: Box<Self>, cancel: CancellationToken) -> MetricFuture {
            Box::pin(async move {
                cancel.cancelled().await;
                self.0.fetch_add(1, Ordering::SeqCst);
            })
        }
    }

    #[tokio::test]
    async fn runs_all_until_cancelled() {
        let done = Arc::new(AtomicUsize::new(0));
        let mut multi = MultiRunner::default();
        for _ in 0..5 {
            multi.push(Box::new(CountOnCancel(done.clone())));
        }
        assert_eq!(5, multi.len());

        let cancel = CancellationToken::new();
        let task = tokio::spawn(Box::new(multi).run(cancel.clone()));

        tokio::task::yield_now().await;
        assert_eq!(0, done.load(Ordering::SeqCst));

        cancel.cancel();
        timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
        assert_eq!(5, done.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn empty_completes_immediately() {
        let multi = MultiRunner::new(Vec::new());
        assert!(multi.is_empty());
        timeout(Duration::from_secs(1), Box::new(multi).run(CancellationToken::new()))
            .await
            .unwrap();
    }
}
