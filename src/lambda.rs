//! Metrics forwarded to the DataDog Lambda library's metric function.
//!
//! Every metric is submitted as a distribution metric through a caller-provided
//! callback, so this crate needs no dependency on the DataDog library itself.
//! See <https://github.com/DataDog/datadog-lambda-go> for the callback's shape.

use std::{
    fmt,
    sync::Arc,
};

use cadence::ErrorKind;

use crate::{
    discard_errors,
    error::Error,
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
    tag::{
        Tag,
        Value,
    },
    ErrorHandler,
};

/// Signature of the function receiving each metric: `(name, value, tags)`,
/// where tags are rendered as `key:value`.
pub type DataDogLambdaFunc = Arc<dyn Fn(&str, f64, &[String]) + Send + Sync>;

struct Forward {
    func: DataDogLambdaFunc,
    error_handler: ErrorHandler,
}

impl Notify for Forward {
    fn notify(&self, op: Op, name: &str, value: Value, tags: &[Tag]) {
        if op == Op::EventSend {
            (self.error_handler)(Error::from((
                ErrorKind::InvalidInput,
                "sending event is not supported in the DataDog Lambda Publisher",
            )));
            return;
        }

        let Some(value) = value.as_f64() else {
            (self.error_handler)(Error::invalid_input(
                "value cannot be casted to f64",
                format!(
                    "could not publish metric `{}`: value `{}` cannot be casted to f64",
                    name, value
                ),
            ));
            return;
        };

        let tags: Vec<String> = tags.iter().map(Tag::to_string).collect();
        (self.func)(name, value, &tags);
    }
}

/// Metrics implementation that hands every update straight to a DataDog Lambda
/// metric function. Events are not supported and are reported as errors.
#[derive(Clone)]
pub struct DataDogLambdaFuncMetrics {
    forward: Arc<Forward>,
}

impl DataDogLambdaFuncMetrics {
    pub fn new(func: DataDogLambdaFunc, error_handler: Option<ErrorHandler>) -> Self {
        Self {
            forward: Arc::new(Forward {
                func,
                error_handler: error_handler.unwrap_or_else(discard_errors),
            }),
        }
    }

    fn notifier(&self) -> Arc<dyn Notify> {
        self.forward.clone()
    }
}

impl Metrics for DataDogLambdaFuncMetrics {
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

impl fmt::Debug for DataDogLambdaFuncMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataDogLambdaFuncMetrics").finish_non_exhaustive()
    }
}
