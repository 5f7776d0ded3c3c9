//! Wire-format encoders turning one metric update into one line.
//!
//! Every encoder is a pure function: no I/O, no state. Lines are terminated
//! by `\n` so the publisher can concatenate them into a single batch.

use std::{
    sync::Arc,
    time::{
        SystemTime,
        UNIX_EPOCH,
    },
};

use crate::{
    error::{
        Error,
        Result,
    },
    metric::Op,
    tag::{
        self,
        Tag,
        Value,
    },
};

/// Shared encoder function: `(name, op, value, tags, sample rate) -> line`.
pub type Encoder = Arc<dyn Fn(&str, Op, &Value, &[Tag], f64) -> Result<String> + Send + Sync>;

fn unsupported(detail: String) -> Error {
    Error::invalid_input("operation not supported by encoder", detail)
}

/// Human readable encoder meant for debugging on standard output.
pub fn stdout(name: &str, op: Op, value: &Value, tags: &[Tag], rate: f64) -> Result<String> {
    Ok(format!(
        "METRIC: {} | {} | {} | [{}] | {:.6}\n",
        name,
        op.index(),
        value,
        tag::join(tags),
        rate
    ))
}

/// StatsD encoder with DataDog tag and event extensions.
///
/// `name:value|type|@rate|#k:v,...`; events use `_e{title_len,text_len}:title|text|#k:v,...`.
pub fn statsd(name: &str, op: Op, value: &Value, tags: &[Tag], rate: f64) -> Result<String> {
    let tags = tag::join(tags);
    let line = match op {
        Op::CounterAdd => format!("{}:{}|c|@{:.4}|#{}\n", name, value, rate, tags),
        Op::GaugeUpdate => format!("{}:{}|g|@{:.4}|#{}\n", name, value, rate, tags),
        Op::HistogramUpdate => format!("{}:{}|h|@{:.4}|#{}\n", name, value, rate, tags),
        Op::TimerStop => format!("{}:{}|ms|@{:.4}|#{}\n", name, value, rate, tags),
        Op::EventSend => {
            let text = value.to_string();
            format!(
                "_e{{{},{}}}:{}|{}|#{}\n",
                name.len(),
                text.len(),
                name,
                text,
                tags
            )
        }
    };

    Ok(line)
}

/// StatsD encoder that drops tags, since the Librato API rejects arbitrary ones.
pub fn librato_statsd(
    name: &str,
    op: Op,
    value: &Value,
    _tags: &[Tag],
    rate: f64,
) -> Result<String> {
    let line = match op {
        Op::CounterAdd => format!("{}:{}|c|@{:.4}\n", name, value, rate),
        Op::GaugeUpdate => format!("{}:{}|g|@{:.4}\n", name, value, rate),
        Op::HistogramUpdate => format!("{}:{}|h|@{:.4}\n", name, value, rate),
        Op::TimerStop => format!("{}:{}|ms|@{:.4}\n", name, value, rate),
        Op::EventSend => {
            let text = value.to_string();
            format!("_e{{{},{}}}:{}|{}\n", name.len(), text.len(), name, text)
        }
    };

    Ok(line)
}

/// Encoder for DataDog metrics printed from AWS Lambda functions.
///
/// Only counters, gauges and histograms are supported; events and timers
/// are rejected. See <https://docs.datadoghq.com/integrations/amazon_lambda/>.
pub fn datadog_lambda(
    name: &str,
    op: Op,
    value: &Value,
    tags: &[Tag],
    _rate: f64,
) -> Result<String> {
    format_datadog_lambda(name, op, value, tags, SystemTime::now())
}

pub(crate) fn format_datadog_lambda(
    name: &str,
    op: Op,
    value: &Value,
    tags: &[Tag],
    at: SystemTime,
) -> Result<String> {
    let metric_type = match op {
        Op::CounterAdd => "count",
        Op::GaugeUpdate => "gauge",
        Op::HistogramUpdate => "histogram",
        Op::EventSend | Op::TimerStop => {
            return Err(unsupported(format!(
                "datadog-lambda encoder: operation \"{}\" not supported",
                op
            )));
        }
    };

    let unix = at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();

    Ok(format!(
        "MONITORING|{}|{}|{}|{}|#{}\n",
        unix,
        value,
        metric_type,
        name,
        tag::join(tags)
    ))
}

/// Wraps `encoder` so every name is prefixed with `<namespace>.`.
pub fn namespaced(encoder: Encoder, namespace: impl Into<String>) -> Encoder {
    let namespace = namespace.into();
    Arc::new(move |name: &str, op: Op, value: &Value, tags: &[Tag], rate: f64| {
        encoder(&format!("{}.{}", namespace, name), op, value, tags, rate)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    type Case = (&'static str, Op, Value, Vec<Tag>, f64, &'static str);

    fn values() -> Vec<(Value, &'static str)> {
        vec![
            (Value::from(123), "123"),
            (Value::from(Duration::from_secs(1)), "1s"),
            (Value::from(Duration::from_millis(1)), "1ms"),
            (Value::from(Duration::from_nanos(5)), "5ns"),
            (Value::from(Duration::from_nanos(5).as_nanos() as u64), "5"),
            (Value::from(1.23), "1.23"),
            (Value::from(-123), "-123"),
        ]
    }

    #[test]
    fn statsd_lines() {
        let tags = vec![Tag::new("x", "1"), Tag::new("y", 2), Tag::new("z", "value")];
        let cases: Vec<Case> = vec![
            ("x", Op::CounterAdd, Value::from(123), vec![], 1.0, "x:123|c|@1.0000|#\n"),
            ("x", Op::GaugeUpdate, Value::from(-123), vec![], 0.25, "x:-123|g|@0.2500|#\n"),
            ("x", Op::HistogramUpdate, Value::from(123.456), vec![], 0.25, "x:123.456|h|@0.2500|#\n"),
            (
                "abc_xyz.sp.com",
                Op::HistogramUpdate,
                Value::from(123.456),
                vec![],
                0.25,
                "abc_xyz.sp.com:123.456|h|@0.2500|#\n",
            ),
            ("x", Op::CounterAdd, Value::from(123), tags[..1].to_vec(), 1.0, "x:123|c|@1.0000|#x:1\n"),
            ("x", Op::CounterAdd, Value::from(123), tags[..2].to_vec(), 1.0, "x:123|c|@1.0000|#x:1,y:2\n"),
            (
                "x",
                Op::CounterAdd,
                Value::from(123),
                tags.clone(),
                1.0,
                "x:123|c|@1.0000|#x:1,y:2,z:value\n",
            ),
            (
                "event title",
                Op::EventSend,
                Value::from("event text"),
                vec![],
                1.0,
                "_e{11,10}:event title|event text|#\n",
            ),
            (
                "event title",
                Op::EventSend,
                Value::from("event text"),
                tags.clone(),
                1.0,
                "_e{11,10}:event title|event text|#x:1,y:2,z:value\n",
            ),
            ("timer", Op::TimerStop, Value::from(123.321), vec![], 1.0, "timer:123.321|ms|@1.0000|#\n"),
        ];

        for (name, op, value, tags, rate, out) in cases {
            assert_eq!(out, statsd(name, op, &value, &tags, rate).unwrap());
        }

        for (value, rendered) in values() {
            assert_eq!(
                format!("x:{}|c|@1.0000|#\n", rendered),
                statsd("x", Op::CounterAdd, &value, &[], 1.0).unwrap()
            );
        }
    }

    #[test]
    fn librato_drops_tags() {
        let tags = vec![Tag::new("x", "1"), Tag::new("y", 2)];
        assert_eq!(
            "x:123|c|@1.0000\n",
            librato_statsd("x", Op::CounterAdd, &Value::from(123), &tags, 1.0).unwrap()
        );
        assert_eq!(
            "x:-123|g|@0.2500\n",
            librato_statsd("x", Op::GaugeUpdate, &Value::from(-123), &[], 0.25).unwrap()
        );
        assert_eq!(
            "_e{11,10}:event title|event text\n",
            librato_statsd("event title", Op::EventSend, &Value::from("event text"), &tags, 1.0)
                .unwrap()
        );
        assert_eq!(
            "timer:123.321|ms|@1.0000\n",
            librato_statsd("timer", Op::TimerStop, &Value::from(123.321), &[], 1.0).unwrap()
        );

        for (value, rendered) in values() {
            assert_eq!(
                format!("x:{}|h|@1.0000\n", rendered),
                librato_statsd("x", Op::HistogramUpdate, &value, &tags, 1.0).unwrap()
            );
        }
    }

    #[test]
    fn datadog_lambda_lines() {
        let tags = vec![Tag::new("x", "1"), Tag::new("y", 2), Tag::new("z", "value")];
        let cases = vec![
            ("x", Op::CounterAdd, Value::from(123), vec![], "MONITORING|0|123|count|x|#\n"),
            ("x", Op::GaugeUpdate, Value::from(1.23), vec![], "MONITORING|0|1.23|gauge|x|#\n"),
            (
                "abc_xyz.sp.com",
                Op::HistogramUpdate,
                Value::from(123.456),
                vec![],
                "MONITORING|0|123.456|histogram|abc_xyz.sp.com|#\n",
            ),
            ("x", Op::CounterAdd, Value::from(123), tags, "MONITORING|0|123|count|x|#x:1,y:2,z:value\n"),
        ];

        for (name, op, value, tags, out) in cases {
            assert_eq!(out, format_datadog_lambda(name, op, &value, &tags, UNIX_EPOCH).unwrap());
        }

        for (value, rendered) in values() {
            assert_eq!(
                format!("MONITORING|0|{}|count|x|#\n", rendered),
                format_datadog_lambda("x", Op::CounterAdd, &value, &[], UNIX_EPOCH).unwrap()
            );
        }

        let at = UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        assert_eq!(
            "MONITORING|1600000000|1|count|x|#\n",
            format_datadog_lambda("x", Op::CounterAdd, &Value::from(1), &[], at).unwrap()
        );
    }

    #[test]
    fn datadog_lambda_rejects_events_and_timers() {
        let err = datadog_lambda("some.metric", Op::EventSend, &Value::from("msg"), &[], 1.0)
            .unwrap_err();
        assert_eq!(cadence::ErrorKind::InvalidInput, err.kind());
        assert!(err.to_string().contains("\"event send\""), "{}", err);

        let err = datadog_lambda("some.metric", Op::TimerStop, &Value::from(1.0), &[], 1.0)
            .unwrap_err();
        assert!(err.to_string().contains("\"timer stop\""), "{}", err);
    }

    #[test]
    fn namespaced_prefixes_name() {
        let encoder = namespaced(Arc::new(statsd), "test_namespace");
        assert_eq!(
            "test_namespace.test:123|c|@1.0000|#\n",
            encoder("test", Op::CounterAdd, &Value::from(123), &[], 1.0).unwrap()
        );

        let twice = namespaced(encoder, "outer");
        assert_eq!(
            "test_namespace.outer.test:1|g|@1.0000|#\n",
            twice("test", Op::GaugeUpdate, &Value::from(1), &[], 1.0).unwrap()
        );
    }

    #[test]
    fn stdout_line() {
        let line = stdout("x", Op::GaugeUpdate, &Value::from(3), &[Tag::new("a", "b")], 1.0).unwrap();
        assert_eq!("METRIC: x | 1 | 3 | [a:b] | 1.000000\n", line);
    }
}
