//! Publisher setup from a single connection string.
//!
//! ```text
//! datadog://[host[:port]]?namespace=my_service[&host=..][&port=..][&socket=..][&gostats=false]
//! datadog-lambda://?namespace=my_service
//! stdout://[?namespace=..]
//! discard://
//! ```

use std::{
    path::PathBuf,
    sync::Arc,
};

use log::*;
use tokio::time::Duration;
use url::{
    Host,
    Url,
};

use crate::{
    discard_errors,
    error::{
        Error,
        Result,
    },
    metric::Metrics,
    namespaced::with_namespace,
    publisher::Publisher,
    runner::{
        MultiRunner,
        Runner,
    },
    runtime_stats::RuntimeStatsRunner,
    tag::Tag,
    udp::{
        DatadogOptions,
        DEFAULT_DATADOG_HOST,
        DEFAULT_DATADOG_PORT,
    },
    worker::PublisherRunner,
    FLUSH_EVERY_15S,
};

const STDOUT_FLUSH_INTERVAL: Duration = Duration::from_millis(100);

fn invalid(description: &'static str, detail: impl Into<String>) -> Error {
    Error::invalid_input(description, detail)
}

/// Host of the DSN authority, with IPv6 addresses unbracketed so they resolve.
fn url_host(url: &Url) -> Option<String> {
    match url.host()? {
        Host::Domain(domain) if domain.is_empty() => None,
        Host::Domain(domain) => Some(domain.to_owned()),
        Host::Ipv4(addr) => Some(addr.to_string()),
        Host::Ipv6(addr) => Some(addr.to_string()),
    }
}

/// Builds the [`Metrics`] and [`Runner`] described by `dsn`.
///
/// The returned runner also reports runtime statistics every 15 seconds unless
/// the DSN carries `gostats=false`.
///
/// # Errors
///
/// Returns an error if the DSN cannot be parsed, names an unknown scheme, lacks
/// a namespace where one is required, or carries an invalid port.
pub fn try_from_dsn(dsn: &str) -> Result<(Arc<dyn Metrics>, Box<dyn Runner>)> {
    let url = Url::parse(dsn).map_err(|e| invalid("invalid metrics DSN", e.to_string()))?;

    let mut namespace = None;
    let mut host = None;
    let mut port = None;
    let mut socket = None;
    let mut runtime_stats = true;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "namespace" if !value.is_empty() => namespace = Some(value.into_owned()),
            "host" if !value.is_empty() => host = Some(value.into_owned()),
            "port" => {
                let parsed = value
                    .parse::<u16>()
                    .map_err(|e| invalid("invalid metrics DSN port", e.to_string()))?;
                port = Some(parsed);
            }
            "socket" if !value.is_empty() => socket = Some(PathBuf::from(value.as_ref())),
            "gostats" => runtime_stats = value != "false",
            _ => {}
        }
    }

    let scheme = url.scheme();
    if matches!(scheme, "datadog" | "datadog-lambda") && namespace.is_none() {
        return Err(invalid("datadog metrics need a namespace", scheme));
    }

    let (publisher, runner): (Publisher, PublisherRunner) = match scheme {
        "datadog" => {
            let host = host
                .or_else(|| url_host(&url))
                .unwrap_or_else(|| DEFAULT_DATADOG_HOST.to_owned());
            let port = port.or_else(|| url.port()).unwrap_or(DEFAULT_DATADOG_PORT);

            Publisher::datadog(DatadogOptions {
                host,
                port,
                socket_path: socket,
                ..Default::default()
            })?
        }
        "datadog-lambda" => Publisher::datadog_lambda(),
        "stdout" => Publisher::stdout(STDOUT_FLUSH_INTERVAL, Some(discard_errors()))?,
        "discard" => Publisher::discard_all(),
        other => return Err(invalid("invalid metrics publisher type", other)),
    };

    debug!(
        "metrics from dsn: scheme={} namespace={:?} runtime_stats={}",
        scheme, namespace, runtime_stats
    );

    let service_tag = namespace.as_ref().map(|ns| Tag::new("namespace", ns.as_str()));
    let metrics: Arc<dyn Metrics> = match namespace {
        Some(ns) => Arc::new(with_namespace(publisher.clone(), ns)),
        None => Arc::new(publisher.clone()),
    };

    if !runtime_stats {
        return Ok((metrics, Box::new(runner)));
    }

    let stats = RuntimeStatsRunner::new(publisher, FLUSH_EVERY_15S, service_tag);
    let mut runners = MultiRunner::default();
    runners.push(Box::new(runner)).push(Box::new(stats));

    Ok((metrics, Box::new(runners)))
}

/// Like [`try_from_dsn`], but panics on an invalid DSN.
///
/// Meant for process start-up, where a bad metrics configuration is fatal.
pub fn from_dsn(dsn: &str) -> (Arc<dyn Metrics>, Box<dyn Runner>) {
    match try_from_dsn(dsn) {
        Ok(parts) => parts,
        Err(e) => panic!("invalid metrics DSN `{}`: {}", dsn, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::Metric;
    use tokio_util::sync::CancellationToken;

    async fn run_briefly(runner: Box<dyn Runner>) {
        let cancel = CancellationToken::new();
        let job = tokio::spawn(runner.run(cancel.clone()));
        cancel.cancel();
        job.await.unwrap();
    }

    #[tokio::test]
    async fn valid_dsns() {
        let _ = pretty_env_logger::try_init();

        for dsn in [
            "discard://",
            "discard://?gostats=false",
            "stdout://?namespace=test&gostats=false",
            "datadog://?namespace=test",
            "datadog://?namespace=test&gostats=false",
            "datadog://localhost:8126?namespace=test",
            "datadog://?namespace=test&host=127.0.0.1&port=9125",
            "datadog://[::1]:8125?namespace=test&gostats=false",
            "datadog://?namespace=test&socket=/tmp/bsk-metrics-dsn.sock&gostats=false",
            "datadog-lambda://?namespace=test&gostats=false",
        ] {
            let (metrics, runner) = try_from_dsn(dsn).unwrap_or_else(|e| panic!("{}: {}", dsn, e));
            metrics.counter("dsn", &[]).inc();
            run_briefly(runner).await;
        }
    }

    #[test]
    fn invalid_dsns() {
        for dsn in [
            "random://",
            "datadog://",
            "datadog://?namespace=",
            "datadog-lambda://",
            "datadog://?namespace=test&port=http",
            "not a url",
        ] {
            let err = try_from_dsn(dsn).err();
            assert!(err.is_some(), "{} should be rejected", dsn);
            assert_eq!(cadence::ErrorKind::InvalidInput, err.unwrap().kind());
        }
    }

    #[test]
    #[should_panic(expected = "invalid metrics DSN")]
    fn from_dsn_panics() {
        from_dsn("random://");
    }

    #[test]
    fn authority_host_is_unbracketed() {
        let host = |dsn: &str| url_host(&Url::parse(dsn).unwrap());

        assert_eq!(Some("::1".to_owned()), host("datadog://[::1]:8125?namespace=x"));
        assert_eq!(Some("10.0.0.7".to_owned()), host("datadog://10.0.0.7?namespace=x"));
        assert_eq!(Some("agent".to_owned()), host("datadog://agent:8125"));
        assert_eq!(None, host("datadog://?namespace=x"));
    }

    #[tokio::test]
    async fn socket_key_selects_unix_datagram() -> Result<()> {
        let path = std::env::temp_dir().join(format!(
            "bsk-metrics-dsn-{}.sock",
            std::time::UNIX_EPOCH.elapsed().unwrap_or_default().as_nanos()
        ));
        let server = tokio::net::UnixDatagram::bind(&path)?;

        let dsn = format!("datadog://?namespace=svc&socket={}&gostats=false", path.display());
        let (metrics, runner) = try_from_dsn(&dsn)?;
        metrics.counter("hits", &[]).add(3);
        run_briefly(runner).await;

        let mut buf = [0; 1024];
        let n = server.recv(&mut buf).await?;
        assert_eq!("svc.hits:3|c|@1.0000|#\n", String::from_utf8_lossy(&buf[..n]));

        std::fs::remove_file(&path).ok();
        Ok(())
    }

    #[tokio::test]
    async fn namespace_prefixes_names() {
        let (metrics, runner) = from_dsn("discard://?namespace=svc&gostats=false");
        assert_eq!("svc.requests", metrics.counter("requests", &[]).name());
        run_briefly(runner).await;
    }
}
