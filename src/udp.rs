//! Publisher wired to a DataDog agent (DogStatsD) over UDP or a Unix datagram socket.

use std::{
    fmt,
    net::UdpSocket,
    path::PathBuf,
    sync::Arc,
};

use cadence::UdpMetricSink;

use log::*;
use tokio::time::Duration;

use crate::{
    encoder,
    error::Result,
    publisher::Publisher,
    unix::UdsMetricSink,
    worker::PublisherRunner,
    ErrorHandler,
    DEFAULT_FLUSH_INTERVAL,
};

/// Default DogStatsD agent host.
pub const DEFAULT_DATADOG_HOST: &str = "127.0.0.1";

/// Default DogStatsD agent port.
pub const DEFAULT_DATADOG_PORT: u16 = 8125;

/// Settings for [`Publisher::datadog`].
#[derive(Clone)]
pub struct DatadogOptions {
    /// Agent host (default: [DEFAULT_DATADOG_HOST]).
    pub host: String,
    /// Agent port (default: [DEFAULT_DATADOG_PORT]).
    pub port: u16,
    /// When set, metrics go to this Unix datagram socket instead of UDP.
    pub socket_path: Option<PathBuf>,
    /// Flush interval (default: [DEFAULT_FLUSH_INTERVAL](crate::DEFAULT_FLUSH_INTERVAL)).
    /// Keep it in line with the agent's own flush period.
    pub flush_interval: Duration,
    pub error_handler: Option<ErrorHandler>,
}

impl fmt::Debug for DatadogOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatadogOptions")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("socket_path", &self.socket_path)
            .field("flush_interval", &self.flush_interval)
            .finish_non_exhaustive()
    }
}

impl Default for DatadogOptions {
    fn default() -> Self {
        Self {
            host: DEFAULT_DATADOG_HOST.to_owned(),
            port: DEFAULT_DATADOG_PORT,
            socket_path: None,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            error_handler: None,
        }
    }
}

impl Publisher {
    /// Creates a StatsD publisher sending batches to a DataDog agent.
    ///
    /// UDP delivery is fire-and-forget: datagrams the agent never receives are lost.
    ///
    /// # Errors
    ///
    /// Returns an error when the agent address cannot be resolved, the local
    /// socket cannot be created, or the flush interval is zero.
    pub fn datadog(options: DatadogOptions) -> Result<(Self, PublisherRunner)> {
        let encoder = Arc::new(encoder::statsd);

        match options.socket_path {
            Some(path) => {
                debug!("datadog agent socket: {}", path.display());
                Self::new(
                    UdsMetricSink::new(path),
                    encoder,
                    options.flush_interval,
                    options.error_handler,
                )
            }

            None => {
                let socket = UdpSocket::bind("0.0.0.0:0")?;
                socket.set_nonblocking(true)?;

                let addr = (options.host.as_str(), options.port);
                let sink = UdpMetricSink::from(addr, socket)?;
                debug!("datadog agent address: {}:{}", options.host, options.port);

                Self::new(sink, encoder, options.flush_interval, options.error_handler)
            }
        }
    }
}
