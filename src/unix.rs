//! Metric sink writing to a Unix datagram socket, such as the DataDog agent's
//! [DogStatsD socket](https://docs.datadoghq.com/developers/dogstatsd/unix_socket).

use std::{
    io::{
        ErrorKind,
        Result,
    },
    os::unix::net::UnixDatagram,
    path::{
        Path,
        PathBuf,
    },
    sync::{
        Mutex,
        PoisonError,
    },
};

use cadence::MetricSink;
use log::*;

/// Unix datagram sink that dials lazily and redials after the peer goes away.
///
/// The socket is connected on the first write. When a write fails because the
/// peer is gone (e.g. the agent restarted), the socket is dropped and the next
/// write dials again. Other errors are returned as is.
///
/// Writes never block: when the peer stops reading and its queue is full, the
/// write fails with [`ErrorKind::WouldBlock`] and the batch is dropped.
#[derive(Debug)]
pub struct UdsMetricSink {
    path: PathBuf,
    conn: Mutex<Option<UnixDatagram>>,
}

impl UdsMetricSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            conn: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<UnixDatagram> {
        let socket = UnixDatagram::unbound()?;
        socket.set_nonblocking(true)?;
        socket.connect(&self.path)?;
        debug!("connected to {}", self.path.display());
        Ok(socket)
    }
}

impl MetricSink for UdsMetricSink {
    fn emit(&self, metric: &str) -> Result<usize> {
        let mut conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);

        let socket = match conn.take() {
            Some(socket) => socket,
            None => self.connect()?,
        };

        let res = socket.send(metric.as_bytes());
        match &res {
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::ConnectionReset
                        | ErrorKind::ConnectionRefused
                        | ErrorKind::BrokenPipe
                        | ErrorKind::NotConnected
                ) =>
            {
                warn!("peer {} went away, reconnecting on next write", self.path.display());
            }

            _ => *conn = Some(socket),
        }

        res
    }
}
