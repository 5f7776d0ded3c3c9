//! Error type shared by publishers, encoders and configuration.

use std::io;

use cadence::{
    ErrorKind,
    MetricError,
};
use thiserror::Error;

/// Errors raised while building publishers, encoding updates or writing batches.
///
/// Sink and socket failures keep cadence's [`MetricError`]; rejections that need
/// to name what was rejected (an operation, a value, a DSN key) carry a detail.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Metric(#[from] MetricError),

    #[error("{description}: {detail}")]
    Detailed {
        kind: ErrorKind,
        description: &'static str,
        detail: String,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Metric(e) => e.kind(),
            Error::Detailed { kind, .. } => *kind,
        }
    }

    pub(crate) fn invalid_input(description: &'static str, detail: impl Into<String>) -> Self {
        Error::Detailed {
            kind: ErrorKind::InvalidInput,
            description,
            detail: detail.into(),
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Metric(MetricError::from(e))
    }
}

impl From<(ErrorKind, &'static str)> for Error {
    fn from((kind, description): (ErrorKind, &'static str)) -> Self {
        Error::Metric(MetricError::from((kind, description)))
    }
}
