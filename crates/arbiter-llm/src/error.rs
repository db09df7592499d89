use std::time::Duration;

use thiserror::Error;

/// Transport-level failure of one backend call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The call did not finish within its configured bound
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The backend could not be reached
    #[error("connection failed: {0}")]
    Connection(String),

    /// The backend answered with a non-success HTTP status
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be understood
    #[error("malformed response: {0}")]
    Protocol(String),
}

impl BackendError {
    /// Short label used in logs and metric attributes
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Connection(_) => "connection",
            Self::Status { .. } => "status",
            Self::Protocol(_) => "protocol",
        }
    }

    pub(crate) fn from_reqwest(error: &reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            Self::Timeout(timeout)
        } else if error.is_decode() {
            Self::Protocol(error.to_string())
        } else {
            Self::Connection(error.to_string())
        }
    }
}
