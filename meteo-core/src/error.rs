use std::time::Duration;

use thiserror::Error;

/// Why a single location's fetch failed.
///
/// Failures are carried as data inside a [`crate::MeasurementResult`]; they never
/// abort sibling fetches.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The request could not be completed (connect, TLS, I/O, client timeout).
    #[error("transport error: {0}")]
    Transport(String),

    /// The caller's deadline fired while the request was in flight.
    #[error("deadline exceeded after {}ms", .after.as_millis())]
    DeadlineExceeded { after: Duration },

    /// The provider answered with a non-success status code.
    #[error("API returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// The body was empty, not JSON, or missing the required fields.
    #[error("decode error: {0}")]
    Decode(String),

    /// The task running the fetch died before producing a result.
    #[error("fetch task failed: {0}")]
    Task(String),
}

/// Coarse classification of a [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    Status,
    Decode,
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Transport(_)
            | FetchError::DeadlineExceeded { .. }
            | FetchError::Task(_) => ErrorKind::Transport,
            FetchError::Status { .. } => ErrorKind::Status,
            FetchError::Decode(_) => ErrorKind::Decode,
        }
    }

    pub fn is_deadline(&self) -> bool {
        matches!(self, FetchError::DeadlineExceeded { .. })
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}
