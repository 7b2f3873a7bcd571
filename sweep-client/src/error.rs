//! Error types for the generation client

use std::time::Duration;
use sweep_core::ErrorKind;
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, GenerateError>;

/// Errors that can occur when calling the backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerateError {
    /// No response within the per-attempt timeout
    #[error("backend did not respond within {0:?}")]
    Timeout(Duration),

    /// Non-retryable rejection (bad model id, bad request, auth failure)
    #[error("backend rejected request{}: {message}", status_suffix(.status))]
    Backend {
        /// HTTP status code, if the rejection came from an HTTP response
        status: Option<u16>,
        message: String,
    },

    /// Retryable condition (rate limiting, overload, connection reset)
    #[error("transient backend error: {0}")]
    Transient(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

/// Statuses worth retrying: request timeout, conflict, rate limit, server
/// errors and overload.
const RETRYABLE_STATUSES: &[u16] = &[408, 409, 429, 500, 502, 503, 504, 529];

impl GenerateError {
    /// Create a backend rejection from a message
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            status: None,
            message: message.into(),
        }
    }

    /// Classify a non-success HTTP status
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        if RETRYABLE_STATUSES.contains(&status) {
            Self::Transient(format!("status {status}: {message}"))
        } else {
            Self::Backend {
                status: Some(status),
                message,
            }
        }
    }

    /// Whether the executor may retry after this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Failure kind recorded in the job result
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Backend { .. } => ErrorKind::Backend,
            Self::Transient(_) => ErrorKind::Transient,
        }
    }
}
