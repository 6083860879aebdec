//! Notification error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    /// Destination answered with something other than the success status.
    #[error("Delivery rejected: HTTP {status}")]
    Delivery { status: u16 },

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

pub type NotifyResult<T> = Result<T, NotifyError>;
