//! API error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Token acquisition was rejected or the token endpoint was unreachable.
    #[error("Auth failure: {0}")]
    AuthFailure(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Decode error: {0}")]
    Decode(String),
}

pub type ApiResult<T> = Result<T, ApiError>;
