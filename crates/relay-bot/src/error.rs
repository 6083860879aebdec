//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core error: {0}")]
    Core(#[from] relay_core::CoreError),

    #[error("API error: {0}")]
    Api(#[from] relay_api::ApiError),

    #[error("Notify error: {0}")]
    Notify(#[from] relay_notify::NotifyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
