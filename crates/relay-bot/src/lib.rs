//! Price-relay bot application.
//!
//! Wires the pipeline together: catalogue load, initial token, pricelist
//! snapshot, stream connection with dispatch into the price book, rendering,
//! and the coalescing webhook delivery queue.

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
