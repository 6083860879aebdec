//! REST client for the upstream pricing API.
//!
//! Provides:
//! - Bearer-token acquisition and the shared `TokenProvider`
//! - Single-item price fetch and price-check requests
//! - Sequential paginated snapshot of the full pricelist

pub mod client;
pub mod error;
pub mod pricelist;
pub mod token;

pub use client::{PageMeta, PricesApi, PricelistItem, PricelistPage};
pub use error::{ApiError, ApiResult};
pub use pricelist::{fetch_pricelist, SnapshotConfig};
pub use token::{Credential, TokenProvider};
