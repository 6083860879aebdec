//! Core domain types for the price-relay bot.
//!
//! This crate provides the fundamental types used throughout the relay:
//! - `Sku`: item identifier in `defindex;quality[;modifiers]` form
//! - `Currencies`: key + refined-metal amounts with precise arithmetic
//! - `PriceUpdate`: a single parsed price-change event
//! - `PriceBook`: last-known prices per item plus the key-currency price
//! - `Catalogue`: static item-name/image lookup loaded at startup

pub mod catalogue;
pub mod error;
pub mod pricebook;
pub mod types;

pub use catalogue::{Catalogue, CatalogueItem};
pub use error::{CoreError, Result};
pub use pricebook::{KeyPrices, PriceBook, PriceChange, PriceEntry, KEY_SKU};
pub use types::{Currencies, PriceUpdate, Sku};
