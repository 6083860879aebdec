//! Last-known prices per item and the key-currency price.
//!
//! The book is seeded from the startup snapshot and updated by every accepted
//! stream event. The key item's sell price (in refined metal) values the key
//! component of other items' prices when rendering deltas.

use crate::types::{Currencies, PriceUpdate, Sku};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Sku of the key-currency item.
pub const KEY_SKU: &str = "5021;6";

/// Last known price of one item.
#[derive(Debug, Clone)]
pub struct PriceEntry {
    pub sku: Sku,
    pub name: String,
    pub buy: Currencies,
    pub sell: Currencies,
    pub time: DateTime<Utc>,
}

/// Current key-currency price.
#[derive(Debug, Clone)]
pub struct KeyPrices {
    pub buy: Currencies,
    pub sell: Currencies,
    pub time: DateTime<Utc>,
}

/// Old and new prices for one accepted update, ready for rendering.
#[derive(Debug, Clone)]
pub struct PriceChange {
    pub sku: Sku,
    pub name: String,
    pub old_buy: Currencies,
    pub old_sell: Currencies,
    pub buy: Currencies,
    pub sell: Currencies,
    pub time: DateTime<Utc>,
}

/// In-memory price book.
///
/// Not internally synchronised; the application wraps it in a lock.
#[derive(Debug, Default)]
pub struct PriceBook {
    entries: HashMap<Sku, PriceEntry>,
    key_prices: Option<KeyPrices>,
}

impl PriceBook {
    /// Create an empty price book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the book from a snapshot, replacing any existing entries.
    pub fn seed(&mut self, entries: Vec<PriceEntry>) {
        for entry in entries {
            if entry.sku.as_str() == KEY_SKU {
                self.key_prices = Some(KeyPrices {
                    buy: entry.buy,
                    sell: entry.sell,
                    time: entry.time,
                });
            }
            self.entries.insert(entry.sku.clone(), entry);
        }
    }

    /// Number of tracked items.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the book holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Last known entry for an item.
    pub fn get(&self, sku: &Sku) -> Option<&PriceEntry> {
        self.entries.get(sku)
    }

    /// Key sell price in refined metal, if known.
    pub fn key_price(&self) -> Option<Decimal> {
        self.key_prices.as_ref().map(|k| k.sell.metal)
    }

    /// Current key prices, if known.
    pub fn key_prices(&self) -> Option<&KeyPrices> {
        self.key_prices.as_ref()
    }

    /// Apply an update, returning the old and new prices for rendering.
    ///
    /// An item seen for the first time reports old = new (zero delta).
    /// Updates for the key item also refresh the stored key price.
    pub fn apply(&mut self, update: &PriceUpdate, name: &str) -> PriceChange {
        let (old_buy, old_sell) = match self.entries.get(&update.sku) {
            Some(entry) => (entry.buy, entry.sell),
            None => (update.buy, update.sell),
        };

        self.entries.insert(
            update.sku.clone(),
            PriceEntry {
                sku: update.sku.clone(),
                name: name.to_string(),
                buy: update.buy,
                sell: update.sell,
                time: update.updated_at,
            },
        );

        if update.sku.as_str() == KEY_SKU {
            self.key_prices = Some(KeyPrices {
                buy: update.buy,
                sell: update.sell,
                time: update.updated_at,
            });
        }

        PriceChange {
            sku: update.sku.clone(),
            name: name.to_string(),
            old_buy,
            old_sell,
            buy: update.buy,
            sell: update.sell,
            time: update.updated_at,
        }
    }
}
