//! Item keys, currency amounts, and price-change events.
//!
//! Upstream encodes metal amounts as integer half-scrap; all arithmetic here
//! is done on `Decimal` refined metal (18 half-scrap = 1 refined).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-scrap units per refined metal.
const HALF_SCRAP_PER_REFINED: i64 = 18;

/// Item identifier in `defindex;quality[;modifiers]` form.
///
/// Examples: `5021;6` (key), `30911;5;u703` (unusual with particle effect).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Sku(String);

impl Sku {
    /// Create a sku from its string form.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The raw string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Item definition index (first segment), if numeric.
    pub fn defindex(&self) -> Option<u32> {
        self.0.split(';').next()?.parse().ok()
    }

    /// Item quality (second segment), if numeric.
    pub fn quality(&self) -> Option<u8> {
        self.0.split(';').nth(1)?.parse().ok()
    }

    /// Particle effect id from a `u<id>` modifier segment, if present.
    pub fn effect_id(&self) -> Option<u32> {
        self.0
            .split(';')
            .skip(2)
            .find_map(|part| part.strip_prefix('u'))
            .and_then(|id| id.parse().ok())
    }
}

impl fmt::Display for Sku {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Sku {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

/// A price expressed in keys plus refined metal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currencies {
    /// Number of keys.
    pub keys: i64,
    /// Refined metal, rounded to two decimal places.
    pub metal: Decimal,
}

impl Currencies {
    /// Create from explicit key and metal amounts.
    pub fn new(keys: i64, metal: Decimal) -> Self {
        Self {
            keys,
            metal: metal.round_dp(2),
        }
    }

    /// Convert from the upstream wire encoding (keys + integer half-scrap).
    pub fn from_half_scrap(keys: i64, half_scrap: i64) -> Self {
        let metal = Decimal::from(half_scrap) / Decimal::from(HALF_SCRAP_PER_REFINED);
        Self {
            keys,
            metal: metal.round_dp(2),
        }
    }

    /// Total value in refined metal, valuing keys at `key_price` refined each.
    pub fn to_value(&self, key_price: Decimal) -> Decimal {
        Decimal::from(self.keys) * key_price + self.metal
    }

    /// Zero price.
    pub fn zero() -> Self {
        Self {
            keys: 0,
            metal: Decimal::ZERO,
        }
    }
}

impl fmt::Display for Currencies {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.keys != 0 && !self.metal.is_zero() {
            let unit = if self.keys == 1 { "key" } else { "keys" };
            write!(f, "{} {unit}, {} ref", self.keys, self.metal)
        } else if self.keys != 0 {
            let unit = if self.keys == 1 { "key" } else { "keys" };
            write!(f, "{} {unit}", self.keys)
        } else {
            write!(f, "{} ref", self.metal)
        }
    }
}

/// A single price-change event, immutable once parsed from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceUpdate {
    /// Item the price change applies to.
    pub sku: Sku,
    /// New buy price.
    pub buy: Currencies,
    /// New sell price.
    pub sell: Currencies,
    /// Upstream timestamp of the change.
    pub updated_at: DateTime<Utc>,
}
