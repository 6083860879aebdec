//! Static item catalogue.
//!
//! Maps skus to display names and image URLs. Loaded once at startup from a
//! JSON file of the form `{ "5021;6": { "name": "...", "image_url": "..." } }`.

use crate::error::{CoreError, Result};
use crate::types::Sku;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// One catalogue record.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogueItem {
    /// Display name of the item.
    pub name: String,
    /// Large image URL, if the catalogue carries one.
    #[serde(default)]
    pub image_url: Option<String>,
}

/// Item-name and image lookup.
#[derive(Debug, Default)]
pub struct Catalogue {
    items: HashMap<String, CatalogueItem>,
}

impl Catalogue {
    /// Load the catalogue from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let items: HashMap<String, CatalogueItem> = serde_json::from_str(&content)
            .map_err(|e| CoreError::Catalogue(format!("Failed to parse catalogue: {e}")))?;
        Ok(Self { items })
    }

    /// Build a catalogue from already-parsed records.
    pub fn from_items(items: HashMap<String, CatalogueItem>) -> Self {
        Self { items }
    }

    /// Display name for an item, if known.
    pub fn name_for(&self, sku: &Sku) -> Option<&str> {
        self.items.get(sku.as_str()).map(|item| item.name.as_str())
    }

    /// Image URL for an item, if known.
    pub fn image_for(&self, sku: &Sku) -> Option<&str> {
        self.items
            .get(sku.as_str())
            .and_then(|item| item.image_url.as_deref())
    }

    /// Number of catalogue records.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the catalogue is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
