//! In-memory catalog seeded from `catalog.json`

use dashmap::DashMap;
use std::path::Path;

use super::{CatalogItem, CatalogProvider};

/// DashMap-backed catalog; lock-free reads from request handlers
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    items: DashMap<String, CatalogItem>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON array of items. A missing file yields an empty catalog.
    pub fn load_json(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let catalog = Self::new();
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Catalog seed file not found, starting empty");
            return Ok(catalog);
        }
        let raw = std::fs::read_to_string(path)?;
        let items: Vec<CatalogItem> = serde_json::from_str(&raw)?;
        for item in items {
            catalog.upsert(item);
        }
        tracing::info!(items = catalog.len(), "Catalog loaded");
        Ok(catalog)
    }

    pub fn upsert(&self, item: CatalogItem) {
        self.items.insert(item.item_id.clone(), item);
    }

    /// Toggle availability; returns false for unknown items
    pub fn set_available(&self, item_id: &str, available: bool) -> bool {
        match self.items.get_mut(item_id) {
            Some(mut item) => {
                item.available = available;
                true
            }
            None => false,
        }
    }

    /// Change the list price; already-submitted lines keep their snapshot
    pub fn set_price(&self, item_id: &str, price_cents: i64) -> bool {
        match self.items.get_mut(item_id) {
            Some(mut item) => {
                item.price_cents = price_cents;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl CatalogProvider for MemoryCatalog {
    fn item(&self, item_id: &str) -> Option<CatalogItem> {
        self.items.get(item_id).map(|entry| entry.value().clone())
    }
}
