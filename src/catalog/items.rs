//! Item catalog: numeric item id to string id and localized names.
//!
//! Two source formats are understood:
//! - the `items.json` dump: an array of `{ "Index", "UniqueName", "LocalizedNames" }`
//! - the `items.txt` fallback: one `index:unique_name:display name` per line
//!
//! Malformed entries are skipped; a lookup miss is never an error.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::config::DEFAULT_LOCALE;
use crate::error::{ProtocolError, Result};

/// A catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogItem {
    pub numeric_id: i64,
    pub unique_name: String,
    pub names: HashMap<String, String>,
}

impl CatalogItem {
    pub fn new(numeric_id: i64, unique_name: impl Into<String>) -> Self {
        Self {
            numeric_id,
            unique_name: unique_name.into(),
            names: HashMap::new(),
        }
    }

    pub fn with_name(mut self, locale: impl Into<String>, name: impl Into<String>) -> Self {
        self.names.insert(locale.into(), name.into());
        self
    }

    /// Display name for `locale`, falling back to EN-US, then the unique name.
    pub fn name(&self, locale: &str) -> &str {
        self.names
            .get(locale)
            .or_else(|| self.names.get(DEFAULT_LOCALE))
            .map(String::as_str)
            .filter(|name| !name.is_empty())
            .unwrap_or(self.unique_name.as_str())
    }
}

/// Read-only lookup consumed by the correlator.
pub trait ItemCatalog: Send + Sync {
    fn get(&self, numeric_id: i64) -> Option<&CatalogItem>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryItemCatalog {
    items: HashMap<i64, CatalogItem>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IndexField {
    Number(i64),
    Text(String),
}

#[derive(Deserialize)]
struct RawItem {
    #[serde(rename = "Index")]
    index: IndexField,
    #[serde(rename = "UniqueName", default)]
    unique_name: String,
    #[serde(rename = "LocalizedNames", default)]
    localized_names: Option<HashMap<String, Option<String>>>,
}

impl RawItem {
    fn into_item(self) -> Option<CatalogItem> {
        let numeric_id = match self.index {
            IndexField::Number(n) => n,
            IndexField::Text(s) => s.trim().parse().ok()?,
        };
        if self.unique_name.is_empty() {
            return None;
        }
        let names = self
            .localized_names
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(locale, name)| name.filter(|n| !n.is_empty()).map(|n| (locale, n)))
            .collect();
        Some(CatalogItem {
            numeric_id,
            unique_name: self.unique_name,
            names,
        })
    }
}

impl InMemoryItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, item: CatalogItem) {
        self.items.insert(item.numeric_id, item);
    }

    /// Parse the `items.json` dump.
    pub fn from_json(content: &str) -> Result<Self> {
        let entries: Vec<serde_json::Value> = serde_json::from_str(content)?;
        let total = entries.len();
        let catalog: Self = entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value::<RawItem>(entry).ok())
            .filter_map(RawItem::into_item)
            .collect();
        debug!(loaded = catalog.len(), skipped = total - catalog.len(), "Parsed item catalog");
        Ok(catalog)
    }

    /// Parse the `items.txt` fallback format.
    pub fn from_txt(content: &str) -> Self {
        content
            .lines()
            .filter_map(|line| {
                let mut parts = line.splitn(3, ':');
                let numeric_id = parts.next()?.trim().parse::<i64>().ok()?;
                let unique_name = parts.next()?.trim();
                if unique_name.is_empty() {
                    return None;
                }
                let item = CatalogItem::new(numeric_id, unique_name);
                Some(match parts.next().map(str::trim).filter(|n| !n.is_empty()) {
                    Some(name) => item.with_name(DEFAULT_LOCALE, name),
                    None => item,
                })
            })
            .collect()
    }

    /// Load from disk; `.json` files use the dump format, anything else the text format.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProtocolError::Catalog(format!("Failed to read {}: {e}", path.display()))
        })?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let catalog = if is_json {
            Self::from_json(&content)?
        } else {
            Self::from_txt(&content)
        };
        info!(path = %path.display(), items = catalog.len(), "Item catalog loaded");
        Ok(catalog)
    }
}

impl FromIterator<CatalogItem> for InMemoryItemCatalog {
    fn from_iter<T: IntoIterator<Item = CatalogItem>>(iter: T) -> Self {
        Self {
            items: iter
                .into_iter()
                .map(|item| (item.numeric_id, item))
                .collect(),
        }
    }
}

impl ItemCatalog for InMemoryItemCatalog {
    fn get(&self, numeric_id: i64) -> Option<&CatalogItem> {
        self.items.get(&numeric_id)
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_catalog() {
        let json = r#"[
            {"Index": "55", "UniqueName": "T4_BAG", "LocalizedNames": {"EN-US": "Adept's Bag", "PT-BR": "Bolsa do Adepto"}},
            {"Index": 56, "UniqueName": "T5_BAG@1", "LocalizedNames": null},
            {"Index": "x", "UniqueName": "BROKEN"},
            {"UniqueName": "NO_INDEX"},
            {"Index": "57", "UniqueName": ""}
        ]"#;
        let catalog = InMemoryItemCatalog::from_json(json).unwrap();
        assert_eq!(catalog.len(), 2);
        let bag = catalog.get(55).unwrap();
        assert_eq!(bag.name("PT-BR"), "Bolsa do Adepto");
        assert_eq!(bag.name("DE-DE"), "Adept's Bag");
        assert_eq!(catalog.get(56).unwrap().name("EN-US"), "T5_BAG@1");
        assert!(catalog.get(57).is_none());
    }

    #[test]
    fn test_json_must_be_array() {
        assert!(InMemoryItemCatalog::from_json("{}").is_err());
    }

    #[test]
    fn test_txt_catalog() {
        let txt = "1: T4_BAG : Adept's Bag\n2:T5_CAPE\nbad line\n3:T6_SWORD:Blade: Edition\n";
        let catalog = InMemoryItemCatalog::from_txt(txt);
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.get(1).unwrap().unique_name, "T4_BAG");
        assert_eq!(catalog.get(1).unwrap().name("EN-US"), "Adept's Bag");
        assert_eq!(catalog.get(2).unwrap().name("EN-US"), "T5_CAPE");
        assert_eq!(catalog.get(3).unwrap().name("EN-US"), "Blade: Edition");
    }
}
