//! # Catalogs
//!
//! External lookup tables the pipeline consumes but never builds: the item
//! catalog and the rare-tier presentation policy.

pub mod items;
pub mod tier;

pub use items::{CatalogItem, InMemoryItemCatalog, ItemCatalog};
pub use tier::{RareTierTable, TierInfo, TierPolicy};
