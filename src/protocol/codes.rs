//! Event-code catalog: wire-level numeric ids carried in parameters 252
//! (events) and 253 (operations).
//!
//! The table is versioned alongside the game client and injected at session
//! start. Missing entries default to 0, which never matches an incoming id.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ProtocolError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EventCodes {
    #[serde(rename = "EvNewCharacter")]
    pub new_character: i64,
    #[serde(rename = "EvNewEquipmentItem")]
    pub new_equipment_item: i64,
    #[serde(rename = "EvNewSiegeBannerItem")]
    pub new_siege_banner_item: i64,
    #[serde(rename = "EvNewSimpleItem")]
    pub new_simple_item: i64,
    #[serde(rename = "EvNewLoot")]
    pub new_loot: i64,
    #[serde(rename = "EvAttachItemContainer")]
    pub attach_item_container: i64,
    #[serde(rename = "EvDetachItemContainer")]
    pub detach_item_container: i64,
    #[serde(rename = "EvCharacterStats")]
    pub character_stats: i64,
    #[serde(rename = "EvOtherGrabbedLoot")]
    pub other_grabbed_loot: i64,
    #[serde(rename = "EvNewLootChest")]
    pub new_loot_chest: i64,
    #[serde(rename = "EvInventoryPutItem")]
    pub inventory_put_item: i64,
    #[serde(rename = "OpJoin")]
    pub join: i64,
    #[serde(rename = "OpInventoryMoveItem")]
    pub inventory_move_item: i64,
}

impl EventCodes {
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProtocolError::Catalog(format!("Failed to read {}: {e}", path.display()))
        })?;
        let codes = Self::from_json(&content)?;
        info!(path = %path.display(), configured = codes.configured(), "Event codes loaded");
        Ok(codes)
    }

    /// Number of non-zero entries.
    pub fn configured(&self) -> usize {
        [
            self.new_character,
            self.new_equipment_item,
            self.new_siege_banner_item,
            self.new_simple_item,
            self.new_loot,
            self.attach_item_container,
            self.detach_item_container,
            self.character_stats,
            self.other_grabbed_loot,
            self.new_loot_chest,
            self.inventory_put_item,
            self.join,
            self.inventory_move_item,
        ]
        .iter()
        .filter(|code| **code != 0)
        .count()
    }
}

/// True when `configured` is a real code equal to `incoming`.
#[inline]
pub fn code_matches(configured: i64, incoming: i64) -> bool {
    configured != 0 && configured == incoming
}
