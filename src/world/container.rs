use std::collections::BTreeMap;

use serde::Serialize;
use uuid::Uuid;

/// Owner-name prefix used for monster loot bags.
pub const MONSTER_OWNER_PREFIX: &str = "@MOB";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContainerKind {
    #[default]
    Unknown,
    Player,
    Monster,
    Chest,
}

impl ContainerKind {
    /// Infer the kind of a loot bag from its owner name.
    pub fn from_owner(owner: &str) -> Self {
        if owner.starts_with(MONSTER_OWNER_PREFIX) {
            ContainerKind::Monster
        } else {
            ContainerKind::Player
        }
    }
}

/// An inventory-bearing entity: loot bag, corpse or chest.
///
/// `items` maps an inventory slot to the object id of a [`LootItem`] held in
/// the loot registry. A slot whose object id is no longer registered reads as
/// empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Container {
    pub id: i64,
    pub uuid: Option<Uuid>,
    pub kind: ContainerKind,
    pub owner: Option<String>,
    pub items: BTreeMap<u32, i64>,
}

impl Container {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            uuid: None,
            kind: ContainerKind::Unknown,
            owner: None,
            items: BTreeMap::new(),
        }
    }

    /// Canonical 36-character hyphenated lowercase rendering of the uuid.
    pub fn uuid_string(&self) -> Option<String> {
        self.uuid.map(|uuid| uuid.hyphenated().to_string())
    }
}

/// A floating item instance keyed by its server-assigned object id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LootItem {
    pub object_id: i64,
    pub item_id: String,
    pub item_name: String,
    pub quantity: i64,
    pub owner: Option<String>,
}
