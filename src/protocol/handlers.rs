//! # Loot Correlation
//!
//! Semantic handlers that update [`WorldState`] and emit [`LootEvent`]s.
//!
//! Two evidence paths produce events:
//! - **Other player**: `EvOtherGrabbedLoot` names both parties directly.
//! - **Local player**: `OpInventoryMoveItem` moves an item out of a tracked
//!   container; the item and its owner come from earlier item, loot and attach
//!   events, and the looter is the player identified at join.
//!
//! Every handler returns `Err(Miss)` for the deliberate "ignore" branches so
//! the caller can log and count them. None of them can fail the session.

use std::sync::Arc;

use tracing::trace;
use uuid::Uuid;

use crate::catalog::ItemCatalog;
use crate::core::message::{DecodedMessage, ParameterTable};
use crate::error::Miss;
use crate::protocol::dispatcher::Route;
use crate::world::{ContainerKind, LootEvent, LootItem, WorldState};

pub type HandlerResult = std::result::Result<Option<LootEvent>, Miss>;

/// Parameter ids per message layout.
pub mod ids {
    pub mod new_character {
        pub const ID: u8 = 0;
        pub const NAME: u8 = 1;
        pub const GUILD: u8 = 8;
        pub const ALLIANCE: u8 = 43;
    }

    pub mod character_stats {
        pub const ID: u8 = 0;
        pub const GUILD: u8 = 2;
        pub const ALLIANCE: u8 = 4;
        pub const NAME: u8 = 5;
    }

    pub mod new_item {
        pub const OBJECT_ID: u8 = 0;
        pub const ITEM_ID: u8 = 1;
        pub const QUANTITY: u8 = 2;
        pub const CRAFTED_BY: u8 = 5;
    }

    pub mod new_loot {
        pub const ID: u8 = 0;
        pub const OWNER: u8 = 3;
    }

    pub mod attach_container {
        pub const ID: u8 = 0;
        pub const UUID: u8 = 1;
        pub const INVENTORY: u8 = 3;
        pub const SLOTS: u8 = 4;
    }

    pub mod detach_container {
        pub const UUID: u8 = 0;
    }

    pub mod other_grabbed_loot {
        pub const LOOTED_FROM: u8 = 1;
        pub const LOOTED_BY: u8 = 2;
        pub const IS_SILVER: u8 = 3;
        pub const ITEM_ID: u8 = 4;
        pub const QUANTITY: u8 = 5;
    }

    pub mod inventory_move {
        pub const FROM_SLOT: u8 = 0;
        pub const FROM_UUID: u8 = 1;
        pub const TO_SLOT: u8 = 3;
        pub const TO_UUID: u8 = 4;
    }

    pub mod join {
        pub const NAME: u8 = 2;
        pub const GUILD: u8 = 57;
        pub const ALLIANCE: u8 = 77;
    }
}

/// Applies routed messages to the world.
#[derive(Clone)]
pub struct LootCorrelator {
    catalog: Arc<dyn ItemCatalog>,
    locale: String,
}

impl std::fmt::Debug for LootCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LootCorrelator")
            .field("catalog_items", &self.catalog.len())
            .field("locale", &self.locale)
            .finish()
    }
}

impl LootCorrelator {
    pub fn new(catalog: Arc<dyn ItemCatalog>, locale: impl Into<String>) -> Self {
        Self {
            catalog,
            locale: locale.into(),
        }
    }

    pub fn handle(
        &self,
        world: &mut WorldState,
        route: Route,
        message: &DecodedMessage,
    ) -> HandlerResult {
        let params = message.parameters();
        match route {
            Route::NewCharacter => self.new_character(world, params),
            Route::CharacterStats => self.character_stats(world, params),
            Route::NewSimpleItem => self.new_item(world, params, true),
            Route::NewEquipmentItem => self.new_item(world, params, false),
            Route::NewLoot => self.new_loot(world, params),
            Route::NewLootChest => self.new_loot_chest(world, params),
            Route::AttachItemContainer => self.attach_container(world, params),
            Route::DetachItemContainer => self.detach_container(world, params),
            Route::OtherGrabbedLoot => self.other_grabbed_loot(world, params),
            Route::InventoryMoveItem => self.inventory_move(world, params),
            Route::Join => match message {
                DecodedMessage::OperationResponse { return_code, .. } if *return_code != 0 => {
                    Err(Miss::JoinFailed(*return_code))
                }
                _ => self.join(world, params),
            },
        }
    }

    fn new_character(&self, world: &mut WorldState, params: &ParameterTable) -> HandlerResult {
        use ids::new_character::*;
        params.int(ID)?;
        let name = params.string(NAME)?;
        world.upsert_player(
            name,
            params.string_or_empty(GUILD),
            params.string_or_empty(ALLIANCE),
        );
        Ok(None)
    }

    fn character_stats(&self, world: &mut WorldState, params: &ParameterTable) -> HandlerResult {
        use ids::character_stats::*;
        params.int(ID)?;
        let name = params.string(NAME)?;
        world.upsert_player(
            name,
            params.string_or_empty(GUILD),
            params.string_or_empty(ALLIANCE),
        );
        Ok(None)
    }

    fn new_item(
        &self,
        world: &mut WorldState,
        params: &ParameterTable,
        simple: bool,
    ) -> HandlerResult {
        use ids::new_item::*;
        let object_id = params.int(OBJECT_ID)?;
        let numeric_id = params.int(ITEM_ID)?;
        let quantity = params.int(QUANTITY)?;
        // a crafted-by string marks an equipment layout arriving under the simple code
        if simple && params.get(CRAFTED_BY).and_then(|v| v.as_str()).is_some() {
            return Err(Miss::CraftedItem);
        }
        let item = self
            .catalog
            .get(numeric_id)
            .ok_or(Miss::CatalogMiss(numeric_id))?;
        world.upsert_loot(LootItem {
            object_id,
            item_id: item.unique_name.clone(),
            item_name: item.name(&self.locale).to_string(),
            quantity,
            owner: None,
        });
        trace!(object_id, item = %item.unique_name, quantity, "Item registered");
        Ok(None)
    }

    fn new_loot(&self, world: &mut WorldState, params: &ParameterTable) -> HandlerResult {
        use ids::new_loot::*;
        let id = params.int(ID)?;
        let owner = params.string(OWNER)?;
        let container = world.upsert_loot_container(id, owner);
        trace!(id, owner, kind = ?container.kind, "Loot container registered");
        Ok(None)
    }

    fn new_loot_chest(&self, world: &mut WorldState, params: &ParameterTable) -> HandlerResult {
        let id = params.int(ids::new_loot::ID)?;
        world.upsert_chest(id);
        trace!(id, "Chest registered");
        Ok(None)
    }

    fn attach_container(&self, world: &mut WorldState, params: &ParameterTable) -> HandlerResult {
        use ids::attach_container::*;
        let id = params.int(ID)?;
        let uuid = Uuid::from_bytes(params.uuid_bytes(UUID)?);
        let inventory = params.int_list(INVENTORY)?;
        let slots = params.int(SLOTS)?;
        let linked = world.attach_container(id, uuid, &inventory);
        trace!(id, uuid = %uuid, slots, linked, "Container attached");
        Ok(None)
    }

    fn detach_container(&self, world: &mut WorldState, params: &ParameterTable) -> HandlerResult {
        let uuid = Uuid::from_bytes(params.uuid_bytes(ids::detach_container::UUID)?);
        if world.remove_container_by_uuid(&uuid).is_some() {
            trace!(uuid = %uuid, "Container detached");
        }
        Ok(None)
    }

    fn other_grabbed_loot(&self, world: &mut WorldState, params: &ParameterTable) -> HandlerResult {
        use ids::other_grabbed_loot::*;
        if params.flag(IS_SILVER) {
            return Err(Miss::SilverTransfer);
        }
        let looted_from = params.string(LOOTED_FROM)?;
        let looted_by = params.string(LOOTED_BY)?;
        let numeric_id = params.int(ITEM_ID)?;
        let quantity = params.int(QUANTITY)?;

        let (item_id, item_name) = match self.catalog.get(numeric_id) {
            Some(item) => (item.unique_name.clone(), item.name(&self.locale).to_string()),
            None => {
                trace!(numeric_id, "Item missing from catalog");
                (
                    format!("UNKNOWN_{numeric_id}"),
                    format!("Unknown Item ({numeric_id})"),
                )
            }
        };

        let looted_by = world.resolve_player(looted_by);
        let looted_from = world.resolve_player(looted_from);
        Ok(Some(LootEvent::new(
            item_id,
            item_name,
            quantity,
            looted_by,
            looted_from,
        )))
    }

    fn inventory_move(&self, world: &mut WorldState, params: &ParameterTable) -> HandlerResult {
        use ids::inventory_move::*;
        let from_uuid = Uuid::from_bytes(params.uuid_bytes(FROM_UUID)?);
        let to_uuid = Uuid::from_bytes(params.uuid_bytes(TO_UUID)?);
        if from_uuid == to_uuid {
            return Err(Miss::SameContainer);
        }
        let from_slot = u32::try_from(params.int(FROM_SLOT).unwrap_or(0)).map_err(|_| {
            Miss::TypeMismatch {
                id: FROM_SLOT,
                expected: "slot index",
            }
        })?;

        let container = world
            .container_by_uuid(&from_uuid)
            .ok_or(Miss::ContainerNotFound)?;
        if container.kind == ContainerKind::Chest {
            return Err(Miss::ChestWithdrawal);
        }
        let container_owner = container.owner.clone();

        let mut item = world
            .take_item(&from_uuid, from_slot)
            .ok_or(Miss::SlotEmpty(from_slot))?;
        trace!(
            object_id = item.object_id,
            from_slot,
            to_slot = params.int(TO_SLOT).unwrap_or(0),
            "Item left container"
        );

        if item.owner.is_none() {
            item.owner = container_owner;
        }
        let owner = item.owner.ok_or(Miss::OwnerUnresolved)?;
        let looted_by = world.self_player().cloned().ok_or(Miss::SelfUnknown)?;
        let looted_from = world.resolve_player(&owner);

        Ok(Some(LootEvent::new(
            item.item_id,
            item.item_name,
            item.quantity,
            looted_by,
            looted_from,
        )))
    }

    fn join(&self, world: &mut WorldState, params: &ParameterTable) -> HandlerResult {
        use ids::join::*;
        let name = params.string(NAME)?;
        world.upsert_player(
            name,
            params.string_or_empty(GUILD),
            params.string_or_empty(ALLIANCE),
        );
        world.set_self(name);
        Ok(None)
    }
}
