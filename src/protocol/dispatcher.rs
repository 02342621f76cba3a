//! Message routing: maps a decoded message to the handler for its code.
//!
//! Events are keyed by parameter 252 and operations by parameter 253. Codes
//! absent from the injected [`EventCodes`] table route to `None`.

use crate::core::message::{DecodedMessage, EVENT_CODE_PARAM, OPERATION_CODE_PARAM};
use crate::protocol::codes::{code_matches, EventCodes};

/// Semantic handler selected for a decoded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    NewCharacter,
    CharacterStats,
    NewSimpleItem,
    /// Also used for siege banners, which share the equipment layout.
    NewEquipmentItem,
    NewLoot,
    NewLootChest,
    AttachItemContainer,
    DetachItemContainer,
    OtherGrabbedLoot,
    InventoryMoveItem,
    Join,
}

impl Route {
    /// Stable name used in log fields.
    pub fn name(&self) -> &'static str {
        match self {
            Route::NewCharacter => "EvNewCharacter",
            Route::CharacterStats => "EvCharacterStats",
            Route::NewSimpleItem => "EvNewSimpleItem",
            Route::NewEquipmentItem => "EvNewEquipmentItem",
            Route::NewLoot => "EvNewLoot",
            Route::NewLootChest => "EvNewLootChest",
            Route::AttachItemContainer => "EvAttachItemContainer",
            Route::DetachItemContainer => "EvDetachItemContainer",
            Route::OtherGrabbedLoot => "EvOtherGrabbedLoot",
            Route::InventoryMoveItem => "OpInventoryMoveItem",
            Route::Join => "OpJoin",
        }
    }
}

/// Maps decoded messages to semantic routes using the injected code table.
///
/// Events are discriminated by parameter 252, requests and responses by
/// parameter 253. Messages without the discriminator, or whose code is not
/// configured, have no route.
#[derive(Debug, Clone, Default)]
pub struct EventRouter {
    codes: EventCodes,
}

impl EventRouter {
    pub fn new(codes: EventCodes) -> Self {
        Self { codes }
    }

    pub fn codes(&self) -> &EventCodes {
        &self.codes
    }

    pub fn route(&self, message: &DecodedMessage) -> Option<Route> {
        match message {
            DecodedMessage::Event { parameters, .. } => {
                let id = parameters.get(EVENT_CODE_PARAM)?.as_i64()?;
                self.route_event(id)
            }
            DecodedMessage::OperationRequest { parameters, .. } => {
                let id = parameters.get(OPERATION_CODE_PARAM)?.as_i64()?;
                code_matches(self.codes.inventory_move_item, id).then_some(Route::InventoryMoveItem)
            }
            DecodedMessage::OperationResponse { parameters, .. } => {
                let id = parameters.get(OPERATION_CODE_PARAM)?.as_i64()?;
                code_matches(self.codes.join, id).then_some(Route::Join)
            }
        }
    }

    fn route_event(&self, id: i64) -> Option<Route> {
        let codes = &self.codes;
        let table = [
            (codes.new_character, Route::NewCharacter),
            (codes.new_equipment_item, Route::NewEquipmentItem),
            (codes.new_siege_banner_item, Route::NewEquipmentItem),
            (codes.new_simple_item, Route::NewSimpleItem),
            (codes.new_loot, Route::NewLoot),
            (codes.attach_item_container, Route::AttachItemContainer),
            (codes.detach_item_container, Route::DetachItemContainer),
            (codes.character_stats, Route::CharacterStats),
            (codes.other_grabbed_loot, Route::OtherGrabbedLoot),
            (codes.new_loot_chest, Route::NewLootChest),
        ];
        table
            .iter()
            .find(|(code, _)| code_matches(*code, id))
            .map(|(_, route)| *route)
    }
}
