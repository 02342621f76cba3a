//! # World State
//!
//! In-memory registries for players, containers and floating loot items
//! observed during one capture session.
//!
//! A single `WorldState` is owned by the pipeline and mutated only by the
//! correlation handlers. Containers are keyed by their integer id and may also
//! be found by uuid; loot items are keyed by object id and referenced from
//! container slots.

pub mod container;
pub mod event;
pub mod player;

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info};
use uuid::Uuid;

pub use container::{Container, ContainerKind, LootItem, MONSTER_OWNER_PREFIX};
pub use event::{LootEvent, CSV_HEADER};
pub use player::Player;

#[derive(Debug, Default)]
pub struct WorldState {
    players: HashMap<String, Player>,
    self_name: Option<String>,
    containers: BTreeMap<i64, Container>,
    loots: HashMap<i64, LootItem>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything, including the local player.
    pub fn clear(&mut self) {
        self.players.clear();
        self.self_name = None;
        self.containers.clear();
        self.loots.clear();
    }

    // players

    pub fn player(&self, name: &str) -> Option<&Player> {
        self.players.get(name)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Insert a player or fill in the tags of a known one.
    pub fn upsert_player(&mut self, name: &str, guild: &str, alliance: &str) -> &Player {
        let player = self
            .players
            .entry(name.to_string())
            .or_insert_with(|| Player::new(name));
        player.merge_tags(guild, alliance);
        player
    }

    /// Snapshot of a player, created bare if unseen.
    pub fn resolve_player(&mut self, name: &str) -> Player {
        self.players
            .entry(name.to_string())
            .or_insert_with(|| Player::new(name))
            .clone()
    }

    /// Mark `name` as the local player. Only the first call after
    /// [`clear_self`](Self::clear_self) takes effect; returns whether this call set it.
    pub fn set_self(&mut self, name: &str) -> bool {
        if let Some(current) = &self.self_name {
            if current != name {
                debug!(current = %current, ignored = %name, "Self player already identified");
            }
            return false;
        }
        self.resolve_player(name);
        self.self_name = Some(name.to_string());
        if let Some(player) = self.players.get(name) {
            info!(player = %player, "Local player identified");
        }
        true
    }

    /// Forget the local player; the next successful join identifies it again.
    pub fn clear_self(&mut self) {
        self.self_name = None;
    }

    pub fn self_player(&self) -> Option<&Player> {
        self.self_name.as_deref().and_then(|name| self.players.get(name))
    }

    // containers

    pub fn container(&self, id: i64) -> Option<&Container> {
        self.containers.get(&id)
    }

    pub fn container_by_uuid(&self, uuid: &Uuid) -> Option<&Container> {
        self.containers
            .values()
            .find(|container| container.uuid.as_ref() == Some(uuid))
    }

    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    pub fn containers(&self) -> impl Iterator<Item = &Container> {
        self.containers.values()
    }

    /// Record a loot bag: owner and kind are refreshed on every sighting.
    pub fn upsert_loot_container(&mut self, id: i64, owner: &str) -> &Container {
        let container = self
            .containers
            .entry(id)
            .or_insert_with(|| Container::new(id));
        container.owner = Some(owner.to_string());
        container.kind = ContainerKind::from_owner(owner);
        container
    }

    /// Record a chest; its contents are never treated as loot.
    pub fn upsert_chest(&mut self, id: i64) -> &Container {
        let container = self
            .containers
            .entry(id)
            .or_insert_with(|| Container::new(id));
        container.kind = ContainerKind::Chest;
        container
    }

    /// Resolve a container by uuid, then by id, correcting its keys in place,
    /// and link the registered items of `inventory` (index = slot) into it.
    /// Returns the number of slots linked.
    pub fn attach_container(&mut self, id: i64, uuid: Uuid, inventory: &[Option<i64>]) -> usize {
        let existing = self
            .containers
            .iter()
            .find(|(_, container)| container.uuid == Some(uuid))
            .map(|(key, _)| *key)
            .or_else(|| self.containers.contains_key(&id).then_some(id));

        let mut container = existing
            .and_then(|key| self.containers.remove(&key))
            .unwrap_or_else(|| Container::new(id));
        if container.id != id {
            debug!(old = container.id, new = id, "Container id corrected");
        }
        container.id = id;
        container.uuid = Some(uuid);

        // a different entry registered under the new id is folded in
        if let Some(other) = self.containers.remove(&id) {
            if container.owner.is_none() {
                container.owner = other.owner;
            }
            if container.kind == ContainerKind::Unknown {
                container.kind = other.kind;
            }
        }

        let mut linked = 0;
        for (slot, object_id) in inventory.iter().enumerate() {
            let Some(object_id) = (*object_id).filter(|object_id| *object_id != 0) else {
                continue;
            };
            let Some(loot) = self.loots.get_mut(&object_id) else {
                continue;
            };
            if loot.owner.is_none() {
                loot.owner = container.owner.clone();
            }
            container.items.insert(slot as u32, object_id);
            linked += 1;
        }

        self.containers.insert(id, container);
        linked
    }

    pub fn remove_container_by_uuid(&mut self, uuid: &Uuid) -> Option<Container> {
        let key = self
            .containers
            .iter()
            .find(|(_, container)| container.uuid.as_ref() == Some(uuid))
            .map(|(key, _)| *key)?;
        self.containers.remove(&key)
    }

    /// Item currently linked at `slot` of the container with `uuid`.
    pub fn item_in_slot(&self, uuid: &Uuid, slot: u32) -> Option<&LootItem> {
        let object_id = self.container_by_uuid(uuid)?.items.get(&slot)?;
        self.loots.get(object_id)
    }

    /// Remove the item at `slot` from both the container and the registry.
    pub fn take_item(&mut self, uuid: &Uuid, slot: u32) -> Option<LootItem> {
        let container = self
            .containers
            .values_mut()
            .find(|container| container.uuid.as_ref() == Some(uuid))?;
        let object_id = container.items.remove(&slot)?;
        self.loots.remove(&object_id)
    }

    // loot items

    pub fn loot(&self, object_id: i64) -> Option<&LootItem> {
        self.loots.get(&object_id)
    }

    pub fn loot_count(&self) -> usize {
        self.loots.len()
    }

    /// Register an item or refresh a known one; a known owner is kept.
    pub fn upsert_loot(&mut self, item: LootItem) {
        match self.loots.get_mut(&item.object_id) {
            Some(existing) => {
                existing.item_id = item.item_id;
                existing.item_name = item.item_name;
                existing.quantity = item.quantity;
                if existing.owner.is_none() {
                    existing.owner = item.owner;
                }
            }
            None => {
                self.loots.insert(item.object_id, item);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(object_id: i64) -> LootItem {
        LootItem {
            object_id,
            item_id: "T4_BAG".into(),
            item_name: "Bag".into(),
            quantity: 1,
            owner: None,
        }
    }

    fn uuid(byte: u8) -> Uuid {
        Uuid::from_bytes([byte; 16])
    }

    #[test]
    fn test_self_set_once() {
        let mut world = WorldState::new();
        assert!(world.self_player().is_none());
        assert!(world.set_self("Alice"));
        assert!(!world.set_self("Mallory"));
        assert_eq!(world.self_player().unwrap().name, "Alice");
        world.upsert_player("Alice", "Knights", "");
        assert_eq!(world.self_player().unwrap().guild, "Knights");

        world.clear_self();
        assert!(world.self_player().is_none());
        assert!(world.player("Alice").is_some());
        assert!(world.set_self("Mallory"));
        assert_eq!(world.self_player().unwrap().name, "Mallory");
    }

    #[test]
    fn test_attach_links_items_and_backfills_owner() {
        let mut world = WorldState::new();
        world.upsert_loot(item(1001));
        world.upsert_loot_container(7, "Bob");
        let linked = world.attach_container(7, uuid(1), &[Some(0), Some(1001), None, Some(99)]);
        assert_eq!(linked, 1);
        assert_eq!(world.container_count(), 1);
        assert_eq!(world.loot(1001).unwrap().owner.as_deref(), Some("Bob"));
        assert_eq!(world.item_in_slot(&uuid(1), 1).unwrap().object_id, 1001);
    }

    #[test]
    fn test_attach_corrects_id_without_duplicate() {
        let mut world = WorldState::new();
        world.attach_container(5, uuid(2), &[]);
        world.attach_container(6, uuid(2), &[]);
        assert_eq!(world.container_count(), 1);
        assert!(world.container(5).is_none());
        assert_eq!(world.container(6).unwrap().uuid, Some(uuid(2)));

        world.attach_container(6, uuid(3), &[]);
        assert_eq!(world.container_count(), 1);
        assert!(world.container_by_uuid(&uuid(2)).is_none());
        assert!(world.container_by_uuid(&uuid(3)).is_some());
    }

    #[test]
    fn test_attach_merges_entry_holding_new_id() {
        let mut world = WorldState::new();
        world.attach_container(1, uuid(4), &[]);
        world.upsert_loot_container(2, "@MOB_WOLF");
        world.attach_container(2, uuid(4), &[]);
        assert_eq!(world.container_count(), 1);
        let container = world.container(2).unwrap();
        assert_eq!(container.kind, ContainerKind::Monster);
        assert_eq!(container.owner.as_deref(), Some("@MOB_WOLF"));
    }

    #[test]
    fn test_take_item_consumes_registry_entry() {
        let mut world = WorldState::new();
        world.upsert_loot(item(3));
        world.attach_container(1, uuid(5), &[Some(3)]);
        assert_eq!(world.take_item(&uuid(5), 0).unwrap().object_id, 3);
        assert!(world.loot(3).is_none());
        assert!(world.take_item(&uuid(5), 0).is_none());
    }

    #[test]
    fn test_remove_container_by_uuid() {
        let mut world = WorldState::new();
        world.attach_container(1, uuid(6), &[]);
        assert!(world.remove_container_by_uuid(&uuid(7)).is_none());
        assert!(world.remove_container_by_uuid(&uuid(6)).is_some());
        assert_eq!(world.container_count(), 0);
    }
}
