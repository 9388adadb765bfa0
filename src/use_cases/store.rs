// World-state mirror: staged deltas, the live snapshot, the own character,
// and the chest map.

use crate::domain::entity::Entity;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct WorldState {
    /// Deltas accumulated from the socket since the last tick drain.
    staged: HashMap<String, Entity>,
    /// The last consistent snapshot, advanced by the simulator.
    live: HashMap<String, Entity>,
    /// The own character, duplicated out of `live` for O(1) reads.
    character: Entity,
    party: Value,
}

/// Shared world state for one bot.
///
/// The network context merges events into `staged` (or the character) under
/// the entity mutex; the tick context swaps `staged` and `live` out, works on
/// the owned maps without the lock, and moves `live` back when done. Critical
/// sections never await.
#[derive(Debug, Default)]
pub struct WorldStore {
    world: Mutex<WorldState>,
    chests: Mutex<HashMap<String, Entity>>,
}

impl WorldStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn world(&self) -> MutexGuard<'_, WorldState> {
        self.world.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn chest_map(&self) -> MutexGuard<'_, HashMap<String, Entity>> {
        self.chests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // -- staging (network context) ----------------------------------------

    /// Merges one entity patch into the staged map, inserting on first sight.
    pub fn stage_update(&self, id: &str, patch: Entity) {
        let mut world = self.world();
        stage_into(&mut world.staged, id, patch);
    }

    /// Merges a whole event's worth of records under a single lock hold, so
    /// a tick drain cannot observe half an event.
    pub fn stage_batch(&self, entries: Vec<(String, Entity)>) {
        let mut world = self.world();
        for (id, patch) in entries {
            stage_into(&mut world.staged, &id, patch);
        }
    }

    /// Clears the staged map and stages a full rebuild, atomically. Used for
    /// `start`, `new_map`, and `entities` snapshots of type `all`.
    pub fn stage_replace_all(&self, entries: Vec<(String, Entity)>) {
        let mut world = self.world();
        world.staged.clear();
        for (id, patch) in entries {
            stage_into(&mut world.staged, &id, patch);
        }
    }

    pub fn stage_clear(&self) {
        self.world().staged.clear();
    }

    /// Flags an entity as gone; removal is deferred to the next full
    /// snapshot, the simulator just stops advancing it.
    pub fn mark_dead(&self, id: &str) {
        let mut patch = Entity::new();
        patch.set("dead", Value::Bool(true));
        self.stage_update(id, patch);
    }

    /// Snapshot of the staged map, for diagnostics and tests.
    pub fn staged_snapshot(&self) -> HashMap<String, Entity> {
        self.world().staged.clone()
    }

    // -- tick handoff (tick context only) ---------------------------------

    /// Takes ownership of both maps, leaving empty slots behind so the
    /// socket can keep staging while the simulator works. The caller must
    /// hand `live` back through [`WorldStore::restore_live`].
    pub fn take_for_tick(&self) -> (HashMap<String, Entity>, HashMap<String, Entity>) {
        let mut world = self.world();
        let staged = std::mem::take(&mut world.staged);
        let live = std::mem::take(&mut world.live);
        (staged, live)
    }

    pub fn restore_live(&self, live: HashMap<String, Entity>) {
        self.world().live = live;
    }

    // -- own character ----------------------------------------------------

    pub fn update_character(&self, patch: &Entity) {
        self.world().character.merge(patch);
    }

    pub fn with_character<R>(&self, read: impl FnOnce(&Entity) -> R) -> R {
        read(&self.world().character)
    }

    pub fn with_character_mut<R>(&self, update: impl FnOnce(&mut Entity) -> R) -> R {
        update(&mut self.world().character)
    }

    // -- live reads -------------------------------------------------------

    pub fn with_live<R>(&self, read: impl FnOnce(&HashMap<String, Entity>) -> R) -> R {
        read(&self.world().live)
    }

    pub fn entity(&self, id: &str) -> Option<Entity> {
        self.world().live.get(id).cloned()
    }

    pub fn entity_count(&self) -> usize {
        self.world().live.len()
    }

    // -- party ------------------------------------------------------------

    pub fn set_party(&self, party: Value) {
        self.world().party = party;
    }

    pub fn party(&self) -> Value {
        self.world().party.clone()
    }

    // -- chests -----------------------------------------------------------

    pub fn add_chest(&self, id: &str, drop: Entity) {
        self.chest_map().insert(id.to_string(), drop);
    }

    pub fn remove_chest(&self, id: &str) {
        self.chest_map().remove(id);
    }

    pub fn chest_ids(&self) -> Vec<String> {
        self.chest_map().keys().cloned().collect()
    }
}

fn stage_into(staged: &mut HashMap<String, Entity>, id: &str, patch: Entity) {
    match staged.get_mut(id) {
        Some(existing) => existing.merge(&patch),
        None => {
            staged.insert(id.to_string(), patch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(value: Value) -> Entity {
        Entity::from_value(value).expect("object")
    }

    #[test]
    fn staging_merges_repeat_updates() {
        let store = WorldStore::new();
        store.stage_update("m1", entity(json!({ "x": 1.0, "hp": 50 })));
        store.stage_update("m1", entity(json!({ "x": 2.0 })));

        let staged = store.staged_snapshot();
        assert_eq!(staged["m1"].num("x"), Some(2.0));
        assert_eq!(staged["m1"].int("hp"), Some(50));
    }

    #[test]
    fn replace_all_discards_previous_staging() {
        let store = WorldStore::new();
        store.stage_update("old", entity(json!({ "x": 0.0 })));
        store.stage_replace_all(vec![("new".into(), entity(json!({ "x": 9.0 })))]);

        let staged = store.staged_snapshot();
        assert!(!staged.contains_key("old"));
        assert!(staged.contains_key("new"));
    }

    #[test]
    fn mark_dead_merges_onto_existing_delta() {
        let store = WorldStore::new();
        store.stage_update("m1", entity(json!({ "hp": 10 })));
        store.mark_dead("m1");

        let staged = store.staged_snapshot();
        assert!(staged["m1"].dead());
        assert_eq!(staged["m1"].int("hp"), Some(10));
    }

    #[test]
    fn take_for_tick_leaves_empty_slots() {
        let store = WorldStore::new();
        store.stage_update("m1", entity(json!({ "x": 1.0 })));
        let (staged, live) = store.take_for_tick();
        assert_eq!(staged.len(), 1);
        assert!(live.is_empty());
        assert!(store.staged_snapshot().is_empty());

        store.restore_live(staged);
        assert_eq!(store.entity_count(), 1);
    }

    #[test]
    fn chests_are_independent_of_the_world() {
        let store = WorldStore::new();
        store.add_chest("c1", entity(json!({ "gold": 120 })));
        assert_eq!(store.chest_ids(), vec!["c1".to_string()]);
        store.remove_chest("c1");
        assert!(store.chest_ids().is_empty());
    }
}
