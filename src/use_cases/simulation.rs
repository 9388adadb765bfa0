// The simulation tick: drains staged deltas into the live map and advances
// moving entities between server updates.

use crate::domain::entity::Entity;
use crate::domain::movement::{engage_move, move_entity, stop_logic};
use crate::frameworks::config;
use crate::interface_adapters::clients::game_data::GameData;
use crate::use_cases::bot::Bot;
use crate::use_cases::store::WorldStore;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Drives the fixed-step simulation until the bot is stopped. Runs on its own
/// task, concurrent with the network context.
pub(crate) async fn run(bot: Bot) {
    let mut ticker = tokio::time::interval(config::TICK_INTERVAL);
    let mut diagnostics = tokio::time::interval(Duration::from_secs(1));
    let mut last = Instant::now();

    while bot.is_running() {
        tokio::select! {
            _ = bot.shutdown_signal() => break,
            _ = ticker.tick() => {
                let now = Instant::now();
                let delta_ms = now.duration_since(last).as_secs_f64() * 1000.0;
                last = now;
                advance_world(bot.store(), bot.game_data(), delta_ms);
            }
            _ = diagnostics.tick() => log_entities(bot.store()),
        }
    }

    debug!("simulation task exiting");
}

/// Advances the world by `delta_ms` of simulated time.
///
/// Staged deltas and the live map are swapped out under the entity mutex and
/// processed as owned maps, so the socket keeps staging while integration
/// runs. Time is consumed in slices of at most 50 ms: the cap bounds
/// per-step positional error and guarantees the stop test runs at least once
/// per 50 ms of simulated time.
pub fn advance_world(store: &WorldStore, data: &GameData, delta_ms: f64) {
    let (staged, mut live) = store.take_for_tick();

    apply_removals(&mut live);

    for (id, patch) in staged {
        match live.get_mut(&id) {
            Some(existing) => existing.merge(&patch),
            None => {
                live.insert(id, patch);
            }
        }
    }

    let mut remaining = delta_ms;
    loop {
        let slice = remaining.min(config::SLICE_CAP_MS);

        store.with_character_mut(|character| advance_character(character, slice));

        for entity in live.values_mut() {
            advance_entity(entity, data, slice);
        }

        remaining -= slice;
        if remaining <= 0.0 {
            break;
        }
    }

    store.restore_live(live);
}

/// Entities flagged `dead` are carried, not purged: the next full snapshot
/// (`start`, `new_map`, `entities` of type `all`) rebuilds the staged map and
/// drops them wholesale.
fn apply_removals(_live: &mut HashMap<String, Entity>) {}

fn advance_character(character: &mut Entity, slice_ms: f64) {
    if character.rip() || !character.moving() {
        return;
    }

    if character.num("ref_speed") != character.num("speed") {
        engage_move(character);
    }
    move_entity(character, slice_ms);
    stop_logic(character);
}

fn advance_entity(entity: &mut Entity, data: &GameData, slice_ms: f64) {
    // Monsters can arrive without a speed; the static tables carry it.
    if entity.num("speed").is_none() && entity.kind() == Some("monster") {
        if let Some(speed) = entity.mtype().and_then(|mtype| data.monster_speed(mtype)) {
            entity.set_num("speed", speed);
        }
    }

    if entity.rip() || entity.dead() || !entity.moving() {
        return;
    }

    // Re-engage when a newer move command superseded the cached state, or
    // when the server changed the speed mid-move.
    if entity.int("move_num") != entity.int("engaged_move")
        || entity.num("ref_speed") != entity.num("speed")
    {
        engage_move(entity);
    }

    move_entity(entity, slice_ms);
    stop_logic(entity);
}

fn log_entities(store: &WorldStore) {
    store.with_live(|live| {
        for (id, entity) in live {
            debug!(
                id = %id,
                hp = entity.int("hp").unwrap_or_default(),
                x = entity.x(),
                y = entity.y(),
                "entity"
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // Stamps a fresh monster record the way ingestion does.
    fn monster(id: &str, fields: serde_json::Value) -> (String, Entity) {
        let mut entity = Entity::from_value(fields).expect("object");
        entity.set("id", json!(id));
        entity.set("type", json!("monster"));
        (id.to_string(), entity)
    }

    fn game_data() -> GameData {
        GameData::from_value(json!({
            "monsters": { "bee": { "speed": 12.0, "hp": 60 } }
        }))
    }

    #[test]
    fn draining_empty_staged_is_a_noop_on_live() {
        let store = WorldStore::new();
        let (id, bee) = monster("m1", json!({ "x": 5.0, "y": 5.0 }));
        store.stage_update(&id, bee);
        advance_world(&store, &game_data(), 0.0);
        let before = store.entity("m1").expect("live");

        advance_world(&store, &game_data(), 0.0);
        assert_eq!(store.entity("m1"), Some(before));
        assert_eq!(store.entity_count(), 1);
    }

    #[test]
    fn moving_entities_have_current_extrapolation_after_a_tick() {
        let store = WorldStore::new();
        let (id, bee) = monster(
            "m1",
            json!({
                "x": 100.0, "y": 0.0,
                "going_x": 0.0, "going_y": 0.0,
                "speed": 50.0, "moving": true, "move_num": 1
            }),
        );
        store.stage_update(&id, bee);

        advance_world(&store, &game_data(), 1000.0);

        let m1 = store.entity("m1").expect("live");
        assert_eq!(m1.num("ref_speed"), m1.num("speed"));
        assert_eq!(m1.int("engaged_move"), Some(1));
        assert!((m1.x() - 50.0).abs() < 1.0);
        assert!(m1.y().abs() < 1e-9);
        assert!((m1.num("vx").unwrap() - -50.0).abs() < 1e-9);
    }

    #[test]
    fn superseding_move_command_reengages_from_current_position() {
        let store = WorldStore::new();
        let (id, bee) = monster(
            "m1",
            json!({
                "x": 100.0, "y": 0.0,
                "going_x": 0.0, "going_y": 0.0,
                "speed": 50.0, "moving": true, "move_num": 1
            }),
        );
        store.stage_update(&id, bee);
        advance_world(&store, &game_data(), 1000.0);

        // Server doubles the speed under a new move counter.
        let mut patch = Entity::new();
        patch.set("going_x", json!(0.0));
        patch.set("going_y", json!(0.0));
        patch.set("speed", json!(100.0));
        patch.set("move_num", json!(2));
        store.stage_update("m1", patch);

        advance_world(&store, &game_data(), 500.0);

        // 50 px remained; 100 px/s over 500 ms arrives exactly and snaps.
        let m1 = store.entity("m1").expect("live");
        assert_eq!((m1.x(), m1.y()), (0.0, 0.0));
        assert!(!m1.moving());
        assert_eq!(m1.num("vx"), Some(0.0));
        assert_eq!(m1.int("engaged_move"), Some(2));
    }

    #[test]
    fn dead_and_rip_entities_are_never_advanced() {
        let store = WorldStore::new();
        let (id, bee) = monster(
            "m1",
            json!({
                "x": 100.0, "y": 0.0,
                "going_x": 0.0, "going_y": 0.0,
                "speed": 50.0, "moving": true, "move_num": 1, "rip": true
            }),
        );
        store.stage_update(&id, bee);
        store.mark_dead("m1");

        advance_world(&store, &game_data(), 1000.0);

        let m1 = store.entity("m1").expect("live");
        assert_eq!(m1.x(), 100.0);
    }

    #[test]
    fn monsters_inherit_speed_from_static_data() {
        let store = WorldStore::new();
        let (id, mut bee) = monster(
            "m1",
            json!({
                "x": 24.0, "y": 0.0,
                "going_x": 0.0, "going_y": 0.0,
                "moving": true, "move_num": 1
            }),
        );
        bee.set("mtype", json!("bee"));
        store.stage_update(&id, bee);

        advance_world(&store, &game_data(), 1000.0);

        let m1 = store.entity("m1").expect("live");
        assert_eq!(m1.num("speed"), Some(12.0));
        assert!((m1.x() - 12.0).abs() < 1.0);
    }

    #[test]
    fn stop_logic_is_idempotent_across_ticks() {
        let store = WorldStore::new();
        let (id, bee) = monster(
            "m1",
            json!({
                "x": 10.0, "y": 0.0,
                "going_x": 0.0, "going_y": 0.0,
                "speed": 50.0, "moving": true, "move_num": 1
            }),
        );
        store.stage_update(&id, bee);

        advance_world(&store, &game_data(), 1000.0);
        let after_arrival = store.entity("m1").expect("live");
        assert_eq!((after_arrival.x(), after_arrival.y()), (0.0, 0.0));
        assert!(!after_arrival.moving());

        advance_world(&store, &game_data(), 1000.0);
        assert_eq!(store.entity("m1"), Some(after_arrival));
    }

    #[test]
    fn own_character_advances_under_the_same_rules() {
        let store = WorldStore::new();
        let mut me = Entity::new();
        me.merge(
            &Entity::from_value(json!({
                "id": "me", "type": "character",
                "x": 0.0, "y": 0.0,
                "going_x": 30.0, "going_y": 0.0,
                "speed": 60.0, "moving": true
            }))
            .expect("object"),
        );
        store.update_character(&me);

        advance_world(&store, &game_data(), 250.0);

        store.with_character(|c| {
            assert!((c.x() - 15.0).abs() < 1.0);
            assert_eq!(c.num("ref_speed"), Some(60.0));
            assert!(c.moving());
        });

        advance_world(&store, &game_data(), 500.0);
        store.with_character(|c| {
            assert_eq!((c.x(), c.y()), (30.0, 0.0));
            assert!(!c.moving());
        });
    }
}
