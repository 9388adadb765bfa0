// Bindings from server events to world-store mutations and facade hooks.

use crate::domain::entity::{Entity, player_base};
use crate::domain::movement::velocity;
use crate::interface_adapters::dispatch::EventRouter;
use crate::use_cases::bot::Bot;
use regex::Regex;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{error, info, trace, warn};

/// Builds the event registry for one bot. Called once, before the socket
/// task starts; the returned router is shared read-only.
pub fn game_router(bot: Bot) -> EventRouter {
    let mut router = EventRouter::new();

    router.on_raw(|frame| trace!(frame, "socket frame"));

    register_loading(&mut router, &bot);
    register_world(&mut router, &bot);
    register_chat(&mut router, &bot);
    register_errors(&mut router, &bot);

    router
}

// -- loading ---------------------------------------------------------------

fn register_loading(router: &mut EventRouter, bot: &Bot) {
    {
        let bot = bot.clone();
        router.on("welcome", move |_| {
            bot.emit(
                "loaded",
                json!({ "success": 1, "width": 1920, "height": 1080, "scale": 2 }),
            );
            bot.login();
        });
    }

    {
        let bot = bot.clone();
        router.on("start", move |data| {
            let Some(snapshot) = data.get("entities") else {
                warn!("start event without entities; dropping");
                return;
            };
            stage_snapshot(&bot, snapshot, true);

            // The envelope minus `entities` is the own-character record.
            let Some(mut own) = Entity::from_value(data.clone()) else {
                warn!("start event is not an object; dropping");
                return;
            };
            own.remove("entities");
            own.set("base", player_base());
            bot.store().update_character(&own);

            info!(map = own.text("map").unwrap_or_default(), "started");
            bot.events().on_connect(&bot);
        });
    }

    {
        let bot = bot.clone();
        router.on("entities", move |data| {
            let replace = data.get("type").and_then(Value::as_str) == Some("all");
            stage_snapshot(&bot, data, replace);
        });
    }
}

// -- world updates ---------------------------------------------------------

fn register_world(router: &mut EventRouter, bot: &Bot) {
    for event in ["death", "disappear", "notthere"] {
        let bot = bot.clone();
        router.on(event, move |data| match data.get("id").and_then(Value::as_str) {
            Some(id) => bot.store().mark_dead(id),
            None => warn!(payload = %data, "disappearance without id; dropping"),
        });
    }

    {
        let bot = bot.clone();
        router.on("drop", move |data| {
            let (Some(id), Some(chest)) = (
                data.get("id").and_then(Value::as_str),
                Entity::from_value(data.clone()),
            ) else {
                warn!("drop without id; dropping");
                return;
            };
            bot.store().add_chest(id, chest);
        });
    }

    {
        let bot = bot.clone();
        router.on("chest_opened", move |data| {
            match data.get("id").and_then(Value::as_str) {
                Some(id) => bot.store().remove_chest(id),
                None => warn!("chest_opened without id; dropping"),
            }
        });
    }

    {
        let bot = bot.clone();
        router.on("player", move |data| {
            let Some(mut patch) = Entity::from_value(data.clone()) else {
                warn!("player event is not an object; dropping");
                return;
            };
            bot.store().with_character_mut(|character| {
                // A speed change mid-move invalidates the cached velocity;
                // restart extrapolation from the server's stated position.
                if patch.moving() {
                    let changed = match (patch.num("speed"), character.num("speed")) {
                        (Some(new), Some(old)) => new != old,
                        _ => false,
                    };
                    if changed {
                        if let (Some(x), Some(y)) = (patch.num("x"), patch.num("y")) {
                            patch.set_num("from_x", x);
                            patch.set_num("from_y", y);
                            let (vx, vy) = velocity(&patch);
                            patch.set_num("vx", vx);
                            patch.set_num("vy", vy);
                        }
                    }
                }
                character.merge(&patch);
            });
        });
    }

    {
        let bot = bot.clone();
        router.on("new_map", move |data| {
            match data.get("entities") {
                Some(snapshot) => stage_snapshot(&bot, snapshot, true),
                None => bot.store().stage_clear(),
            }

            let mut own = Entity::new();
            if let Some(name) = data.get("name").cloned() {
                own.set("map", name);
            }
            for key in ["x", "y", "m"] {
                if let Some(value) = data.get(key).cloned() {
                    own.set(key, value);
                }
            }
            own.set("moving", Value::Bool(false));
            bot.store().update_character(&own);
            let map_name = data.get("name").and_then(Value::as_str).unwrap_or_default();
            info!(map = map_name, "map changed");
        });
    }

    {
        let bot = bot.clone();
        router.on("correction", move |data| {
            let Some(patch) = Entity::from_value(data.clone()) else {
                warn!("correction is not an object; dropping");
                return;
            };
            bot.store().with_character_mut(|character| {
                warn!(
                    client_x = character.x(),
                    client_y = character.y(),
                    server_x = patch.x(),
                    server_y = patch.y(),
                    "position corrected"
                );
                character.merge(&patch);
            });
        });
    }

    {
        let bot = bot.clone();
        router.on("party_update", move |data| {
            bot.store()
                .set_party(data.get("party").cloned().unwrap_or(Value::Null));
        });
    }
}

// -- chat and party --------------------------------------------------------

fn register_chat(router: &mut EventRouter, bot: &Bot) {
    {
        let bot = bot.clone();
        router.on("cm", move |data| {
            let (Some(name), Some(message)) =
                (data.get("name").and_then(Value::as_str), data.get("message"))
            else {
                warn!("cm without name/message; dropping");
                return;
            };
            bot.events().on_cm(&bot, name, message);
        });
    }

    {
        let bot = bot.clone();
        router.on("pm", move |data| {
            let (Some(owner), Some(message)) = (
                data.get("owner").and_then(Value::as_str),
                data.get("message").and_then(Value::as_str),
            ) else {
                warn!("pm without owner/message; dropping");
                return;
            };
            bot.events().on_pm(&bot, owner, message);
        });
    }

    {
        let bot = bot.clone();
        router.on("chat_log", move |data| {
            let (Some(owner), Some(message)) = (
                data.get("owner").and_then(Value::as_str),
                data.get("message").and_then(Value::as_str),
            ) else {
                warn!("chat_log without owner/message; dropping");
                return;
            };
            bot.events().on_chat(&bot, owner, message);
        });
    }

    {
        let bot = bot.clone();
        router.on("invite", move |data| {
            match data.get("name").and_then(Value::as_str) {
                Some(name) => bot.events().on_party_invite(&bot, name),
                None => warn!("invite without name; dropping"),
            }
        });
    }

    {
        let bot = bot.clone();
        router.on("request", move |data| {
            match data.get("name").and_then(Value::as_str) {
                Some(name) => bot.events().on_party_request(&bot, name),
                None => warn!("request without name; dropping"),
            }
        });
    }
}

// -- server-side errors ----------------------------------------------------

fn register_errors(router: &mut EventRouter, bot: &Bot) {
    {
        let bot = bot.clone();
        let wait_pattern = Regex::new(r"wait (\d+) seconds").expect("wait pattern");
        router.on("game_error", move |data| {
            error!(payload = %data, "game error");
            let Some(text) = data.as_str() else {
                return;
            };
            let Some(seconds) = wait_pattern
                .captures(text)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse::<u64>().ok())
            else {
                return;
            };

            // One extra second so the retry lands after the server's window.
            let delay = Duration::from_secs(seconds + 1);
            info!(seconds = seconds + 1, "re-login scheduled");
            let bot = bot.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => bot.login(),
                    _ = bot.shutdown_signal() => {}
                }
            });
        });
    }

    for event in ["disconnect", "disconnect_reason"] {
        let bot = bot.clone();
        router.on(event, move |data| {
            error!(payload = %data, "server disconnect");
            let reason = data.as_str().unwrap_or("server disconnect");
            bot.events().on_disconnect(&bot, reason);
        });
    }
}

// -- snapshot ingestion ----------------------------------------------------

/// Normalizes and stages every player and monster record in a snapshot
/// envelope. `replace` clears the staged map first (full snapshots).
fn stage_snapshot(bot: &Bot, envelope: &Value, replace: bool) {
    let (Some(map), Some(instance)) = (
        envelope.get("map").and_then(Value::as_str),
        envelope.get("in").and_then(Value::as_str),
    ) else {
        warn!("entity snapshot without map/in; dropping");
        return;
    };

    let mut entries = Vec::new();

    if let Some(players) = envelope.get("players").and_then(Value::as_array) {
        for record in players {
            let Some(mut player) = Entity::from_value(record.clone()) else {
                continue;
            };
            player.sanitize();
            player.set("in", json!(instance));
            player.set("map", json!(map));
            player.set("type", json!("character"));
            player.set("base", player_base());

            let Some(id) = player.id().map(str::to_string) else {
                warn!("player record without id; dropping");
                continue;
            };
            if id == bot.session().character_name {
                bot.store().update_character(&player);
            }
            entries.push((id, player));
        }
    }

    if let Some(monsters) = envelope.get("monsters").and_then(Value::as_array) {
        for record in monsters {
            let Some(mut monster) = Entity::from_value(record.clone()) else {
                continue;
            };
            monster.sanitize();
            monster.set("in", json!(instance));
            monster.set("map", json!(map));

            // The species key arrives in `type`; our `type` is the entity class.
            if let Some(species) = monster.kind().map(str::to_string) {
                monster.set("mtype", json!(species));
            }
            monster.set("type", json!("monster"));

            if !monster.contains("max_hp") {
                if let Some(hp) = monster
                    .mtype()
                    .and_then(|species| bot.game_data().monster_hp(species))
                {
                    monster.set("max_hp", json!(hp));
                }
            }
            if !monster.contains("hp") {
                if let Some(max_hp) = monster.get("max_hp").cloned() {
                    monster.set("hp", max_hp);
                }
            }

            let Some(id) = monster.id().map(str::to_string) else {
                warn!("monster record without id; dropping");
                continue;
            };
            entries.push((id, monster));
        }
    }

    if replace {
        bot.store().stage_replace_all(entries);
    } else {
        bot.store().stage_batch(entries);
    }
}
