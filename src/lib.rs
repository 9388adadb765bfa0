//! Headless client core for a real-time multiplayer game: a Socket.IO-over-
//! WebSocket protocol client, a concurrent world-state mirror, and a
//! fixed-step motion simulator behind a small bot facade.

pub mod domain;
pub mod frameworks;
pub mod interface_adapters;
pub mod use_cases;

pub use domain::entity::Entity;
pub use interface_adapters::clients::game_data::GameData;
pub use use_cases::bot::Bot;
pub use use_cases::types::{BotEvents, CharacterSession, HostMessage, NoopEvents};
