// Use-case level identities and extension points for the bot.

use crate::use_cases::bot::Bot;
use serde_json::Value;

/// Everything the host process supplies to run one character: where to
/// connect and which identity to authenticate as.
#[derive(Debug, Clone)]
pub struct CharacterSession {
    /// Game server URL. A bare host gets `wss://` prepended; explicit
    /// `ws://` and `wss://` URLs are used as-is.
    pub server_url: String,
    /// Server-side character id sent in the `auth` payload.
    pub character_id: String,
    /// Character display name; also the own-entity id in world snapshots.
    pub character_name: String,
    /// Account user id.
    pub user_id: String,
    /// Session auth token.
    pub auth_token: String,
}

/// An opaque message exchanged with the host process. The core never
/// interprets `payload`; it only routes on `command`.
#[derive(Debug, Clone)]
pub struct HostMessage {
    pub command: String,
    pub requester: String,
    pub target: String,
    pub payload: Value,
}

/// Extension hooks invoked by the protocol handlers. All methods default to
/// no-ops; implement the ones the bot cares about.
///
/// Hooks run on the network context, so they must stay short — schedule
/// longer work on the runtime instead of computing inline.
pub trait BotEvents: Send + Sync {
    /// The server accepted the character and sent the initial world snapshot.
    fn on_connect(&self, _bot: &Bot) {}

    /// The socket closed, or the server announced a disconnect.
    fn on_disconnect(&self, _bot: &Bot, _reason: &str) {}

    /// A code message from another character (or from the host process).
    fn on_cm(&self, _bot: &Bot, _from: &str, _data: &Value) {}

    /// A private message.
    fn on_pm(&self, _bot: &Bot, _from: &str, _message: &str) {}

    /// A public chat line.
    fn on_chat(&self, _bot: &Bot, _from: &str, _message: &str) {}

    fn on_party_invite(&self, _bot: &Bot, _from: &str) {}

    fn on_party_request(&self, _bot: &Bot, _from: &str) {}
}

/// The do-nothing hook set, for bots that only need the accessors.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEvents;

impl BotEvents for NoopEvents {}
