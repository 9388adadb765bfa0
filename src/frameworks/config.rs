use crate::use_cases::types::CharacterSession;
use std::{env, time::Duration};

// Runtime constants (not gameplay tuning).

/// Fixed simulation step: 60 Hz.
pub const TICK_INTERVAL: Duration = Duration::from_millis(1000 / 60);

/// Upper bound on one integration slice. Bounds per-step positional error
/// and guarantees stop-logic runs at least once per 50 ms of simulated time.
pub const SLICE_CAP_MS: f64 = 50.0;

/// Heartbeat window assumed until the server's OPEN frame declares one.
pub const DEFAULT_PING_INTERVAL_MS: u64 = 4000;

pub const OUTBOUND_CHANNEL_CAPACITY: usize = 256;

pub fn game_data_url() -> Option<String> {
    env::var("GAME_DATA_URL").ok()
}

pub fn game_data_timeout() -> Duration {
    let millis = env::var("GAME_DATA_TIMEOUT_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(5000);
    Duration::from_millis(millis)
}

/// Builds a session from the environment, or reports the first missing
/// variable.
pub fn character_session() -> Result<CharacterSession, String> {
    let required = |name: &str| {
        env::var(name).map_err(|_| format!("missing required environment variable {name}"))
    };

    Ok(CharacterSession {
        server_url: required("SERVER_URL")?,
        character_id: required("CHARACTER_ID")?,
        character_name: required("CHARACTER_NAME")?,
        user_id: required("USER_ID")?,
        auth_token: required("AUTH_TOKEN")?,
    })
}
