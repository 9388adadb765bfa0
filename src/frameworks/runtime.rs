// Framework bootstrap for the single-bot binary.

use crate::frameworks::config;
use crate::interface_adapters::clients::game_data::GameData;
use crate::use_cases::bot::Bot;
use crate::use_cases::types::BotEvents;
use serde_json::{Value, json};
use tracing::info;

pub fn init_runtime() {
    let _ = dotenvy::dotenv();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

/// Hooks for the bundled runner: greet on connect, log everything said to us.
struct ChatLogger;

impl BotEvents for ChatLogger {
    fn on_connect(&self, bot: &Bot) {
        info!(map = %bot.map(), x = bot.x(), y = bot.y(), "connected");
        bot.emit("say", json!({ "message": "hello" }));
    }

    fn on_disconnect(&self, _bot: &Bot, reason: &str) {
        info!(reason, "disconnected");
    }

    fn on_cm(&self, _bot: &Bot, from: &str, data: &Value) {
        info!(from, payload = %data, "code message");
    }

    fn on_pm(&self, _bot: &Bot, from: &str, message: &str) {
        info!(from, message, "private message");
    }

    fn on_chat(&self, _bot: &Bot, from: &str, message: &str) {
        info!(from, message, "chat");
    }

    fn on_party_invite(&self, _bot: &Bot, from: &str) {
        info!(from, "party invite");
    }

    fn on_party_request(&self, _bot: &Bot, from: &str) {
        info!(from, "party request");
    }
}

/// Runs one environment-configured bot until ctrl-c.
pub async fn run_from_env() -> std::io::Result<()> {
    init_runtime();

    let session = config::character_session().map_err(std::io::Error::other)?;

    let data = match config::game_data_url() {
        Some(url) => GameData::fetch(&url, config::game_data_timeout())
            .await
            .map_err(|e| std::io::Error::other(format!("failed to fetch game data: {e}")))?,
        None => GameData::empty(),
    };

    let bot = Bot::new(session, data, ChatLogger);
    bot.connect();

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    bot.stop();
    Ok(())
}
