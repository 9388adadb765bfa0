// Host-process bridge: inter-bot notices arrive as opaque messages instead
// of a raw callback ABI.

use crate::use_cases::bot::Bot;
use crate::use_cases::types::HostMessage;
use tracing::{error, warn};

/// Routes one message injected by the host process into the bot's hooks.
pub(crate) fn route_host_message(bot: &Bot, message: HostMessage) {
    match message.command.as_str() {
        "code_message" => {
            bot.events()
                .on_cm(bot, &message.requester, &message.payload);
        }
        "code_message_fail" => {
            error!(
                requester = %message.requester,
                service = %message.target,
                "code message delivery failed"
            );
        }
        other => {
            warn!(command = %other, "unknown host command; dropping");
        }
    }
}
