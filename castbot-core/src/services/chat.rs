//! Handling of inbound chat lines.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, error};

use castbot_common::models::ChatUser;

use crate::Error;
use crate::platforms::ChatSink;
use crate::services::command_service::Invocation;
use crate::session::ChannelSession;

pub const COMMAND_PREFIX: char = '!';

/// Emits `chat.message` for the line, then dispatches it if it is a command.
/// Returns whether a command handled the line.
pub async fn handle_chat_message(
    session: &ChannelSession,
    sender: ChatUser,
    text: &str,
    reply_to: Arc<dyn ChatSink>,
) -> Result<bool, Error> {
    session.emit(
        "chat.message",
        json!({ "sender": sender, "message": text, "special": false }),
        None,
    );

    let line = text.trim();
    if !line.starts_with(COMMAND_PREFIX) {
        return Ok(false);
    }

    let Some(mut invocation) = Invocation::parse(line, sender, reply_to) else {
        return Ok(false);
    };
    invocation.command = invocation.command.to_lowercase();

    let command = invocation.command.clone();
    let arguments = invocation.arguments.clone();
    let who = invocation.sender.clone();

    match session.dispatch(invocation).await {
        Ok(true) => {
            session.emit(
                "chat.command",
                json!({ "command": command, "arguments": arguments, "sender": who }),
                None,
            );
            Ok(true)
        }
        Ok(false) => {
            debug!("[Chat] '{}' from {} matched no command", command, who.nickname);
            Ok(false)
        }
        Err(e) => {
            error!("[Chat] dispatch of '{}' failed: {}", command, e);
            Err(e)
        }
    }
}
