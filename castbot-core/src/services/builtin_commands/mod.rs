//! Module commands every session gets: `ping` and `uptime`.

pub mod ping_command;
pub mod uptime_command;

use std::sync::Arc;

use crate::services::command_service::CommandDefinition;
use crate::session::ChannelSession;

use ping_command::PingCommand;
use uptime_command::UptimeCommand;

pub fn builtin_commands() -> Vec<CommandDefinition> {
    vec![
        CommandDefinition::module("ping", Arc::new(PingCommand)),
        CommandDefinition::module("uptime", Arc::new(UptimeCommand)),
    ]
}

/// Registers the built-ins on `session`; returns the registry size afterwards.
pub fn register_builtin_commands(session: &ChannelSession) -> usize {
    builtin_commands()
        .into_iter()
        .fold(0, |_, def| session.register_command(def))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::command_service::Invocation;
    use crate::session::tests::{recording_sink, test_session};
    use castbot_common::models::ChatUser;

    #[tokio::test]
    async fn test_ping_replies_pong() {
        let session = test_session();
        assert_eq!(register_builtin_commands(&session), 2);

        let sink = recording_sink();
        let inv = Invocation::new("ping", vec![], ChatUser::default(), sink.clone());
        assert!(session.dispatch(inv).await.unwrap());
        assert_eq!(sink.messages(), vec!["pong"]);
    }

    #[tokio::test]
    async fn test_uptime_when_offline() {
        let session = test_session();
        register_builtin_commands(&session);

        let sink = recording_sink();
        let inv = Invocation::new("uptime", vec![], ChatUser::default(), sink.clone());
        session.dispatch(inv).await.unwrap();
        assert_eq!(sink.messages(), vec![format!("{} is offline", session.channel())]);
    }
}
