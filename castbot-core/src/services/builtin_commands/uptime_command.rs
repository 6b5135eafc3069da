use async_trait::async_trait;

use crate::Error;
use crate::services::command_service::{CommandContext, CommandModule, Invocation};
use crate::utils::time;

/// Replies with how long the stream has been online.
pub struct UptimeCommand;

#[async_trait]
impl CommandModule for UptimeCommand {
    async fn execute(&self, ctx: CommandContext, invocation: &Invocation) -> Result<(), Error> {
        let stream = ctx.session.stream_state();
        let reply = if stream.online {
            format!("{} has been live for {}", ctx.session.channel(), time::uptime(stream.started))
        } else {
            format!("{} is offline", ctx.session.channel())
        };
        invocation.reply(&reply)
    }
}
