use async_trait::async_trait;

use crate::Error;
use crate::services::command_service::{CommandContext, CommandModule, Invocation};

pub struct PingCommand;

#[async_trait]
impl CommandModule for PingCommand {
    async fn execute(&self, _ctx: CommandContext, invocation: &Invocation) -> Result<(), Error> {
        invocation.reply("pong")
    }
}
