pub mod builtin_commands;
pub mod chat;
pub mod classifier;
pub mod command_service;
pub mod emotes;
pub mod language;

pub use command_service::{
    Addon, CommandContext, CommandDefinition, CommandKind, CommandModule, CommandRegistry, CommandService,
    EnterHook, Invocation,
};
pub use emotes::{EmoteAnnouncer, EmoteBehavior};
pub use language::LanguageTable;
