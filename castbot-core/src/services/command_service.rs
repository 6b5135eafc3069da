//! Chat command registry and dispatcher.
//!
//! Four command kinds are supported:
//! - `text`: replies with its content after placeholder substitution
//! - `alias`: rewrites the invocation into another command and dispatches it
//! - `module`: runs a [`CommandModule`] with an explicit [`CommandContext`]
//! - `addon`: runs once at registration and is not kept in the registry
//!
//! Several commands may share a name; every match runs.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use parking_lot::RwLock;
use serde_json::{json, Value};
use tracing::{debug, error, warn};

use castbot_common::models::{ChatUser, CommandType, StoredCommand};

use crate::Error;
use crate::platforms::ChatSink;
use crate::session::ChannelSession;
use crate::utils::{template, time};

/// Command names answered with the list of registered commands.
pub const LISTING_COMMANDS: [&str; 2] = ["commands", "comandos"];

/// Deepest alias chain followed before the dispatch is rejected as a loop.
pub const MAX_ALIAS_DEPTH: usize = 8;

/// A parsed command request.
#[derive(Clone)]
pub struct Invocation {
    pub command: String,
    pub arguments: Vec<String>,
    pub sender: ChatUser,
    pub reply_to: Arc<dyn ChatSink>,
}

impl Invocation {
    pub fn new(
        command: impl Into<String>,
        arguments: Vec<String>,
        sender: ChatUser,
        reply_to: Arc<dyn ChatSink>,
    ) -> Self {
        Self {
            command: command.into(),
            arguments,
            sender,
            reply_to,
        }
    }

    /// Splits `line` on whitespace into a command name (first `!` removed)
    /// and its arguments. Returns `None` for a blank line.
    pub fn parse(line: &str, sender: ChatUser, reply_to: Arc<dyn ChatSink>) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let command = parts.next()?.replacen('!', "", 1);
        if command.is_empty() {
            return None;
        }
        let arguments = parts.map(str::to_string).collect();
        Some(Self::new(command, arguments, sender, reply_to))
    }

    pub fn argument_line(&self) -> String {
        self.arguments.join(" ")
    }

    pub fn reply(&self, text: &str) -> Result<(), Error> {
        self.reply_to.send_message(text)
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("command", &self.command)
            .field("arguments", &self.arguments)
            .field("sender", &self.sender.nickname)
            .finish()
    }
}

/// What a command handler gets to work with.
#[derive(Clone)]
pub struct CommandContext {
    pub session: ChannelSession,
    pub command: CommandDefinition,
    pub outbound: Arc<dyn ChatSink>,
}

#[async_trait]
pub trait CommandModule: Send + Sync {
    async fn execute(&self, ctx: CommandContext, invocation: &Invocation) -> Result<(), Error>;
}

/// Registration-time extension of the session (listeners, background jobs).
pub trait Addon: Send + Sync {
    fn install(&self, ctx: CommandContext) -> Result<(), Error>;
}

pub trait EnterHook: Send + Sync {
    fn on_enter(&self, ctx: &CommandContext);
}

#[derive(Clone)]
pub enum CommandKind {
    Text(String),
    Alias(String),
    Module(Arc<dyn CommandModule>),
    Addon(Arc<dyn Addon>),
    /// A stored command whose type this build does not understand.
    Unsupported { kind: String, content: String },
}

impl CommandKind {
    pub fn type_name(&self) -> &str {
        match self {
            CommandKind::Text(_) => "text",
            CommandKind::Alias(_) => "alias",
            CommandKind::Module(_) => "module",
            CommandKind::Addon(_) => "addon",
            CommandKind::Unsupported { kind, .. } => kind,
        }
    }
}

impl fmt::Debug for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Text(c) => f.debug_tuple("Text").field(c).finish(),
            CommandKind::Alias(c) => f.debug_tuple("Alias").field(c).finish(),
            CommandKind::Module(_) => f.write_str("Module(..)"),
            CommandKind::Addon(_) => f.write_str("Addon(..)"),
            CommandKind::Unsupported { kind, .. } => f.debug_struct("Unsupported").field("kind", kind).finish(),
        }
    }
}

#[derive(Clone)]
pub struct CommandDefinition {
    pub id: Option<i64>,
    pub name: String,
    pub kind: CommandKind,
    pub active: bool,
    pub on_enter: Option<Arc<dyn EnterHook>>,
}

impl CommandDefinition {
    fn with_kind(name: impl Into<String>, kind: CommandKind) -> Self {
        Self {
            id: None,
            name: name.into(),
            kind,
            active: true,
            on_enter: None,
        }
    }

    pub fn text(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self::with_kind(name, CommandKind::Text(content.into()))
    }

    pub fn alias(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::with_kind(name, CommandKind::Alias(target.into()))
    }

    /// Names are matched as given. Chat lower-cases the command token, so a
    /// module reachable from chat needs a lower-case name.
    pub fn module(name: impl Into<String>, module: Arc<dyn CommandModule>) -> Self {
        Self::with_kind(name, CommandKind::Module(module))
    }

    pub fn addon(name: impl Into<String>, addon: Arc<dyn Addon>) -> Self {
        Self::with_kind(name, CommandKind::Addon(addon))
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_on_enter(mut self, hook: Arc<dyn EnterHook>) -> Self {
        self.on_enter = Some(hook);
        self
    }

    pub fn is_addon(&self) -> bool {
        matches!(self.kind, CommandKind::Addon(_))
    }
}

impl fmt::Debug for CommandDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("active", &self.active)
            .finish()
    }
}

impl From<StoredCommand> for CommandDefinition {
    fn from(stored: StoredCommand) -> Self {
        let kind = match stored.kind.parse::<CommandType>() {
            Ok(CommandType::Text) => CommandKind::Text(stored.content),
            Ok(CommandType::Alias) => CommandKind::Alias(stored.content),
            _ => CommandKind::Unsupported {
                kind: stored.kind,
                content: stored.content,
            },
        };
        Self {
            id: stored.id,
            name: stored.name,
            kind,
            active: stored.active,
            on_enter: None,
        }
    }
}

/// Ordered list of registered commands. Handlers are cloned out before they
/// run, so registration and removal never wait on a running command.
#[derive(Default)]
pub struct CommandRegistry {
    commands: RwLock<Vec<CommandDefinition>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.commands.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.read().is_empty()
    }

    fn push(&self, def: CommandDefinition) -> usize {
        let mut commands = self.commands.write();
        commands.push(def);
        commands.len()
    }

    pub fn find_all(&self, name: &str) -> Vec<CommandDefinition> {
        self.commands
            .read()
            .iter()
            .filter(|c| c.name == name)
            .cloned()
            .collect()
    }

    /// First command registered under `name`.
    pub fn get(&self, name: &str) -> Option<CommandDefinition> {
        self.commands.read().iter().find(|c| c.name == name).cloned()
    }

    /// Names of every non-addon command, in registration order.
    pub fn names(&self) -> Vec<String> {
        self.commands
            .read()
            .iter()
            .filter(|c| !c.is_addon())
            .map(|c| c.name.clone())
            .collect()
    }

    /// Removes every command stored with `id`; returns whether any was removed.
    pub fn remove(&self, id: i64) -> bool {
        let mut commands = self.commands.write();
        let before = commands.len();
        commands.retain(|c| c.id != Some(id));
        commands.len() != before
    }

    pub fn clear(&self) {
        self.commands.write().clear();
    }
}

#[derive(Default)]
pub struct CommandService {
    registry: CommandRegistry,
}

impl CommandService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Registers `def` and returns the registry size afterwards.
    pub fn register(&self, session: &ChannelSession, def: CommandDefinition) -> usize {
        if let Some(hook) = &def.on_enter {
            hook.on_enter(&session.command_context(def.clone()));
        }

        if let CommandKind::Addon(addon) = &def.kind {
            if let Err(e) = addon.install(session.command_context(def.clone())) {
                error!("[Commands] addon '{}' failed to install: {}", def.name, e);
            }
            return self.registry.len();
        }

        let stored = if matches!(def.kind, CommandKind::Text(_) | CommandKind::Alias(_)) {
            CommandDefinition {
                id: def.id,
                name: def.name.to_lowercase(),
                kind: def.kind,
                active: true,
                on_enter: None,
            }
        } else {
            def
        };

        debug!("[Commands] registered '{}' ({})", stored.name, stored.kind.type_name());
        self.registry.push(stored)
    }

    /// Runs every handler registered under the invocation's command name.
    /// Returns `Ok(false)` when nothing matched.
    pub async fn dispatch(&self, session: &ChannelSession, invocation: Invocation) -> Result<bool, Error> {
        self.dispatch_at_depth(session, invocation, 0).await
    }

    fn dispatch_at_depth<'a>(
        &'a self,
        session: &'a ChannelSession,
        invocation: Invocation,
        depth: usize,
    ) -> BoxFuture<'a, Result<bool, Error>> {
        Box::pin(async move {
            if LISTING_COMMANDS.contains(&invocation.command.as_str()) {
                let listing = self
                    .registry
                    .names()
                    .iter()
                    .map(|name| format!("!{}", name))
                    .collect::<Vec<_>>()
                    .join(", ");
                if let Err(e) = invocation.reply(&listing) {
                    warn!("[Commands] could not send command listing: {}", e);
                }
                return Ok(true);
            }

            let handlers = self.registry.find_all(&invocation.command);
            if handlers.is_empty() {
                debug!("[Commands] no command found matching '{}'", invocation.command);
                return Ok(false);
            }

            for handler in handlers {
                match &handler.kind {
                    CommandKind::Text(content) => {
                        let text = template::render(content, &text_variables(session, &invocation));
                        if let Err(e) = invocation.reply(&text) {
                            warn!("[Commands] reply for '{}' failed: {}", handler.name, e);
                        }
                    }
                    CommandKind::Alias(content) => {
                        if depth >= MAX_ALIAS_DEPTH {
                            error!("[Commands] alias loop detected at '{}'", invocation.command);
                            return Err(Error::AliasLoop(invocation.command.clone()));
                        }
                        let mut parts = content.split_whitespace().map(str::to_string);
                        let target = parts.next().unwrap_or_default().replacen('!', "", 1);
                        let mut arguments: Vec<String> = parts.collect();
                        arguments.extend(invocation.arguments.iter().cloned());

                        let next = Invocation::new(
                            target,
                            arguments,
                            invocation.sender.clone(),
                            invocation.reply_to.clone(),
                        );
                        self.dispatch_at_depth(session, next, depth + 1).await?;
                    }
                    CommandKind::Module(module) => {
                        let ctx = session.command_context(handler.clone());
                        if let Err(e) = module.execute(ctx, &invocation).await {
                            error!("[Commands] module '{}' failed: {}", handler.name, e);
                        }
                    }
                    other => {
                        error!(
                            "[Commands] unknown command type {} for command {}",
                            other.type_name(),
                            invocation.command
                        );
                    }
                }
            }

            Ok(true)
        })
    }
}

/// Placeholders available to text commands.
fn text_variables(session: &ChannelSession, invocation: &Invocation) -> Value {
    let stream = session.stream_state();
    let mut vars = json!({
        "sender": invocation.sender,
        "args": invocation.argument_line(),
        "channel": session.channel(),
        "viewers": stream.viewers,
        "views": stream.views,
        "title": stream.title,
        "uptime": time::uptime(stream.started),
        "lang": session.language().to_json(),
    });
    for (i, arg) in invocation.arguments.iter().enumerate() {
        vars[(i + 1).to_string()] = Value::String(arg.clone());
    }
    vars
}
