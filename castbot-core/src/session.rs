//! src/session.rs
//!
//! One live bot session per broadcast channel. The session owns the stream
//! state, the connections bound to each role, the command registry and the
//! timers, and fans domain events out through the [`EventBus`].

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use castbot_common::models::{
    ChannelConfig, ChannelInfo, ChatUser, GiftDefinition, LanguageRow, StreamState, TimerDefinition,
};
use castbot_common::traits::repository_traits::ChannelStore;

use crate::Error;
use crate::alerts::{Alert, AlertService};
use crate::auth::Authenticator;
use crate::eventbus::{DomainEvent, Endpoint, EventBus};
use crate::platforms::live_socket::{spawn_connection, FrameHandler, InboundFrame, ProtocolConnection};
use crate::platforms::{ChatSink, ConnectionState, Role, Transport};
use crate::services::chat;
use crate::services::classifier::{self, ClassifierContext};
use crate::services::command_service::{CommandContext, CommandDefinition, CommandService, Invocation};
use crate::services::emotes::EmoteBehavior;
use crate::services::language::LanguageTable;
use crate::tasks::timer_scheduler::{TimerInfo, TimerScheduler};

/// External collaborators a session talks to.
#[derive(Clone)]
pub struct SessionServices {
    pub authenticator: Arc<dyn Authenticator>,
    pub transport: Arc<dyn Transport>,
    pub alerts: Arc<dyn AlertService>,
    pub emotes: Arc<dyn EmoteBehavior>,
}

struct SessionInner {
    instance_id: Uuid,
    config: RwLock<ChannelConfig>,
    services: SessionServices,
    events: EventBus,
    info: RwLock<Option<ChannelInfo>>,
    language_rows: RwLock<Vec<LanguageRow>>,
    language: RwLock<LanguageTable>,
    stream: Mutex<StreamState>,
    connections: DashMap<Role, Arc<ProtocolConnection>>,
    commands: CommandService,
    timers: TimerScheduler,
}

/// Cheap-to-clone handle to a channel session.
#[derive(Clone)]
pub struct ChannelSession {
    inner: Arc<SessionInner>,
}

impl ChannelSession {
    pub fn new(config: ChannelConfig, services: SessionServices, events: EventBus) -> Self {
        let language = LanguageTable::for_language(&[], &config.language);
        Self {
            inner: Arc::new(SessionInner {
                instance_id: Uuid::new_v4(),
                config: RwLock::new(config),
                services,
                events,
                info: RwLock::new(None),
                language_rows: RwLock::new(Vec::new()),
                language: RwLock::new(language),
                stream: Mutex::new(StreamState::default()),
                connections: DashMap::new(),
                commands: CommandService::new(),
                timers: TimerScheduler::new(),
            }),
        }
    }

    /// Builds a session for `channel` from persisted configuration, with its
    /// stored commands and timers registered. Nothing is started.
    pub async fn from_store(
        store: &dyn ChannelStore,
        channel: &str,
        services: SessionServices,
        events: EventBus,
    ) -> Result<Self, Error> {
        let config = store.get_config(channel).await?;
        let session = Self::new(config, services, events);
        session.set_language_rows(store.list_language_rows().await?);

        for stored in store.list_commands(channel).await? {
            session.register_command(CommandDefinition::from(stored));
        }
        for timer in store.list_timers(channel).await? {
            session.register_timer(timer);
        }

        info!(
            "[Session] loaded {}: {} command(s), {} timer(s)",
            channel,
            session.inner.commands.registry().len(),
            session.inner.timers.len()
        );
        Ok(session)
    }

    fn from_inner(inner: Arc<SessionInner>) -> Self {
        Self { inner }
    }

    fn downgrade(&self) -> Weak<SessionInner> {
        Arc::downgrade(&self.inner)
    }

    /// A handle that does not keep the session alive.
    pub(crate) fn downgrade_handle(&self) -> WeakSession {
        WeakSession(self.downgrade())
    }

    pub fn instance_id(&self) -> Uuid {
        self.inner.instance_id
    }

    pub fn channel(&self) -> String {
        self.inner.config.read().channel.clone()
    }

    pub fn config(&self) -> ChannelConfig {
        self.inner.config.read().clone()
    }

    /// Overrides login credentials before `start`; `None` keeps the current value.
    pub fn set_credentials(&self, email: Option<String>, password: Option<String>) {
        let mut config = self.inner.config.write();
        if let Some(email) = email {
            config.email = email;
        }
        if let Some(password) = password {
            config.password = password;
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    pub fn channel_info(&self) -> Option<ChannelInfo> {
        self.inner.info.read().clone()
    }

    /// Room id events are addressed to; `None` until channel info is known.
    pub fn room(&self) -> Option<i64> {
        self.inner.info.read().as_ref().map(|i| i.user.uin)
    }

    /// Identity used for the bot's own invocations (timers).
    pub fn bot_sender(&self) -> ChatUser {
        self.inner
            .info
            .read()
            .as_ref()
            .map(|i| i.bot_member.clone())
            .unwrap_or_default()
    }

    pub fn stream_state(&self) -> StreamState {
        self.inner.stream.lock().clone()
    }

    pub fn gift_catalog(&self) -> Vec<GiftDefinition> {
        self.inner.config.read().gift_list.clone()
    }

    pub fn language(&self) -> LanguageTable {
        self.inner.language.read().clone()
    }

    /// Replaces the localized strings and rebuilds the table for the
    /// configured language.
    pub fn set_language_rows(&self, rows: Vec<LanguageRow>) {
        *self.inner.language_rows.write() = rows;
        self.rebuild_language();
    }

    fn rebuild_language(&self) {
        let language = self.inner.config.read().language.clone();
        let table = LanguageTable::for_language(&self.inner.language_rows.read(), &language);
        debug!("[Session] {} localized string(s) for '{}'", table.len(), language);
        *self.inner.language.write() = table;
    }

    /// Connection currently holding `role`. After a handoff both roles
    /// resolve to the same connection.
    pub fn connection(&self, role: Role) -> Option<Arc<ProtocolConnection>> {
        self.inner.connections.get(&role).map(|c| c.value().clone())
    }

    /// Outbound channel that always writes to whatever connection holds the
    /// passive role at send time.
    pub fn passive_sink(&self) -> Arc<dyn ChatSink> {
        Arc::new(RoleSink {
            session: self.downgrade(),
            role: Role::Passive,
        })
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Logs in, fetches channel metadata and opens the passive then the
    /// active connection. Authentication failures are returned as-is.
    pub async fn start(&self) -> Result<(), Error> {
        let (email, password, channel) = {
            let config = self.inner.config.read();
            (config.email.clone(), config.password.clone(), config.channel.clone())
        };

        let authenticator = self.inner.services.authenticator.clone();
        let credential = authenticator.login(&email, &password).await.map_err(|e| {
            error!("[Session] authentication error for {}: {}", email, e);
            e
        })?;
        let info = authenticator
            .fetch_channel_info(&credential, &channel)
            .await
            .map_err(|e| {
                error!("[Session] could not fetch channel info for {}: {}", channel, e);
                e
            })?;

        let urls = info.connection_urls.clone();
        *self.inner.info.write() = Some(info);
        self.rebuild_language();

        self.open_connection(Role::Passive, urls.passive);
        self.open_connection(Role::Active, urls.active);

        info!("[Session] {} started (instance {})", channel, self.inner.instance_id);
        Ok(())
    }

    fn open_connection(&self, role: Role, url: String) {
        let connection = Arc::new(ProtocolConnection::new(role, url));
        if let Some(previous) = self.inner.connections.insert(role, connection.clone()) {
            previous.close();
        }
        let handler = Arc::new(SessionFrameHandler {
            session: self.downgrade(),
        });
        spawn_connection(connection, self.inner.services.transport.clone(), handler);
    }

    /// Closes every connection and stops every timer. In-flight work is
    /// abandoned.
    pub fn end(&self) {
        let connections: Vec<Arc<ProtocolConnection>> = self
            .inner
            .connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.inner.connections.clear();
        for connection in connections {
            connection.close();
        }

        self.inner.timers.clear();
        self.inner.commands.registry().clear();
        info!("[Session] {} ended", self.channel());
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    /// Publishes an event to `targets` (both endpoints when `None`). Dropped
    /// silently while the session has no room yet.
    pub fn emit(&self, event_type: &str, payload: Value, targets: Option<&[Endpoint]>) {
        let mut event = DomainEvent::new(event_type, payload);
        if let Some(targets) = targets {
            event = event.with_targets(targets);
        }
        self.emit_event(&event);
    }

    pub fn emit_event(&self, event: &DomainEvent) {
        match self.room() {
            Some(room) => self.inner.events.publish(room, event),
            None => trace!("[Session] no room yet, dropping '{}'", event.event_type),
        }
    }

    fn send_alert(&self, alert: Alert) {
        let Some(token) = self.inner.config.read().alert_token.clone() else {
            debug!("[Session] no alert token configured, skipping {:?}", alert);
            return;
        };
        let alerts = self.inner.services.alerts.clone();
        tokio::spawn(async move {
            if let Err(e) = alerts.add_alert(&token, &alert).await {
                error!("[Session] alert for {} failed: {}", alert.name, e);
            }
        });
    }

    /// Classifies one platform data message and carries out what it produced.
    pub async fn process_data_message(&self, code: i64, sender: &ChatUser, payload: &Value) -> Result<(), Error> {
        let classification = {
            let config = self.inner.config.read();
            let language = self.inner.language.read();
            let mut stream = self.inner.stream.lock();
            let ctx = ClassifierContext {
                language: &language,
                gifts: &config.gift_list,
                can_reply: config.can_reply,
            };
            classifier::classify(code, sender, payload, &mut stream, &ctx)?
        };

        for event in &classification.events {
            self.emit_event(event);
        }
        if let Some(alert) = classification.alert {
            self.send_alert(alert);
        }
        if let Some(emote) = classification.emote {
            self.inner.services.emotes.on_emote(self, emote).await?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    pub fn command_context(&self, command: CommandDefinition) -> CommandContext {
        CommandContext {
            session: self.clone(),
            command,
            outbound: self.passive_sink(),
        }
    }

    /// Returns the registry size after registration.
    pub fn register_command(&self, def: CommandDefinition) -> usize {
        self.inner.commands.register(self, def)
    }

    pub fn remove_command(&self, id: i64) -> bool {
        self.inner.commands.registry().remove(id)
    }

    pub fn command(&self, name: &str) -> Option<CommandDefinition> {
        self.inner.commands.registry().get(name)
    }

    pub fn command_names(&self) -> Vec<String> {
        self.inner.commands.registry().names()
    }

    pub async fn dispatch(&self, invocation: Invocation) -> Result<bool, Error> {
        self.inner.commands.dispatch(self, invocation).await
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    pub fn register_timer(&self, def: TimerDefinition) -> usize {
        self.inner.timers.register(def)
    }

    pub fn start_timers(&self) -> usize {
        self.inner.timers.start_all(self)
    }

    pub fn start_timer(&self, index: usize) -> Result<(), Error> {
        self.inner.timers.start(self, index)
    }

    pub fn stop_timer(&self, index: usize) -> bool {
        self.inner.timers.stop(index)
    }

    pub fn stop_timers(&self) -> usize {
        self.inner.timers.stop_all()
    }

    pub fn timers(&self) -> Vec<TimerInfo> {
        self.inner.timers.snapshot()
    }

    // ------------------------------------------------------------------
    // Connection callbacks
    // ------------------------------------------------------------------

    fn replace_gift_catalog(&self, list: Vec<GiftDefinition>) {
        debug!("[Session] gift catalog replaced ({} entries)", list.len());
        self.inner.config.write().gift_list = list;
    }

    /// Retries are spent on `connection`: hand the active role over to a live
    /// passive connection if there is one, otherwise give up on it.
    fn on_connection_exhausted(&self, connection: &Arc<ProtocolConnection>) {
        let role = connection.role();

        if role == Role::Active {
            let target = self
                .connection(Role::Passive)
                .filter(|p| p.is_live() && !Arc::ptr_eq(p, connection));
            if let Some(passive) = target {
                connection.set_state(ConnectionState::Handoff);
                self.inner.connections.insert(Role::Active, passive.clone());
                warn!("[Session] active connection lost, passive connection takes over");
                if let Err(e) = passive.request_studio_config() {
                    warn!("[Session] could not request studio config after handoff: {}", e);
                }
                return;
            }
        }

        connection.set_state(ConnectionState::Failed);
        error!("[Session] {} connection failed, giving up on reconnecting", role);
    }
}

/// Non-owning session handle for background tasks such as timers.
#[derive(Clone)]
pub(crate) struct WeakSession(Weak<SessionInner>);

impl WeakSession {
    pub(crate) fn upgrade(&self) -> Option<ChannelSession> {
        self.0.upgrade().map(ChannelSession::from_inner)
    }
}

/// Connection callbacks hold only a weak reference, so a dropped session is
/// not kept alive by its own connection tasks.
struct SessionFrameHandler {
    session: Weak<SessionInner>,
}

impl SessionFrameHandler {
    fn session(&self) -> Option<ChannelSession> {
        self.session.upgrade().map(ChannelSession::from_inner)
    }
}

#[async_trait]
impl FrameHandler for SessionFrameHandler {
    async fn handle_frame(&self, connection: &Arc<ProtocolConnection>, frame: InboundFrame) {
        let Some(session) = self.session() else {
            return;
        };

        match frame {
            InboundFrame::GiftList { list } => session.replace_gift_catalog(list),
            InboundFrame::Chat { sender, text } => {
                let reply_to: Arc<dyn ChatSink> = connection.clone();
                if let Err(e) = chat::handle_chat_message(&session, sender, &text, reply_to).await {
                    debug!("[Session] chat line not handled: {}", e);
                }
            }
            InboundFrame::Data { code, sender, payload } => {
                if let Err(e) = session.process_data_message(code, &sender, &payload).await {
                    warn!("[Session] data message {} failed: {}", code, e);
                }
            }
        }
    }

    async fn connection_exhausted(&self, connection: &Arc<ProtocolConnection>) {
        match self.session() {
            Some(session) => session.on_connection_exhausted(connection),
            None => connection.set_state(ConnectionState::Failed),
        }
    }
}

struct RoleSink {
    session: Weak<SessionInner>,
    role: Role,
}

impl ChatSink for RoleSink {
    fn send_message(&self, text: &str) -> Result<(), Error> {
        let connection = self
            .session
            .upgrade()
            .and_then(|inner| inner.connections.get(&self.role).map(|c| c.value().clone()))
            .ok_or_else(|| Error::NotConnected(format!("no {} connection", self.role)))?;
        connection.send_message(text)
    }
}
