use async_trait::async_trait;

use crate::error::Error;
use crate::models::{ChannelConfig, LanguageRow, StoredCommand, TimerDefinition};

/// Read-only view of the persisted channel configuration.
#[async_trait]
pub trait ChannelStore: Send + Sync {
    async fn get_config(&self, channel: &str) -> Result<ChannelConfig, Error>;

    /// Channels flagged to start a session when the process boots.
    async fn list_auto_enter_channels(&self) -> Result<Vec<String>, Error>;

    /// Active commands only.
    async fn list_commands(&self, channel: &str) -> Result<Vec<StoredCommand>, Error>;

    async fn list_timers(&self, channel: &str) -> Result<Vec<TimerDefinition>, Error>;

    /// Every localized string, for every language.
    async fn list_language_rows(&self) -> Result<Vec<LanguageRow>, Error>;
}
