//! JSON-file channel store.
//!
//! Layout of the data directory:
//! - `channels.json`: array of channel configurations (required)
//! - `commands.json`: object mapping channel name to its stored commands
//! - `timers.json`: object mapping channel name to its timers
//! - `languages.json`: array of `{language, key, value}` rows
//!
//! Optional files that do not exist read as empty.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use castbot_common::models::{ChannelConfig, LanguageRow, StoredCommand, TimerDefinition};
use castbot_common::traits::repository_traits::ChannelStore;

use crate::Error;

pub const CHANNELS_FILE: &str = "channels.json";
pub const COMMANDS_FILE: &str = "commands.json";
pub const TIMERS_FILE: &str = "timers.json";
pub const LANGUAGES_FILE: &str = "languages.json";

#[derive(Debug, Clone)]
pub struct FileChannelStore {
    root: PathBuf,
}

impl FileChannelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn read_json<T: DeserializeOwned>(&self, file: &str) -> Result<Option<T>, Error> {
        let path = self.root.join(file);
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                debug!("[Store] read {}", path.display());
                Ok(Some(serde_json::from_slice(&bytes)?))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn channels(&self) -> Result<Vec<ChannelConfig>, Error> {
        self.read_json(CHANNELS_FILE)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{} in {}", CHANNELS_FILE, self.root.display())))
    }

    async fn per_channel<T: DeserializeOwned>(&self, file: &str, channel: &str) -> Result<Vec<T>, Error> {
        let mut all: HashMap<String, Vec<T>> = self.read_json(file).await?.unwrap_or_default();
        Ok(all.remove(channel).unwrap_or_default())
    }
}

#[async_trait]
impl ChannelStore for FileChannelStore {
    async fn get_config(&self, channel: &str) -> Result<ChannelConfig, Error> {
        self.channels()
            .await?
            .into_iter()
            .find(|c| c.channel == channel)
            .ok_or_else(|| Error::NotFound(format!("channel '{}'", channel)))
    }

    async fn list_auto_enter_channels(&self) -> Result<Vec<String>, Error> {
        Ok(self
            .channels()
            .await?
            .into_iter()
            .filter(|c| c.auto_enter)
            .map(|c| c.channel)
            .collect())
    }

    async fn list_commands(&self, channel: &str) -> Result<Vec<StoredCommand>, Error> {
        let commands: Vec<StoredCommand> = self.per_channel(COMMANDS_FILE, channel).await?;
        Ok(commands.into_iter().filter(|c| c.active).collect())
    }

    async fn list_timers(&self, channel: &str) -> Result<Vec<TimerDefinition>, Error> {
        self.per_channel(TIMERS_FILE, channel).await
    }

    async fn list_language_rows(&self) -> Result<Vec<LanguageRow>, Error> {
        Ok(self.read_json(LANGUAGES_FILE).await?.unwrap_or_default())
    }
}
