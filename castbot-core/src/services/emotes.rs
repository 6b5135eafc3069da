//! Reward behavior for gifts sent to the channel.

use async_trait::async_trait;
use tracing::{error, info};

use crate::Error;
use crate::services::classifier::EmotePayload;
use crate::session::ChannelSession;

#[async_trait]
pub trait EmoteBehavior: Send + Sync {
    async fn on_emote(&self, session: &ChannelSession, emote: EmotePayload) -> Result<(), Error>;
}

/// Announces every gift to the dashboard and overlay as `chat.emote`.
#[derive(Debug, Clone, Default)]
pub struct EmoteAnnouncer;

#[async_trait]
impl EmoteBehavior for EmoteAnnouncer {
    async fn on_emote(&self, session: &ChannelSession, emote: EmotePayload) -> Result<(), Error> {
        info!(
            "[Emotes] gift {} x{} ({} coins) on {}",
            emote.id,
            emote.amount,
            emote.cost,
            session.channel()
        );
        let payload = serde_json::to_value(&emote).map_err(|e| {
            error!("[Emotes] could not serialize emote {}: {}", emote.id, e);
            e
        })?;
        session.emit("chat.emote", payload, None);
        Ok(())
    }
}
