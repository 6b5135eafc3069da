use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::user::{ChatUser, UserContext};

/// One entry of the platform's gift catalog. Display fields (name, animation,
/// picture, ...) are kept opaque and passed through to the overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GiftDefinition {
    pub id: i64,
    #[serde(default)]
    pub coins: i64,
    #[serde(flatten)]
    pub display: Map<String, Value>,
}

/// Per-channel bot configuration, owned by the storage collaborator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub channel: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default, rename = "giftList")]
    pub gift_list: Vec<GiftDefinition>,
    #[serde(default, rename = "streamLabsToken")]
    pub alert_token: Option<String>,
    #[serde(default, rename = "canReply")]
    pub can_reply: bool,
    #[serde(default, rename = "autoEnter")]
    pub auto_enter: bool,
}

fn default_language() -> String {
    "en".to_string()
}

/// A single localized string as stored for every supported language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageRow {
    pub language: String,
    pub key: String,
    pub value: String,
}

/// Opaque credential handed back by the platform login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionUrls {
    pub active: String,
    pub passive: String,
}

/// Channel metadata fetched after login.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelInfo {
    #[serde(rename = "ws")]
    pub connection_urls: ConnectionUrls,
    pub user: UserContext,
    /// Identity the bot uses for its own timer-driven invocations.
    #[serde(default, rename = "botMember")]
    pub bot_member: ChatUser,
}
