use serde::{Deserialize, Serialize};

/// Identity attached to inbound chat and data frames.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatUser {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub nickname: String,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
}

/// The broadcaster account a session is bound to. Emitted events are
/// addressed to the room named by `uin`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserContext {
    pub uin: i64,
    #[serde(default)]
    pub nickname: String,
}
