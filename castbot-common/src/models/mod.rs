// File: castbot-common/src/models/mod.rs
pub mod channel;
pub mod command;
pub mod stream;
pub mod timer;
pub mod user;

pub use channel::{ChannelConfig, ChannelInfo, ConnectionUrls, Credential, GiftDefinition, LanguageRow};
pub use command::{CommandType, StoredCommand};
pub use stream::StreamState;
pub use timer::TimerDefinition;
pub use user::{ChatUser, UserContext};
