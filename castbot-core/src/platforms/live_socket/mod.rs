pub mod client;
pub mod frames;
pub mod runtime;

pub use client::{FrameLink, WsTransport};
pub use frames::{InboundFrame, OutboundFrame};
pub use runtime::{
    alternate_url, spawn_connection, FrameHandler, ProtocolConnection, ReconnectDecision,
    ACTIVE_PORT, INITIAL_RECONNECT_DELAY_SECS, MAX_RETRIES, PASSIVE_PORT,
};
