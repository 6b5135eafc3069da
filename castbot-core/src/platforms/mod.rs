// File: src/platforms/mod.rs

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Error;

pub mod live_socket;

use live_socket::client::FrameLink;

/// Logical identity of a platform connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Privileged control channel.
    Active,
    /// Chat/read channel.
    Passive,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Active => "active",
            Role::Passive => "passive",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting,
    /// Retries exhausted with nobody to take over.
    Failed,
    /// Retries exhausted; the passive connection now holds the active role.
    Handoff,
    /// Shut down by the session.
    Closed,
}

impl ConnectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ConnectionState::Failed | ConnectionState::Handoff | ConnectionState::Closed)
    }
}

/// Anything chat replies can be written to.
pub trait ChatSink: Send + Sync {
    fn send_message(&self, text: &str) -> Result<(), Error>;
}

/// Opens a duplex frame link to a platform endpoint.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn open(&self, url: &str) -> Result<FrameLink, Error>;
}
