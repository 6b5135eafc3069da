//! Shared fakes for the session integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::Instant;

use castbot_core::alerts::NoopAlertService;
use castbot_core::auth::Authenticator;
use castbot_core::eventbus::EventBus;
use castbot_core::models::{ChannelConfig, ChannelInfo, ChatUser, ConnectionUrls, Credential, UserContext};
use castbot_core::platforms::Transport;
use castbot_core::platforms::live_socket::{FrameLink, InboundFrame, OutboundFrame};
use castbot_core::services::EmoteAnnouncer;
use castbot_core::{ChannelSession, Error, SessionServices};

pub const ACTIVE_URL: &str = "ws://active.test:1689/live";
pub const PASSIVE_URL: &str = "ws://passive.test:1690/live";
pub const ROOM: i64 = 4242;

/// Server side of an open in-memory link.
pub struct Peer {
    pub url: String,
    pub inbound: mpsc::UnboundedSender<InboundFrame>,
    pub outbound: mpsc::UnboundedReceiver<OutboundFrame>,
}

impl Peer {
    pub fn push(&self, frame: InboundFrame) {
        self.inbound.send(frame).expect("link is open");
    }

    pub async fn next_outbound(&mut self) -> OutboundFrame {
        tokio::time::timeout(Duration::from_secs(5), self.outbound.recv())
            .await
            .expect("outbound frame in time")
            .expect("link is open")
    }
}

/// Transport that only reaches hosts listed as reachable.
pub struct InMemoryTransport {
    reachable: Vec<String>,
    peers: Mutex<Vec<Peer>>,
    attempts: Mutex<Vec<(String, Instant)>>,
}

impl InMemoryTransport {
    pub fn new(reachable: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            reachable: reachable.iter().map(|h| h.to_string()).collect(),
            peers: Mutex::new(Vec::new()),
            attempts: Mutex::new(Vec::new()),
        })
    }

    pub fn attempts_to(&self, host: &str) -> Vec<(String, Instant)> {
        self.attempts
            .lock()
            .iter()
            .filter(|(url, _)| url.contains(host))
            .cloned()
            .collect()
    }

    /// Waits for the next link opened to `host` and hands over its server side.
    pub async fn take_peer(&self, host: &str) -> Peer {
        for _ in 0..1000 {
            {
                let mut peers = self.peers.lock();
                if let Some(pos) = peers.iter().position(|p| p.url.contains(host)) {
                    return peers.remove(pos);
                }
            }
            tokio::task::yield_now().await;
        }
        panic!("no link was opened to {}", host);
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn open(&self, url: &str) -> Result<FrameLink, Error> {
        self.attempts.lock().push((url.to_string(), Instant::now()));
        if !self.reachable.iter().any(|h| url.contains(h.as_str())) {
            return Err(Error::Platform(format!("{} unreachable", url)));
        }

        let (tx_in, rx_in) = mpsc::unbounded_channel();
        let (tx_out, rx_out) = mpsc::unbounded_channel();
        self.peers.lock().push(Peer {
            url: url.to_string(),
            inbound: tx_in,
            outbound: rx_out,
        });
        Ok(FrameLink::new(rx_in, tx_out))
    }
}

pub struct StaticAuthenticator;

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn login(&self, email: &str, password: &str) -> Result<Credential, Error> {
        if password != "pw" {
            return Err(Error::Auth(format!("bad credentials for {}", email)));
        }
        Ok(Credential { token: "token".into() })
    }

    async fn fetch_channel_info(&self, _credential: &Credential, _channel: &str) -> Result<ChannelInfo, Error> {
        Ok(ChannelInfo {
            connection_urls: ConnectionUrls {
                active: ACTIVE_URL.into(),
                passive: PASSIVE_URL.into(),
            },
            user: UserContext { uin: ROOM, nickname: "neko".into() },
            bot_member: ChatUser { id: 1, nickname: "castbot".into(), ..Default::default() },
        })
    }
}

pub fn config() -> ChannelConfig {
    ChannelConfig {
        channel: "neko".into(),
        email: "bot@example".into(),
        password: "pw".into(),
        language: "en".into(),
        ..Default::default()
    }
}

pub fn services(transport: Arc<InMemoryTransport>) -> SessionServices {
    SessionServices {
        authenticator: Arc::new(StaticAuthenticator),
        transport,
        alerts: Arc::new(NoopAlertService),
        emotes: Arc::new(EmoteAnnouncer),
    }
}

pub fn session(transport: Arc<InMemoryTransport>) -> ChannelSession {
    ChannelSession::new(config(), services(transport), EventBus::new())
}

pub fn viewer(nickname: &str) -> ChatUser {
    ChatUser { id: 7, nickname: nickname.into(), ..Default::default() }
}
