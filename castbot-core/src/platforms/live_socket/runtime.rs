//! src/platforms/live_socket/runtime.rs
//!
//! One supervised platform connection per role. A connection keeps retrying
//! on its own with a linearly growing delay, alternating between the two
//! service ports, and reports to its [`FrameHandler`] once retries are spent.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::Error;
use crate::platforms::{ChatSink, ConnectionState, Role, Transport};

use super::frames::{InboundFrame, OutboundFrame};

pub const ACTIVE_PORT: &str = "1689";
pub const PASSIVE_PORT: &str = "1690";
pub const MAX_RETRIES: u32 = 3;
pub const INITIAL_RECONNECT_DELAY_SECS: u64 = 1;

/// Swaps the active service port for the passive one and vice versa.
pub fn alternate_url(url: &str) -> String {
    if url.contains(ACTIVE_PORT) {
        url.replacen(ACTIVE_PORT, PASSIVE_PORT, 1)
    } else {
        url.replacen(PASSIVE_PORT, ACTIVE_PORT, 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectDecision {
    Retry { delay: Duration, url: String },
    Exhausted,
}

/// Receives everything a running connection produces.
#[async_trait]
pub trait FrameHandler: Send + Sync {
    /// Frames of one connection are delivered in arrival order; the next
    /// frame is not read until this returns.
    async fn handle_frame(&self, connection: &Arc<ProtocolConnection>, frame: InboundFrame);

    /// Called once when the connection has used up its retries.
    async fn connection_exhausted(&self, connection: &Arc<ProtocolConnection>);
}

#[derive(Debug)]
struct LinkState {
    url: String,
    retry_count: u32,
    reconnect_delay_secs: u64,
    state: ConnectionState,
}

pub struct ProtocolConnection {
    role: Role,
    link: Mutex<LinkState>,
    outgoing: Mutex<Option<mpsc::UnboundedSender<OutboundFrame>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ProtocolConnection {
    pub fn new(role: Role, url: impl Into<String>) -> Self {
        Self {
            role,
            link: Mutex::new(LinkState {
                url: url.into(),
                retry_count: 0,
                reconnect_delay_secs: INITIAL_RECONNECT_DELAY_SECS,
                state: ConnectionState::Connecting,
            }),
            outgoing: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    pub fn with_reconnect_delay(self, secs: u64) -> Self {
        self.link.lock().reconnect_delay_secs = secs;
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn url(&self) -> String {
        self.link.lock().url.clone()
    }

    pub fn retry_count(&self) -> u32 {
        self.link.lock().retry_count
    }

    pub fn reconnect_delay_secs(&self) -> u64 {
        self.link.lock().reconnect_delay_secs
    }

    pub fn state(&self) -> ConnectionState {
        self.link.lock().state
    }

    /// A live connection can still carry traffic or come back on its own.
    pub fn is_live(&self) -> bool {
        !self.state().is_terminal()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        let mut link = self.link.lock();
        debug!("[LiveSocket:{}] {:?} -> {:?}", self.role, link.state, state);
        link.state = state;
    }

    /// Applies the reconnection policy after a failed or lost link.
    pub fn on_failure(&self) -> ReconnectDecision {
        let mut link = self.link.lock();
        if link.retry_count >= MAX_RETRIES {
            return ReconnectDecision::Exhausted;
        }

        let delay = Duration::from_secs(link.reconnect_delay_secs);
        link.reconnect_delay_secs += 1;
        link.url = alternate_url(&link.url);
        link.retry_count += 1;
        link.state = ConnectionState::Reconnecting;

        ReconnectDecision::Retry {
            delay,
            url: link.url.clone(),
        }
    }

    fn on_connected(&self, outgoing: mpsc::UnboundedSender<OutboundFrame>) {
        {
            let mut link = self.link.lock();
            link.state = ConnectionState::Connected;
            link.retry_count = 0;
        }
        *self.outgoing.lock() = Some(outgoing);
    }

    fn on_link_lost(&self) {
        *self.outgoing.lock() = None;
    }

    pub fn send(&self, frame: OutboundFrame) -> Result<(), Error> {
        let outgoing = self.outgoing.lock();
        match outgoing.as_ref() {
            Some(tx) => tx
                .send(frame)
                .map_err(|_| Error::NotConnected(format!("{} link closed", self.role))),
            None => Err(Error::NotConnected(format!("no {} link", self.role))),
        }
    }

    pub fn request_studio_config(&self) -> Result<(), Error> {
        self.send(OutboundFrame::StudioConfig)
    }

    fn attach_task(&self, handle: JoinHandle<()>) {
        if let Some(old) = self.task.lock().replace(handle) {
            old.abort();
        }
    }

    /// Stops the connection immediately, without draining in-flight frames.
    pub fn close(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        self.on_link_lost();
        self.set_state(ConnectionState::Closed);
    }
}

impl ChatSink for ProtocolConnection {
    fn send_message(&self, text: &str) -> Result<(), Error> {
        self.send(OutboundFrame::Chat { text: text.to_string() })
    }
}

impl std::fmt::Debug for ProtocolConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolConnection")
            .field("role", &self.role)
            .field("link", &*self.link.lock())
            .finish()
    }
}

/// Starts the supervisor task for `connection`.
pub fn spawn_connection(
    connection: Arc<ProtocolConnection>,
    transport: Arc<dyn Transport>,
    handler: Arc<dyn FrameHandler>,
) {
    let conn = connection.clone();
    let handle = tokio::spawn(async move {
        run_connection(conn, transport, handler).await;
    });
    connection.attach_task(handle);
}

async fn run_connection(
    conn: Arc<ProtocolConnection>,
    transport: Arc<dyn Transport>,
    handler: Arc<dyn FrameHandler>,
) {
    let role = conn.role();

    loop {
        let url = conn.url();
        conn.set_state(ConnectionState::Connecting);
        info!("[LiveSocket:{}] connecting to {}", role, url);

        match transport.open(&url).await {
            Ok(mut link) => {
                conn.on_connected(link.sender());
                info!("[LiveSocket:{}] connected", role);

                while let Some(frame) = link.recv().await {
                    handler.handle_frame(&conn, frame).await;
                }

                conn.on_link_lost();
                warn!("[LiveSocket:{}] connection lost", role);
            }
            Err(e) => {
                error!("[LiveSocket:{}] connect error: {}", role, e);
            }
        }

        match conn.on_failure() {
            ReconnectDecision::Retry { delay, url } => {
                info!(
                    "[LiveSocket:{}] trying to reconnect in {} seconds to {}",
                    role,
                    delay.as_secs(),
                    url
                );
                sleep(delay).await;
            }
            ReconnectDecision::Exhausted => {
                handler.connection_exhausted(&conn).await;
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::MockTransport;
    use crate::platforms::live_socket::client::FrameLink;
    use tokio::time::Instant;

    #[derive(Default)]
    struct RecordingHandler {
        frames: Mutex<Vec<InboundFrame>>,
        exhausted: Mutex<Vec<Role>>,
    }

    #[async_trait]
    impl FrameHandler for RecordingHandler {
        async fn handle_frame(&self, _connection: &Arc<ProtocolConnection>, frame: InboundFrame) {
            self.frames.lock().push(frame);
        }

        async fn connection_exhausted(&self, connection: &Arc<ProtocolConnection>) {
            self.exhausted.lock().push(connection.role());
            connection.set_state(ConnectionState::Failed);
        }
    }

    #[test]
    fn test_alternate_url_toggles_ports() {
        assert_eq!(alternate_url("ws://live.example:1689/ws"), "ws://live.example:1690/ws");
        assert_eq!(alternate_url("ws://live.example:1690/ws"), "ws://live.example:1689/ws");
        assert_eq!(alternate_url("ws://live.example/ws"), "ws://live.example/ws");
    }

    #[test]
    fn test_policy_gives_linear_delays_then_exhausts() {
        let conn = ProtocolConnection::new(Role::Passive, "ws://h:1690");

        let mut delays = Vec::new();
        let mut urls = Vec::new();
        while let ReconnectDecision::Retry { delay, url } = conn.on_failure() {
            delays.push(delay.as_secs());
            urls.push(url);
        }

        assert_eq!(delays, vec![1, 2, 3]);
        assert_eq!(urls, vec!["ws://h:1689", "ws://h:1690", "ws://h:1689"]);
        assert_eq!(conn.retry_count(), MAX_RETRIES);
        assert_eq!(conn.on_failure(), ReconnectDecision::Exhausted);
    }

    #[test]
    fn test_policy_respects_initial_delay() {
        let conn = ProtocolConnection::new(Role::Active, "ws://h:1689").with_reconnect_delay(5);
        let ReconnectDecision::Retry { delay, .. } = conn.on_failure() else {
            panic!("expected a retry");
        };
        assert_eq!(delay, Duration::from_secs(5));
        assert_eq!(conn.reconnect_delay_secs(), 6);
    }

    #[test]
    fn test_send_without_link_fails() {
        let conn = ProtocolConnection::new(Role::Passive, "ws://h:1690");
        assert!(matches!(conn.send_message("hi"), Err(Error::NotConnected(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_connection_stops_after_three_retries() {
        let attempts = Arc::new(Mutex::new(Vec::<Instant>::new()));
        let seen = attempts.clone();

        let mut transport = MockTransport::new();
        transport.expect_open().times(4).returning(move |_| {
            seen.lock().push(Instant::now());
            Err(Error::Platform("connection refused".into()))
        });

        let handler = Arc::new(RecordingHandler::default());
        let conn = Arc::new(ProtocolConnection::new(Role::Passive, "ws://h:1690"));
        spawn_connection(conn.clone(), Arc::new(transport), handler.clone());

        sleep(Duration::from_secs(60)).await;

        assert_eq!(conn.state(), ConnectionState::Failed);
        assert_eq!(*handler.exhausted.lock(), vec![Role::Passive]);

        let attempts = attempts.lock();
        let gaps: Vec<u64> = attempts
            .windows(2)
            .map(|w| (w[1] - w[0]).as_secs())
            .collect();
        assert_eq!(gaps, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_connect_resets_retry_count() {
        let attempts = Arc::new(Mutex::new(Vec::<Instant>::new()));
        let seen = attempts.clone();

        let mut transport = MockTransport::new();
        transport.expect_open().times(5).returning(move |_| {
            let mut seen = seen.lock();
            seen.push(Instant::now());
            if seen.len() == 2 {
                // Connects, then the peer hangs up straight away.
                let (_, rx_in) = mpsc::unbounded_channel();
                let (tx_out, _) = mpsc::unbounded_channel();
                return Ok(FrameLink::new(rx_in, tx_out));
            }
            Err(Error::Platform("connection refused".into()))
        });

        let handler = Arc::new(RecordingHandler::default());
        let conn = Arc::new(ProtocolConnection::new(Role::Passive, "ws://h:1690"));
        spawn_connection(conn.clone(), Arc::new(transport), handler.clone());

        sleep(Duration::from_secs(60)).await;

        assert_eq!(conn.state(), ConnectionState::Failed);
        assert_eq!(*handler.exhausted.lock(), vec![Role::Passive]);

        let attempts = attempts.lock();
        let gaps: Vec<u64> = attempts
            .windows(2)
            .map(|w| (w[1] - w[0]).as_secs())
            .collect();
        assert_eq!(gaps, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_frames_are_forwarded_in_order() {
        let (tx_in, rx_in) = mpsc::unbounded_channel();
        let (tx_out, _rx_out) = mpsc::unbounded_channel();
        let link = Mutex::new(Some(FrameLink::new(rx_in, tx_out)));

        for i in 0..3 {
            tx_in
                .send(InboundFrame::Data { code: i, sender: Default::default(), payload: Default::default() })
                .unwrap();
        }

        let mut transport = MockTransport::new();
        transport
            .expect_open()
            .returning(move |_| link.lock().take().ok_or_else(|| Error::Platform("gone".into())));

        let handler = Arc::new(RecordingHandler::default());
        let conn = Arc::new(ProtocolConnection::new(Role::Passive, "ws://h:1690"));
        spawn_connection(conn.clone(), Arc::new(transport), handler.clone());

        for _ in 0..50 {
            if handler.frames.lock().len() == 3 {
                break;
            }
            tokio::task::yield_now().await;
        }

        let codes: Vec<i64> = handler
            .frames
            .lock()
            .iter()
            .filter_map(|f| match f {
                InboundFrame::Data { code, .. } => Some(*code),
                _ => None,
            })
            .collect();
        assert_eq!(codes, vec![0, 1, 2]);
        assert!(conn.is_connected());
        assert!(conn.send_message("hello").is_ok());

        conn.close();
        assert_eq!(conn.state(), ConnectionState::Closed);
        drop(tx_in);
    }
}
