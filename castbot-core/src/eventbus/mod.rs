//! src/eventbus/mod.rs
//!
//! Fan-out of domain events to the dashboard (`streamer`) and overlay (`obs`)
//! endpoints. Every subscriber gets its own unbounded queue, so publishing
//! never waits on a slow consumer and can be done from synchronous code.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, watch};

/// Logical consumers of session events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Endpoint {
    /// Streamer dashboard.
    Streamer,
    /// Broadcast overlay.
    Obs,
}

impl Endpoint {
    pub const ALL: [Endpoint; 2] = [Endpoint::Streamer, Endpoint::Obs];

    pub fn as_str(&self) -> &'static str {
        match self {
            Endpoint::Streamer => "streamer",
            Endpoint::Obs => "obs",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed, named event derived from wire traffic or bot activity.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainEvent {
    pub event_type: String,
    pub payload: Value,
    pub targets: Vec<Endpoint>,
}

impl DomainEvent {
    /// Event addressed to every endpoint.
    pub fn new(event_type: impl Into<String>, payload: Value) -> Self {
        Self {
            event_type: event_type.into(),
            payload,
            targets: Endpoint::ALL.to_vec(),
        }
    }

    pub fn with_targets(mut self, targets: &[Endpoint]) -> Self {
        self.targets = targets.to_vec();
        self
    }
}

/// What a subscriber actually receives: the event plus the room (broadcaster
/// uin) and endpoint it was delivered to.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomEvent {
    pub room: i64,
    pub endpoint: Endpoint,
    pub event_type: String,
    pub payload: Value,
}

#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<(Endpoint, mpsc::UnboundedSender<RoomEvent>)>>>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    pub shutdown_rx: watch::Receiver<bool>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            subscribers: Arc::new(Mutex::new(vec![])),
            shutdown_tx: Arc::new(tx),
            shutdown_rx: rx,
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    /// Returns a receiver on which events addressed to `endpoint` are delivered.
    pub fn subscribe(&self, endpoint: Endpoint) -> mpsc::UnboundedReceiver<RoomEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push((endpoint, tx));
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Delivers `event` to every subscriber of its target endpoints.
    /// Subscribers whose receiver was dropped are pruned.
    pub fn publish(&self, room: i64, event: &DomainEvent) {
        let mut subs = self.subscribers.lock();
        subs.retain(|(endpoint, tx)| {
            if !event.targets.contains(endpoint) {
                return !tx.is_closed();
            }
            tx.send(RoomEvent {
                room,
                endpoint: *endpoint,
                event_type: event.event_type.clone(),
                payload: event.payload.clone(),
            })
            .is_ok()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_subscribers_receive_events_for_their_endpoint() {
        let bus = EventBus::new();

        let mut streamer = bus.subscribe(Endpoint::Streamer);
        let mut obs = bus.subscribe(Endpoint::Obs);

        bus.publish(42, &DomainEvent::new("stream.update", json!({"online": true})));

        let evt1 = streamer.recv().await.expect("streamer should get event");
        let evt2 = obs.recv().await.expect("obs should get event");
        assert_eq!(evt1.room, 42);
        assert_eq!(evt1.endpoint, Endpoint::Streamer);
        assert_eq!(evt2.endpoint, Endpoint::Obs);
        assert_eq!(evt2.event_type, "stream.update");
    }

    #[tokio::test]
    async fn test_targets_limit_delivery() {
        let bus = EventBus::new();
        let mut streamer = bus.subscribe(Endpoint::Streamer);
        let mut obs = bus.subscribe(Endpoint::Obs);

        let event = DomainEvent::new("chat.message", json!({})).with_targets(&[Endpoint::Obs]);
        bus.publish(1, &event);

        assert!(obs.try_recv().is_ok());
        assert!(streamer.try_recv().is_err());
    }

    #[test]
    fn test_dropped_subscribers_are_pruned() {
        let bus = EventBus::new();
        let rx = bus.subscribe(Endpoint::Obs);
        let _keep = bus.subscribe(Endpoint::Streamer);
        drop(rx);

        bus.publish(1, &DomainEvent::new("chat.join", json!({})));
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[test]
    fn test_shutdown_flag() {
        let bus = EventBus::new();
        assert!(!bus.is_shutdown());
        bus.shutdown();
        assert!(bus.is_shutdown());
    }
}
