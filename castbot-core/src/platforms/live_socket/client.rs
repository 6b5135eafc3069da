//! src/platforms/live_socket/client.rs

use std::fmt::Display;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, error, info, trace};

use crate::Error;
use crate::platforms::Transport;

use super::frames::{InboundFrame, OutboundFrame};

/// An open duplex link: decoded inbound frames on one side, outbound frames
/// on the other. Dropping the link stops its I/O tasks.
pub struct FrameLink {
    incoming: mpsc::UnboundedReceiver<InboundFrame>,
    outgoing: mpsc::UnboundedSender<OutboundFrame>,
    tasks: Vec<JoinHandle<()>>,
}

impl FrameLink {
    pub fn new(
        incoming: mpsc::UnboundedReceiver<InboundFrame>,
        outgoing: mpsc::UnboundedSender<OutboundFrame>,
    ) -> Self {
        Self {
            incoming,
            outgoing,
            tasks: Vec::new(),
        }
    }

    pub fn with_tasks(mut self, tasks: Vec<JoinHandle<()>>) -> Self {
        self.tasks = tasks;
        self
    }

    /// Next inbound frame, or `None` once the peer is gone.
    pub async fn recv(&mut self) -> Option<InboundFrame> {
        self.incoming.recv().await
    }

    pub fn sender(&self) -> mpsc::UnboundedSender<OutboundFrame> {
        self.outgoing.clone()
    }
}

impl Drop for FrameLink {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// WebSocket transport speaking JSON text frames.
#[derive(Debug, Clone, Default)]
pub struct WsTransport;

impl WsTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, url: &str) -> Result<FrameLink, Error> {
        let (ws, _) = connect_async(url).await?;
        let (write_half, read_half) = ws.split();

        let (tx_outgoing, rx_outgoing) = mpsc::unbounded_channel::<OutboundFrame>();
        let (tx_incoming, rx_incoming) = mpsc::unbounded_channel::<InboundFrame>();

        let write_task = tokio::spawn(writer_loop(write_half, rx_outgoing));
        let read_task = tokio::spawn(reader_loop(read_half, tx_incoming));

        Ok(FrameLink::new(rx_incoming, tx_outgoing).with_tasks(vec![read_task, write_task]))
    }
}

async fn reader_loop<R>(mut read_half: R, tx_incoming: mpsc::UnboundedSender<InboundFrame>)
where
    R: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(msg) = read_half.next().await {
        match msg {
            Ok(Message::Text(txt)) => {
                trace!("<< {}", txt.as_str());
                match InboundFrame::decode(txt.as_str()) {
                    Ok(frame) => {
                        if tx_incoming.send(frame).is_err() {
                            break;
                        }
                    }
                    Err(e) => debug!("[LiveSocket] skipping undecodable frame ({}): {}", e, txt.as_str()),
                }
            }
            Ok(Message::Close(frame)) => {
                info!("[LiveSocket] server closed the connection: {:?}", frame);
                break;
            }
            Ok(_) => {}
            Err(e) => {
                error!("[LiveSocket] read error => {:?}", e);
                break;
            }
        }
    }

    info!("[LiveSocket] reader_loop ended.");
}

async fn writer_loop<W>(mut write_half: W, mut rx_outgoing: mpsc::UnboundedReceiver<OutboundFrame>)
where
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    while let Some(frame) = rx_outgoing.recv().await {
        let text = match frame.encode() {
            Ok(t) => t,
            Err(e) => {
                error!("[LiveSocket] failed to encode {:?}: {}", frame, e);
                continue;
            }
        };
        debug!(">> {}", text);
        if let Err(e) = write_half.send(Message::Text(text.into())).await {
            error!("[LiveSocket] writer error => {}", e);
            break;
        }
    }

    info!("[LiveSocket] writer_loop ended.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frame_link_channels() {
        let (tx_in, rx_in) = mpsc::unbounded_channel();
        let (tx_out, mut rx_out) = mpsc::unbounded_channel();
        let mut link = FrameLink::new(rx_in, tx_out);

        tx_in
            .send(InboundFrame::Chat { sender: Default::default(), text: "hey".into() })
            .unwrap();
        drop(tx_in);

        assert!(matches!(link.recv().await, Some(InboundFrame::Chat { .. })));
        assert!(link.recv().await.is_none());

        link.sender().send(OutboundFrame::StudioConfig).unwrap();
        assert_eq!(rx_out.recv().await, Some(OutboundFrame::StudioConfig));
    }
}
