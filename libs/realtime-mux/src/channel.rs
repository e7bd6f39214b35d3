//! In-process transport.
//!
//! The client half plugs into a [`crate::Multiplexer`]; the server half hands
//! out one [`ServerConnection`] per accepted link. Used to embed the sync layer
//! next to an in-process event source and throughout the test suites.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::mpsc;

use crate::error::{Result, TransportError};
use crate::frames::{ClientFrame, ServerFrame};
use crate::transport::{Transport, TransportLink};

/// Client half
pub struct ChannelTransport {
    accept_tx: mpsc::UnboundedSender<ServerConnection>,
    refusals: AtomicU32,
}

/// Server half
pub struct ChannelServer {
    accept_rx: mpsc::UnboundedReceiver<ServerConnection>,
}

/// Server side of one accepted link. Dropping it closes the link.
pub struct ServerConnection {
    from_client: mpsc::UnboundedReceiver<ClientFrame>,
    to_client: mpsc::UnboundedSender<ServerFrame>,
}

impl ChannelTransport {
    pub fn pair() -> (ChannelTransport, ChannelServer) {
        let (accept_tx, accept_rx) = mpsc::unbounded_channel();
        (
            ChannelTransport {
                accept_tx,
                refusals: AtomicU32::new(0),
            },
            ChannelServer { accept_rx },
        )
    }

    /// Refuse the next `count` connect attempts
    pub fn refuse_next(&self, count: u32) {
        self.refusals.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn connect(&self) -> Result<Box<dyn TransportLink>> {
        let refused = self
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::Refused("refused by channel server".to_string()));
        }

        let (client_tx, from_client) = mpsc::unbounded_channel();
        let (to_client, server_rx) = mpsc::unbounded_channel();
        self.accept_tx
            .send(ServerConnection {
                from_client,
                to_client,
            })
            .map_err(|_| TransportError::Refused("channel server dropped".to_string()))?;

        Ok(Box::new(ChannelLink {
            to_server: client_tx,
            from_server: server_rx,
        }))
    }

    fn endpoint(&self) -> String {
        "channel://in-process".to_string()
    }
}

impl ChannelServer {
    /// Wait for the next link the client opens
    pub async fn accept(&mut self) -> Option<ServerConnection> {
        self.accept_rx.recv().await
    }

    pub fn try_accept(&mut self) -> Option<ServerConnection> {
        self.accept_rx.try_recv().ok()
    }
}

impl ServerConnection {
    /// Push a frame to the client. `false` once the client dropped the link.
    pub fn push(&self, frame: ServerFrame) -> bool {
        self.to_client.send(frame).is_ok()
    }

    /// Next frame sent by the client; `None` once the client closed the link
    pub async fn next_frame(&mut self) -> Option<ClientFrame> {
        self.from_client.recv().await
    }

    pub fn try_next_frame(&mut self) -> Option<ClientFrame> {
        self.from_client.try_recv().ok()
    }
}

struct ChannelLink {
    to_server: mpsc::UnboundedSender<ClientFrame>,
    from_server: mpsc::UnboundedReceiver<ServerFrame>,
}

#[async_trait]
impl TransportLink for ChannelLink {
    async fn send(&mut self, frame: &ClientFrame) -> Result<()> {
        self.to_server
            .send(frame.clone())
            .map_err(|_| TransportError::Closed)
    }

    async fn recv(&mut self) -> Option<Result<ServerFrame>> {
        self.from_server.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.from_server.close();
    }
}
