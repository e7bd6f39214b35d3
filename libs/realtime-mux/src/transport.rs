//! Transport abstraction underneath the multiplexer

use async_trait::async_trait;

use crate::error::Result;
use crate::frames::{ClientFrame, ServerFrame};

/// Opens links to the real-time endpoint. The multiplexer calls
/// [`Transport::connect`] once per (re)connect attempt.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn connect(&self) -> Result<Box<dyn TransportLink>>;

    /// Human-readable endpoint, for logs
    fn endpoint(&self) -> String;
}

/// One open link.
///
/// `recv` must be cancel safe: the multiplexer polls it inside
/// `tokio::select!` alongside outbound traffic and timers.
#[async_trait]
pub trait TransportLink: Send {
    async fn send(&mut self, frame: &ClientFrame) -> Result<()>;

    /// Next inbound frame; `None` once the peer closed the link
    async fn recv(&mut self) -> Option<Result<ServerFrame>>;

    /// Close the link gracefully
    async fn close(&mut self) {}
}
