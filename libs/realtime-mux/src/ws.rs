//! WebSocket transport (JSON text frames)

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::frames::{ClientFrame, ServerFrame};
use crate::transport::{Transport, TransportLink};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Transport over a WebSocket endpoint such as `wss://campus.example/ws`
#[derive(Debug, Clone)]
pub struct WsTransport {
    url: String,
}

impl WsTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self) -> Result<Box<dyn TransportLink>> {
        let (stream, response) = connect_async(self.url.as_str()).await?;
        info!(url = %self.url, status = %response.status(), "WebSocket handshake complete");
        Ok(Box::new(WsLink { stream }))
    }

    fn endpoint(&self) -> String {
        self.url.clone()
    }
}

struct WsLink {
    stream: WsStream,
}

#[async_trait]
impl TransportLink for WsLink {
    async fn send(&mut self, frame: &ClientFrame) -> Result<()> {
        let payload = frame.to_json()?;
        self.stream.send(Message::Text(payload)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<ServerFrame>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => {
                    return Some(ServerFrame::from_json(&text).map_err(TransportError::from));
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "WebSocket closed by server");
                    return None;
                }
                // Ping/pong are answered by tungstenite; binary frames are not part of the protocol
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(error = %e, "WebSocket close handshake failed");
        }
    }
}
