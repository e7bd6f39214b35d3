//! Error types for the real-time transport

use std::time::Duration;
use thiserror::Error;

/// Transport errors. None of these reach the UI: the multiplexer recovers
/// from them by reconnecting.
#[derive(Error, Debug)]
pub enum TransportError {
    /// WebSocket handshake or I/O error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Frame serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The transport refused to open a link
    #[error("Connection refused: {0}")]
    Refused(String),

    /// The peer closed the link
    #[error("Connection closed")]
    Closed,

    /// No inbound traffic within the heartbeat timeout
    #[error("Heartbeat timeout after {0:?}")]
    HeartbeatTimeout(Duration),
}

impl TransportError {
    /// Whether the link survives this error. A malformed frame is dropped,
    /// everything else tears the link down.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TransportError::Serialization(_))
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
