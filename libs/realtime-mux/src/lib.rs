//! Real-time connection multiplexer
//!
//! One logical connection to the push endpoint, shared by every UI consumer.
//!
//! # Architecture
//!
//! ```text
//! consumers ──subscribe/unsubscribe──→ SubscriptionRegistry (refcounted)
//!                                            │ 0→1 / 1→0 only
//!                                            ↓
//!                     supervisor task ── TransportLink (WebSocket / channel)
//!                          │  ↑ reconnect with Backoff, replay registry
//!                          ↓
//!        notification frames → NotificationSink
//!        refresh frames      → RefreshBus
//! ```
//!
//! Transport failures never surface to callers. The supervisor retries
//! indefinitely, capped at the configured maximum delay, until
//! [`Multiplexer::disconnect`] is called.
//!
//! # Example
//!
//! ```rust,ignore
//! use realtime_mux::{Multiplexer, WsTransport};
//! use std::sync::Arc;
//!
//! let mux = Multiplexer::builder(Arc::new(WsTransport::new("ws://127.0.0.1:8080/ws")))
//!     .refresh_bus(bus.clone())
//!     .build();
//! mux.connect();
//! mux.subscribe_to_entity("course", "c1");
//! ```

pub mod backoff;
pub mod channel;
pub mod error;
pub mod frames;
pub mod multiplexer;
pub mod registry;
mod stats;
pub mod transport;
pub mod ws;

pub use backoff::{Backoff, ReconnectConfig};
pub use channel::{ChannelServer, ChannelTransport, ServerConnection};
pub use error::{Result, TransportError};
pub use frames::{ClientFrame, ControlFrame, NotificationEvent, NotificationFrame, RefreshFrame, ServerFrame};
pub use multiplexer::{ConnectionState, HeartbeatConfig, Multiplexer, MultiplexerBuilder, MuxConfig};
pub use registry::{RegistryChange, SubscriptionRegistry};
pub use stats::MuxStats;
pub use transport::{Transport, TransportLink};
pub use ws::WsTransport;
