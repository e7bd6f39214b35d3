//! campus-sync
//!
//! Client-side real-time synchronization for the campus platform.
//!
//! ```text
//!                 ┌──────────────── SyncRuntime ────────────────┐
//!  server ──ws──→ │ Multiplexer ──push──→ NotificationStore      │ ──→ UI events
//!                 │      │                                       │
//!                 │      └─refresh─→ RefreshBus ─→ Coordinator   │ ──→ reload callbacks
//!                 │                                              │
//!                 │ SnapshotService (around forced reloads)      │
//!                 └──────────────────────────────────────────────┘
//! ```
//!
//! The component crates are re-exported so an application depends on this
//! crate alone.

pub mod config;
pub mod logging;
pub mod runtime;

pub use config::{LogFormat, SyncConfig};
pub use logging::init_tracing;
pub use runtime::{SyncRuntime, SyncRuntimeBuilder};

pub use notification_store;
pub use realtime_mux;
pub use refresh_coordinator;
pub use state_snapshot;
pub use sync_events;
