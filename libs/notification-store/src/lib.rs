//! Notification state store
//!
//! Keeps the notification list and unread count consistent under optimistic
//! local mutations, server confirmations and server pushes.
//!
//! ```text
//! UI action ──→ optimistic transition ──→ PendingMutation ──→ NotificationApi
//!                    │ broadcast                 │ ok: commit
//!                    ↓                           │ err: rollback + feedback
//!              NotificationSubscription ←────────┘
//!
//! realtime-mux ──(NotificationPush)──→ apply_push ──→ broadcast
//! ```

mod api;
mod error;
mod events;
mod http;
mod pending;
mod state;
mod store;

pub use api::{NotificationApi, NotificationFilter};
pub use error::{ApiError, Result, StoreError};
pub use events::{NotificationSubscription, StoreEvent};
pub use http::HttpNotificationApi;
pub use store::{NotificationStore, NotificationStoreBuilder};
