//! Shared event vocabulary for the campus real-time sync layer
//!
//! Every component of the sync layer speaks in the types defined here:
//!
//! ```text
//! server push
//!     ↓
//! realtime-mux ──(NotificationPush)──→ NotificationSink (notification-store)
//!     │
//!     └──(RefreshRequest)──→ RefreshBus ──→ refresh-coordinator ──→ reload callbacks
//! ```
//!
//! The crate holds no behaviour beyond the refresh bus and the category
//! routing table, so the multiplexer stays a leaf and the coordinator and
//! store can be tested without a connection.

mod entity;
mod feedback;
mod notification;
mod refresh;

pub use entity::{EntityRef, ParseEntityError};
pub use feedback::{CollectingFeedback, FeedbackEntry, FeedbackLevel, FeedbackSurface, TracingFeedback};
pub use notification::{
    Notification, NotificationPriority, NotificationPush, NotificationSink, Scalar,
};
pub use refresh::{
    RefreshBus, RefreshCategory, RefreshOrigin, RefreshRequest, NOTIFICATION_CATEGORY,
};
