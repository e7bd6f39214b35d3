use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Notification priority level
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    Low,
    #[default]
    Medium,
    High,
}

impl NotificationPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationPriority::Low => "low",
            NotificationPriority::Medium => "medium",
            NotificationPriority::High => "high",
        }
    }
}

/// Scalar payload value attached to a notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

/// Core notification model, as served by the platform API and pushed over
/// the real-time connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Opaque, unique id
    pub id: String,

    #[serde(rename = "type")]
    pub notification_type: String,

    #[serde(default)]
    pub priority: NotificationPriority,

    #[serde(default)]
    pub read: bool,

    pub created_at: DateTime<Utc>,

    pub title: String,

    pub message: String,

    #[serde(default)]
    pub data: BTreeMap<String, Scalar>,
}

impl Notification {
    pub fn new(
        id: impl Into<String>,
        notification_type: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            notification_type: notification_type.into(),
            priority: NotificationPriority::default(),
            read: false,
            created_at: Utc::now(),
            title: title.into(),
            message: message.into(),
            data: BTreeMap::new(),
        }
    }

    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: Scalar) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn is_unread(&self) -> bool {
        !self.read
    }
}

/// Notification change pushed by the server
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationPush {
    Created(Notification),
    Updated(Notification),
    Deleted { id: String },
    /// Every notification was marked read elsewhere (another tab or device)
    AllRead,
    /// The server asked for the list to be fetched again
    Resync,
}

/// Receiver of pushed notification changes.
///
/// The multiplexer calls this synchronously from its read loop, so
/// implementations must not block.
pub trait NotificationSink: Send + Sync {
    fn apply_push(&self, push: NotificationPush);
}
