//! Backend contract of the store

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sync_events::{Notification, NotificationPriority};

use crate::error::ApiError;

/// Query for [`NotificationApi::fetch`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationFilter {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unread_only: bool,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub notification_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<NotificationPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl NotificationFilter {
    pub fn unread() -> Self {
        Self {
            unread_only: true,
            ..Self::default()
        }
    }

    pub fn with_type(mut self, notification_type: impl Into<String>) -> Self {
        self.notification_type = Some(notification_type.into());
        self
    }

    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Server side of the notification model
#[async_trait]
pub trait NotificationApi: Send + Sync {
    async fn fetch(&self, filter: &NotificationFilter) -> Result<Vec<Notification>, ApiError>;

    async fn mark_read(&self, id: &str) -> Result<(), ApiError>;

    async fn mark_all_read(&self) -> Result<(), ApiError>;

    async fn delete(&self, ids: &[String]) -> Result<(), ApiError>;
}
