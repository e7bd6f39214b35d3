/// Wire frames exchanged with the real-time endpoint
use serde::{Deserialize, Serialize};
use sync_events::{EntityRef, Notification, NotificationPush};

/// Frames sent by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Start receiving pushes for one entity
    Subscribe {
        #[serde(rename = "entityType")]
        entity_type: String,
        #[serde(rename = "entityId")]
        entity_id: String,
    },

    /// Stop receiving pushes for one entity
    Unsubscribe {
        #[serde(rename = "entityType")]
        entity_type: String,
        #[serde(rename = "entityId")]
        entity_id: String,
    },

    /// Heartbeat
    Ping { timestamp: i64 },
}

impl ClientFrame {
    pub fn subscribe(entity: &EntityRef) -> Self {
        ClientFrame::Subscribe {
            entity_type: entity.entity_type.clone(),
            entity_id: entity.entity_id.clone(),
        }
    }

    pub fn unsubscribe(entity: &EntityRef) -> Self {
        ClientFrame::Unsubscribe {
            entity_type: entity.entity_type.clone(),
            entity_id: entity.entity_id.clone(),
        }
    }

    pub fn ping() -> Self {
        ClientFrame::Ping {
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Frames pushed by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Notification(NotificationFrame),
    Refresh(RefreshFrame),
    Control(ControlFrame),
}

impl ServerFrame {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Refresh frame for the given category and entities
    pub fn refresh(category: impl Into<String>, affected_entities: Vec<EntityRef>) -> Self {
        ServerFrame::Refresh(RefreshFrame {
            category: category.into(),
            affected_entities,
        })
    }

    pub fn notification_created(notification: Notification) -> Self {
        ServerFrame::Notification(NotificationFrame {
            notification_event: NotificationEvent::Created,
            notification: Some(notification),
            notification_id: None,
        })
    }

    pub fn notification_deleted(id: impl Into<String>) -> Self {
        ServerFrame::Notification(NotificationFrame {
            notification_event: NotificationEvent::Deleted,
            notification: None,
            notification_id: Some(id.into()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationEvent {
    Created,
    Updated,
    Deleted,
    AllRead,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFrame {
    pub notification_event: NotificationEvent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification: Option<Notification>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<String>,
}

impl NotificationFrame {
    /// Convert to a store push. `None` when the frame lacks the payload its
    /// event requires.
    pub fn into_push(self) -> Option<NotificationPush> {
        match self.notification_event {
            NotificationEvent::Created => self.notification.map(NotificationPush::Created),
            NotificationEvent::Updated => self.notification.map(NotificationPush::Updated),
            NotificationEvent::Deleted => self
                .notification_id
                .or_else(|| self.notification.map(|n| n.id))
                .map(|id| NotificationPush::Deleted { id }),
            NotificationEvent::AllRead => Some(NotificationPush::AllRead),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshFrame {
    pub category: String,
    #[serde(default)]
    pub affected_entities: Vec<EntityRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlFrame {
    Pong {
        #[serde(default)]
        timestamp: Option<i64>,
    },
    Ack {
        #[serde(default, rename = "messageId")]
        message_id: Option<String>,
    },
}
