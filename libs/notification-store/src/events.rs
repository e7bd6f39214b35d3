//! Change events broadcast by the store

use std::sync::{Arc, Weak};
use sync_events::Notification;
use tokio::sync::mpsc;

use crate::store::Shared;

#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    /// The list was replaced with server truth
    NotificationsLoaded { count: usize },
    NotificationAdded(Notification),
    NotificationUpdated(Notification),
    NotificationDeleted { id: String },
    UnreadCountChanged { unread_count: usize },
    AllMarkedRead,
}

impl StoreEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            StoreEvent::NotificationsLoaded { .. } => "notifications_loaded",
            StoreEvent::NotificationAdded(_) => "notification_added",
            StoreEvent::NotificationUpdated(_) => "notification_updated",
            StoreEvent::NotificationDeleted { .. } => "notification_deleted",
            StoreEvent::UnreadCountChanged { .. } => "unread_count_changed",
            StoreEvent::AllMarkedRead => "all_marked_read",
        }
    }
}

/// Live registration of a store listener. Events arrive in mutation order;
/// dropping the subscription unregisters it.
pub struct NotificationSubscription {
    pub(crate) id: u64,
    pub(crate) events: mpsc::UnboundedReceiver<StoreEvent>,
    pub(crate) shared: Weak<Shared>,
}

impl NotificationSubscription {
    pub async fn recv(&mut self) -> Option<StoreEvent> {
        self.events.recv().await
    }

    pub fn try_recv(&mut self) -> Option<StoreEvent> {
        self.events.try_recv().ok()
    }

    /// Everything received so far, without waiting
    pub fn drain(&mut self) -> Vec<StoreEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

impl Drop for NotificationSubscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.state.lock().listeners.remove(&self.id);
        }
    }
}

pub(crate) fn subscription(shared: &Arc<Shared>) -> NotificationSubscription {
    let (tx, events) = mpsc::unbounded_channel();
    let mut state = shared.state.lock();
    state.next_listener += 1;
    let id = state.next_listener;
    state.listeners.insert(id, tx);
    NotificationSubscription {
        id,
        events,
        shared: Arc::downgrade(shared),
    }
}
