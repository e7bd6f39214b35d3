/// Notification state store
///
/// Authoritative client-side cache of the user's notifications:
/// - `fetch` replaces the list with server truth
/// - mark/delete mutate optimistically, then confirm with the backend and
///   roll back on failure
/// - server pushes are applied as they arrive
///
/// `unread_count` equals the number of unread entries after every settled
/// transition.
use parking_lot::Mutex;
use std::sync::Arc;
use sync_events::{
    FeedbackLevel, FeedbackSurface, Notification, NotificationPush, NotificationSink,
    TracingFeedback,
};
use tracing::{debug, error, info, warn};

use crate::api::{NotificationApi, NotificationFilter};
use crate::error::{ApiError, Result, StoreError};
use crate::events::{subscription, NotificationSubscription};
use crate::pending::PendingMutation;
use crate::state::{MutationId, StoreState};

pub(crate) struct Shared {
    pub(crate) api: Arc<dyn NotificationApi>,
    pub(crate) state: Mutex<StoreState>,
    pub(crate) feedback: Arc<dyn FeedbackSurface>,
}

pub struct NotificationStoreBuilder {
    api: Arc<dyn NotificationApi>,
    feedback: Option<Arc<dyn FeedbackSurface>>,
}

impl NotificationStoreBuilder {
    /// Where rolled-back mutations are reported
    pub fn feedback(mut self, feedback: Arc<dyn FeedbackSurface>) -> Self {
        self.feedback = Some(feedback);
        self
    }

    pub fn build(self) -> NotificationStore {
        NotificationStore {
            shared: Arc::new(Shared {
                api: self.api,
                state: Mutex::new(StoreState::default()),
                feedback: self.feedback.unwrap_or_else(|| Arc::new(TracingFeedback)),
            }),
        }
    }
}

#[derive(Clone)]
pub struct NotificationStore {
    shared: Arc<Shared>,
}

impl NotificationStore {
    pub fn builder(api: Arc<dyn NotificationApi>) -> NotificationStoreBuilder {
        NotificationStoreBuilder {
            api,
            feedback: None,
        }
    }

    pub fn new(api: Arc<dyn NotificationApi>) -> Self {
        Self::builder(api).build()
    }

    /// Replace the list with the server's view for `filter`. Returns the
    /// number of notifications loaded.
    pub async fn fetch(&self, filter: NotificationFilter) -> Result<usize> {
        match self.shared.api.fetch(&filter).await {
            Ok(notifications) => {
                let count = notifications.len();
                self.shared.state.lock().load(notifications, filter);
                info!(count, "Notifications loaded");
                Ok(count)
            }
            Err(e) => {
                self.surface_failure("Could not load notifications", &e);
                Err(e.into())
            }
        }
    }

    /// Fetch again with the filter of the last successful fetch
    pub async fn refetch(&self) -> Result<usize> {
        let filter = self.shared.state.lock().last_filter.clone();
        self.fetch(filter).await
    }

    /// Mark one notification read. A notification whose read state the
    /// server already confirmed succeeds without a round trip; one that is
    /// only read optimistically gets its own confirmation.
    pub async fn mark_as_read(&self, id: &str) -> Result<()> {
        let mutation = self.shared.state.lock().mark_read(id)?;
        let Some(mutation) = mutation else {
            debug!(notification_id = %id, "Notification already read");
            return Ok(());
        };

        let pending = self.begin(mutation);
        let confirmation = self.shared.api.mark_read(id).await;
        self.settle(pending, confirmation, "Could not mark notification as read")
    }

    /// Mark every notification read. Returns how many were unread.
    pub async fn mark_all_as_read(&self) -> Result<usize> {
        let started = self.shared.state.lock().mark_all_read();
        let Some((mutation, marked)) = started else {
            return Ok(0);
        };

        let pending = self.begin(mutation);
        let confirmation = self.shared.api.mark_all_read().await;
        self.settle(pending, confirmation, "Could not mark notifications as read")?;
        Ok(marked)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let started = self.shared.state.lock().remove(&[id.to_string()]);
        let (mutation, _) = started.ok_or_else(|| StoreError::NotFound(id.to_string()))?;

        let pending = self.begin(mutation);
        let confirmation = self.shared.api.delete(&[id.to_string()]).await;
        self.settle(pending, confirmation, "Could not delete notification")
    }

    /// Delete every listed notification in one round trip. Unknown ids are
    /// skipped; returns how many were removed.
    pub async fn delete_many(&self, ids: &[String]) -> Result<usize> {
        let started = self.shared.state.lock().remove(ids);
        let Some((mutation, removed)) = started else {
            return Ok(0);
        };

        let pending = self.begin(mutation);
        let confirmation = self.shared.api.delete(&removed).await;
        self.settle(pending, confirmation, "Could not delete notifications")?;
        Ok(removed.len())
    }

    /// Listen to store changes until the subscription is dropped
    pub fn subscribe(&self) -> NotificationSubscription {
        subscription(&self.shared)
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.shared.state.lock().notifications.clone()
    }

    pub fn unread_count(&self) -> usize {
        self.shared.state.lock().unread_count
    }

    pub fn get(&self, id: &str) -> Option<Notification> {
        self.shared
            .state
            .lock()
            .notifications
            .iter()
            .find(|n| n.id == id)
            .cloned()
    }

    pub fn last_filter(&self) -> NotificationFilter {
        self.shared.state.lock().last_filter.clone()
    }

    pub fn listener_count(&self) -> usize {
        self.shared.state.lock().listeners.len()
    }

    /// Mutations sent to the backend and not yet answered
    pub fn in_flight(&self) -> usize {
        self.shared.state.lock().in_flight()
    }

    fn begin(&self, mutation: MutationId) -> PendingMutation {
        PendingMutation::new(Arc::clone(&self.shared), mutation)
    }

    fn settle(
        &self,
        pending: PendingMutation,
        confirmation: std::result::Result<(), ApiError>,
        failure_title: &str,
    ) -> Result<()> {
        match confirmation {
            Ok(()) => {
                pending.commit();
                Ok(())
            }
            Err(e) => {
                pending.rollback();
                self.surface_failure(failure_title, &e);
                Err(e.into())
            }
        }
    }

    fn surface_failure(&self, title: &str, e: &ApiError) {
        error!(error = %e, "{}", title);
        self.shared
            .feedback
            .notify(FeedbackLevel::Error, title, &e.to_string());
    }
}

impl NotificationSink for NotificationStore {
    fn apply_push(&self, push: NotificationPush) {
        if matches!(push, NotificationPush::Resync) {
            let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                warn!("Notification resync requested outside a runtime, ignored");
                return;
            };
            let store = self.clone();
            runtime.spawn(async move {
                if let Err(e) = store.refetch().await {
                    warn!(error = %e, "Notification resync failed");
                }
            });
            return;
        }

        self.shared.state.lock().apply_push(push);
    }
}
