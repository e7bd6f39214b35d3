//! Notification store behaviour against mocked and gated backends

use async_trait::async_trait;
use mockall::mock;
use notification_store::{
    ApiError, NotificationApi, NotificationFilter, NotificationStore, StoreError, StoreEvent,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use sync_events::{
    CollectingFeedback, FeedbackLevel, Notification, NotificationPriority, NotificationPush,
    NotificationSink,
};
use tokio::sync::Semaphore;

mock! {
    pub Api {}

    #[async_trait]
    impl NotificationApi for Api {
        async fn fetch(&self, filter: &NotificationFilter) -> Result<Vec<Notification>, ApiError>;
        async fn mark_read(&self, id: &str) -> Result<(), ApiError>;
        async fn mark_all_read(&self) -> Result<(), ApiError>;
        async fn delete(&self, ids: &[String]) -> Result<(), ApiError>;
    }
}

fn note(id: &str, read: bool) -> Notification {
    let mut notification =
        Notification::new(id, "session_reminder", "Session soon", "Starts in 15 minutes")
            .with_read(read);
    notification.created_at = "2026-04-02T08:30:00Z".parse().unwrap();
    notification
}

fn server_error() -> ApiError {
    ApiError::Status {
        status: 500,
        body: "boom".to_string(),
    }
}

fn seeded(mut api: MockApi, items: Vec<Notification>) -> MockApi {
    api.expect_fetch()
        .times(1)
        .returning(move |_| Ok(items.clone()));
    api
}

async fn loaded_store(api: MockApi) -> (NotificationStore, Arc<CollectingFeedback>) {
    let feedback = Arc::new(CollectingFeedback::new());
    let store = NotificationStore::builder(Arc::new(api))
        .feedback(feedback.clone())
        .build();
    store.fetch(NotificationFilter::default()).await.unwrap();
    (store, feedback)
}

fn assert_unread_invariant(store: &NotificationStore) {
    let unread = store.notifications().iter().filter(|n| !n.read).count();
    assert_eq!(store.unread_count(), unread);
}

#[tokio::test]
async fn test_fetch_replaces_list_and_broadcasts() {
    let api = seeded(MockApi::new(), vec![note("a", false), note("b", true)]);
    let store = NotificationStore::new(Arc::new(api));
    let mut events = store.subscribe();

    let count = store
        .fetch(NotificationFilter::default().with_priority(NotificationPriority::High))
        .await
        .unwrap();

    assert_eq!(count, 2);
    assert_eq!(store.unread_count(), 1);
    assert_eq!(store.last_filter().priority, Some(NotificationPriority::High));
    assert_eq!(
        events.drain(),
        vec![
            StoreEvent::NotificationsLoaded { count: 2 },
            StoreEvent::UnreadCountChanged { unread_count: 1 },
        ]
    );
}

#[tokio::test]
async fn test_failed_fetch_keeps_list() {
    let mut api = seeded(MockApi::new(), vec![note("a", false)]);
    api.expect_fetch().returning(|_| Err(server_error()));
    let (store, feedback) = loaded_store(api).await;

    let result = store.fetch(NotificationFilter::unread()).await;

    assert!(matches!(result, Err(StoreError::Api(ApiError::Status { status: 500, .. }))));
    assert_eq!(store.notifications().len(), 1);
    assert_eq!(store.last_filter(), NotificationFilter::default());
    assert_eq!(feedback.count(FeedbackLevel::Error), 1);
}

#[tokio::test]
async fn test_mark_as_read_confirms() {
    let mut api = seeded(MockApi::new(), vec![note("a", false), note("b", false)]);
    api.expect_mark_read()
        .withf(|id| id == "a")
        .times(1)
        .returning(|_| Ok(()));
    let (store, feedback) = loaded_store(api).await;
    let mut events = store.subscribe();

    store.mark_as_read("a").await.unwrap();

    assert!(store.get("a").unwrap().read);
    assert_eq!(store.unread_count(), 1);
    assert_unread_invariant(&store);
    let kinds: Vec<&str> = events.drain().iter().map(StoreEvent::kind).collect();
    assert_eq!(kinds, vec!["notification_updated", "unread_count_changed"]);
    assert!(feedback.entries().is_empty());
}

#[tokio::test]
async fn test_mark_as_read_rolls_back_on_failure() {
    let mut api = seeded(MockApi::new(), vec![note("a", false), note("b", false)]);
    api.expect_mark_read().times(1).returning(|_| Err(server_error()));
    let (store, feedback) = loaded_store(api).await;
    let mut events = store.subscribe();

    let result = store.mark_as_read("a").await;

    assert!(matches!(result, Err(StoreError::Api(_))));
    assert!(!store.get("a").unwrap().read);
    assert_eq!(store.unread_count(), 2);
    assert_unread_invariant(&store);
    assert_eq!(
        events.drain(),
        vec![
            StoreEvent::NotificationUpdated(note("a", true)),
            StoreEvent::UnreadCountChanged { unread_count: 1 },
            StoreEvent::NotificationUpdated(note("a", false)),
            StoreEvent::UnreadCountChanged { unread_count: 2 },
        ]
    );
    assert_eq!(feedback.count(FeedbackLevel::Error), 1);
}

#[tokio::test]
async fn test_mark_as_read_short_circuits() {
    let mut api = seeded(MockApi::new(), vec![note("a", true)]);
    api.expect_mark_read().times(0);
    let (store, _feedback) = loaded_store(api).await;

    store.mark_as_read("a").await.unwrap();
    assert!(matches!(
        store.mark_as_read("missing").await,
        Err(StoreError::NotFound(id)) if id == "missing"
    ));
}

#[tokio::test]
async fn test_failed_mark_all_restores_exact_state() {
    let original = vec![note("a", false), note("b", true), note("c", false)];
    let mut api = seeded(MockApi::new(), original.clone());
    api.expect_mark_all_read()
        .times(1)
        .returning(|| Err(server_error()));
    let (store, _feedback) = loaded_store(api).await;

    assert!(store.mark_all_as_read().await.is_err());

    assert_eq!(store.notifications(), original);
    assert_eq!(store.unread_count(), 2);
}

#[tokio::test]
async fn test_mark_all_as_read() {
    let mut api = seeded(MockApi::new(), vec![note("a", false), note("b", false)]);
    api.expect_mark_all_read().times(1).returning(|| Ok(()));
    let (store, _feedback) = loaded_store(api).await;
    let mut events = store.subscribe();

    assert_eq!(store.mark_all_as_read().await.unwrap(), 2);
    assert_eq!(store.unread_count(), 0);
    assert_eq!(
        events.drain(),
        vec![
            StoreEvent::AllMarkedRead,
            StoreEvent::UnreadCountChanged { unread_count: 0 }
        ]
    );

    // Nothing left to mark: no second round trip
    assert_eq!(store.mark_all_as_read().await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_many_rolls_back_in_original_order() {
    let original = vec![note("a", false), note("b", true), note("c", false), note("d", false)];
    let mut api = seeded(MockApi::new(), original.clone());
    api.expect_delete()
        .withf(|ids| ids == ["b".to_string(), "d".to_string()])
        .times(1)
        .returning(|_| Err(server_error()));
    let (store, feedback) = loaded_store(api).await;

    let result = store
        .delete_many(&["d".to_string(), "b".to_string(), "zzz".to_string()])
        .await;

    assert!(result.is_err());
    assert_eq!(store.notifications(), original);
    assert_unread_invariant(&store);
    assert_eq!(feedback.count(FeedbackLevel::Error), 1);
}

#[tokio::test]
async fn test_delete_adjusts_unread_count() {
    let mut api = seeded(MockApi::new(), vec![note("a", false), note("b", true)]);
    api.expect_delete().times(1).returning(|_| Ok(()));
    let (store, _feedback) = loaded_store(api).await;
    let mut events = store.subscribe();

    store.delete("a").await.unwrap();

    assert_eq!(store.unread_count(), 0);
    assert!(store.get("a").is_none());
    assert_eq!(
        events.drain(),
        vec![
            StoreEvent::NotificationDeleted { id: "a".into() },
            StoreEvent::UnreadCountChanged { unread_count: 0 },
        ]
    );
    assert!(matches!(store.delete("a").await, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn test_resync_push_refetches_with_last_filter() {
    let mut api = MockApi::new();
    api.expect_fetch()
        .withf(|filter| filter.unread_only)
        .times(2)
        .returning(|_| Ok(vec![note("a", false)]));
    let store = NotificationStore::new(Arc::new(api));
    store.fetch(NotificationFilter::unread()).await.unwrap();
    let mut events = store.subscribe();

    store.apply_push(NotificationPush::Resync);

    let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .unwrap();
    assert_eq!(event, Some(StoreEvent::NotificationsLoaded { count: 1 }));
}

#[tokio::test]
async fn test_dropped_subscription_unregisters() {
    let api = seeded(MockApi::new(), vec![]);
    let (store, _feedback) = loaded_store(api).await;

    let first = store.subscribe();
    let mut second = store.subscribe();
    assert_eq!(store.listener_count(), 2);

    drop(first);
    assert_eq!(store.listener_count(), 1);

    store.apply_push(NotificationPush::Created(note("n1", false)));
    assert_eq!(
        second.drain(),
        vec![
            StoreEvent::NotificationAdded(note("n1", false)),
            StoreEvent::UnreadCountChanged { unread_count: 1 },
        ]
    );
}

/// Backend whose confirmations wait until the test releases them
struct GatedApi {
    items: Vec<Notification>,
    gate: Semaphore,
    fail: bool,
}

impl GatedApi {
    fn new(items: Vec<Notification>, fail: bool) -> Self {
        Self {
            items,
            gate: Semaphore::new(0),
            fail,
        }
    }

    async fn confirm(&self) -> Result<(), ApiError> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| ApiError::Unavailable(e.to_string()))?;
        if self.fail {
            Err(server_error())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl NotificationApi for GatedApi {
    async fn fetch(&self, _filter: &NotificationFilter) -> Result<Vec<Notification>, ApiError> {
        Ok(self.items.clone())
    }

    async fn mark_read(&self, _id: &str) -> Result<(), ApiError> {
        self.confirm().await
    }

    async fn mark_all_read(&self) -> Result<(), ApiError> {
        self.confirm().await
    }

    async fn delete(&self, _ids: &[String]) -> Result<(), ApiError> {
        self.confirm().await
    }
}

#[tokio::test]
async fn test_optimistic_state_visible_while_in_flight() {
    let api = Arc::new(GatedApi::new(vec![note("a", false), note("b", false)], true));
    let store = NotificationStore::new(api.clone());
    store.fetch(NotificationFilter::default()).await.unwrap();

    let pending = tokio::spawn({
        let store = store.clone();
        async move { store.mark_as_read("a").await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert!(store.get("a").unwrap().read);
    assert_eq!(store.unread_count(), 1);

    // A push lands while the confirmation is outstanding
    store.apply_push(NotificationPush::Created(note("c", false)));
    assert_eq!(store.unread_count(), 2);

    api.gate.add_permits(1);
    assert!(pending.await.unwrap().is_err());

    assert!(!store.get("a").unwrap().read);
    assert!(store.get("c").is_some());
    assert_eq!(store.unread_count(), 3);
    assert_unread_invariant(&store);
}

#[tokio::test]
async fn test_push_during_failed_delete_is_kept() {
    let api = Arc::new(GatedApi::new(vec![note("a", false), note("b", true)], true));
    let store = NotificationStore::new(api.clone());
    store.fetch(NotificationFilter::default()).await.unwrap();

    let pending = tokio::spawn({
        let store = store.clone();
        async move { store.delete("a").await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(store.get("a").is_none());

    store.apply_push(NotificationPush::Created(note("z", false)));
    api.gate.add_permits(1);
    assert!(pending.await.unwrap().is_err());

    let ids: Vec<String> = store.notifications().into_iter().map(|n| n.id).collect();
    // Re-inserted at its original index
    assert_eq!(ids, vec!["a", "z", "b"]);
    assert_unread_invariant(&store);
}

/// One gated backend operation answering from a scripted list of outcomes
struct Gate {
    permits: Semaphore,
    outcomes: Mutex<VecDeque<bool>>,
}

impl Gate {
    fn new(outcomes: impl IntoIterator<Item = bool>) -> Self {
        Self {
            permits: Semaphore::new(0),
            outcomes: Mutex::new(outcomes.into_iter().collect()),
        }
    }

    async fn pass(&self) -> Result<(), ApiError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ApiError::Unavailable(e.to_string()))?;
        match self.outcomes.lock().pop_front() {
            Some(true) => Ok(()),
            _ => Err(server_error()),
        }
    }
}

/// Mark and delete confirmations released independently
struct TwoGateApi {
    items: Vec<Notification>,
    mark: Gate,
    delete: Gate,
}

#[async_trait]
impl NotificationApi for TwoGateApi {
    async fn fetch(&self, _filter: &NotificationFilter) -> Result<Vec<Notification>, ApiError> {
        Ok(self.items.clone())
    }

    async fn mark_read(&self, _id: &str) -> Result<(), ApiError> {
        self.mark.pass().await
    }

    async fn mark_all_read(&self) -> Result<(), ApiError> {
        self.mark.pass().await
    }

    async fn delete(&self, _ids: &[String]) -> Result<(), ApiError> {
        self.delete.pass().await
    }
}

async fn two_gate_store(
    items: Vec<Notification>,
    mark: impl IntoIterator<Item = bool>,
    delete: impl IntoIterator<Item = bool>,
) -> (NotificationStore, Arc<TwoGateApi>) {
    let api = Arc::new(TwoGateApi {
        items,
        mark: Gate::new(mark),
        delete: Gate::new(delete),
    });
    let store = NotificationStore::new(api.clone());
    store.fetch(NotificationFilter::default()).await.unwrap();
    (store, api)
}

async fn settle_next(gate: &Gate) {
    gate.permits.add_permits(1);
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test]
async fn test_failed_mark_then_failed_delete_restores_unread() {
    let original = vec![note("a", false), note("b", true)];
    let (store, api) = two_gate_store(original.clone(), [false], [false]).await;

    let mark = tokio::spawn({
        let store = store.clone();
        async move { store.mark_as_read("a").await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    let delete = tokio::spawn({
        let store = store.clone();
        async move { store.delete("a").await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(store.get("a").is_none());

    settle_next(&api.mark).await;
    assert!(mark.await.unwrap().is_err());
    settle_next(&api.delete).await;
    assert!(delete.await.unwrap().is_err());

    assert_eq!(store.notifications(), original);
    assert_eq!(store.unread_count(), 1);
    assert_eq!(store.in_flight(), 0);
    assert_unread_invariant(&store);
}

#[tokio::test]
async fn test_failed_mark_all_then_failed_delete_restores_unread() {
    let original = vec![note("a", false), note("b", false), note("c", true)];
    let (store, api) = two_gate_store(original.clone(), [false], [false]).await;

    let mark_all = tokio::spawn({
        let store = store.clone();
        async move { store.mark_all_as_read().await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    let delete = tokio::spawn({
        let store = store.clone();
        async move { store.delete("b").await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    settle_next(&api.mark).await;
    assert!(mark_all.await.unwrap().is_err());
    settle_next(&api.delete).await;
    assert!(delete.await.unwrap().is_err());

    assert_eq!(store.notifications(), original);
    assert_eq!(store.unread_count(), 2);
    assert_unread_invariant(&store);
}

#[tokio::test]
async fn test_repeated_mark_gets_its_own_confirmation() {
    let (store, api) = two_gate_store(vec![note("a", false)], [false, true], []).await;

    let first = tokio::spawn({
        let store = store.clone();
        async move { store.mark_as_read("a").await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = tokio::spawn({
        let store = store.clone();
        async move { store.mark_as_read("a").await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(store.in_flight(), 2);

    settle_next(&api.mark).await;
    assert!(first.await.unwrap().is_err());
    // The second request is still out and keeps the flag
    assert!(store.get("a").unwrap().read);

    settle_next(&api.mark).await;
    assert!(second.await.unwrap().is_ok());
    assert!(store.get("a").unwrap().read);
    assert_eq!(store.unread_count(), 0);
    assert_eq!(store.in_flight(), 0);
}

#[tokio::test]
async fn test_repeated_mark_fails_when_both_are_rejected() {
    let (store, api) = two_gate_store(vec![note("a", false)], [false, false], []).await;

    let first = tokio::spawn({
        let store = store.clone();
        async move { store.mark_as_read("a").await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = tokio::spawn({
        let store = store.clone();
        async move { store.mark_as_read("a").await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    settle_next(&api.mark).await;
    settle_next(&api.mark).await;
    assert!(first.await.unwrap().is_err());
    assert!(second.await.unwrap().is_err());

    assert!(!store.get("a").unwrap().read);
    assert_eq!(store.unread_count(), 1);
    assert_unread_invariant(&store);
}

#[tokio::test]
async fn test_subscription_waits_for_next_event() {
    let store = NotificationStore::new(Arc::new(MockApi::new()));
    let mut subscription = store.subscribe();

    {
        let mut next = tokio_test::task::spawn(subscription.recv());
        tokio_test::assert_pending!(next.poll());

        store.apply_push(NotificationPush::Created(note("n1", false)));
        assert!(next.is_woken());
        let event = tokio_test::assert_ready!(next.poll());
        assert_eq!(event, Some(StoreEvent::NotificationAdded(note("n1", false))));
    }
    assert_eq!(
        subscription.try_recv(),
        Some(StoreEvent::UnreadCountChanged { unread_count: 1 })
    );
}
