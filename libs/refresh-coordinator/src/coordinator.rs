/// Refresh coordinator
///
/// Turns refresh requests into single-flight reloads, one per interested
/// consumer. Requests that arrive while a consumer is already reloading are
/// dropped, not queued: the reload in flight fetches fresh data anyway.
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use sync_events::{
    FeedbackLevel, FeedbackSurface, RefreshBus, RefreshCategory, RefreshRequest, TracingFeedback,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{CoordinatorError, Result};
use crate::interest::{Interest, Registration};
use crate::stats::{CoordinatorStats, StatsCollector};

/// Reload callback supplied by a consumer
pub type ReloadFn = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Wrap an async closure as a [`ReloadFn`]
pub fn reload_fn<F, Fut>(f: F) -> ReloadFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsumerId(Uuid);

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Consumer {
    id: ConsumerId,
    label: String,
    interest: Interest,
    reload: ReloadFn,
    in_flight: AtomicBool,
}

/// Clears the consumer's in-flight flag when the reload settles, including
/// when it panics or its task is cancelled.
struct InFlightGuard(Arc<Consumer>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.in_flight.store(false, Ordering::Release);
    }
}

struct Inner {
    consumers: RwLock<HashMap<ConsumerId, Arc<Consumer>>>,
    feedback: Arc<dyn FeedbackSurface>,
    stats: StatsCollector,
}

#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new(Arc::new(TracingFeedback))
    }
}

impl RefreshCoordinator {
    pub fn new(feedback: Arc<dyn FeedbackSurface>) -> Self {
        Self {
            inner: Arc::new(Inner {
                consumers: RwLock::new(HashMap::new()),
                feedback,
                stats: StatsCollector::default(),
            }),
        }
    }

    /// Register a consumer. It stays registered until the returned handle is
    /// dropped.
    pub fn register(&self, registration: Registration, reload: ReloadFn) -> ConsumerHandle {
        let consumer = Arc::new(Consumer {
            id: ConsumerId(Uuid::new_v4()),
            label: registration.display_label(),
            interest: registration.interest(),
            reload,
            in_flight: AtomicBool::new(false),
        });

        info!(
            consumer = %consumer.label,
            consumer_id = %consumer.id,
            entity_types = ?consumer.interest.entity_types,
            entity_ids = ?consumer.interest.entity_ids,
            "Refresh consumer registered"
        );
        self.inner
            .consumers
            .write()
            .insert(consumer.id, Arc::clone(&consumer));

        ConsumerHandle {
            consumer,
            inner: Arc::clone(&self.inner),
        }
    }

    /// Evaluate `request` against every registered consumer and start the
    /// reloads it calls for. Returns how many reloads were started.
    pub fn dispatch(&self, request: &RefreshRequest) -> usize {
        self.inner.dispatch(request)
    }

    /// Drive the coordinator from `bus` until the bus closes or the
    /// coordinator is dropped.
    pub fn attach(&self, bus: &RefreshBus) -> JoinHandle<()> {
        let mut requests = bus.subscribe();
        let inner: Weak<Inner> = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            loop {
                let request = match requests.recv().await {
                    Ok(request) => request,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Refresh listener lagged, requests dropped");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(inner) = inner.upgrade() else {
                    break;
                };
                inner.dispatch(&request);
            }
            debug!("Refresh listener stopped");
        })
    }

    pub fn consumer_count(&self) -> usize {
        self.inner.consumers.read().len()
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.inner.stats.snapshot()
    }
}

impl Inner {
    fn dispatch(self: &Arc<Self>, request: &RefreshRequest) -> usize {
        self.stats.record_request();
        let consumers: Vec<Arc<Consumer>> = self.consumers.read().values().cloned().collect();

        let mut started = 0;
        for consumer in consumers {
            if consumer.in_flight.load(Ordering::Acquire) {
                self.stats.record_dropped();
                debug!(
                    consumer = %consumer.label,
                    category = %request.category,
                    "Reload in flight, request dropped"
                );
                continue;
            }
            if !consumer.interest.matches(request) {
                self.stats.record_filtered();
                continue;
            }
            if self.start_reload(&consumer, &request.category) {
                started += 1;
            }
        }
        started
    }

    fn start_reload(self: &Arc<Self>, consumer: &Arc<Consumer>, category: &RefreshCategory) -> bool {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(consumer = %consumer.label, %category, "Reload requested outside a runtime, ignored");
            return false;
        };

        if consumer
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.stats.record_dropped();
            debug!(consumer = %consumer.label, "Reload in flight, request dropped");
            return false;
        }

        let guard = InFlightGuard(Arc::clone(consumer));
        self.stats.record_started();
        debug!(consumer = %consumer.label, %category, "Starting reload");

        let inner = Arc::clone(self);
        let consumer = Arc::clone(consumer);
        runtime.spawn(async move {
            let outcome = run_reload(&consumer).await;
            drop(guard);
            inner.report(&consumer, outcome);
        });
        true
    }

    fn report(&self, consumer: &Consumer, outcome: Result<()>) {
        self.stats.record_outcome(outcome.is_ok());
        match outcome {
            Ok(()) => {
                debug!(consumer = %consumer.label, "Reload completed");
                self.feedback.notify(
                    FeedbackLevel::Info,
                    "Refreshed",
                    &format!("{} is up to date", consumer.label),
                );
            }
            Err(e) => {
                error!(consumer = %consumer.label, error = %e, "Reload failed");
                self.feedback
                    .notify(FeedbackLevel::Error, "Refresh failed", &e.to_string());
            }
        }
    }
}

async fn run_reload(consumer: &Consumer) -> Result<()> {
    let panicked = || CoordinatorError::ReloadPanicked {
        consumer: consumer.label.clone(),
    };

    let future = std::panic::catch_unwind(AssertUnwindSafe(|| (consumer.reload)()))
        .map_err(|_| panicked())?;

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(CoordinatorError::ReloadFailed {
            consumer: consumer.label.clone(),
            source,
        }),
        Err(_) => Err(panicked()),
    }
}

/// Registration of one consumer. Dropping it unregisters the consumer; a
/// reload already running finishes on its own.
pub struct ConsumerHandle {
    consumer: Arc<Consumer>,
    inner: Arc<Inner>,
}

impl ConsumerHandle {
    /// Reload this consumer now, bypassing interest filtering. Returns
    /// `false` when a reload is already in flight or there is no Tokio
    /// runtime to run it on.
    pub fn trigger_refresh(&self) -> bool {
        self.inner.stats.record_request();
        self.inner
            .start_reload(&self.consumer, &RefreshCategory::Custom("manual".to_string()))
    }

    pub fn is_refreshing(&self) -> bool {
        self.consumer.in_flight.load(Ordering::Acquire)
    }

    pub fn id(&self) -> ConsumerId {
        self.consumer.id
    }

    pub fn label(&self) -> &str {
        &self.consumer.label
    }
}

impl Drop for ConsumerHandle {
    fn drop(&mut self) {
        self.inner.consumers.write().remove(&self.consumer.id);
        debug!(consumer = %self.consumer.label, "Refresh consumer unregistered");
    }
}
