/// Connection multiplexer
///
/// Owns exactly one logical real-time connection and shares it between every
/// UI consumer:
/// - Reference-counted entity subscriptions (wire traffic only on 0→1 / 1→0)
/// - Supervised reconnect with exponential backoff, replaying subscriptions
/// - Heartbeat (ping) with inbound-silence timeout
/// - Inbound routing: notification pushes to the sink, everything else to the
///   refresh bus
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use sync_events::{
    EntityRef, NotificationPush, NotificationSink, RefreshBus, RefreshCategory, RefreshRequest,
    NOTIFICATION_CATEGORY,
};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::backoff::{Backoff, ReconnectConfig};
use crate::error::TransportError;
use crate::frames::{ClientFrame, ServerFrame};
use crate::registry::{RegistryChange, SubscriptionRegistry};
use crate::stats::{MuxStats, StatsCollector};
use crate::transport::{Transport, TransportLink};

/// Lifecycle of the logical connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Ping period
    pub interval: Duration,
    /// Inbound silence after which the link is considered dead
    pub timeout: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(25),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MuxConfig {
    pub reconnect: ReconnectConfig,
    /// `None` disables the heartbeat
    pub heartbeat: Option<HeartbeatConfig>,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            heartbeat: Some(HeartbeatConfig::default()),
        }
    }
}

pub struct MultiplexerBuilder {
    transport: Arc<dyn Transport>,
    bus: Option<RefreshBus>,
    sink: Option<Arc<dyn NotificationSink>>,
    config: MuxConfig,
}

impl MultiplexerBuilder {
    /// Bus refresh requests are published on. A private bus is created when
    /// none is given.
    pub fn refresh_bus(mut self, bus: RefreshBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Receiver of notification pushes
    pub fn notification_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn config(mut self, config: MuxConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Multiplexer {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Multiplexer {
            inner: Arc::new(Inner {
                transport: self.transport,
                bus: self.bus.unwrap_or_default(),
                sink: self.sink,
                config: self.config,
                links: Mutex::new(LinkState::default()),
                lifecycle: Mutex::new(Lifecycle::default()),
                state,
                stats: StatsCollector::default(),
            }),
        }
    }
}

/// Handle to the multiplexer. Cheap to clone; all clones share one
/// connection and one registry.
#[derive(Clone)]
pub struct Multiplexer {
    inner: Arc<Inner>,
}

impl Multiplexer {
    pub fn builder(transport: Arc<dyn Transport>) -> MultiplexerBuilder {
        MultiplexerBuilder {
            transport,
            bus: None,
            sink: None,
            config: MuxConfig::default(),
        }
    }

    /// Start managing the connection.
    ///
    /// Idempotent: returns `false` without side effects while a connection
    /// is already connecting, connected or reconnecting. Must be called from
    /// within a tokio runtime.
    pub fn connect(&self) -> bool {
        let mut lifecycle = self.inner.lifecycle.lock();
        if lifecycle.shutdown.is_some() {
            debug!(state = ?self.state(), "connect() ignored, connection already managed");
            return false;
        }

        lifecycle.generation += 1;
        let generation = lifecycle.generation;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        lifecycle.shutdown = Some(shutdown_tx);
        self.inner.state.send_replace(ConnectionState::Connecting);
        drop(lifecycle);

        info!(endpoint = %self.inner.transport.endpoint(), "Connecting real-time transport");
        let inner = Arc::clone(&self.inner);
        tokio::spawn(inner.supervise(generation, shutdown_rx));
        true
    }

    /// Stop the connection and its reconnect loop. Registered subscriptions
    /// are kept and replayed on the next [`Multiplexer::connect`].
    pub fn disconnect(&self) {
        let mut lifecycle = self.inner.lifecycle.lock();
        let Some(shutdown) = lifecycle.shutdown.take() else {
            return;
        };
        let _ = shutdown.send(true);
        self.inner.links.lock().outbound = None;
        self.inner.state.send_replace(ConnectionState::Disconnected);
        info!("Real-time transport disconnected");
    }

    /// Declare interest in an entity. Only the first declaration for a pair
    /// produces a wire subscribe.
    pub fn subscribe_to_entity(&self, entity_type: &str, entity_id: &str) -> RegistryChange {
        let entity = EntityRef::new(entity_type, entity_id);
        let mut links = self.inner.links.lock();
        let change = links.registry.acquire(&entity);
        if change == RegistryChange::Added {
            links.send(ClientFrame::subscribe(&entity));
        }
        debug!(entity = %entity, ?change, "Entity subscription acquired");
        change
    }

    /// Withdraw interest in an entity. Only the last withdrawal produces a
    /// wire unsubscribe; unknown pairs are ignored.
    pub fn unsubscribe_from_entity(&self, entity_type: &str, entity_id: &str) -> RegistryChange {
        let entity = EntityRef::new(entity_type, entity_id);
        let mut links = self.inner.links.lock();
        let change = links.registry.release(&entity);
        match change {
            RegistryChange::Removed => links.send(ClientFrame::unsubscribe(&entity)),
            RegistryChange::Unknown => {
                warn!(entity = %entity, "Unsubscribe for an entity that is not subscribed")
            }
            _ => {}
        }
        debug!(entity = %entity, ?change, "Entity subscription released");
        change
    }

    pub fn refcount(&self, entity_type: &str, entity_id: &str) -> u32 {
        self.inner
            .links
            .lock()
            .registry
            .refcount(&EntityRef::new(entity_type, entity_id))
    }

    pub fn subscribed_entities(&self) -> Vec<EntityRef> {
        self.inner.links.lock().registry.entities()
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Watch connection state transitions
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Wait until the connection reaches `state`
    pub async fn wait_for_state(&self, state: ConnectionState) {
        let mut changes = self.state_changes();
        let _ = changes.wait_for(|current| *current == state).await;
    }

    pub fn refresh_bus(&self) -> &RefreshBus {
        &self.inner.bus
    }

    pub fn stats(&self) -> MuxStats {
        self.inner.stats.snapshot()
    }
}

#[derive(Default)]
struct LinkState {
    registry: SubscriptionRegistry,
    /// Writer of the live link; `None` while no link is up
    outbound: Option<mpsc::UnboundedSender<ClientFrame>>,
}

impl LinkState {
    fn send(&self, frame: ClientFrame) {
        match &self.outbound {
            Some(tx) => {
                if tx.send(frame).is_err() {
                    debug!("Link closing, frame will be replayed on reconnect");
                }
            }
            None => trace!(?frame, "No live link, frame deferred to reconnect"),
        }
    }
}

#[derive(Default)]
struct Lifecycle {
    /// Bumped by every connect(); stale supervisors compare against it
    generation: u64,
    shutdown: Option<watch::Sender<bool>>,
}

impl Lifecycle {
    fn is_current(&self, generation: u64) -> bool {
        self.shutdown.is_some() && self.generation == generation
    }
}

enum LinkExit {
    Shutdown,
    Lost(TransportError),
}

struct Inner {
    transport: Arc<dyn Transport>,
    bus: RefreshBus,
    sink: Option<Arc<dyn NotificationSink>>,
    config: MuxConfig,
    // Lock order: lifecycle before links
    links: Mutex<LinkState>,
    lifecycle: Mutex<Lifecycle>,
    state: watch::Sender<ConnectionState>,
    stats: StatsCollector,
}

impl Inner {
    async fn supervise(self: Arc<Self>, generation: u64, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = Backoff::new(self.config.reconnect.clone());

        loop {
            self.stats.record_connect_attempt();
            let attempt = tokio::select! {
                result = self.transport.connect() => result,
                _ = shutdown.changed() => break,
            };

            match attempt {
                Ok(mut link) => {
                    let Some(outbound) = self.install_link(generation) else {
                        link.close().await;
                        break;
                    };
                    backoff.reset();

                    let exit = self.pump(link.as_mut(), outbound, &mut shutdown).await;
                    self.clear_link(generation);
                    match exit {
                        LinkExit::Shutdown => {
                            link.close().await;
                            break;
                        }
                        LinkExit::Lost(reason) => {
                            warn!(error = %reason, "Real-time link lost");
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        endpoint = %self.transport.endpoint(),
                        attempt = backoff.attempt() + 1,
                        error = %e,
                        "Real-time connect attempt failed"
                    );
                }
            }

            if !self.transition(generation, ConnectionState::Reconnecting) {
                break;
            }
            let delay = backoff.next_delay();
            info!(
                delay_ms = delay.as_millis() as u64,
                attempt = backoff.attempt(),
                "Scheduling reconnect"
            );
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break,
            }
        }

        debug!(generation, "Connection supervisor stopped");
    }

    /// Publish a fresh link writer and replay every registered subscription
    /// through it, atomically with respect to subscribe/unsubscribe calls.
    fn install_link(&self, generation: u64) -> Option<mpsc::UnboundedReceiver<ClientFrame>> {
        let lifecycle = self.lifecycle.lock();
        if !lifecycle.is_current(generation) {
            return None;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut links = self.links.lock();
        let entities = links.registry.entities();
        for entity in &entities {
            let _ = tx.send(ClientFrame::subscribe(entity));
        }
        links.outbound = Some(tx);
        drop(links);

        self.state.send_replace(ConnectionState::Connected);
        self.stats.record_connected();
        info!(
            endpoint = %self.transport.endpoint(),
            resubscribed = entities.len(),
            "Real-time link established"
        );
        Some(rx)
    }

    fn clear_link(&self, generation: u64) {
        let lifecycle = self.lifecycle.lock();
        if lifecycle.is_current(generation) {
            self.links.lock().outbound = None;
        }
    }

    fn transition(&self, generation: u64, state: ConnectionState) -> bool {
        let lifecycle = self.lifecycle.lock();
        if !lifecycle.is_current(generation) {
            return false;
        }
        self.state.send_replace(state);
        true
    }

    async fn pump(
        &self,
        link: &mut dyn TransportLink,
        mut outbound: mpsc::UnboundedReceiver<ClientFrame>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> LinkExit {
        let heartbeat = self.config.heartbeat.clone();
        let period = heartbeat
            .as_ref()
            .map(|h| h.interval)
            .unwrap_or(Duration::from_secs(3600));
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_inbound = Instant::now();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => return LinkExit::Shutdown,
                frame = outbound.recv() => {
                    let Some(frame) = frame else {
                        return LinkExit::Lost(TransportError::Closed);
                    };
                    if let Err(e) = link.send(&frame).await {
                        return LinkExit::Lost(e);
                    }
                    self.stats.record_sent(&frame);
                }
                inbound = link.recv() => match inbound {
                    Some(Ok(frame)) => {
                        last_inbound = Instant::now();
                        self.dispatch(frame);
                    }
                    Some(Err(e)) if e.is_recoverable() => {
                        last_inbound = Instant::now();
                        self.stats.record_malformed();
                        warn!(error = %e, "Dropping malformed real-time frame");
                    }
                    Some(Err(e)) => return LinkExit::Lost(e),
                    None => return LinkExit::Lost(TransportError::Closed),
                },
                _ = ticker.tick(), if heartbeat.is_some() => {
                    if let Some(heartbeat) = &heartbeat {
                        if last_inbound.elapsed() >= heartbeat.timeout {
                            return LinkExit::Lost(TransportError::HeartbeatTimeout(heartbeat.timeout));
                        }
                        let ping = ClientFrame::ping();
                        if let Err(e) = link.send(&ping).await {
                            return LinkExit::Lost(e);
                        }
                        self.stats.record_sent(&ping);
                    }
                }
            }
        }
    }

    fn dispatch(&self, frame: ServerFrame) {
        self.stats.record_received();
        match frame {
            ServerFrame::Notification(frame) => {
                let event = frame.notification_event;
                match frame.into_push() {
                    Some(push) => self.deliver_notification(push),
                    None => {
                        self.stats.record_malformed();
                        warn!(?event, "Notification frame without required payload");
                    }
                }
            }
            ServerFrame::Refresh(frame) if frame.category == NOTIFICATION_CATEGORY => {
                self.deliver_notification(NotificationPush::Resync);
            }
            ServerFrame::Refresh(frame) => {
                let request =
                    RefreshRequest::push(RefreshCategory::from(frame.category), frame.affected_entities);
                let category = request.category.clone();
                let entities = request.affected_entities.len();
                let receivers = self.bus.publish(request);
                debug!(%category, entities, receivers, "Refresh request routed to bus");
            }
            ServerFrame::Control(control) => trace!(?control, "Control frame"),
        }
    }

    fn deliver_notification(&self, push: NotificationPush) {
        match &self.sink {
            Some(sink) => sink.apply_push(push),
            None => debug!(?push, "Notification push dropped, no sink attached"),
        }
    }
}
