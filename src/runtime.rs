//! Composition root
//!
//! Wires the sync components into one owned runtime. Nothing in the sync
//! layer is global; an application creates one `SyncRuntime` per page
//! shell and hands out references to its parts.

use notification_store::{HttpNotificationApi, NotificationApi, NotificationStore};
use realtime_mux::{Multiplexer, MuxConfig, Transport, WsTransport};
use refresh_coordinator::RefreshCoordinator;
use state_snapshot::{
    FileStorage, PageSurface, SnapshotConfig, SnapshotService, SnapshotStorage,
};
use std::sync::Arc;
use sync_events::{FeedbackSurface, RefreshBus, TracingFeedback};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::SyncConfig;

struct SnapshotParts {
    storage: Arc<dyn SnapshotStorage>,
    page: Arc<dyn PageSurface>,
    config: SnapshotConfig,
}

pub struct SyncRuntimeBuilder {
    transport: Arc<dyn Transport>,
    api: Arc<dyn NotificationApi>,
    feedback: Arc<dyn FeedbackSurface>,
    mux_config: MuxConfig,
    bus_capacity: usize,
    snapshot: Option<SnapshotParts>,
}

impl SyncRuntimeBuilder {
    /// Toast surface shared by the coordinator and the store
    pub fn feedback(mut self, feedback: Arc<dyn FeedbackSurface>) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn mux_config(mut self, config: MuxConfig) -> Self {
        self.mux_config = config;
        self
    }

    pub fn bus_capacity(mut self, capacity: usize) -> Self {
        self.bus_capacity = capacity;
        self
    }

    /// Enable page-state preservation around forced reloads
    pub fn snapshot(
        mut self,
        storage: Arc<dyn SnapshotStorage>,
        page: Arc<dyn PageSurface>,
        config: SnapshotConfig,
    ) -> Self {
        self.snapshot = Some(SnapshotParts {
            storage,
            page,
            config,
        });
        self
    }

    /// Must be called inside a tokio runtime: the coordinator's bus listener
    /// is spawned here.
    pub fn build(self) -> SyncRuntime {
        let bus = RefreshBus::new(self.bus_capacity);

        let store = NotificationStore::builder(self.api)
            .feedback(Arc::clone(&self.feedback))
            .build();

        let mux = Multiplexer::builder(self.transport)
            .refresh_bus(bus.clone())
            .notification_sink(Arc::new(store.clone()))
            .config(self.mux_config)
            .build();

        let coordinator = RefreshCoordinator::new(self.feedback);
        let listener = coordinator.attach(&bus);

        let snapshot = self.snapshot.map(|parts| {
            SnapshotService::builder(parts.storage, parts.page)
                .config(parts.config)
                .build()
        });

        info!(
            bus_capacity = self.bus_capacity,
            snapshot = snapshot.is_some(),
            "Sync runtime assembled"
        );
        SyncRuntime {
            bus,
            mux,
            coordinator,
            store,
            snapshot,
            listener,
        }
    }
}

pub struct SyncRuntime {
    bus: RefreshBus,
    mux: Multiplexer,
    coordinator: RefreshCoordinator,
    store: NotificationStore,
    snapshot: Option<SnapshotService>,
    listener: JoinHandle<()>,
}

impl SyncRuntime {
    pub fn builder(
        transport: Arc<dyn Transport>,
        api: Arc<dyn NotificationApi>,
    ) -> SyncRuntimeBuilder {
        SyncRuntimeBuilder {
            transport,
            api,
            feedback: Arc::new(TracingFeedback),
            mux_config: MuxConfig::default(),
            bus_capacity: RefreshBus::DEFAULT_CAPACITY,
            snapshot: None,
        }
    }

    /// WebSocket transport, REST notification API and a file-backed
    /// snapshot slot, all taken from `config`
    pub fn from_config(config: &SyncConfig, page: Arc<dyn PageSurface>) -> SyncRuntimeBuilder {
        Self::builder(
            Arc::new(WsTransport::new(config.ws_url.clone())),
            Arc::new(HttpNotificationApi::new(config.api_base_url.clone())),
        )
        .mux_config(config.mux_config())
        .bus_capacity(config.refresh_bus_capacity)
        .snapshot(
            Arc::new(FileStorage::new(config.snapshot_path.clone())),
            page,
            config.snapshot_config(),
        )
    }

    pub fn bus(&self) -> &RefreshBus {
        &self.bus
    }

    pub fn multiplexer(&self) -> &Multiplexer {
        &self.mux
    }

    pub fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    pub fn notifications(&self) -> &NotificationStore {
        &self.store
    }

    pub fn snapshot(&self) -> Option<&SnapshotService> {
        self.snapshot.as_ref()
    }

    /// Open the real-time connection. Returns `false` if it was already open
    /// or opening.
    pub fn start(&self) -> bool {
        self.mux.connect()
    }

    /// Close the connection and stop routing refresh requests
    pub fn shutdown(&self) {
        self.mux.disconnect();
        self.listener.abort();
        info!("Sync runtime stopped");
    }
}

impl Drop for SyncRuntime {
    fn drop(&mut self) {
        self.listener.abort();
    }
}
