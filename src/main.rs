//! campus-sync probe
//!
//! Connects to the real-time endpoint, subscribes to the entities given on
//! the command line as `type:id`, and logs notification and refresh traffic
//! until Ctrl-C.

use anyhow::Context;
use campus_sync::notification_store::NotificationFilter;
use campus_sync::state_snapshot::MemoryPage;
use campus_sync::sync_events::EntityRef;
use campus_sync::{init_tracing, SyncConfig, SyncRuntime};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = SyncConfig::from_env().context("Failed to load configuration")?;
    init_tracing(config.log_format, "info")?;

    let entities = std::env::args()
        .skip(1)
        .map(|arg| arg.parse::<EntityRef>())
        .collect::<Result<Vec<_>, _>>()?;

    info!(
        ws_url = %config.ws_url,
        api_base_url = %config.api_base_url,
        entities = entities.len(),
        "Starting campus-sync probe"
    );

    // No page is rendered here; the headless one only backs the snapshot slot
    let page = Arc::new(MemoryPage::new("/"));
    let runtime = SyncRuntime::from_config(&config, page).build();
    if let Some(snapshot) = runtime.snapshot() {
        info!(
            path = %config.snapshot_path.display(),
            pending = snapshot.has_pending_snapshot(),
            "Page-state slot"
        );
    }

    let store = runtime.notifications();
    match store.fetch(NotificationFilter::default()).await {
        Ok(count) => info!(count, unread = store.unread_count(), "Initial notifications loaded"),
        // The store keeps working from pushes alone
        Err(e) => warn!(error = %e, "Initial notification fetch failed"),
    }

    let mut events = store.subscribe();
    let mut refreshes = runtime.bus().subscribe();

    runtime.start();
    for entity in &entities {
        runtime
            .multiplexer()
            .subscribe_to_entity(&entity.entity_type, &entity.entity_id);
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, shutting down");
                break;
            }
            Some(event) = events.recv() => {
                info!(kind = event.kind(), event = ?event, "Notification store event");
            }
            request = refreshes.recv() => match request {
                Ok(request) => info!(
                    category = %request.category,
                    origin = ?request.origin,
                    entities = ?request.affected_entities,
                    "Refresh request"
                ),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Probe fell behind the refresh bus"),
                Err(RecvError::Closed) => {
                    error!("Refresh bus closed");
                    break;
                }
            },
        }
    }

    runtime.shutdown();
    let stats = runtime.multiplexer().stats();
    info!(
        frames_received = stats.frames_received,
        frames_malformed = stats.frames_malformed,
        connections = stats.connections_established,
        "Probe finished"
    );
    Ok(())
}
