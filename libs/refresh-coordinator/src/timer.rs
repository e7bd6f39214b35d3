//! Periodic refresh requests

use std::time::Duration;
use sync_events::{RefreshBus, RefreshCategory, RefreshRequest};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Shortest accepted period; shorter ones are raised to it
pub const MIN_REFRESH_PERIOD: Duration = Duration::from_secs(1);

/// Publish a timer-origin request for `category` every `period`, starting one
/// period from now. Abort the returned handle to stop.
pub fn spawn_periodic(bus: RefreshBus, period: Duration, category: RefreshCategory) -> JoinHandle<()> {
    if period < MIN_REFRESH_PERIOD {
        warn!(%category, period_ms = period.as_millis() as u64, "Refresh period too short, using minimum");
    }
    let period = period.max(MIN_REFRESH_PERIOD);
    info!(%category, period_ms = period.as_millis() as u64, "Periodic refresh scheduled");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let receivers = bus.publish(RefreshRequest::timer(category.clone()));
            debug!(%category, receivers, "Periodic refresh published");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sync_events::RefreshOrigin;

    #[tokio::test(start_paused = true)]
    async fn test_publishes_every_period() {
        let bus = RefreshBus::default();
        let mut requests = bus.subscribe();
        let start = Instant::now();
        let handle = spawn_periodic(bus.clone(), Duration::from_secs(30), RefreshCategory::Admin);

        let first = requests.recv().await.unwrap();
        assert_eq!(first.origin, RefreshOrigin::Timer);
        assert_eq!(first.category, RefreshCategory::Admin);
        assert_eq!(start.elapsed(), Duration::from_secs(30));

        requests.recv().await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(60));
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_period_is_raised_to_minimum() {
        let bus = RefreshBus::default();
        let mut requests = bus.subscribe();
        let start = Instant::now();
        let handle = spawn_periodic(bus.clone(), Duration::ZERO, RefreshCategory::User);

        requests.recv().await.unwrap();
        assert_eq!(start.elapsed(), MIN_REFRESH_PERIOD);
        requests.recv().await.unwrap();
        assert_eq!(start.elapsed(), MIN_REFRESH_PERIOD * 2);
        assert!(!handle.is_finished());
        handle.abort();
    }
}
