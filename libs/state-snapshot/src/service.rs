/// State snapshot service
///
/// Captures the ephemeral state of the current page right before a forced
/// reload and replays it once on the next load of the same path. The slot
/// holds one record; saving overwrites whatever was there.
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::record::SnapshotRecord;
use crate::storage::{SnapshotStorage, SNAPSHOT_KEY};
use crate::surface::PageSurface;

#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// Records this old or older are discarded
    pub ttl: Duration,
    /// Scroll is restored after this delay so the page can lay out first
    pub scroll_restore_delay: Duration,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            scroll_restore_delay: Duration::from_millis(100),
        }
    }
}

/// Result of one restore attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored {
        /// Form fields written back into the page
        fields_restored: usize,
        /// Fields, sections, tabs and filters whose target was missing
        targets_missing: usize,
    },
    NoSnapshot,
    /// Discarded, older than the TTL
    Expired,
    /// Left in place for the page it was taken on
    PathMismatch { snapshot_path: String },
    /// Discarded, could not be read or parsed
    Unreadable,
}

impl RestoreOutcome {
    pub fn is_restored(&self) -> bool {
        matches!(self, RestoreOutcome::Restored { .. })
    }
}

pub struct SnapshotServiceBuilder {
    storage: Arc<dyn SnapshotStorage>,
    page: Arc<dyn PageSurface>,
    clock: Option<Arc<dyn Clock>>,
    config: SnapshotConfig,
}

impl SnapshotServiceBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn config(mut self, config: SnapshotConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> SnapshotService {
        SnapshotService {
            storage: self.storage,
            page: self.page,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            config: self.config,
        }
    }
}

#[derive(Clone)]
pub struct SnapshotService {
    storage: Arc<dyn SnapshotStorage>,
    page: Arc<dyn PageSurface>,
    clock: Arc<dyn Clock>,
    config: SnapshotConfig,
}

impl SnapshotService {
    pub fn builder(
        storage: Arc<dyn SnapshotStorage>,
        page: Arc<dyn PageSurface>,
    ) -> SnapshotServiceBuilder {
        SnapshotServiceBuilder {
            storage,
            page,
            clock: None,
            config: SnapshotConfig::default(),
        }
    }

    pub fn new(storage: Arc<dyn SnapshotStorage>, page: Arc<dyn PageSurface>) -> Self {
        Self::builder(storage, page).build()
    }

    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// Capture the page into the slot, replacing any unconsumed record
    pub fn save_current_state(&self) -> Result<SnapshotRecord> {
        let page = &self.page;
        let mut record = SnapshotRecord::new(self.clock.now(), page.current_path())
            .with_forms(page.forms());
        record.scroll_position = page.scroll_position();
        record.ui_settings = page.ui_settings();
        record.expanded_sections = page.expanded_sections();
        record.selected_tabs = page.selected_tabs();
        record.filters = page.filters();

        self.storage.set(SNAPSHOT_KEY, &record.to_json()?)?;
        debug!(
            path = %record.path,
            fields = record.field_count(),
            sections = record.expanded_sections.len(),
            "Page state saved"
        );
        Ok(record)
    }

    /// Restore the saved state if there is a fresh record for this path
    pub async fn restore_state(&self) -> bool {
        self.restore().await.is_restored()
    }

    /// Like [`restore_state`](Self::restore_state), reporting why nothing
    /// was restored
    pub async fn restore(&self) -> RestoreOutcome {
        let record = match self.take_fresh_record() {
            Ok(record) => record,
            Err(outcome) => return outcome,
        };

        let mut fields_restored = 0;
        let mut targets_missing = 0;

        for (form_id, fields) in &record.form_data {
            for (name, value) in fields {
                if self.page.set_field(form_id, name, value) {
                    fields_restored += 1;
                } else {
                    debug!(form = %form_id, field = %name, "Form field no longer on page");
                    targets_missing += 1;
                }
            }
        }

        self.page.apply_ui_settings(&record.ui_settings);
        for section in &record.expanded_sections {
            if !self.page.expand_section(section) {
                targets_missing += 1;
            }
        }
        for (group, tab) in &record.selected_tabs {
            if !self.page.select_tab(group, tab) {
                targets_missing += 1;
            }
        }
        for (name, value) in &record.filters {
            if !self.page.set_filter(name, value) {
                targets_missing += 1;
            }
        }

        if !self.config.scroll_restore_delay.is_zero() {
            tokio::time::sleep(self.config.scroll_restore_delay).await;
        }
        self.page.scroll_to(record.scroll_position);

        info!(
            path = %record.path,
            fields_restored,
            targets_missing,
            "Page state restored"
        );
        RestoreOutcome::Restored {
            fields_restored,
            targets_missing,
        }
    }

    /// Whether a readable record younger than the TTL is waiting, for any path
    pub fn has_pending_snapshot(&self) -> bool {
        match self.storage.get(SNAPSHOT_KEY) {
            Ok(Some(json)) => SnapshotRecord::from_json(&json)
                .map(|record| record.is_fresh(self.clock.now(), self.config.ttl))
                .unwrap_or(false),
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "Snapshot storage unavailable");
                false
            }
        }
    }

    /// Save the page state, then run `reload`. A failed save is logged and
    /// the reload still happens.
    pub async fn reload_preserving_state<F, Fut, T>(&self, reload: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if let Err(e) = self.save_current_state() {
            warn!(error = %e, "Could not save page state before reload");
        }
        reload().await
    }

    /// Claim the record for the current page. The slot is emptied before the
    /// record is handed out so it is applied at most once.
    fn take_fresh_record(&self) -> std::result::Result<SnapshotRecord, RestoreOutcome> {
        let json = match self.storage.get(SNAPSHOT_KEY) {
            Ok(Some(json)) => json,
            Ok(None) => return Err(RestoreOutcome::NoSnapshot),
            Err(e) => {
                warn!(error = %e, "Snapshot storage unavailable");
                return Err(RestoreOutcome::Unreadable);
            }
        };

        let record = match SnapshotRecord::from_json(&json) {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable page state");
                self.discard();
                return Err(RestoreOutcome::Unreadable);
            }
        };

        if !record.is_fresh(self.clock.now(), self.config.ttl) {
            debug!(path = %record.path, saved_at = %record.timestamp, "Discarding expired page state");
            self.discard();
            return Err(RestoreOutcome::Expired);
        }

        let current_path = self.page.current_path();
        if record.path != current_path {
            debug!(
                snapshot_path = %record.path,
                current_path = %current_path,
                "Page state belongs to another page"
            );
            return Err(RestoreOutcome::PathMismatch {
                snapshot_path: record.path,
            });
        }

        if let Err(e) = self.storage.remove(SNAPSHOT_KEY) {
            warn!(error = %e, "Could not clear page state, skipping restore");
            return Err(RestoreOutcome::Unreadable);
        }
        Ok(record)
    }

    fn discard(&self) {
        if let Err(e) = self.storage.remove(SNAPSHOT_KEY) {
            warn!(error = %e, "Could not clear page state");
        }
    }
}
