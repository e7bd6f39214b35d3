//! State snapshot service
//!
//! Preserves ephemeral UI state across a forced full-page reload.
//!
//! ```text
//!   reload_preserving_state(reload)
//!        │
//!        ▼
//!   save_current_state ──► PageSurface ──► SnapshotRecord ──► SnapshotStorage
//!        │                                                    (single slot)
//!        ▼
//!     reload()                                                      │
//!                                                                   ▼
//!   restore_state ◄── fresh? same path? ◄── take + clear slot ◄─────┘
//!        │
//!        ▼
//!   forms, UI settings, sections, tabs, filters ─► delay ─► scroll
//! ```
//!
//! Password and file inputs are never captured. A record older than the TTL
//! or that cannot be parsed is discarded on sight; a record taken on another
//! path is left in place for that path.
//!
//! # Example
//!
//! ```ignore
//! let service = SnapshotService::builder(Arc::new(MemoryStorage::new()), page.clone())
//!     .config(SnapshotConfig::default())
//!     .build();
//!
//! service.reload_preserving_state(|| shell.reload()).await;
//! // ... after the page is rebuilt
//! service.restore_state().await;
//! ```

pub mod clock;
pub mod error;
pub mod record;
pub mod service;
pub mod storage;
pub mod surface;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Result, SnapshotError};
pub use record::{
    FieldKind, FieldValue, FormField, FormSnapshot, ScrollPosition, SnapshotRecord, UiSettings,
};
pub use service::{RestoreOutcome, SnapshotConfig, SnapshotService, SnapshotServiceBuilder};
pub use storage::{FileStorage, MemoryStorage, SnapshotStorage, SNAPSHOT_KEY};
pub use surface::{MemoryPage, PageSurface};
