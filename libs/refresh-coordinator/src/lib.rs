//! Refresh coordination for UI consumers
//!
//! Consumers register once per page with a reload callback. The coordinator
//! listens on the [`sync_events::RefreshBus`], matches every request against
//! each consumer's interest set and runs at most one reload per consumer at a
//! time.
//!
//! ```text
//! RefreshBus ──→ attach() listener ──→ dispatch()
//!                                         │ per consumer:
//!                                         ├─ in flight?      → drop
//!                                         ├─ interest miss?  → filter
//!                                         └─ spawn reload    → FeedbackSurface
//! ```
//!
//! Interest defaults come from the page type:
//!
//! | page type            | categories                  |
//! |----------------------|-----------------------------|
//! | admin dashboard      | admin                       |
//! | instructor dashboard | course, session, enrollment |
//! | student dashboard    | course, session, enrollment |
//! | course detail        | course                      |
//! | session detail       | session                     |
//! | profile              | user                        |
//! | custom               | none (matches everything)   |

mod coordinator;
mod error;
mod interest;
mod stats;
mod timer;

pub use coordinator::{reload_fn, ConsumerHandle, ConsumerId, RefreshCoordinator, ReloadFn};
pub use error::{CoordinatorError, Result};
pub use interest::{Interest, PageType, Registration};
pub use stats::CoordinatorStats;
pub use timer::{spawn_periodic, MIN_REFRESH_PERIOD};
