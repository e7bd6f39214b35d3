//! Optimistic mutation awaiting server confirmation

use std::sync::Arc;
use tracing::debug;

use crate::state::MutationId;
use crate::store::Shared;

/// Handle on an optimistic change registered in the store state, held
/// until the server confirms (`commit`) or rejects (`rollback`) it.
/// Dropping it unsettled rolls back.
#[must_use = "an unsettled mutation rolls back when dropped"]
pub(crate) struct PendingMutation {
    shared: Arc<Shared>,
    mutation: Option<MutationId>,
}

impl PendingMutation {
    pub fn new(shared: Arc<Shared>, mutation: MutationId) -> Self {
        Self {
            shared,
            mutation: Some(mutation),
        }
    }

    pub fn commit(mut self) {
        if let Some(mutation) = self.mutation.take() {
            self.shared.state.lock().commit(mutation);
        }
    }

    pub fn rollback(mut self) {
        self.revert();
    }

    fn revert(&mut self) {
        if let Some(mutation) = self.mutation.take() {
            self.shared.state.lock().rollback(mutation);
        }
    }
}

impl Drop for PendingMutation {
    fn drop(&mut self) {
        if self.mutation.is_some() {
            debug!("Unsettled notification mutation dropped, rolling back");
            self.revert();
        }
    }
}
