//! Notification list state and its transitions
//!
//! Every transition runs under the store lock and broadcasts its events
//! before the lock is released, so listeners observe mutations in the order
//! they happened. Entity events always precede the unread-count event of the
//! same transition.
//!
//! Optimistic transitions stay registered in `pending` until the backend
//! answers. Overlapping mutations settle against each other through it: a
//! read flag another request still vouches for is not reverted, and a
//! reverted read flag reaches copies held by in-flight deletes.

use std::collections::{BTreeMap, HashMap};
use sync_events::{Notification, NotificationPush};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::api::NotificationFilter;
use crate::error::{Result, StoreError};
use crate::events::StoreEvent;

/// Identifies one optimistic mutation awaiting confirmation
pub(crate) type MutationId = u64;

/// Data needed to revert an optimistic transition
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Undo {
    MarkRead {
        /// Flipped to read by this request, reverted if it fails
        flipped: Vec<String>,
        /// Confirmed read if this request succeeds
        covers: Vec<String>,
    },
    /// Removed entries with their original positions, ascending
    Delete { removed: Vec<(usize, Notification)> },
}

impl Undo {
    fn covers(&self, id: &str) -> bool {
        matches!(self, Undo::MarkRead { covers, .. } if covers.iter().any(|c| c == id))
    }

    fn flipped(&self, id: &str) -> bool {
        matches!(self, Undo::MarkRead { flipped, .. } if flipped.iter().any(|f| f == id))
    }
}

#[derive(Default)]
pub(crate) struct StoreState {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
    pub last_filter: NotificationFilter,
    pub listeners: HashMap<u64, mpsc::UnboundedSender<StoreEvent>>,
    pub next_listener: u64,
    pending: BTreeMap<MutationId, Undo>,
    next_mutation: MutationId,
}

impl StoreState {
    fn emit(&mut self, event: StoreEvent) {
        trace!(kind = event.kind(), listeners = self.listeners.len(), "Store event");
        self.listeners.retain(|_, tx| tx.send(event.clone()).is_ok());
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.notifications.iter().position(|n| n.id == id)
    }

    fn count_unread(&self) -> usize {
        self.notifications.iter().filter(|n| n.is_unread()).count()
    }

    /// Recompute the unread count, announcing it when it moved
    fn sync_unread(&mut self) {
        let unread = self.count_unread();
        if unread != self.unread_count {
            self.unread_count = unread;
            self.emit(StoreEvent::UnreadCountChanged {
                unread_count: unread,
            });
        }
    }

    fn track(&mut self, undo: Undo) -> MutationId {
        self.next_mutation += 1;
        self.pending.insert(self.next_mutation, undo);
        self.next_mutation
    }

    /// Read only because a request still in flight flipped it
    fn read_unconfirmed(&self, id: &str) -> bool {
        self.pending.values().any(|undo| undo.flipped(id))
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    pub fn load(&mut self, notifications: Vec<Notification>, filter: NotificationFilter) {
        let count = notifications.len();
        self.notifications = notifications;
        self.last_filter = filter;
        self.emit(StoreEvent::NotificationsLoaded { count });

        self.unread_count = self.count_unread();
        let unread_count = self.unread_count;
        self.emit(StoreEvent::UnreadCountChanged { unread_count });
    }

    /// Optimistically mark one notification read. `None` when it is already
    /// read and no request in flight could revert that.
    pub fn mark_read(&mut self, id: &str) -> Result<Option<MutationId>> {
        let index = self
            .position(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let covers = vec![id.to_string()];

        if self.notifications[index].read {
            if !self.read_unconfirmed(id) {
                return Ok(None);
            }
            // Needs its own confirmation; nothing to flip
            return Ok(Some(self.track(Undo::MarkRead {
                flipped: Vec::new(),
                covers,
            })));
        }

        let notification = &mut self.notifications[index];
        notification.read = true;
        let updated = notification.clone();
        self.emit(StoreEvent::NotificationUpdated(updated));
        self.sync_unread();
        Ok(Some(self.track(Undo::MarkRead {
            flipped: covers.clone(),
            covers,
        })))
    }

    /// Optimistically mark everything read. Returns the mutation and how
    /// many notifications it flipped; `None` when everything is already
    /// confirmed read.
    pub fn mark_all_read(&mut self) -> Option<(MutationId, usize)> {
        let flipped: Vec<String> = self
            .notifications
            .iter()
            .filter(|n| n.is_unread())
            .map(|n| n.id.clone())
            .collect();
        let covers: Vec<String> = self.notifications.iter().map(|n| n.id.clone()).collect();
        if flipped.is_empty() && !covers.iter().any(|id| self.read_unconfirmed(id)) {
            return None;
        }

        let marked = flipped.len();
        if marked > 0 {
            for notification in &mut self.notifications {
                notification.read = true;
            }
            self.emit(StoreEvent::AllMarkedRead);
            self.sync_unread();
        }
        Some((self.track(Undo::MarkRead { flipped, covers }), marked))
    }

    /// Optimistically remove the listed notifications. Unknown ids are
    /// skipped; `None` when nothing matched. Returns the removed ids.
    pub fn remove(&mut self, ids: &[String]) -> Option<(MutationId, Vec<String>)> {
        let mut positions: Vec<usize> = ids.iter().filter_map(|id| self.position(id)).collect();
        positions.sort_unstable();
        positions.dedup();
        if positions.is_empty() {
            return None;
        }

        let mut removed: Vec<(usize, Notification)> = positions
            .iter()
            .rev()
            .map(|&index| (index, self.notifications.remove(index)))
            .collect();
        removed.reverse();

        for (_, notification) in &removed {
            self.emit(StoreEvent::NotificationDeleted {
                id: notification.id.clone(),
            });
        }
        self.sync_unread();

        let removed_ids = removed.iter().map(|(_, n)| n.id.clone()).collect();
        Some((self.track(Undo::Delete { removed }), removed_ids))
    }

    /// The backend accepted the mutation
    pub fn commit(&mut self, mutation: MutationId) {
        let Some(undo) = self.pending.remove(&mutation) else {
            return;
        };
        let Undo::MarkRead { covers, .. } = undo else {
            return;
        };

        // Server-confirmed read: nothing still in flight may revert it
        for other in self.pending.values_mut() {
            match other {
                Undo::MarkRead { flipped, .. } => flipped.retain(|id| !covers.contains(id)),
                Undo::Delete { removed } => {
                    for (_, notification) in removed.iter_mut() {
                        if covers.contains(&notification.id) {
                            notification.read = true;
                        }
                    }
                }
            }
        }
    }

    /// The backend rejected the mutation, revert it
    pub fn rollback(&mut self, mutation: MutationId) {
        let Some(undo) = self.pending.remove(&mutation) else {
            return;
        };
        match undo {
            Undo::MarkRead { flipped, .. } => self.restore_unread(flipped),
            Undo::Delete { removed } => {
                for (index, notification) in removed {
                    // A push may have brought it back already
                    if self.position(&notification.id).is_some() {
                        continue;
                    }
                    let index = index.min(self.notifications.len());
                    self.notifications.insert(index, notification.clone());
                    self.emit(StoreEvent::NotificationAdded(notification));
                }
            }
        }
        self.sync_unread();
    }

    fn restore_unread(&mut self, ids: Vec<String>) {
        for id in ids {
            // Another request in flight vouches for it; its outcome decides
            if let Some(Undo::MarkRead { flipped, .. }) =
                self.pending.values_mut().find(|undo| undo.covers(&id))
            {
                if !flipped.contains(&id) {
                    flipped.push(id);
                }
                continue;
            }

            match self.position(&id) {
                Some(index) => {
                    let notification = &mut self.notifications[index];
                    if notification.read {
                        notification.read = false;
                        let restored = notification.clone();
                        self.emit(StoreEvent::NotificationUpdated(restored));
                    }
                }
                // Removed by a delete still in flight, fix the copy it will
                // put back if it fails
                None => {
                    for undo in self.pending.values_mut() {
                        if let Undo::Delete { removed } = undo {
                            for (_, notification) in removed.iter_mut() {
                                if notification.id == id {
                                    notification.read = false;
                                }
                            }
                        }
                    }
                }
            }
        }
    }

    /// Apply a server push. Resync requests are the caller's business.
    pub fn apply_push(&mut self, push: NotificationPush) {
        match push {
            NotificationPush::Created(notification) | NotificationPush::Updated(notification) => {
                match self.position(&notification.id) {
                    Some(index) => {
                        self.notifications[index] = notification.clone();
                        self.emit(StoreEvent::NotificationUpdated(notification));
                    }
                    None => {
                        self.notifications.insert(0, notification.clone());
                        self.emit(StoreEvent::NotificationAdded(notification));
                    }
                }
            }
            NotificationPush::Deleted { id } => match self.position(&id) {
                Some(index) => {
                    self.notifications.remove(index);
                    self.emit(StoreEvent::NotificationDeleted { id });
                }
                None => debug!(notification_id = %id, "Pushed delete for unknown notification"),
            },
            NotificationPush::AllRead => {
                if self.count_unread() > 0 {
                    for notification in &mut self.notifications {
                        notification.read = true;
                    }
                    self.emit(StoreEvent::AllMarkedRead);
                }
            }
            NotificationPush::Resync => {}
        }
        self.sync_unread();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(id: &str, read: bool) -> Notification {
        Notification::new(id, "announcement", "Title", "Body").with_read(read)
    }

    fn loaded(items: Vec<Notification>) -> (StoreState, mpsc::UnboundedReceiver<StoreEvent>) {
        let mut state = StoreState::default();
        state.load(items, NotificationFilter::default());
        let (tx, rx) = mpsc::unbounded_channel();
        state.listeners.insert(1, tx);
        (state, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<StoreEvent>) -> Vec<StoreEvent> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    fn ids(state: &StoreState) -> Vec<&str> {
        state.notifications.iter().map(|n| n.id.as_str()).collect()
    }

    #[test]
    fn test_load_counts_unread() {
        let (state, _rx) = loaded(vec![note("a", false), note("b", true), note("c", false)]);
        assert_eq!(state.unread_count, 2);
    }

    #[test]
    fn test_mark_read_emits_entity_event_first() {
        let (mut state, mut rx) = loaded(vec![note("a", false), note("b", false)]);

        let mutation = state.mark_read("a").unwrap();
        assert!(mutation.is_some());
        assert_eq!(state.unread_count, 1);
        assert_eq!(state.in_flight(), 1);

        let events = drain(&mut rx);
        assert_eq!(
            events.iter().map(StoreEvent::kind).collect::<Vec<_>>(),
            vec!["notification_updated", "unread_count_changed"]
        );
    }

    #[test]
    fn test_mark_read_of_read_or_unknown() {
        let (mut state, mut rx) = loaded(vec![note("a", true)]);

        assert_eq!(state.mark_read("a").unwrap(), None);
        assert!(matches!(state.mark_read("zzz"), Err(StoreError::NotFound(id)) if id == "zzz"));
        assert!(drain(&mut rx).is_empty());
        assert_eq!(state.in_flight(), 0);
    }

    #[test]
    fn test_mark_all_rollback_restores_exactly() {
        let original = vec![note("a", false), note("b", true), note("c", false)];
        let (mut state, _rx) = loaded(original.clone());

        let (mutation, marked) = state.mark_all_read().unwrap();
        assert_eq!(marked, 2);
        assert_eq!(state.unread_count, 0);
        assert!(state.notifications.iter().all(|n| n.read));

        state.rollback(mutation);
        assert_eq!(state.notifications, original);
        assert_eq!(state.unread_count, 2);
        assert_eq!(state.in_flight(), 0);
    }

    #[test]
    fn test_delete_rollback_restores_positions() {
        let original = vec![
            note("a", false),
            note("b", true),
            note("c", false),
            note("d", true),
        ];
        let (mut state, mut rx) = loaded(original.clone());

        let (mutation, removed) = state
            .remove(&["d".to_string(), "a".to_string(), "missing".to_string()])
            .unwrap();
        assert_eq!(removed, vec!["a".to_string(), "d".to_string()]);
        assert_eq!(ids(&state), vec!["b", "c"]);
        assert_eq!(state.unread_count, 1);
        assert_eq!(
            drain(&mut rx),
            vec![
                StoreEvent::NotificationDeleted { id: "a".into() },
                StoreEvent::NotificationDeleted { id: "d".into() },
                StoreEvent::UnreadCountChanged { unread_count: 1 },
            ]
        );

        state.rollback(mutation);
        assert_eq!(state.notifications, original);
        assert_eq!(state.unread_count, 2);
    }

    #[test]
    fn test_commit_keeps_optimistic_state() {
        let (mut state, _rx) = loaded(vec![note("a", false)]);
        let mutation = state.mark_read("a").unwrap().unwrap();

        state.commit(mutation);
        state.rollback(mutation);
        assert!(state.notifications[0].read);
        assert_eq!(state.in_flight(), 0);
    }

    #[test]
    fn test_failed_mark_reaches_entry_held_by_delete() {
        let original = vec![note("a", false), note("b", false)];
        let (mut state, _rx) = loaded(original.clone());

        let mark = state.mark_read("a").unwrap().unwrap();
        let (delete, _) = state.remove(&["a".to_string()]).unwrap();

        state.rollback(mark);
        state.rollback(delete);
        assert_eq!(state.notifications, original);
        assert_eq!(state.unread_count, 2);
    }

    #[test]
    fn test_failed_mark_all_reaches_entry_held_by_delete() {
        let original = vec![note("a", false), note("b", true)];
        let (mut state, _rx) = loaded(original.clone());

        let (mark_all, _) = state.mark_all_read().unwrap();
        let (delete, _) = state.remove(&["a".to_string()]).unwrap();

        state.rollback(mark_all);
        state.rollback(delete);
        assert_eq!(state.notifications, original);
        assert_eq!(state.unread_count, 1);
    }

    #[test]
    fn test_confirmed_mark_survives_failed_delete() {
        let (mut state, _rx) = loaded(vec![note("a", false)]);

        let (delete, _) = state.remove(&["a".to_string()]).unwrap();
        assert!(state.mark_read("a").is_err());
        state.rollback(delete);

        let mark = state.mark_read("a").unwrap().unwrap();
        let (delete, _) = state.remove(&["a".to_string()]).unwrap();
        state.commit(mark);
        state.rollback(delete);
        assert!(state.notifications[0].read);
        assert_eq!(state.unread_count, 0);
    }

    #[test]
    fn test_second_mark_of_optimistic_read_needs_confirmation() {
        let (mut state, _rx) = loaded(vec![note("a", false)]);

        let first = state.mark_read("a").unwrap().unwrap();
        let second = state.mark_read("a").unwrap().unwrap();
        assert_ne!(first, second);
        assert_eq!(state.in_flight(), 2);

        // The second request still vouches for the flag
        state.rollback(first);
        assert!(state.notifications[0].read);

        state.rollback(second);
        assert!(!state.notifications[0].read);
        assert_eq!(state.unread_count, 1);
    }

    #[test]
    fn test_confirmed_second_mark_outlives_failed_first() {
        let (mut state, _rx) = loaded(vec![note("a", false)]);

        let first = state.mark_read("a").unwrap().unwrap();
        let second = state.mark_read("a").unwrap().unwrap();
        state.commit(second);
        state.rollback(first);

        assert!(state.notifications[0].read);
        assert_eq!(state.unread_count, 0);
        assert_eq!(state.mark_read("a").unwrap(), None);
    }

    #[test]
    fn test_mark_all_with_only_optimistic_reads_still_confirms() {
        let (mut state, _rx) = loaded(vec![note("a", false), note("b", true)]);

        let mark = state.mark_read("a").unwrap().unwrap();
        let (mark_all, marked) = state.mark_all_read().unwrap();
        assert_eq!(marked, 0);

        state.rollback(mark);
        assert!(state.notifications[0].read);
        state.rollback(mark_all);
        assert!(!state.notifications[0].read);
        assert!(state.notifications[1].read);
        assert_eq!(state.unread_count, 1);

        assert!(state.mark_all_read().is_some());
    }

    #[test]
    fn test_remove_nothing() {
        let (mut state, _rx) = loaded(vec![note("a", false)]);
        assert!(state.remove(&["x".to_string()]).is_none());
        assert!(state.remove(&[]).is_none());
    }

    #[test]
    fn test_pushes_keep_unread_invariant() {
        let (mut state, mut rx) = loaded(vec![note("a", true)]);

        state.apply_push(NotificationPush::Created(note("b", false)));
        assert_eq!(ids(&state), vec!["b", "a"]);
        assert_eq!(state.unread_count, 1);

        state.apply_push(NotificationPush::Updated(note("b", true)));
        assert_eq!(state.unread_count, 0);

        state.apply_push(NotificationPush::Created(note("c", false)));
        state.apply_push(NotificationPush::Deleted { id: "c".into() });
        state.apply_push(NotificationPush::Deleted { id: "ghost".into() });
        assert_eq!(state.unread_count, 0);
        assert_eq!(state.unread_count, state.count_unread());

        let kinds: Vec<&str> = drain(&mut rx).iter().map(StoreEvent::kind).collect();
        assert_eq!(
            kinds,
            vec![
                "notification_added",
                "unread_count_changed",
                "notification_updated",
                "unread_count_changed",
                "notification_added",
                "unread_count_changed",
                "notification_deleted",
                "unread_count_changed",
            ]
        );
    }

    #[test]
    fn test_pushed_all_read() {
        let (mut state, mut rx) = loaded(vec![note("a", false), note("b", false)]);
        state.apply_push(NotificationPush::AllRead);

        assert_eq!(state.unread_count, 0);
        assert_eq!(
            drain(&mut rx),
            vec![
                StoreEvent::AllMarkedRead,
                StoreEvent::UnreadCountChanged { unread_count: 0 }
            ]
        );
    }

    #[test]
    fn test_closed_listeners_are_pruned() {
        let (mut state, rx) = loaded(vec![note("a", false)]);
        drop(rx);
        state.apply_push(NotificationPush::AllRead);
        assert!(state.listeners.is_empty());
    }
}
