//! Reference-counted entity subscription registry

use std::collections::BTreeMap;
use sync_events::EntityRef;

/// Outcome of a registry mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryChange {
    /// First interested party (0 → 1). A wire subscribe is due.
    Added,
    /// Another party joined an existing subscription
    Retained { refcount: u32 },
    /// Last interested party left (1 → 0). A wire unsubscribe is due.
    Removed,
    /// One party left, others remain
    Released { refcount: u32 },
    /// Release of a pair that was never registered
    Unknown,
}

impl RegistryChange {
    /// Whether this change has to be mirrored on the wire
    pub fn is_wire_visible(&self) -> bool {
        matches!(self, RegistryChange::Added | RegistryChange::Removed)
    }
}

/// Subscriptions keyed by (entity type, entity id).
///
/// Every stored refcount is at least 1; an entry is removed the moment its
/// count would reach 0.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: BTreeMap<EntityRef, u32>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&mut self, entity: &EntityRef) -> RegistryChange {
        match self.entries.get_mut(entity) {
            Some(refcount) => {
                *refcount += 1;
                RegistryChange::Retained { refcount: *refcount }
            }
            None => {
                self.entries.insert(entity.clone(), 1);
                RegistryChange::Added
            }
        }
    }

    pub fn release(&mut self, entity: &EntityRef) -> RegistryChange {
        match self.entries.get_mut(entity) {
            Some(refcount) if *refcount > 1 => {
                *refcount -= 1;
                RegistryChange::Released { refcount: *refcount }
            }
            Some(_) => {
                self.entries.remove(entity);
                RegistryChange::Removed
            }
            None => RegistryChange::Unknown,
        }
    }

    pub fn refcount(&self, entity: &EntityRef) -> u32 {
        self.entries.get(entity).copied().unwrap_or(0)
    }

    /// Registered entities in a stable order, used to replay subscriptions
    /// after a reconnect
    pub fn entities(&self) -> Vec<EntityRef> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(id: &str) -> EntityRef {
        EntityRef::new("course", id)
    }

    #[test]
    fn test_first_acquire_adds() {
        let mut registry = SubscriptionRegistry::new();
        assert_eq!(registry.acquire(&course("c1")), RegistryChange::Added);
        assert_eq!(registry.refcount(&course("c1")), 1);
    }

    #[test]
    fn test_duplicate_acquire_retains() {
        let mut registry = SubscriptionRegistry::new();
        registry.acquire(&course("c1"));
        assert_eq!(
            registry.acquire(&course("c1")),
            RegistryChange::Retained { refcount: 2 }
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_only_last_release_removes() {
        let mut registry = SubscriptionRegistry::new();
        for _ in 0..3 {
            registry.acquire(&course("c1"));
        }

        assert_eq!(
            registry.release(&course("c1")),
            RegistryChange::Released { refcount: 2 }
        );
        assert_eq!(
            registry.release(&course("c1")),
            RegistryChange::Released { refcount: 1 }
        );
        assert_eq!(registry.release(&course("c1")), RegistryChange::Removed);
        assert!(registry.is_empty());
        assert_eq!(registry.refcount(&course("c1")), 0);
    }

    #[test]
    fn test_release_unknown_is_noop() {
        let mut registry = SubscriptionRegistry::new();
        assert_eq!(registry.release(&course("ghost")), RegistryChange::Unknown);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_wire_visibility() {
        assert!(RegistryChange::Added.is_wire_visible());
        assert!(RegistryChange::Removed.is_wire_visible());
        assert!(!RegistryChange::Retained { refcount: 2 }.is_wire_visible());
        assert!(!RegistryChange::Unknown.is_wire_visible());
    }

    #[test]
    fn test_entities_are_sorted() {
        let mut registry = SubscriptionRegistry::new();
        registry.acquire(&EntityRef::new("session", "s1"));
        registry.acquire(&course("c2"));
        registry.acquire(&course("c1"));

        let keys: Vec<String> = registry.entities().iter().map(|e| e.to_string()).collect();
        assert_eq!(keys, vec!["course:c1", "course:c2", "session:s1"]);
    }
}
