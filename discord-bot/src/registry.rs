//! Keyed store of live objects, shared by `Arc` between components.
//!
//! Replacing or removing an entry never interrupts work already running on the old
//! value; callers holding an `Arc` finish against the orphaned object.

use crate::session::ConversationSession;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

pub struct Registry<T> {
    entries: DashMap<u64, Arc<T>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: u64) -> Option<Arc<T>> {
        self.entries.get(&key).map(|e| Arc::clone(e.value()))
    }

    /// Returns the existing value or stores `value`. When two callers race, the first
    /// insert wins and both get the same `Arc`.
    pub fn get_or_insert(&self, key: u64, value: T) -> Arc<T> {
        Arc::clone(self.entries.entry(key).or_insert_with(|| Arc::new(value)).value())
    }

    pub fn get_or_insert_with(&self, key: u64, make: impl FnOnce() -> T) -> Arc<T> {
        Arc::clone(self.entries.entry(key).or_insert_with(|| Arc::new(make())).value())
    }

    /// Stores `value`, returning the replaced entry.
    pub fn insert(&self, key: u64, value: Arc<T>) -> Option<Arc<T>> {
        self.entries.insert(key, value)
    }

    pub fn remove(&self, key: u64) -> Option<Arc<T>> {
        self.entries.remove(&key).map(|(_, v)| v)
    }

    /// Snapshot of all values; the map is not locked while callers use them.
    pub fn list(&self) -> Vec<Arc<T>> {
        self.entries.iter().map(|e| Arc::clone(e.value())).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Conversation sessions keyed by channel id.
pub type SessionRegistry = Registry<ConversationSession>;

impl Registry<ConversationSession> {
    /// Drops the channel's session and its pending debounce timer. Returns the number of
    /// history turns discarded.
    pub async fn clear(&self, channel_id: u64) -> usize {
        let Some(session) = self.remove(channel_id) else {
            return 0;
        };
        session.cancel_pending().await;
        let discarded = session.history_len().await;
        info!(channel_id, discarded, "Session cleared");
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_insert_keeps_first_value() {
        let registry: Registry<String> = Registry::new();
        let first = registry.get_or_insert(1, "a".to_string());
        let second = registry.get_or_insert_with(1, || "b".to_string());
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    /// **Test: Removing an entry leaves existing handles usable.**
    #[test]
    fn test_remove_orphans_value() {
        let registry: Registry<String> = Registry::new();
        let held = registry.get_or_insert(7, "live".to_string());
        let removed = registry.remove(7).unwrap();
        assert!(Arc::ptr_eq(&held, &removed));
        assert!(registry.get(7).is_none());
        assert_eq!(held.as_str(), "live");
        assert!(registry.is_empty());
    }

    #[test]
    fn test_insert_replaces() {
        let registry: Registry<u32> = Registry::new();
        registry.insert(1, Arc::new(1));
        let old = registry.insert(1, Arc::new(2));
        assert_eq!(old.as_deref(), Some(&1));
        assert_eq!(registry.list().len(), 1);
        assert_eq!(*registry.get(1).unwrap(), 2);
    }
}
