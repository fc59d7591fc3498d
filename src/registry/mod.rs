//! In-memory stream registry.
//!
//! Process-local cache of transient per-stream state: the liveness state
//! machine and outstanding notification handles. Rebuilt from the store at
//! startup and kept in sync incrementally as subscriptions change. Nothing
//! in here is ever persisted.

use dashmap::DashMap;
use tracing::debug;

use crate::database::models::StreamRecord;
use crate::dispatcher::NotificationHandle;
use crate::monitor::state::StreamState;
use crate::provider::StreamId;

/// Transient state for one tracked stream.
#[derive(Debug, Clone)]
pub struct TrackedStream {
    pub id: StreamId,
    /// Display name, mirrored from the store and refreshed from provider
    /// data by the polling engine.
    pub name: String,
    pub state: StreamState,
    /// Handles of online notifications awaiting their offline edit.
    pub notifications: Vec<NotificationHandle>,
}

impl TrackedStream {
    fn new(id: StreamId, name: String) -> Self {
        Self {
            id,
            name,
            state: StreamState::new(),
            notifications: Vec::new(),
        }
    }
}

/// Registry of all streams the polling engine must watch.
///
/// Entry-level locking via `DashMap` keeps mutations single-writer-per-id;
/// the polling loop and the command handlers share the map safely as long
/// as entry locks are held only for short, non-blocking sections.
pub struct StreamRegistry {
    entries: DashMap<StreamId, TrackedStream>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Replace the registry contents with one fresh entry per stream.
    ///
    /// Called once at startup after the store becomes ready.
    pub fn load(&self, streams: Vec<StreamRecord>) {
        self.entries.clear();
        let count = streams.len();
        for stream in streams {
            self.entries
                .insert(stream.id, TrackedStream::new(stream.id, stream.name));
        }
        debug!(count, "registry loaded");
    }

    /// Add a stream entry. Idempotent per id: an existing entry (and its
    /// transient state) is left untouched.
    pub fn register(&self, stream: &StreamRecord) {
        self.entries
            .entry(stream.id)
            .or_insert_with(|| TrackedStream::new(stream.id, stream.name.clone()));
    }

    /// Remove a stream entry once its last subscription is gone.
    ///
    /// Skipping this leaks a live polling target indefinitely, so both the
    /// subscription-removal path and the destination-deletion path call it.
    pub fn unregister(&self, id: StreamId) -> bool {
        let removed = self.entries.remove(&id).is_some();
        if removed {
            debug!(stream_id = id, "stream unregistered");
        }
        removed
    }

    pub fn contains(&self, id: StreamId) -> bool {
        self.entries.contains_key(&id)
    }

    /// All registered stream ids, the polling engine's query set.
    pub fn ids(&self) -> Vec<StreamId> {
        let mut ids: Vec<StreamId> = self.entries.iter().map(|e| *e.key()).collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_online(&self, id: StreamId) -> bool {
        self.entries
            .get(&id)
            .map(|e| e.state.is_online())
            .unwrap_or(false)
    }

    pub fn name_of(&self, id: StreamId) -> Option<String> {
        self.entries.get(&id).map(|e| e.name.clone())
    }

    /// Run a short mutation against one entry under its lock.
    ///
    /// Returns `None` when the stream is not registered. The closure must
    /// not block or perform I/O.
    pub fn with_entry<R>(
        &self,
        id: StreamId,
        f: impl FnOnce(&mut TrackedStream) -> R,
    ) -> Option<R> {
        self.entries.get_mut(&id).map(|mut entry| f(&mut entry))
    }
}

impl Default for StreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, name: &str) -> StreamRecord {
        StreamRecord {
            id,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_load_replaces_contents() {
        let registry = StreamRegistry::new();
        registry.load(vec![record(1, "a"), record(2, "b")]);
        assert_eq!(registry.len(), 2);

        registry.load(vec![record(3, "c")]);
        assert_eq!(registry.ids(), vec![3]);
        assert!(!registry.contains(1));
    }

    #[test]
    fn test_register_is_idempotent() {
        let registry = StreamRegistry::new();
        registry.register(&record(1, "a"));

        // Mark the stream online, then re-register: transient state must
        // survive.
        registry.with_entry(1, |s| s.state.observe_present());
        registry.register(&record(1, "a"));
        assert!(registry.is_online(1));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unregister() {
        let registry = StreamRegistry::new();
        registry.register(&record(1, "a"));
        assert!(registry.unregister(1));
        assert!(!registry.unregister(1));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_with_entry_on_unknown_stream() {
        let registry = StreamRegistry::new();
        assert_eq!(registry.with_entry(99, |_| ()), None);
    }
}
