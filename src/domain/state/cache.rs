//! Identity-keyed entity cache with fine-grained change notifications.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// A mutation observed on a cache, with the fields it touched.
///
/// Watchers use this to react to exactly what changed instead of diffing
/// whole entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheChange<K> {
    /// The whole cache was replaced from a `Ready` payload.
    Loaded {
        /// Number of entries after the load.
        count: usize,
    },
    /// An entry was created or replaced.
    Inserted(K),
    /// An existing entry was patched in place.
    Updated {
        /// Key of the patched entry.
        key: K,
        /// Names of the fields that changed.
        fields: Vec<&'static str>,
    },
    /// An entry was deleted.
    Removed(K),
    /// All entries were discarded at teardown.
    Cleared,
}

/// Identity-keyed store of one entity kind.
///
/// Entries are only ever patched in place through [`Cache::update`]; the
/// key-to-entry binding created by [`Cache::insert`] or [`Cache::bulk_load`]
/// survives every patch, so a consumer that re-reads a key always observes
/// the latest version of the same entry. Handles are cheap to clone and share
/// the underlying store.
pub struct Cache<K, V> {
    name: &'static str,
    entries: Arc<RwLock<HashMap<K, V>>>,
    changes: broadcast::Sender<CacheChange<K>>,
}

impl<K, V> Clone for Cache<K, V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            entries: Arc::clone(&self.entries),
            changes: self.changes.clone(),
        }
    }
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    /// Creates an empty cache. `name` labels log lines and nothing else.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            name,
            entries: Arc::new(RwLock::new(HashMap::new())),
            changes,
        }
    }

    /// Subscribes to mutations applied after this call.
    #[must_use]
    pub fn watch(&self) -> broadcast::Receiver<CacheChange<K>> {
        self.changes.subscribe()
    }

    /// Replaces the entire cache contents. Used only on `Ready`.
    pub fn bulk_load(&self, entries: impl IntoIterator<Item = (K, V)>) {
        let mut guard = self.entries.write();
        guard.clear();
        guard.extend(entries);
        let count = guard.len();
        drop(guard);

        debug!(cache = self.name, count, "bulk loaded");
        let _ = self.changes.send(CacheChange::Loaded { count });
    }

    /// Creates or replaces a single entry.
    pub fn insert(&self, key: K, value: V) {
        self.entries.write().insert(key.clone(), value);
        let _ = self.changes.send(CacheChange::Inserted(key));
    }

    /// Patches an existing entry in place.
    ///
    /// `patch` mutates the entry and reports the names of the fields it
    /// changed. An update for an absent key is dropped with a debug log,
    /// never an error: event delivery races entity fetches, and a missed
    /// patch must not take the pipeline down. Returns whether the entry
    /// existed.
    pub fn update(&self, key: &K, patch: impl FnOnce(&mut V) -> Vec<&'static str>) -> bool {
        let mut guard = self.entries.write();
        let Some(entry) = guard.get_mut(key) else {
            drop(guard);
            debug!(cache = self.name, key = ?key, "update for unknown entry dropped");
            return false;
        };

        let fields = patch(entry);
        drop(guard);

        if !fields.is_empty() {
            let _ = self.changes.send(CacheChange::Updated {
                key: key.clone(),
                fields,
            });
        }
        true
    }

    /// Deletes an entry, reporting whether something was actually removed so
    /// call sites can avoid emitting duplicate delete notifications.
    pub fn remove(&self, key: &K) -> bool {
        let removed = self.entries.write().remove(key).is_some();
        if removed {
            let _ = self.changes.send(CacheChange::Removed(key.clone()));
        } else {
            debug!(cache = self.name, key = ?key, "remove for unknown entry dropped");
        }
        removed
    }

    /// Drops every entry for which `keep` returns false, notifying watchers
    /// per removed key. Returns the number of removed entries.
    pub fn retain(&self, mut keep: impl FnMut(&K, &V) -> bool) -> usize {
        let mut removed = Vec::new();
        self.entries.write().retain(|key, value| {
            let keeping = keep(key, value);
            if !keeping {
                removed.push(key.clone());
            }
            keeping
        });

        for key in &removed {
            let _ = self.changes.send(CacheChange::Removed(key.clone()));
        }
        removed.len()
    }

    /// Clones the entry for `key` out of the cache.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.read().get(key).cloned()
    }

    /// Runs `read` against the entry for `key` without cloning it.
    pub fn with<R>(&self, key: &K, read: impl FnOnce(&V) -> R) -> Option<R> {
        self.entries.read().get(key).map(read)
    }

    /// Whether an entry exists for `key`.
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Snapshot of every key currently cached.
    #[must_use]
    pub fn keys(&self) -> Vec<K> {
        self.entries.read().keys().cloned().collect()
    }

    /// Discards every entry. Used only at teardown.
    pub fn clear(&self) {
        self.entries.write().clear();
        let _ = self.changes.send(CacheChange::Cleared);
    }
}
