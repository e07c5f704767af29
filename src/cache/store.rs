//! Result Store: a size-bounded, priority-aware key/value store with
//! sliding/absolute expiration and post-eviction callbacks.
//!
//! Generic over the stored value so the [`crate::cache::execution_cache`]
//! layer can wrap it with tool-result semantics without this module
//! knowing anything about tools. Sharded with [`dashmap::DashMap`] so
//! `try_get` on unrelated keys never blocks on the same lock.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Relative eviction priority. Ordered so `Low < Normal < High < NeverEvict`
/// — eviction sorts candidates ascending by priority and evicts from the
/// head, so `NeverEvict` entries sort last and are additionally filtered
/// out of the candidate set entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Low,
    Normal,
    High,
    NeverEvict,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

/// Why an entry left the store, passed to eviction callbacks (glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    Removed,
    Replaced,
    Expired,
    Capacity,
    None,
}

/// A callback invoked after an entry leaves the store. Invoked outside
/// any store lock — callbacks must never try to re-enter the store.
pub type EvictionCallback = Arc<dyn Fn(&str, EvictionReason) + Send + Sync>;

/// Options accepted by [`ResultStore::set`].
#[derive(Clone, Default)]
pub struct SetOptions {
    pub absolute_expiration: Option<DateTime<Utc>>,
    pub sliding_window: Option<Duration>,
    pub priority: Priority,
    pub size_bytes: usize,
    /// Opaque owner tag; the execution cache layer stores the tool id here.
    pub tool_id: Option<String>,
    /// Keys this entry depends on, for the execution cache's invalidation
    /// graph. The store itself does not interpret these.
    pub dependencies: BTreeSet<String>,
    pub callbacks: Vec<EvictionCallback>,
}

struct Entry<V> {
    value: V,
    tool_id: Option<String>,
    priority: Priority,
    dependencies: BTreeSet<String>,
    sliding_window: Option<Duration>,
    size_bytes: usize,
    expires_at: Option<DateTime<Utc>>,
    last_accessed: DateTime<Utc>,
    created_at: DateTime<Utc>,
    hit_count: u64,
    callbacks: Vec<EvictionCallback>,
}

/// A read-only snapshot of an entry's bookkeeping fields, used by the
/// execution cache to compute statistics and by tests.
#[derive(Debug, Clone)]
pub struct EntrySnapshot {
    pub key: String,
    pub tool_id: Option<String>,
    pub priority: Priority,
    pub size_bytes: usize,
    pub expires_at: Option<DateTime<Utc>>,
    pub hit_count: u64,
    pub last_accessed: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

pub struct ResultStore<V: Clone + Send + Sync + 'static> {
    entries: DashMap<String, Entry<V>>,
    max_size_bytes: usize,
    current_size_bytes: AtomicUsize,
    cleanup_interval: Duration,
}

impl<V: Clone + Send + Sync + 'static> ResultStore<V> {
    pub fn new(max_size_bytes: usize, cleanup_interval: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_size_bytes,
            current_size_bytes: AtomicUsize::new(0),
            cleanup_interval,
        }
    }

    pub fn max_size_bytes(&self) -> usize {
        self.max_size_bytes
    }

    pub fn cleanup_interval(&self) -> Duration {
        self.cleanup_interval
    }

    /// Insert or replace `key`. Fires `Replaced` callbacks on an existing
    /// key before installing the new value, then evicts by priority/LRU
    /// if the incoming entry would push the store over `max_size_bytes`.
    /// A single entry whose own size exceeds `max_size_bytes` is still
    /// accepted — the store over-commits rather than rejecting the write.
    pub fn set(&self, key: impl Into<String>, value: V, options: SetOptions) {
        let key = key.into();
        let now = Utc::now();

        let expires_at = options.absolute_expiration.or_else(|| {
            options.sliding_window.map(|w| now + chrono::Duration::from_std(w).unwrap_or_default())
        });

        let mut fired: Vec<(String, EvictionReason, Vec<EvictionCallback>)> = Vec::new();

        if let Some((_, old)) = self.entries.remove(&key) {
            self.current_size_bytes.fetch_sub(old.size_bytes, Ordering::SeqCst);
            fired.push((key.clone(), EvictionReason::Replaced, old.callbacks));
        }

        self.make_room(options.size_bytes, &mut fired);

        let entry = Entry {
            value,
            tool_id: options.tool_id,
            priority: options.priority,
            dependencies: options.dependencies,
            sliding_window: options.sliding_window,
            size_bytes: options.size_bytes,
            expires_at,
            last_accessed: now,
            created_at: now,
            hit_count: 0,
            callbacks: options.callbacks,
        };
        self.entries.insert(key, entry);
        self.current_size_bytes.fetch_add(options.size_bytes, Ordering::SeqCst);

        Self::fire_all(fired);
    }

    fn make_room(&self, incoming_size: usize, fired: &mut Vec<(String, EvictionReason, Vec<EvictionCallback>)>) {
        if self.current_size_bytes.load(Ordering::SeqCst) + incoming_size <= self.max_size_bytes {
            return;
        }

        let mut candidates: Vec<(String, Priority, DateTime<Utc>)> = self
            .entries
            .iter()
            .filter(|e| e.priority != Priority::NeverEvict)
            .map(|e| (e.key().clone(), e.priority, e.last_accessed))
            .collect();
        candidates.sort_by(|a, b| a.1.cmp(&b.1).then(a.2.cmp(&b.2)));

        for (key, _, _) in candidates {
            if self.current_size_bytes.load(Ordering::SeqCst) + incoming_size <= self.max_size_bytes {
                break;
            }
            if let Some((_, evicted)) = self.entries.remove(&key) {
                self.current_size_bytes.fetch_sub(evicted.size_bytes, Ordering::SeqCst);
                fired.push((key, EvictionReason::Capacity, evicted.callbacks));
            }
        }
    }

    /// Look up `key`. An expired entry is treated as a miss and removed
    /// (firing `Expired`). On a live hit with a sliding window, refreshes
    /// `expires_at` and `last_accessed`, and increments `hit_count`.
    pub fn try_get(&self, key: &str) -> (bool, Option<V>) {
        let now = Utc::now();

        let mut expired: Option<(String, Vec<EvictionCallback>)> = None;
        let result = match self.entries.get_mut(key) {
            Some(mut entry) => {
                if let Some(expires_at) = entry.expires_at {
                    if expires_at <= now {
                        expired = Some((key.to_string(), Vec::new()));
                        None
                    } else {
                        if let Some(window) = entry.sliding_window {
                            entry.expires_at =
                                Some(now + chrono::Duration::from_std(window).unwrap_or_default());
                        }
                        entry.last_accessed = now;
                        entry.hit_count += 1;
                        Some(entry.value.clone())
                    }
                } else {
                    entry.last_accessed = now;
                    entry.hit_count += 1;
                    Some(entry.value.clone())
                }
            }
            None => None,
        };

        if let Some((k, _)) = expired {
            self.remove_with_reason(&k, EvictionReason::Expired);
            return (false, None);
        }

        (result.is_some(), result)
    }

    /// Current `hit_count` of `key`, without refreshing sliding expiry.
    pub fn hit_count(&self, key: &str) -> Option<u64> {
        self.entries.get(key).map(|e| e.hit_count)
    }

    pub fn last_accessed(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries.get(key).map(|e| e.last_accessed)
    }

    pub fn created_at(&self, key: &str) -> Option<DateTime<Utc>> {
        self.entries.get(key).map(|e| e.created_at)
    }

    pub fn expires_at(&self, key: &str) -> Option<Option<DateTime<Utc>>> {
        self.entries.get(key).map(|e| e.expires_at)
    }

    pub fn tool_id_of(&self, key: &str) -> Option<Option<String>> {
        self.entries.get(key).map(|e| e.tool_id.clone())
    }

    pub fn dependencies_of(&self, key: &str) -> Option<BTreeSet<String>> {
        self.entries.get(key).map(|e| e.dependencies.clone())
    }

    pub fn remove(&self, key: &str) {
        self.remove_with_reason(key, EvictionReason::Removed);
    }

    fn remove_with_reason(&self, key: &str, reason: EvictionReason) {
        if let Some((_, entry)) = self.entries.remove(key) {
            self.current_size_bytes.fetch_sub(entry.size_bytes, Ordering::SeqCst);
            Self::fire(key, reason, entry.callbacks);
        }
    }

    /// Remove every entry, firing `Removed` callbacks for each.
    pub fn clear(&self) {
        let keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        for key in keys {
            self.remove_with_reason(&key, EvictionReason::Removed);
        }
    }

    /// Sweep and remove all currently-expired entries. Intended to be
    /// called from a periodic background task running every
    /// `cleanup_interval`.
    pub fn run_cleanup(&self) -> usize {
        let now = Utc::now();
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.expires_at.map(|exp| exp <= now).unwrap_or(false))
            .map(|e| e.key().clone())
            .collect();
        let count = expired.len();
        for key in expired {
            self.remove_with_reason(&key, EvictionReason::Expired);
        }
        count
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn current_size_bytes(&self) -> usize {
        self.current_size_bytes.load(Ordering::SeqCst)
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    pub fn snapshot(&self) -> Vec<EntrySnapshot> {
        self.entries
            .iter()
            .map(|e| EntrySnapshot {
                key: e.key().clone(),
                tool_id: e.tool_id.clone(),
                priority: e.priority,
                size_bytes: e.size_bytes,
                expires_at: e.expires_at,
                hit_count: e.hit_count,
                last_accessed: e.last_accessed,
                created_at: e.created_at,
            })
            .collect()
    }

    fn fire(key: &str, reason: EvictionReason, callbacks: Vec<EvictionCallback>) {
        for cb in callbacks {
            cb(key, reason);
        }
    }

    fn fire_all(fired: Vec<(String, EvictionReason, Vec<EvictionCallback>)>) {
        for (key, reason, callbacks) in fired {
            Self::fire(&key, reason, callbacks);
        }
    }

    /// Spawn the periodic cleanup task on `cleanup_interval`. Returns the
    /// `JoinHandle` so the caller (the lifecycle manager, typically) can
    /// abort it on shutdown.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()>
    where
        V: 'static,
    {
        let store = Arc::clone(self);
        let interval = store.cleanup_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let removed = store.run_cleanup();
                if removed > 0 {
                    tracing::debug!(removed, "result store cleanup swept expired entries");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn opts(size: usize, priority: Priority) -> SetOptions {
        SetOptions {
            size_bytes: size,
            priority,
            ..Default::default()
        }
    }

    #[test]
    fn basic_set_get_roundtrip() {
        let store: ResultStore<i32> = ResultStore::new(1024, Duration::from_secs(60));
        store.set("a", 42, opts(8, Priority::Normal));
        let (found, value) = store.try_get("a");
        assert!(found);
        assert_eq!(value, Some(42));
    }

    #[test]
    fn clear_resets_count_and_size() {
        let store: ResultStore<i32> = ResultStore::new(1024, Duration::from_secs(60));
        store.set("a", 1, opts(8, Priority::Normal));
        store.set("b", 2, opts(8, Priority::Normal));
        store.clear();
        assert_eq!(store.count(), 0);
        assert_eq!(store.current_size_bytes(), 0);
    }

    #[test]
    fn never_evict_survives_capacity_pressure() {
        let store: ResultStore<i32> = ResultStore::new(20, Duration::from_secs(60));
        store.set("keep", 1, opts(10, Priority::NeverEvict));
        store.set("a", 2, opts(10, Priority::Low));
        store.set("b", 3, opts(10, Priority::Low));
        let (found, _) = store.try_get("keep");
        assert!(found, "NeverEvict entry must never be evicted under capacity pressure");
    }

    #[test]
    fn eviction_prefers_lower_priority_then_lru() {
        let store: ResultStore<i32> = ResultStore::new(20, Duration::from_secs(60));
        store.set("low", 1, opts(10, Priority::Low));
        store.set("high", 2, opts(10, Priority::High));
        // Pushes total to 30 > 20: must evict "low" first.
        store.set("new", 3, opts(10, Priority::Normal));
        assert_eq!(store.try_get("low").0, false);
        assert_eq!(store.try_get("high").0, true);
    }

    #[test]
    fn replace_fires_replaced_callback() {
        let count = Arc::new(AtomicU32::new(0));
        let count2 = Arc::clone(&count);
        let cb: EvictionCallback = Arc::new(move |_key, reason| {
            if reason == EvictionReason::Replaced {
                count2.fetch_add(1, Ordering::SeqCst);
            }
        });
        let store: ResultStore<i32> = ResultStore::new(1024, Duration::from_secs(60));
        let mut o = opts(8, Priority::Normal);
        o.callbacks.push(cb);
        store.set("a", 1, o);
        store.set("a", 2, opts(8, Priority::Normal));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn absolute_expiration_is_respected() {
        let store: ResultStore<i32> = ResultStore::new(1024, Duration::from_secs(60));
        let mut o = opts(8, Priority::Normal);
        o.absolute_expiration = Some(Utc::now() - chrono::Duration::seconds(1));
        store.set("a", 1, o);
        assert_eq!(store.try_get("a").0, false);
    }
}
