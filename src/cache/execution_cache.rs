//! Execution Cache: tool-semantic caching on top of the
//! [`crate::cache::store::ResultStore`] — invalidation by key, glob
//! pattern, tool, or dependency, plus statistics.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::cache::store::{EntrySnapshot, EvictionReason, Priority, ResultStore, SetOptions};
use crate::executor::ExecutionResult;
use crate::fingerprint::{self, FingerprintContext};
use crate::parameters::ParameterMap;

/// A cached tool result plus bookkeeping.
///
/// Invariant: `expires_at.is_none()` iff the entry never expires by time.
/// Invariant: `hit_count` is monotonically non-decreasing and
/// `last_accessed >= cached_at` whenever it is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedResult {
    pub key: String,
    pub tool_id: String,
    pub result: ExecutionResult,
    pub cached_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub hit_count: u64,
    pub last_accessed: Option<DateTime<Utc>>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Options accepted by [`ExecutionCache::set`].
#[derive(Clone, Default)]
pub struct CacheSetOptions {
    pub absolute_expiration: Option<DateTime<Utc>>,
    pub ttl: Option<Duration>,
    pub sliding_window: Option<Duration>,
    pub priority: Priority,
    /// If false (the default), a failed `ExecutionResult` is never stored.
    pub cache_failures: bool,
    pub dependencies: BTreeSet<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Aggregate statistics.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheStatistics {
    pub total_entries: usize,
    pub hit_count: u64,
    pub miss_count: u64,
    pub eviction_count: u64,
    pub expired_count: usize,
    pub hit_ratio: f64,
    pub per_tool: HashMap<String, ToolCacheStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ToolCacheStats {
    pub entry_count: usize,
    pub size_bytes: usize,
}

/// Default TTL applied when `set` is called with no explicit expiration
/// Computed expiry: absolute, ttl, sliding, or a default TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

pub struct ExecutionCache {
    store: Arc<ResultStore<CachedResult>>,
    /// Reverse edges: `dep_key -> {dependent_key}`. Invalidating `dep_key`
    /// recursively invalidates everything reachable here.
    dependents: DashMap<String, BTreeSet<String>>,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
    eviction_count: Arc<AtomicU64>,
}

impl ExecutionCache {
    pub fn new(max_size_bytes: usize, cleanup_interval: Duration) -> Arc<Self> {
        let eviction_count = Arc::new(AtomicU64::new(0));
        let store = Arc::new(ResultStore::new(max_size_bytes, cleanup_interval));
        Arc::new(Self {
            store,
            dependents: DashMap::new(),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            eviction_count,
        })
    }

    /// Start the background cleanup sweep. Intended to be
    /// called once by the lifecycle manager at startup.
    pub fn spawn_cleanup_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        self.store.spawn_cleanup_task()
    }

    /// Runs one cleanup sweep synchronously, returning the number of
    /// expired entries removed. Used by [`crate::lifecycle::LifecycleManager`]'s
    /// periodic maintenance in addition to the background task.
    pub fn run_cleanup(&self) -> usize {
        self.store.run_cleanup()
    }

    /// Delegates to [`fingerprint::fingerprint`].
    pub fn generate_cache_key(
        &self,
        tool_id: &str,
        params: &ParameterMap,
        context: Option<&FingerprintContext>,
    ) -> String {
        fingerprint::fingerprint(tool_id, params, context)
    }

    /// Fetch a cached result. Misses increment the miss counter; hits
    /// increment the hit counter and the entry's own `hit_count`.
    ///
    /// Async per spec §4.3/§9: the in-memory implementation completes
    /// synchronously, but the signature stays async so a future
    /// distributed backend can substitute in without a breaking change.
    pub async fn get(&self, key: &str) -> Option<CachedResult> {
        let (found, value) = self.store.try_get(key);
        if found {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            value.map(|mut cached| {
                cached.hit_count = self.store.hit_count(key).unwrap_or(cached.hit_count);
                cached.last_accessed = self.store.last_accessed(key);
                cached
            })
        } else {
            self.miss_count.fetch_add(1, Ordering::Relaxed);
            None
        }
    }

    /// Store `result` under `key`, unless it failed and
    /// `options.cache_failures` is false.
    pub async fn set(&self, key: impl Into<String>, tool_id: impl Into<String>, result: ExecutionResult, options: CacheSetOptions) {
        if !result.success && !options.cache_failures {
            return;
        }

        let key = key.into();
        let tool_id = tool_id.into();
        let now = Utc::now();

        let expires_at = options.absolute_expiration.or_else(|| {
            options
                .ttl
                .or(options.sliding_window)
                .or(Some(DEFAULT_TTL))
                .map(|d| now + chrono::Duration::from_std(d).unwrap_or_default())
        });

        let size_bytes = serde_json::to_vec(&result.data).map(|v| v.len()).unwrap_or(0);

        let cached = CachedResult {
            key: key.clone(),
            tool_id: tool_id.clone(),
            result,
            cached_at: now,
            expires_at,
            hit_count: 0,
            last_accessed: None,
            metadata: options.metadata,
        };

        for dep in &options.dependencies {
            self.dependents.entry(dep.clone()).or_default().insert(key.clone());
        }

        let eviction_count = Arc::clone(&self.eviction_count);
        let callback: crate::cache::store::EvictionCallback = Arc::new(move |_k, reason| {
            if reason == EvictionReason::Capacity {
                eviction_count.fetch_add(1, Ordering::Relaxed);
            }
        });

        self.store.set(
            key,
            cached,
            SetOptions {
                absolute_expiration: expires_at,
                sliding_window: options.sliding_window,
                priority: options.priority,
                size_bytes,
                tool_id: Some(tool_id),
                dependencies: options.dependencies,
                callbacks: vec![callback],
            },
        );
    }

    /// Remove `key` and, transitively, every key that depends on it
    /// Walks the dependency graph transitively. A visited set guards cycles.
    pub async fn invalidate(&self, key: &str) -> usize {
        let mut visited = BTreeSet::new();
        let mut stack = vec![key.to_string()];
        let mut removed = 0usize;

        while let Some(k) = stack.pop() {
            if !visited.insert(k.clone()) {
                continue;
            }
            let existed = self.store.keys().iter().any(|existing| existing == &k);
            self.store.remove(&k);
            if existed {
                removed += 1;
            }
            if let Some((_, dependents)) = self.dependents.remove(&k) {
                stack.extend(dependents);
            }
        }
        removed
    }

    /// Invalidate every key matching a `*`/`?` glob.
    pub async fn invalidate_by_pattern(&self, pattern: &str) -> usize {
        let matching: Vec<String> = self
            .store
            .keys()
            .into_iter()
            .filter(|k| glob_match(pattern, k))
            .collect();
        let mut count = 0;
        for key in matching {
            count += self.invalidate(&key).await;
        }
        count
    }

    /// Invalidate every entry whose stored tool id matches `tool_id`
    /// Used when a tool's results should all be dropped at once.
    pub async fn invalidate_by_tool(&self, tool_id: &str) -> usize {
        let matching: Vec<String> = self
            .store
            .snapshot()
            .into_iter()
            .filter(|e| e.tool_id.as_deref() == Some(tool_id))
            .map(|e| e.key)
            .collect();
        let mut count = 0;
        for key in matching {
            count += self.invalidate(&key).await;
        }
        count
    }

    pub async fn clear(&self) {
        self.store.clear();
        self.dependents.clear();
    }

    pub async fn statistics(&self) -> CacheStatistics {
        let snapshot: Vec<EntrySnapshot> = self.store.snapshot();
        let now = Utc::now();
        let expired_count = snapshot.iter().filter(|e| e.expires_at.map(|exp| exp <= now).unwrap_or(false)).count();

        let mut per_tool: HashMap<String, ToolCacheStats> = HashMap::new();
        for entry in &snapshot {
            if let Some(tool_id) = &entry.tool_id {
                let stats = per_tool.entry(tool_id.clone()).or_default();
                stats.entry_count += 1;
                stats.size_bytes += entry.size_bytes;
            }
        }

        let hit = self.hit_count.load(Ordering::Relaxed);
        let miss = self.miss_count.load(Ordering::Relaxed);
        let hit_ratio = if hit + miss == 0 { 0.0 } else { hit as f64 / (hit + miss) as f64 };

        CacheStatistics {
            total_entries: snapshot.len(),
            hit_count: hit,
            miss_count: miss,
            eviction_count: self.eviction_count.load(Ordering::Relaxed),
            expired_count,
            hit_ratio,
            per_tool,
        }
    }
}

/// Minimal `*`/`?` glob matcher (no `[...]` classes — only the two
/// wildcards are needed here). Implemented with a small DP rather than
/// pulling in a dedicated glob crate for two wildcard characters.
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (plen, tlen) = (p.len(), t.len());
    let mut dp = vec![vec![false; tlen + 1]; plen + 1];
    dp[0][0] = true;
    for i in 1..=plen {
        if p[i - 1] == '*' {
            dp[i][0] = dp[i - 1][0];
        }
    }
    for i in 1..=plen {
        for j in 1..=tlen {
            dp[i][j] = match p[i - 1] {
                '*' => dp[i - 1][j] || dp[i][j - 1],
                '?' => dp[i - 1][j - 1],
                c => dp[i - 1][j - 1] && c == t[j - 1],
            };
        }
    }
    dp[plen][tlen]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_result() -> ExecutionResult {
        ExecutionResult::success("t".to_string(), serde_json::json!({"x": 1}), Duration::from_millis(1), 0)
    }

    #[tokio::test]
    async fn miss_then_hit_updates_statistics() {
        let cache = ExecutionCache::new(1 << 20, Duration::from_secs(60));
        assert!(cache.get("k").await.is_none());
        cache.set("k", "tool_a", ok_result(), CacheSetOptions::default()).await;
        let hit = cache.get("k").await;
        assert!(hit.is_some());
        let stats = cache.statistics().await;
        assert_eq!(stats.hit_count, 1);
        assert_eq!(stats.miss_count, 1);
    }

    #[tokio::test]
    async fn invalidate_by_tool_counts_and_removes() {
        let cache = ExecutionCache::new(1 << 20, Duration::from_secs(60));
        cache.set("a1", "A", ok_result(), CacheSetOptions::default()).await;
        cache.set("a2", "A", ok_result(), CacheSetOptions::default()).await;
        cache.set("a3", "A", ok_result(), CacheSetOptions::default()).await;
        cache.set("b1", "B", ok_result(), CacheSetOptions::default()).await;
        cache.set("b2", "B", ok_result(), CacheSetOptions::default()).await;

        let removed = cache.invalidate_by_tool("A").await;
        assert_eq!(removed, 3);
        assert_eq!(cache.statistics().await.total_entries, 2);
        assert!(cache.get("a1").await.is_none());
    }

    #[tokio::test]
    async fn transitive_dependency_invalidation() {
        let cache = ExecutionCache::new(1 << 20, Duration::from_secs(60));
        cache.set("base", "t", ok_result(), CacheSetOptions::default()).await;
        let mut dep_opts = CacheSetOptions::default();
        dep_opts.dependencies.insert("base".to_string());
        cache.set("derived", "t", ok_result(), dep_opts).await;

        cache.invalidate("base").await;
        assert!(cache.get("base").await.is_none());
        assert!(cache.get("derived").await.is_none());
    }

    #[tokio::test]
    async fn glob_pattern_invalidation() {
        let cache = ExecutionCache::new(1 << 20, Duration::from_secs(60));
        cache.set("user:1:profile", "t", ok_result(), CacheSetOptions::default()).await;
        cache.set("user:2:profile", "t", ok_result(), CacheSetOptions::default()).await;
        cache.set("post:1", "t", ok_result(), CacheSetOptions::default()).await;

        let removed = cache.invalidate_by_pattern("user:?:profile").await;
        assert_eq!(removed, 2);
        assert!(cache.get("post:1").await.is_some());
    }

    #[tokio::test]
    async fn failures_are_not_cached_unless_opted_in() {
        let cache = ExecutionCache::new(1 << 20, Duration::from_secs(60));
        let failure = ExecutionResult::failure("t".to_string(), "boom".to_string(), Duration::from_millis(1), 0);
        cache.set("k", "t", failure.clone(), CacheSetOptions::default()).await;
        assert!(cache.get("k").await.is_none());

        let mut opts = CacheSetOptions::default();
        opts.cache_failures = true;
        cache.set("k", "t", failure, opts).await;
        assert!(cache.get("k").await.is_some());
    }
}
