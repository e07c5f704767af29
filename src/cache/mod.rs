//! Execution Cache subsystem: a size-bounded, priority-aware in-memory
//! cache of tool results, sitting on top of a generic [`store::ResultStore`].

pub mod execution_cache;
pub mod store;

pub use execution_cache::{CacheSetOptions, CacheStatistics, CachedResult, ExecutionCache, ToolCacheStats, DEFAULT_TTL};
pub use store::{EntrySnapshot, EvictionCallback, EvictionReason, Priority, ResultStore, SetOptions};
