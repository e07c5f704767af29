//! End-to-end scenarios for the execution cache and the caching executor
//! decorator sitting in front of it.

use std::sync::Arc;
use std::time::Duration;

use toolforge::builtin::CalculatorTool;
use toolforge::cache::{CacheSetOptions, ExecutionCache};
use toolforge::caching_executor::CachingExecutor;
use toolforge::executor::{ExecutionContext, Executor, ExecutionResult, ToolExecutor};
use toolforge::registry::ToolRegistry;

fn registry() -> ToolRegistry {
    let registry = ToolRegistry::new();
    registry.register(CalculatorTool::new()).unwrap();
    registry
}

fn inner_executor() -> Arc<dyn Executor> {
    Arc::new(ToolExecutor::new(registry()))
}

#[tokio::test]
async fn caching_executor_is_a_pass_through_when_caching_is_disabled() {
    let cache = ExecutionCache::new(1 << 20, Duration::from_secs(60));
    let executor = CachingExecutor::new(inner_executor(), cache.clone());

    let input = serde_json::json!({"operation": "add", "a": 1.0, "b": 2.0});
    let result = executor.execute_tool("calculator", input, None).await.unwrap();
    assert!(result.success);
    assert_eq!(cache.statistics().await.total_entries, 0);
}

#[tokio::test]
async fn caching_executor_caches_a_result_when_caching_is_enabled_on_the_context() {
    let cache = ExecutionCache::new(1 << 20, Duration::from_secs(60));
    let executor = CachingExecutor::new(inner_executor(), cache.clone());

    let input = serde_json::json!({"operation": "add", "a": 1.0, "b": 2.0});
    let context = ExecutionContext::default().enable_caching();

    let first = executor.execute_tool("calculator", input.clone(), Some(context.clone())).await.unwrap();
    assert!(first.success);
    assert_eq!(cache.statistics().await.total_entries, 1);

    let second = executor.execute_tool("calculator", input, Some(context)).await.unwrap();
    assert!(second.success);
    assert_eq!(second.data, first.data);
    assert_eq!(cache.statistics().await.hit_count, 1);
}

#[tokio::test]
async fn cache_invalidation_by_tool_forces_a_fresh_execution() {
    let cache = ExecutionCache::new(1 << 20, Duration::from_secs(60));
    let executor = CachingExecutor::new(inner_executor(), cache.clone());

    let context = ExecutionContext::default().enable_caching();
    let input = serde_json::json!({"operation": "multiply", "a": 3.0, "b": 4.0});

    executor.execute_tool("calculator", input.clone(), Some(context.clone())).await.unwrap();
    assert_eq!(cache.statistics().await.total_entries, 1);

    let invalidated = cache.invalidate_by_tool("calculator").await;
    assert_eq!(invalidated, 1);
    assert_eq!(cache.statistics().await.total_entries, 0);

    executor.execute_tool("calculator", input, Some(context)).await.unwrap();
    assert_eq!(cache.statistics().await.total_entries, 1);
}

#[tokio::test]
async fn expired_entries_are_swept_by_run_cleanup() {
    let cache = ExecutionCache::new(1 << 20, Duration::from_secs(60));
    let result = ExecutionResult::success("calculator".to_string(), serde_json::json!({"result": 7.0}), Duration::from_millis(1), 0);

    let mut opts = CacheSetOptions::default();
    opts.ttl = Some(Duration::from_millis(1));
    cache.set("k", "calculator", result, opts).await;

    tokio::time::sleep(Duration::from_millis(20)).await;
    let removed = cache.run_cleanup();
    assert_eq!(removed, 1);
    assert!(cache.get("k").await.is_none());
}

#[tokio::test]
async fn dependency_chain_invalidation_removes_every_dependent_entry() {
    let cache = ExecutionCache::new(1 << 20, Duration::from_secs(60));
    let result = ExecutionResult::success("calculator".to_string(), serde_json::json!({"result": 1.0}), Duration::from_millis(1), 0);

    cache.set("base", "calculator", result.clone(), CacheSetOptions::default()).await;

    let mut mid_opts = CacheSetOptions::default();
    mid_opts.dependencies.insert("base".to_string());
    cache.set("mid", "calculator", result.clone(), mid_opts).await;

    let mut leaf_opts = CacheSetOptions::default();
    leaf_opts.dependencies.insert("mid".to_string());
    cache.set("leaf", "calculator", result, leaf_opts).await;

    let removed = cache.invalidate("base").await;
    assert_eq!(removed, 3);
    assert!(cache.get("base").await.is_none());
    assert!(cache.get("mid").await.is_none());
    assert!(cache.get("leaf").await.is_none());
}
