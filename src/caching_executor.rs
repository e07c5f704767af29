//! Caching Executor: a decorator over any [`Executor`] that consults the
//! [`ExecutionCache`] on read and stores on write, forwarding every other
//! operation and event stream straight through.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::cache::{CacheSetOptions, ExecutionCache, Priority};
use crate::error::ToolResult;
use crate::executor::{
    Executor, ExecutionCompletedEvent, ExecutionContext, ExecutionRequest, ExecutionResult, ExecutionStartedEvent,
    ExecutionStatistics, ResourceUsage, RunningExecutionInfo, SecurityViolationEvent,
};
use crate::fingerprint::FingerprintContext;
use crate::parameters::parameter_map_from_json;

/// Wraps `inner` with the [`ExecutionCache`]. Caching only engages when
/// `request.context.additional_data["EnableCaching"] == true` (spec
/// §4.4 "Caching activation"); otherwise behavior is a pure pass-through.
pub struct CachingExecutor {
    inner: Arc<dyn Executor>,
    cache: Arc<ExecutionCache>,
}

impl CachingExecutor {
    pub fn new(inner: Arc<dyn Executor>, cache: Arc<ExecutionCache>) -> Self {
        Self { inner, cache }
    }

    fn fingerprint_context(context: &ExecutionContext) -> FingerprintContext {
        FingerprintContext {
            user_id: context.user_id.clone(),
            env: context.env.clone(),
            version: context.version.clone(),
            ..Default::default()
        }
    }

    fn cache_options(context: &ExecutionContext) -> CacheSetOptions {
        let ttl = context
            .additional_data
            .get("CacheTimeToLive")
            .and_then(|v| v.as_u64())
            .map(Duration::from_secs);

        let priority = match context.additional_data.get("CachePriority").and_then(|v| v.as_str()) {
            Some("low") => Priority::Low,
            Some("high") => Priority::High,
            Some("never_evict") | Some("never-evict") => Priority::NeverEvict,
            _ => Priority::Normal,
        };

        let cache_failures = context
            .additional_data
            .get("CacheFailures")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let dependencies: BTreeSet<String> = context
            .additional_data
            .get("CacheDependencies")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        CacheSetOptions {
            ttl,
            priority,
            cache_failures,
            dependencies,
            ..Default::default()
        }
    }
}

#[async_trait]
impl Executor for CachingExecutor {
    async fn execute(&self, request: ExecutionRequest) -> ToolResult<ExecutionResult> {
        if !request.context.caching_enabled() {
            return self.inner.execute(request).await;
        }

        let params = match parameter_map_from_json(&request.params) {
            Some(p) => p,
            None => Default::default(),
        };
        let fp_context = Self::fingerprint_context(&request.context);
        let key = self.cache.generate_cache_key(&request.tool_id, &params, Some(&fp_context));

        if let Some(cached) = self.cache.get(&key).await {
            let mut result = cached.result.clone();
            result.success = cached.result.success;
            result
                .metadata
                .insert("cache_hit".to_string(), serde_json::Value::Bool(true));
            result
                .metadata
                .insert("cached_at".to_string(), serde_json::json!(cached.cached_at));
            result
                .metadata
                .insert("hit_count".to_string(), serde_json::json!(cached.hit_count));
            return Ok(result);
        }

        let tool_id = request.tool_id.clone();
        let context = request.context.clone();
        let result = self.inner.execute(request).await?;

        let options = Self::cache_options(&context);
        self.cache.set(key, tool_id, result.clone(), options).await;

        Ok(result)
    }

    async fn validate(&self, request: &ExecutionRequest) -> Vec<String> {
        self.inner.validate(request).await
    }

    async fn estimate_resources(&self, tool_id: &str, params: &serde_json::Value) -> Option<ResourceUsage> {
        self.inner.estimate_resources(tool_id, params).await
    }

    async fn cancel_by_correlation_id(&self, correlation_id: &str) -> usize {
        self.inner.cancel_by_correlation_id(correlation_id).await
    }

    async fn running_executions(&self) -> Vec<RunningExecutionInfo> {
        self.inner.running_executions().await
    }

    async fn statistics(&self) -> ExecutionStatistics {
        self.inner.statistics().await
    }

    fn subscribe_started(&self) -> broadcast::Receiver<ExecutionStartedEvent> {
        self.inner.subscribe_started()
    }

    fn subscribe_completed(&self) -> broadcast::Receiver<ExecutionCompletedEvent> {
        self.inner.subscribe_completed()
    }

    fn subscribe_security_violations(&self) -> broadcast::Receiver<SecurityViolationEvent> {
        self.inner.subscribe_security_violations()
    }
}

impl Clone for CachingExecutor {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            cache: Arc::clone(&self.cache),
        }
    }
}
