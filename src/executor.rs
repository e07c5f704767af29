//! Enhanced tool executor with type-safe builder pattern
//!
//! Implements the "Executor boundary" spec §6 describes: `execute`,
//! `validate`, `estimate_resources`, `cancel_by_correlation_id`,
//! `running_executions`, `statistics`, plus the `ExecutionStarted` /
//! `ExecutionCompleted` / `SecurityViolation` event streams the caching
//! decorator (`caching_executor.rs`) re-publishes.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::error::{error_context, ToolResult};
use crate::registry::ToolRegistry;

/// Per-call state threaded through a tool invocation: correlation id,
/// user/permission context, cancellation, progress reporting, and the
/// cache-control knobs the caching executor reads out of `additional_data`
/// (spec §4.4 "Caching activation").
#[derive(Clone)]
pub struct ExecutionContext {
    pub correlation_id: String,
    pub user_id: Option<String>,
    pub env: Option<String>,
    pub version: Option<String>,
    pub permissions: Vec<String>,
    pub cancellation: CancellationToken,
    pub progress: Option<Arc<dyn Fn(ProgressEvent) + Send + Sync>>,
    /// Free-form bag consumed by the caching executor:
    /// `EnableCaching`, `CacheTimeToLive`, `CachePriority`,
    /// `CacheFailures`, `CacheDependencies` (spec §4.4).
    pub additional_data: HashMap<String, serde_json::Value>,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("correlation_id", &self.correlation_id)
            .field("user_id", &self.user_id)
            .field("permissions", &self.permissions)
            .finish()
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            correlation_id: uuid::Uuid::new_v4().to_string(),
            user_id: None,
            env: None,
            version: None,
            permissions: Vec::new(),
            cancellation: CancellationToken::new(),
            progress: None,
            additional_data: HashMap::new(),
        }
    }
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = id.into();
        self
    }

    pub fn enable_caching(mut self) -> Self {
        self.additional_data
            .insert("EnableCaching".to_string(), serde_json::Value::Bool(true));
        self
    }

    pub fn caching_enabled(&self) -> bool {
        self.additional_data
            .get("EnableCaching")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn report_progress(&self, message: impl Into<String>, percentage: f64) {
        if let Some(cb) = &self.progress {
            cb(ProgressEvent {
                message: message.into(),
                percentage,
                timestamp: Utc::now(),
            });
        }
    }
}

/// Reported via `context.report_progress` and the chain engine's
/// `onProgress` callback (spec §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub message: String,
    pub percentage: f64,
    pub timestamp: DateTime<Utc>,
}

/// A single invocation request (spec §6 "execute(request)").
#[derive(Clone)]
pub struct ExecutionRequest {
    pub tool_id: String,
    pub params: serde_json::Value,
    pub context: ExecutionContext,
}

impl ExecutionRequest {
    pub fn new(tool_id: impl Into<String>, params: serde_json::Value) -> Self {
        Self {
            tool_id: tool_id.into(),
            params,
            context: ExecutionContext::default(),
        }
    }

    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.context = context;
        self
    }
}

/// Execution result with enhanced metadata (spec §3 "Result"; field names
/// follow spec.md exactly: `success`, `data`, `error`, `metadata`, with
/// `duration` kept as `std::time::Duration` — the teacher's idiom
/// throughout `executor.rs`/`monitoring.rs` — and a `duration_ms()`
/// accessor for the spec's `durationMs: number | null`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub tool_id: String,
    pub success: bool,
    pub data: serde_json::Value,
    pub error: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
    pub duration: Duration,
    pub retries: u32,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionResult {
    pub fn success(tool_id: String, data: serde_json::Value, duration: Duration, retries: u32) -> Self {
        Self {
            tool_id,
            success: true,
            data,
            error: None,
            metadata: HashMap::new(),
            duration,
            retries,
            timestamp: Utc::now(),
        }
    }

    pub fn failure(tool_id: String, error: String, duration: Duration, retries: u32) -> Self {
        Self {
            tool_id,
            success: false,
            data: serde_json::Value::Null,
            error: Some(error),
            metadata: HashMap::new(),
            duration,
            retries,
            timestamp: Utc::now(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// `durationMs` in spec.md's wire grammar; `None` only if a caller
    /// constructs a synthetic result without measuring (this crate's own
    /// code paths always measure).
    pub fn duration_ms(&self) -> Option<u64> {
        Some(self.duration.as_millis() as u64)
    }
}

/// A coarse resource estimate (spec §6 `estimateResources`). The core
/// never computes this itself — it is a pass-through hook for a
/// host-supplied resource monitor; `ToolExecutor` always returns `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub estimated_cpu_percent: Option<f64>,
    pub estimated_memory_bytes: Option<u64>,
    pub estimated_duration: Option<Duration>,
}

/// Snapshot of one in-flight execution (spec §6 `runningExecutions`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunningExecutionInfo {
    pub correlation_id: String,
    pub tool_id: String,
    pub started_at: DateTime<Utc>,
}

/// Aggregate counters the executor itself tracks (distinct from — and
/// much coarser than — [`crate::metrics::MetricsCollector`], which is the
/// spec §4.6 subsystem a host wires up separately).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExecutionStatistics {
    pub total_executions: u64,
    pub successful_executions: u64,
    pub failed_executions: u64,
    pub cancelled_executions: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStartedEvent {
    pub correlation_id: String,
    pub tool_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionCompletedEvent {
    pub correlation_id: String,
    pub tool_id: String,
    pub success: bool,
    pub duration: Duration,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityViolationEvent {
    pub correlation_id: String,
    pub tool_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// The executor boundary (spec §6). `CachingExecutor` (and any other
/// decorator a host writes) implements the same trait so it can wrap
/// another `Arc<dyn Executor>` transparently.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, request: ExecutionRequest) -> ToolResult<ExecutionResult>;

    async fn execute_tool(
        &self,
        tool_id: &str,
        params: serde_json::Value,
        context: Option<ExecutionContext>,
    ) -> ToolResult<ExecutionResult> {
        self.execute(ExecutionRequest {
            tool_id: tool_id.to_string(),
            params,
            context: context.unwrap_or_default(),
        })
        .await
    }

    async fn validate(&self, request: &ExecutionRequest) -> Vec<String>;

    async fn estimate_resources(&self, tool_id: &str, params: &serde_json::Value) -> Option<ResourceUsage>;

    /// Cancels every running execution carrying `correlation_id`, returns
    /// how many were found (spec §6 `cancelByCorrelationId(id) -> int`).
    async fn cancel_by_correlation_id(&self, correlation_id: &str) -> usize;

    async fn running_executions(&self) -> Vec<RunningExecutionInfo>;

    async fn statistics(&self) -> ExecutionStatistics;

    fn subscribe_started(&self) -> broadcast::Receiver<ExecutionStartedEvent>;

    fn subscribe_completed(&self) -> broadcast::Receiver<ExecutionCompletedEvent>;

    fn subscribe_security_violations(&self) -> broadcast::Receiver<SecurityViolationEvent>;
}

/// Execution configuration with type-safe builder
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub timeout: Option<Duration>,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub validate_parameters: bool,
    pub enable_logging: bool,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            max_retries: 0,
            retry_delay: Duration::from_millis(100),
            validate_parameters: true,
            enable_logging: false,
        }
    }
}

const STARTED_CAPACITY: usize = 256;
const COMPLETED_CAPACITY: usize = 256;
const SECURITY_CAPACITY: usize = 64;

/// The base tool executor: runs tools out of a [`ToolRegistry`], honours
/// timeouts and flat retry/backoff, and tracks in-flight executions for
/// cancellation and `runningExecutions`/`statistics`.
#[derive(Clone)]
pub struct ToolExecutor {
    registry: ToolRegistry,
    config: ExecutionConfig,
    running: Arc<DashMap<String, (RunningExecutionInfo, CancellationToken)>>,
    stats: Arc<ExecutorCounters>,
    started_tx: broadcast::Sender<ExecutionStartedEvent>,
    completed_tx: broadcast::Sender<ExecutionCompletedEvent>,
    security_tx: broadcast::Sender<SecurityViolationEvent>,
}

#[derive(Default)]
struct ExecutorCounters {
    total: AtomicU64,
    success: AtomicU64,
    failed: AtomicU64,
    cancelled: AtomicU64,
}

impl ToolExecutor {
    /// Create a new executor with default config
    pub fn new(registry: ToolRegistry) -> Self {
        Self::with_config(registry, ExecutionConfig::default())
    }

    /// Create an executor builder for fluent API
    pub fn builder(registry: ToolRegistry) -> ExecutorBuilder {
        ExecutorBuilder::new(registry)
    }

    /// Create executor with custom config
    pub fn with_config(registry: ToolRegistry, config: ExecutionConfig) -> Self {
        let (started_tx, _) = broadcast::channel(STARTED_CAPACITY);
        let (completed_tx, _) = broadcast::channel(COMPLETED_CAPACITY);
        let (security_tx, _) = broadcast::channel(SECURITY_CAPACITY);
        Self {
            registry,
            config,
            running: Arc::new(DashMap::new()),
            stats: Arc::new(ExecutorCounters::default()),
            started_tx,
            completed_tx,
            security_tx,
        }
    }

    /// Execute a tool and return only the result
    pub async fn execute_simple(&self, tool_name: &str, input: serde_json::Value) -> ToolResult<serde_json::Value> {
        let result = self.execute_tool(tool_name, input, None).await?;
        if result.success {
            Ok(result.data)
        } else {
            Err(error_context()
                .with_tool(tool_name)
                .execution_failed(result.error.unwrap_or_else(|| "Unknown error".to_string())))
        }
    }

    /// Execute multiple tools in parallel
    pub async fn execute_parallel(&self, requests: Vec<(String, serde_json::Value)>) -> Vec<ToolResult<ExecutionResult>> {
        let futures = requests.into_iter().map(|(tool_name, input)| {
            let executor = self.clone();
            async move { executor.execute_tool(&tool_name, input, None).await }
        });

        futures::future::join_all(futures).await
    }

    /// Execute with a specific timeout, overriding the configured one.
    pub async fn execute_with_timeout(
        &self,
        tool_name: &str,
        input: serde_json::Value,
        timeout_duration: Duration,
    ) -> ToolResult<ExecutionResult> {
        match timeout(timeout_duration, self.execute_tool(tool_name, input, None)).await {
            Ok(result) => result,
            Err(_) => Ok(ExecutionResult::failure(
                tool_name.to_string(),
                format!("Execution timed out after {:?}", timeout_duration),
                timeout_duration,
                0,
            )),
        }
    }

    async fn execute_once(&self, tool_name: &str, input: &serde_json::Value, cancellation: &CancellationToken) -> ToolResult<serde_json::Value> {
        let execution_future = self.registry.execute(tool_name, input.clone());

        let run = async {
            match self.config.timeout {
                Some(timeout_duration) => match timeout(timeout_duration, execution_future).await {
                    Ok(result) => result,
                    Err(_) => Err(error_context().with_tool(tool_name).timeout_error(timeout_duration)),
                },
                None => execution_future.await,
            }
        };

        tokio::select! {
            biased;
            _ = cancellation.cancelled() => Err(error_context().cancelled_error()),
            result = run => result,
        }
    }

    /// Get the registry
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Get the config
    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }
}

#[async_trait]
impl Executor for ToolExecutor {
    async fn execute(&self, request: ExecutionRequest) -> ToolResult<ExecutionResult> {
        let ExecutionRequest { tool_id, params, context } = request;
        let correlation_id = context.correlation_id.clone();
        let cancellation = context.cancellation.clone();

        self.running.insert(
            correlation_id.clone(),
            (
                RunningExecutionInfo {
                    correlation_id: correlation_id.clone(),
                    tool_id: tool_id.clone(),
                    started_at: Utc::now(),
                },
                cancellation.clone(),
            ),
        );
        let _ = self.started_tx.send(ExecutionStartedEvent {
            correlation_id: correlation_id.clone(),
            tool_id: tool_id.clone(),
            timestamp: Utc::now(),
        });

        let start_time = Instant::now();
        let mut retries = 0;

        let result = loop {
            if cancellation.is_cancelled() {
                break Ok(ExecutionResult::failure(
                    tool_id.clone(),
                    "execution cancelled".to_string(),
                    start_time.elapsed(),
                    retries,
                ));
            }

            match self.execute_once(&tool_id, &params, &cancellation).await {
                Ok(data) => {
                    break Ok(ExecutionResult::success(tool_id.clone(), data, start_time.elapsed(), retries));
                }
                Err(error) => {
                    if retries >= self.config.max_retries {
                        break Ok(ExecutionResult::failure(
                            tool_id.clone(),
                            error.to_string(),
                            start_time.elapsed(),
                            retries,
                        ));
                    }

                    retries += 1;

                    if self.config.enable_logging {
                        tracing::warn!(tool = %tool_id, attempt = retries, error = %error, "tool execution failed, retrying");
                    }

                    tokio::select! {
                        biased;
                        _ = cancellation.cancelled() => {}
                        _ = tokio::time::sleep(self.config.retry_delay) => {}
                    }
                }
            }
        };

        self.running.remove(&correlation_id);
        self.stats.total.fetch_add(1, Ordering::Relaxed);
        match &result {
            Ok(r) if r.success => {
                self.stats.success.fetch_add(1, Ordering::Relaxed);
            }
            Ok(r) if cancellation.is_cancelled() => {
                self.stats.cancelled.fetch_add(1, Ordering::Relaxed);
                let _ = r;
            }
            _ => {
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
            }
        }

        if let Ok(r) = &result {
            let _ = self.completed_tx.send(ExecutionCompletedEvent {
                correlation_id,
                tool_id,
                success: r.success,
                duration: r.duration,
                timestamp: Utc::now(),
            });
        }

        result
    }

    async fn validate(&self, request: &ExecutionRequest) -> Vec<String> {
        let mut errors = Vec::new();
        if !self.registry.has_tool(&request.tool_id) {
            errors.push(format!("tool '{}' not found in registry", request.tool_id));
        }
        errors
    }

    async fn estimate_resources(&self, _tool_id: &str, _params: &serde_json::Value) -> Option<ResourceUsage> {
        // No resource monitor is implemented in-core (spec §6: consumed,
        // not implemented, here). A host wires a real estimator in.
        None
    }

    async fn cancel_by_correlation_id(&self, correlation_id: &str) -> usize {
        if let Some((_, (_, token))) = self.running.remove(correlation_id) {
            token.cancel();
            1
        } else {
            0
        }
    }

    async fn running_executions(&self) -> Vec<RunningExecutionInfo> {
        self.running.iter().map(|e| e.value().0.clone()).collect()
    }

    async fn statistics(&self) -> ExecutionStatistics {
        ExecutionStatistics {
            total_executions: self.stats.total.load(Ordering::Relaxed),
            successful_executions: self.stats.success.load(Ordering::Relaxed),
            failed_executions: self.stats.failed.load(Ordering::Relaxed),
            cancelled_executions: self.stats.cancelled.load(Ordering::Relaxed),
        }
    }

    fn subscribe_started(&self) -> broadcast::Receiver<ExecutionStartedEvent> {
        self.started_tx.subscribe()
    }

    fn subscribe_completed(&self) -> broadcast::Receiver<ExecutionCompletedEvent> {
        self.completed_tx.subscribe()
    }

    fn subscribe_security_violations(&self) -> broadcast::Receiver<SecurityViolationEvent> {
        self.security_tx.subscribe()
    }
}

/// Builder for creating tool executors with fluent API
pub struct ExecutorBuilder {
    registry: ToolRegistry,
    config: ExecutionConfig,
}

impl ExecutorBuilder {
    /// Create a new executor builder
    pub fn new(registry: ToolRegistry) -> Self {
        Self {
            registry,
            config: ExecutionConfig::default(),
        }
    }

    /// Set timeout for tool execution
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Set maximum number of retries
    pub fn retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Enable or disable logging
    pub fn logging(mut self, enabled: bool) -> Self {
        self.config.enable_logging = enabled;
        self
    }

    /// Build the final executor
    pub fn build(self) -> ToolExecutor {
        ToolExecutor::with_config(self.registry, self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtin::CalculatorTool;

    fn registry_with_calculator() -> ToolRegistry {
        let registry = ToolRegistry::new();
        registry.register(CalculatorTool::new()).unwrap();
        registry
    }

    #[tokio::test]
    async fn executes_a_registered_tool() {
        let executor = ToolExecutor::new(registry_with_calculator());
        let result = executor
            .execute_tool("calculator", serde_json::json!({"operation": "add", "a": 2.0, "b": 3.0}), None)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.data["result"], serde_json::json!(5.0));
    }

    #[tokio::test]
    async fn missing_tool_is_reported_as_failure_not_error() {
        let executor = ToolExecutor::new(ToolRegistry::new());
        let result = executor.execute_tool("nonexistent", serde_json::json!({}), None).await.unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn cancellation_before_start_short_circuits() {
        let executor = ToolExecutor::new(registry_with_calculator());
        let context = ExecutionContext::default();
        context.cancellation.cancel();
        let request = ExecutionRequest::new("calculator", serde_json::json!({"operation": "add", "a": 1.0, "b": 1.0}))
            .with_context(context);
        let result = executor.execute(request).await.unwrap();
        assert!(!result.success);
    }

    #[tokio::test]
    async fn cancel_by_correlation_id_stops_running_execution() {
        let executor = ToolExecutor::new(registry_with_calculator());
        assert_eq!(executor.cancel_by_correlation_id("missing").await, 0);
    }
}
