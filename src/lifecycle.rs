//! Lifecycle Manager (spec §4.7): owns startup (explicit registration +
//! discovery), periodic maintenance, and orderly shutdown.
//!
//! Also declares the minimal trait boundaries spec §6 calls out as
//! consumed-but-not-implemented here: [`SecurityManager`] and
//! [`PermissionProfileService`]. Both are host concerns — this crate
//! never persists permission profiles to disk (spec §6: "any
//! implementation MUST refuse to persist other core state" beyond what
//! the result store/execution cache already own).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::time::interval;

use crate::cache::ExecutionCache;
use crate::discovery::{Discovery, DiscoveryOptions};
use crate::error::{error_context, ToolResult};
use crate::executor::Executor;
use crate::metrics::MetricsCollector;
use crate::registry::ToolRegistry;

/// Consumed-only boundary: a host-supplied source of truth for security
/// violation history the core doesn't itself retain beyond the
/// executor's broadcast channel (spec §6).
#[async_trait]
pub trait SecurityManager: Send + Sync {
    async fn clear_old_violations(&self, older_than: Duration) -> usize;
}

/// Consumed-only boundary: spec §6 describes on-disk JSON permission
/// profiles persisted by the host, not the core. This trait is the
/// read-side the executor/lifecycle could consult; no implementation
/// ships here.
pub trait PermissionProfileService: Send + Sync {
    fn is_granted(&self, profile: &str, permission: &str) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Running,
    ShuttingDown,
    Stopped,
}

#[derive(Debug, Clone)]
pub struct MaintenanceReport {
    pub expired_cache_entries_removed: usize,
    pub stale_metrics_removed: usize,
    pub security_violations_cleared: usize,
}

const DEFAULT_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(3600);
const DEFAULT_METRICS_RETENTION: Duration = Duration::from_secs(7 * 24 * 3600);

/// Drives a registry/executor/cache/metrics quartet through
/// Uninitialized -> Initializing -> Running -> ShuttingDown -> Stopped
/// (spec §4.7). State transitions are monotonic except that a failed
/// `initialize` falls back from Initializing to Uninitialized so the
/// host can retry.
pub struct LifecycleManager {
    registry: ToolRegistry,
    executor: Arc<dyn Executor>,
    cache: Arc<ExecutionCache>,
    metrics: Arc<MetricsCollector>,
    security: Option<Arc<dyn SecurityManager>>,
    state: RwLock<LifecycleState>,
    maintenance_interval: Duration,
    metrics_retention: Duration,
}

impl LifecycleManager {
    pub fn new(registry: ToolRegistry, executor: Arc<dyn Executor>, cache: Arc<ExecutionCache>, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            registry,
            executor,
            cache,
            metrics,
            security: None,
            state: RwLock::new(LifecycleState::Uninitialized),
            maintenance_interval: DEFAULT_MAINTENANCE_INTERVAL,
            metrics_retention: DEFAULT_METRICS_RETENTION,
        }
    }

    pub fn with_security(mut self, security: Arc<dyn SecurityManager>) -> Self {
        self.security = Some(security);
        self
    }

    pub fn with_maintenance_interval(mut self, interval: Duration) -> Self {
        self.maintenance_interval = interval;
        self
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.read()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn executor(&self) -> &Arc<dyn Executor> {
        &self.executor
    }

    pub fn cache(&self) -> &Arc<ExecutionCache> {
        &self.cache
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    /// Registers explicit tools, then (if provided) pulls more from
    /// `discovery`, skipping anything already present under the same
    /// name (spec §4.7 "Discovery ... duplicates skipped by tool name").
    /// On any unexpected failure the state falls back to `Uninitialized`.
    pub async fn initialize(
        &self,
        explicit_tools: Vec<Box<dyn crate::core::DynTool>>,
        discovery: Option<Arc<dyn Discovery>>,
        options: DiscoveryOptions,
    ) -> ToolResult<usize> {
        {
            let mut state = self.state.write();
            if *state != LifecycleState::Uninitialized {
                return Err(error_context().chain_exception(format!("cannot initialize from state {:?}", *state)));
            }
            *state = LifecycleState::Initializing;
        }

        let mut registered = 0usize;
        for tool in explicit_tools {
            let name = tool.name().to_string();
            if self.registry.contains(&name) {
                continue;
            }
            if self.registry.register_dyn(tool).is_ok() {
                registered += 1;
            }
        }

        if let Some(discovery) = discovery {
            for discovered in discovery.discover(&options).await {
                let name = discovered.metadata.name.clone();
                if self.registry.contains(&name) {
                    continue;
                }
                if self.registry.register_dyn(discovered.tool).is_ok() {
                    registered += 1;
                }
            }
        }

        *self.state.write() = LifecycleState::Running;
        Ok(registered)
    }

    /// One maintenance sweep: clears expired cache entries, compacts
    /// metrics history, and (if a [`SecurityManager`] is wired up)
    /// clears old security violations. Individual failures are logged,
    /// not propagated — maintenance never aborts a running system
    /// (spec §4.7 "Periodic maintenance").
    pub async fn run_maintenance(&self) -> MaintenanceReport {
        let expired_cache_entries_removed = self.cache.run_cleanup();
        let stale_metrics_removed = self.metrics.clear_old_metrics(self.metrics_retention);

        let security_violations_cleared = match &self.security {
            Some(security) => security.clear_old_violations(self.metrics_retention).await,
            None => 0,
        };

        tracing::debug!(
            expired_cache_entries_removed,
            stale_metrics_removed,
            security_violations_cleared,
            "lifecycle maintenance sweep completed"
        );

        MaintenanceReport {
            expired_cache_entries_removed,
            stale_metrics_removed,
            security_violations_cleared,
        }
    }

    /// Spawns a background task that calls [`Self::run_maintenance`] on
    /// `maintenance_interval`. The handle runs until the process exits;
    /// callers that need a clean stop should abort the returned handle
    /// in addition to calling [`Self::shutdown`].
    pub fn spawn_maintenance_task(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(manager.maintenance_interval);
            loop {
                ticker.tick().await;
                if manager.state() != LifecycleState::Running {
                    break;
                }
                manager.run_maintenance().await;
            }
        })
    }

    /// Cancels every running execution, waits up to `deadline` for them
    /// to drain, then transitions to `Stopped` regardless (spec §4.7
    /// "Shutdown ... best-effort drain with a deadline").
    pub async fn shutdown(&self, deadline: Duration) -> ToolResult<usize> {
        *self.state.write() = LifecycleState::ShuttingDown;

        let running = self.executor.running_executions().await;
        let mut cancelled = 0usize;
        for execution in &running {
            cancelled += self.executor.cancel_by_correlation_id(&execution.correlation_id).await;
        }

        let wait_until = tokio::time::Instant::now() + deadline;
        while tokio::time::Instant::now() < wait_until {
            if self.executor.running_executions().await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }

        *self.state.write() = LifecycleState::Stopped;
        Ok(cancelled)
    }
}
