//! Chain, ChainContext, and ChainResult: the data model behind a running
//! chain.
//!
//! `ChainContextHandle` is the shareable, interior-mutable view of a
//! running chain's context: predicates, transforms, and `Custom` step
//! bodies all close over `&ChainContextHandle`/`Arc<ChainContextHandle>`
//! rather than a `&mut` context, since `Parallel` steps need to hand the
//! same context to several concurrently-running branches that all launch
//! at once.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::chain::step::{Step, StepId};
use crate::executor::ExecutionContext;

/// A directed graph of steps plus identifying metadata.
/// Step order in `steps` is informational only — true execution order is
/// derived from `dependencies` by [`crate::chain::engine::ChainEngine`].
pub struct Chain {
    pub id: String,
    pub name: String,
    pub description: String,
    pub steps: Vec<Step>,
}

impl Chain {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            steps: Vec::new(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn with_steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.steps.extend(steps);
        self
    }
}

/// Terminal and in-flight chain states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainStatus {
    NotStarted,
    Running,
    Completed,
    Failed,
    Cancelled,
    PartiallyCompleted,
}

/// Error taxonomy kind recorded against a chain run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainErrorKind {
    ValidationError,
    StepFailed,
    StepException,
    Cancelled,
    ChainException,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainErrorEntry {
    pub kind: ChainErrorKind,
    pub step_id: Option<StepId>,
    pub message: String,
}

impl ChainErrorEntry {
    pub fn new(kind: ChainErrorKind, step_id: Option<StepId>, message: impl Into<String>) -> Self {
        Self {
            kind,
            step_id,
            message: message.into(),
        }
    }
}

/// The outcome of a single step run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: StepId,
    pub name: String,
    pub success: bool,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub duration: Duration,
    pub retry_attempts: u32,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Progress reported at step start or via `context.report_progress`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainProgressEvent {
    pub chain_id: String,
    pub step_id: Option<StepId>,
    pub message: String,
    pub percentage: f64,
    pub timestamp: DateTime<Utc>,
}

pub type ProgressCallback = Arc<dyn Fn(ChainProgressEvent) + Send + Sync>;

struct ChainContextInner {
    chain_id: String,
    initial_params: serde_json::Value,
    /// Append-only by construction: the only mutator is
    /// [`ChainContextHandle::record_step_result`].
    results: DashMap<StepId, StepResult>,
    /// Insertion order, so "previous result" means "last inserted"
    /// not "dependency order".
    results_order: Mutex<Vec<StepId>>,
    shared_state: DashMap<String, serde_json::Value>,
    execution_context: ExecutionContext,
    start_time: DateTime<Utc>,
    on_progress: Option<ProgressCallback>,
}

/// Cheaply `Clone`-able (it's an `Arc` internally) handle to a running
/// chain's context. Steps that need to read prior results, share state,
/// or report progress are given a reference to this rather than the
/// engine's own bookkeeping structures.
#[derive(Clone)]
pub struct ChainContextHandle(Arc<ChainContextInner>);

impl ChainContextHandle {
    pub fn new(
        chain_id: impl Into<String>,
        initial_params: serde_json::Value,
        execution_context: ExecutionContext,
        on_progress: Option<ProgressCallback>,
    ) -> Self {
        Self(Arc::new(ChainContextInner {
            chain_id: chain_id.into(),
            initial_params,
            results: DashMap::new(),
            results_order: Mutex::new(Vec::new()),
            shared_state: DashMap::new(),
            execution_context,
            start_time: Utc::now(),
            on_progress,
        }))
    }

    pub fn chain_id(&self) -> &str {
        &self.0.chain_id
    }

    pub fn initial_params(&self) -> &serde_json::Value {
        &self.0.initial_params
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.0.start_time
    }

    pub fn execution_context(&self) -> &ExecutionContext {
        &self.0.execution_context
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.execution_context.cancellation.is_cancelled()
    }

    /// Append `result` under its own step id. `stepResults` is append-only
    /// during execution.
    pub fn record_step_result(&self, result: StepResult) {
        let id = result.step_id.clone();
        self.0.results.insert(id.clone(), result);
        self.0.results_order.lock().push(id);
    }

    pub fn step_result(&self, id: &str) -> Option<StepResult> {
        self.0.results.get(id).map(|r| r.clone())
    }

    /// The data of the most-recently-recorded step result — "previous
    /// result", fed to `Transform` steps.
    pub fn previous_result(&self) -> Option<serde_json::Value> {
        let order = self.0.results_order.lock();
        let last_id = order.last()?;
        self.0.results.get(last_id).and_then(|r| r.data.clone())
    }

    pub fn all_results(&self) -> HashMap<StepId, StepResult> {
        self.0.results.iter().map(|e| (e.key().clone(), e.value().clone())).collect()
    }

    /// Plain shared mapping (`sharedState: map<string, any>`). Synchronizing
    /// concurrent writers across `Parallel` substeps is the caller's
    /// responsibility; this uses a `DashMap` so individual reads/writes
    /// don't race each other, but read-modify-write sequences across
    /// substeps still need the caller's own discipline.
    pub fn shared_get(&self, key: &str) -> Option<serde_json::Value> {
        self.0.shared_state.get(key).map(|v| v.clone())
    }

    pub fn shared_set(&self, key: impl Into<String>, value: serde_json::Value) {
        self.0.shared_state.insert(key.into(), value);
    }

    pub fn report_progress(&self, step_id: Option<StepId>, message: impl Into<String>, percentage: f64) {
        if let Some(cb) = &self.0.on_progress {
            cb(ChainProgressEvent {
                chain_id: self.0.chain_id.clone(),
                step_id,
                message: message.into(),
                percentage,
                timestamp: Utc::now(),
            });
        }
        self.0.execution_context.report_progress(message, percentage);
    }
}

/// Final outcome of a chain run.
/// `successful_steps`/`failed_steps` are derived from `step_results`
/// rather than tracked separately — they are derived on demand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainResult {
    pub chain_id: String,
    pub status: ChainStatus,
    pub data: Option<serde_json::Value>,
    pub step_results: HashMap<StepId, StepResult>,
    pub errors: Vec<ChainErrorEntry>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: Duration,
}

impl ChainResult {
    pub fn successful_steps(&self) -> usize {
        self.step_results.values().filter(|r| r.success).count()
    }

    pub fn failed_steps(&self) -> usize {
        self.step_results.values().filter(|r| !r.success).count()
    }
}
