//! Chain Engine: validates a [`Chain`]'s dependency graph,
//! derives a stable execution order, and runs each step with retry and
//! exponential backoff, honoring cancellation throughout.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::chain::context::{
    Chain, ChainContextHandle, ChainErrorEntry, ChainErrorKind, ChainResult, ChainStatus, ProgressCallback, StepResult,
};
use crate::chain::step::{Step, StepBody, StepId, StepKind};
use crate::error::{error_context, ToolError, ToolResult};
use crate::executor::{ExecutionContext, Executor};

/// Runs [`Chain`]s against an [`Executor`]. One engine can
/// drive any number of chains; it holds no per-chain state itself — all
/// of that lives in the [`ChainContextHandle`] created fresh for each run.
pub struct ChainEngine {
    executor: Arc<dyn Executor>,
}

impl ChainEngine {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self { executor }
    }

    /// Structural checks only; does not touch the registry or execute
    /// anything. Returns one message per problem found.
    pub fn validate(&self, chain: &Chain) -> Vec<String> {
        let mut errors = Vec::new();

        if chain.id.trim().is_empty() {
            errors.push("chain id must not be empty".to_string());
        }
        if chain.name.trim().is_empty() {
            errors.push("chain name must not be empty".to_string());
        }
        if chain.steps.is_empty() {
            errors.push("chain must contain at least one step".to_string());
        }

        let ids: HashSet<&str> = chain.steps.iter().map(|s| s.id.as_str()).collect();
        for step in &chain.steps {
            for dep in &step.dependencies {
                if !ids.contains(dep.as_str()) {
                    errors.push(format!("step '{}' depends on unknown step '{}'", step.id, dep));
                }
            }
        }

        if let Some(cycle_step) = detect_cycle(&chain.steps) {
            errors.push(format!("Circular dependency detected involving step '{}'", cycle_step));
        }

        for step in &chain.steps {
            collect_parallel_substep_errors(step, &mut errors);
        }

        errors
    }

    /// Runs `chain` end to end. Always returns a [`ChainResult`] rather
    /// than `Err` — validation and step failures are reported inside the
    /// result's `errors`/`status` fields; `execute` itself never throws
    /// for ordinary failures.
    pub async fn execute(
        &self,
        chain: &Chain,
        initial_params: Value,
        execution_context: ExecutionContext,
        on_progress: Option<ProgressCallback>,
    ) -> ChainResult {
        let start_time = chrono::Utc::now();
        let wall_start = Instant::now();

        let validation_errors = self.validate(chain);
        if !validation_errors.is_empty() {
            return ChainResult {
                chain_id: chain.id.clone(),
                status: ChainStatus::Failed,
                data: None,
                step_results: HashMap::new(),
                errors: validation_errors
                    .into_iter()
                    .map(|m| ChainErrorEntry::new(ChainErrorKind::ValidationError, None, m))
                    .collect(),
                start_time,
                end_time: chrono::Utc::now(),
                duration: wall_start.elapsed(),
            };
        }

        let handle = ChainContextHandle::new(chain.id.clone(), initial_params, execution_context, on_progress);
        let order = topological_order(&chain.steps);

        let mut errors = Vec::new();
        let mut cancelled = false;
        let mut last_data = None;

        for index in order {
            let step = &chain.steps[index];

            if handle.is_cancelled() {
                cancelled = true;
                errors.push(ChainErrorEntry::new(ChainErrorKind::Cancelled, Some(step.id.clone()), "chain cancelled before step started"));
                break;
            }

            handle.report_progress(Some(step.id.clone()), format!("running step '{}'", step.name), progress_percent(index, chain.steps.len()));

            let result = self.run_step(step, &handle).await;
            last_data = result.data.clone().or(last_data);
            let success = result.success;
            let error_message = result.error.clone();
            handle.record_step_result(result);

            if !success {
                let kind = if error_message.as_deref().map(|m| m.contains("cancelled")).unwrap_or(false) {
                    ChainErrorKind::Cancelled
                } else {
                    ChainErrorKind::StepFailed
                };
                errors.push(ChainErrorEntry::new(kind, Some(step.id.clone()), error_message.unwrap_or_else(|| "step failed".to_string())));

                // ErrorHandler steps are exempt from the fail-chain policy.
                if step.kind != StepKind::ErrorHandler {
                    break;
                }
            }
        }

        let all_results = handle.all_results();
        let total_top_level = chain.steps.len();
        let completed_top_level = chain.steps.iter().filter(|s| all_results.contains_key(&s.id)).count();
        let succeeded_top_level = chain
            .steps
            .iter()
            .filter(|s| all_results.get(&s.id).map(|r| r.success).unwrap_or(false))
            .count();
        let broke_early = completed_top_level < total_top_level;

        let status = if cancelled {
            ChainStatus::Cancelled
        } else if succeeded_top_level == total_top_level {
            ChainStatus::Completed
        } else if succeeded_top_level == 0 || broke_early {
            ChainStatus::Failed
        } else {
            ChainStatus::PartiallyCompleted
        };

        ChainResult {
            chain_id: chain.id.clone(),
            status,
            data: last_data,
            step_results: all_results,
            errors,
            start_time,
            end_time: chrono::Utc::now(),
            duration: wall_start.elapsed(),
        }
    }

    /// Runs one step with retry/backoff, waiting `2^(attempt-1)` seconds
    /// between attempts. Nested steps (`Conditional`'s
    /// then/else branch, `ErrorHandler`'s body) recurse back into this
    /// same function, so their own `isRetryable`/`maxRetries` apply
    /// independently of the wrapping step's.
    fn run_step<'a>(&'a self, step: &'a Step, handle: &'a ChainContextHandle) -> std::pin::Pin<Box<dyn std::future::Future<Output = StepResult> + Send + 'a>> {
        Box::pin(async move {
            let max_attempts = if step.is_retryable { step.max_retries + 1 } else { 1 };
            let wall_start = Instant::now();
            let mut attempt: u32 = 0;
            let mut last_value: Option<Value> = None;
            let mut last_error: Option<ToolError> = None;
            let mut metadata = HashMap::new();

            while attempt < max_attempts {
                attempt += 1;

                if handle.is_cancelled() {
                    last_error = Some(error_context().with_step(&step.id).cancelled_error());
                    break;
                }

                let outcome = self.dispatch(step, handle).await;
                match outcome.value {
                    Ok(value) => {
                        last_value = Some(value);
                        last_error = None;
                        metadata = outcome.metadata;
                        break;
                    }
                    Err(e) => {
                        last_error = Some(e);
                        metadata = outcome.metadata;
                        if attempt < max_attempts {
                            let backoff = Duration::from_secs(2u64.saturating_pow(attempt));
                            tokio::select! {
                                biased;
                                _ = handle.execution_context().cancellation.cancelled() => break,
                                _ = tokio::time::sleep(backoff) => {}
                            }
                        }
                    }
                }
            }

            let retry_attempts = attempt.saturating_sub(1);
            match last_error {
                None => StepResult {
                    step_id: step.id.clone(),
                    name: step.name.clone(),
                    success: true,
                    data: last_value,
                    error: None,
                    duration: wall_start.elapsed(),
                    retry_attempts,
                    metadata,
                },
                Some(e) => StepResult {
                    step_id: step.id.clone(),
                    name: step.name.clone(),
                    success: false,
                    data: last_value,
                    error: Some(e.to_string()),
                    duration: wall_start.elapsed(),
                    retry_attempts,
                    metadata,
                },
            }
        })
    }

    /// One dispatch attempt for `step`'s body. Always returns metadata,
    /// even on failure — `Parallel` uses this to attach every substep's
    /// outcome regardless of overall success.
    fn dispatch<'a>(&'a self, step: &'a Step, handle: &'a ChainContextHandle) -> std::pin::Pin<Box<dyn std::future::Future<Output = DispatchOutcome> + Send + 'a>> {
        Box::pin(async move {
            match &step.body {
                StepBody::Tool { tool_id, params } => {
                    let mut child_ctx = handle.execution_context().clone();
                    child_ctx.correlation_id = format!("{}::{}", handle.execution_context().correlation_id, step.id);
                    match self.executor.execute_tool(tool_id, params.clone(), Some(child_ctx)).await {
                        Ok(result) if result.success => DispatchOutcome::ok(result.data, result.metadata),
                        Ok(result) => DispatchOutcome::err(
                            error_context().with_step(&step.id).step_failed(result.error.unwrap_or_else(|| "tool reported failure".to_string())),
                            result.metadata,
                        ),
                        Err(e) => DispatchOutcome::err(error_context().with_step(&step.id).step_exception(e.to_string()), HashMap::new()),
                    }
                }
                StepBody::Conditional { predicate, then_step, else_step } => {
                    if predicate(handle) {
                        let result = self.run_step(then_step, handle).await;
                        handle.record_step_result(result.clone());
                        DispatchOutcome::from_step_result(result)
                    } else if let Some(else_step) = else_step {
                        let result = self.run_step(else_step, handle).await;
                        handle.record_step_result(result.clone());
                        DispatchOutcome::from_step_result(result)
                    } else {
                        DispatchOutcome::ok(Value::Null, HashMap::new())
                    }
                }
                StepBody::Parallel { substeps } => {
                    let results = futures::future::join_all(substeps.iter().map(|s| self.run_step(s, handle))).await;
                    for r in &results {
                        handle.record_step_result(r.clone());
                    }
                    let all_ok = results.iter().all(|r| r.success);
                    let data = Value::Array(results.iter().map(|r| r.data.clone().unwrap_or(Value::Null)).collect());
                    let mut metadata = HashMap::new();
                    metadata.insert(
                        "substep_results".to_string(),
                        serde_json::to_value(&results).unwrap_or(Value::Null),
                    );
                    if all_ok {
                        DispatchOutcome::ok(data, metadata)
                    } else {
                        let message = results
                            .iter()
                            .find(|r| !r.success)
                            .and_then(|r| r.error.clone())
                            .unwrap_or_else(|| "a parallel substep failed".to_string());
                        DispatchOutcome {
                            value: Err(error_context().with_step(&step.id).step_failed(message)),
                            metadata,
                        }
                    }
                }
                StepBody::Transform { transform } => {
                    let previous = handle.previous_result();
                    match transform(previous, handle) {
                        Ok(value) => DispatchOutcome::ok(value, HashMap::new()),
                        Err(e) => DispatchOutcome::err(e, HashMap::new()),
                    }
                }
                StepBody::Loop => DispatchOutcome::err(
                    error_context().with_step(&step.id).step_failed("Loop step kind is reserved and not implemented"),
                    HashMap::new(),
                ),
                StepBody::ErrorHandler { body } => {
                    let result = self.run_step(body, handle).await;
                    handle.record_step_result(result.clone());
                    DispatchOutcome::from_step_result(result)
                }
                StepBody::Custom { run } => match run(Arc::new(handle.clone())).await {
                    Ok(value) => DispatchOutcome::ok(value, HashMap::new()),
                    Err(e) => DispatchOutcome::err(e, HashMap::new()),
                },
            }
        })
    }
}

struct DispatchOutcome {
    value: ToolResult<Value>,
    metadata: HashMap<String, Value>,
}

impl DispatchOutcome {
    fn ok(value: Value, metadata: HashMap<String, Value>) -> Self {
        Self { value: Ok(value), metadata }
    }

    fn err(error: ToolError, metadata: HashMap<String, Value>) -> Self {
        Self { value: Err(error), metadata }
    }

    fn from_step_result(result: StepResult) -> Self {
        if result.success {
            Self::ok(result.data.unwrap_or(Value::Null), result.metadata)
        } else {
            Self {
                value: Err(ToolError::StepFailed {
                    step: result.step_id,
                    message: result.error.unwrap_or_else(|| "nested step failed".to_string()),
                }),
                metadata: result.metadata,
            }
        }
    }
}

fn progress_percent(index: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        (index as f64 / total as f64) * 100.0
    }
}

/// DFS-based cycle detection over top-level steps only. Returns the id of a step
/// found to be part of a cycle, if any.
fn detect_cycle(steps: &[Step]) -> Option<StepId> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
        White,
        Gray,
        Black,
    }

    let by_id: HashMap<&str, &Step> = steps.iter().map(|s| (s.id.as_str(), s)).collect();
    let mut color: HashMap<&str, Color> = steps.iter().map(|s| (s.id.as_str(), Color::White)).collect();

    fn visit<'a>(id: &'a str, by_id: &HashMap<&'a str, &'a Step>, color: &mut HashMap<&'a str, Color>) -> Option<String> {
        match color.get(id) {
            Some(Color::Black) | None => return None,
            Some(Color::Gray) => return Some(id.to_string()),
            Some(Color::White) => {}
        }
        color.insert(id, Color::Gray);
        if let Some(step) = by_id.get(id) {
            for dep in &step.dependencies {
                if let Some(found) = visit(dep.as_str(), by_id, color) {
                    return Some(found);
                }
            }
        }
        color.insert(id, Color::Black);
        None
    }

    for step in steps {
        if let Some(found) = visit(step.id.as_str(), &by_id, &mut color) {
            return Some(found);
        }
    }
    None
}

/// Stable Kahn's-algorithm ordering: among steps whose dependencies are
/// all already placed, pick the one with the smallest original index
/// Ties are broken by original insertion order.
fn topological_order(steps: &[Step]) -> Vec<usize> {
    let mut placed: HashSet<&str> = HashSet::new();
    let mut order = Vec::with_capacity(steps.len());
    let mut remaining: Vec<usize> = (0..steps.len()).collect();

    while !remaining.is_empty() {
        let next = remaining
            .iter()
            .position(|&i| steps[i].dependencies.iter().all(|d| placed.contains(d.as_str())));

        match next {
            Some(pos) => {
                let idx = remaining.remove(pos);
                placed.insert(steps[idx].id.as_str());
                order.push(idx);
            }
            // Only reachable if validate() wasn't called first; fall back
            // to original order for whatever is left rather than hanging.
            None => {
                order.extend(remaining.drain(..));
                break;
            }
        }
    }

    order
}

/// Rejects a chain where a step inside a `Parallel` group declares any
/// `dependencies` of its own. Cross-parallel dependencies are
/// not supported — substeps run concurrently and are not part of the
/// top-level topological sort, so a dependency on another substep, or on
/// an outside step not yet satisfied at the parallel's position, could
/// never be honored).
fn collect_parallel_substep_errors(step: &Step, errors: &mut Vec<String>) {
    match &step.body {
        StepBody::Parallel { substeps } => {
            for substep in substeps {
                if !substep.dependencies.is_empty() {
                    errors.push(format!(
                        "parallel substep '{}' must not declare dependencies; cross-parallel dependencies are not supported",
                        substep.id
                    ));
                }
                collect_parallel_substep_errors(substep, errors);
            }
        }
        StepBody::Conditional { then_step, else_step, .. } => {
            collect_parallel_substep_errors(then_step, errors);
            if let Some(else_step) = else_step {
                collect_parallel_substep_errors(else_step, errors);
            }
        }
        StepBody::ErrorHandler { body } => collect_parallel_substep_errors(body, errors),
        _ => {}
    }
}
