//! End-to-end scenarios for the chain engine: conditional branching,
//! parallel fan-out, transforms, and retry/backoff, driven entirely
//! through the public API against the built-in calculator/echo tools.

use std::sync::Arc;
use std::time::Duration;

use toolforge::builtin::{CalculatorTool, EchoTool};
use toolforge::chain::{Chain, ChainEngine, ChainStatus, Step};
use toolforge::executor::{ExecutionContext, ToolExecutor};
use toolforge::registry::ToolRegistry;

fn engine() -> ChainEngine {
    let registry = ToolRegistry::new();
    registry.register(CalculatorTool::new()).unwrap();
    registry.register(EchoTool::new()).unwrap();
    ChainEngine::new(Arc::new(ToolExecutor::new(registry)))
}

#[tokio::test]
async fn conditional_step_runs_then_branch_when_predicate_is_true() {
    let chain = Chain::new("cond", "conditional").with_step(Step::conditional(
        "c",
        "c",
        |_ctx| true,
        Step::tool(
            "then",
            "then",
            "calculator",
            serde_json::json!({"operation": "add", "a": 1.0, "b": 2.0}),
        ),
        Some(Step::tool(
            "else",
            "else",
            "calculator",
            serde_json::json!({"operation": "subtract", "a": 1.0, "b": 2.0}),
        )),
    ));

    let result = engine().execute(&chain, serde_json::Value::Null, ExecutionContext::default(), None).await;
    assert_eq!(result.status, ChainStatus::Completed);
    assert!(result.step_results.contains_key("then"));
    assert!(!result.step_results.contains_key("else"));
}

#[tokio::test]
async fn conditional_step_runs_else_branch_when_predicate_is_false() {
    let chain = Chain::new("cond", "conditional").with_step(Step::conditional(
        "c",
        "c",
        |_ctx| false,
        Step::tool(
            "then",
            "then",
            "calculator",
            serde_json::json!({"operation": "add", "a": 1.0, "b": 2.0}),
        ),
        Some(Step::tool(
            "else",
            "else",
            "calculator",
            serde_json::json!({"operation": "subtract", "a": 1.0, "b": 2.0}),
        )),
    ));

    let result = engine().execute(&chain, serde_json::Value::Null, ExecutionContext::default(), None).await;
    assert_eq!(result.status, ChainStatus::Completed);
    assert!(!result.step_results.contains_key("then"));
    assert!(result.step_results.contains_key("else"));
}

#[tokio::test]
async fn parallel_step_runs_every_substep_and_aggregates_results() {
    let chain = Chain::new("par", "fan-out").with_step(Step::parallel(
        "p",
        "p",
        vec![
            Step::tool("x", "x", "echo", serde_json::json!({"value": "one"})),
            Step::tool("y", "y", "echo", serde_json::json!({"value": "two"})),
            Step::tool("z", "z", "echo", serde_json::json!({"value": "three"})),
        ],
    ));

    let result = engine().execute(&chain, serde_json::Value::Null, ExecutionContext::default(), None).await;
    assert_eq!(result.status, ChainStatus::Completed);
    for id in ["x", "y", "z"] {
        assert!(result.step_results.get(id).map(|r| r.success).unwrap_or(false));
    }
}

#[tokio::test]
async fn transform_step_reshapes_the_previous_result() {
    let chain = Chain::new("xf", "transform")
        .with_step(Step::tool(
            "calc",
            "calc",
            "calculator",
            serde_json::json!({"operation": "add", "a": 2.0, "b": 3.0}),
        ))
        .with_step(
            Step::transform("double", "double", |previous, _ctx| {
                let value = previous.and_then(|v| v.get("result").and_then(|r| r.as_f64())).unwrap_or(0.0);
                Ok(serde_json::json!({ "doubled": value * 2.0 }))
            })
            .with_dependencies(["calc"]),
        );

    let result = engine().execute(&chain, serde_json::Value::Null, ExecutionContext::default(), None).await;
    assert_eq!(result.status, ChainStatus::Completed);
    let transform_result = result.step_results.get("double").unwrap();
    assert_eq!(transform_result.data.as_ref().unwrap()["doubled"].as_f64().unwrap(), 10.0);
}

#[tokio::test]
async fn retryable_step_exhausts_retries_and_fails_within_a_deadline() {
    // "nonexistent" always fails; this exercises that retries happen
    // and the chain still terminates within a bounded wall-clock budget
    // rather than hanging (backoff is exponential: 2s then 4s for 2 retries).
    let chain = Chain::new("retry", "retry").with_step(Step::tool("a", "a", "nonexistent", serde_json::Value::Null).retryable(1));

    let started = std::time::Instant::now();
    let result = engine().execute(&chain, serde_json::Value::Null, ExecutionContext::default(), None).await;
    assert_eq!(result.status, ChainStatus::Failed);
    let step_result = result.step_results.get("a").unwrap();
    assert_eq!(step_result.retry_attempts, 1);
    assert!(started.elapsed() >= Duration::from_secs(2));
}

#[tokio::test]
async fn progress_callback_receives_events_for_every_top_level_step() {
    use std::sync::Mutex;

    let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let events_clone = Arc::clone(&events);
    let on_progress: toolforge::chain::ProgressCallback = Arc::new(move |event| {
        events_clone.lock().unwrap().push(event.message);
    });

    let chain = Chain::new("prog", "progress")
        .with_step(Step::tool("a", "a", "echo", serde_json::json!({"value": 1})))
        .with_step(Step::tool("b", "b", "echo", serde_json::json!({"value": 2})).with_dependencies(["a"]));

    let result = engine()
        .execute(&chain, serde_json::Value::Null, ExecutionContext::default(), Some(on_progress))
        .await;

    assert_eq!(result.status, ChainStatus::Completed);
    assert_eq!(events.lock().unwrap().len(), 2);
}
