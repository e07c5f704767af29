//! Chain step sum type (spec §3 "Chain Step", §4.5 "Step kinds").
//!
//! Modeled as a closed struct holding an engine-visible [`StepKind`] tag
//! plus a [`StepBody`] payload (spec §9 "Design Notes": "tagged sum ...
//! the engine pattern-matching on the tag" — chosen over a trait-object-
//! per-kind split because `ErrorHandler`'s fail-chain exemption needs the
//! engine to classify a step without downcasting).

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::chain::context::ChainContextHandle;
use crate::error::ToolResult;

pub type StepId = String;

/// Engine-visible classification of a step (spec §4.5, §9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Tool,
    Conditional,
    Parallel,
    Transform,
    /// Reserved for extension (spec §9: "appears in the enumeration but
    /// has no source implementation"). [`crate::chain::engine::ChainEngine`]
    /// always fails a `Loop` step with a clear "not implemented" message.
    Loop,
    ErrorHandler,
    Custom,
}

type Predicate = Arc<dyn Fn(&ChainContextHandle) -> bool + Send + Sync>;
type TransformFn = Arc<dyn Fn(Option<serde_json::Value>, &ChainContextHandle) -> ToolResult<serde_json::Value> + Send + Sync>;
type CustomFuture = Pin<Box<dyn Future<Output = ToolResult<serde_json::Value>> + Send>>;
type CustomFn = Arc<dyn Fn(Arc<ChainContextHandle>) -> CustomFuture + Send + Sync>;

/// Per-kind payload. Only the engine (`chain/engine.rs`) matches on this;
/// everything else goes through [`Step`]'s public fields.
pub enum StepBody {
    Tool {
        tool_id: String,
        params: serde_json::Value,
    },
    Conditional {
        predicate: Predicate,
        then_step: Box<Step>,
        else_step: Option<Box<Step>>,
    },
    Parallel {
        substeps: Vec<Step>,
    },
    Transform {
        transform: TransformFn,
    },
    /// Reserved; see [`StepKind::Loop`].
    Loop,
    ErrorHandler {
        body: Box<Step>,
    },
    Custom {
        run: CustomFn,
    },
}

/// One node in a [`crate::chain::context::Chain`] (spec §3 "Chain Step").
pub struct Step {
    pub id: StepId,
    pub name: String,
    /// Step ids that must finish (successfully or not — see engine's
    /// fail-chain policy) before this step runs.
    pub dependencies: Vec<StepId>,
    pub is_retryable: bool,
    pub max_retries: u32,
    pub kind: StepKind,
    pub body: StepBody,
}

impl Step {
    fn base(id: impl Into<String>, name: impl Into<String>, kind: StepKind, body: StepBody) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            dependencies: Vec::new(),
            is_retryable: false,
            max_retries: 0,
            kind,
            body,
        }
    }

    pub fn tool(id: impl Into<String>, name: impl Into<String>, tool_id: impl Into<String>, params: serde_json::Value) -> Self {
        Self::base(id, name, StepKind::Tool, StepBody::Tool { tool_id: tool_id.into(), params })
    }

    pub fn conditional(
        id: impl Into<String>,
        name: impl Into<String>,
        predicate: impl Fn(&ChainContextHandle) -> bool + Send + Sync + 'static,
        then_step: Step,
        else_step: Option<Step>,
    ) -> Self {
        Self::base(
            id,
            name,
            StepKind::Conditional,
            StepBody::Conditional {
                predicate: Arc::new(predicate),
                then_step: Box::new(then_step),
                else_step: else_step.map(Box::new),
            },
        )
    }

    pub fn parallel(id: impl Into<String>, name: impl Into<String>, substeps: Vec<Step>) -> Self {
        Self::base(id, name, StepKind::Parallel, StepBody::Parallel { substeps })
    }

    pub fn transform(
        id: impl Into<String>,
        name: impl Into<String>,
        transform: impl Fn(Option<serde_json::Value>, &ChainContextHandle) -> ToolResult<serde_json::Value> + Send + Sync + 'static,
    ) -> Self {
        Self::base(id, name, StepKind::Transform, StepBody::Transform { transform: Arc::new(transform) })
    }

    pub fn error_handler(id: impl Into<String>, name: impl Into<String>, body: Step) -> Self {
        Self::base(id, name, StepKind::ErrorHandler, StepBody::ErrorHandler { body: Box::new(body) })
    }

    pub fn custom<F, Fut>(id: impl Into<String>, name: impl Into<String>, run: F) -> Self
    where
        F: Fn(Arc<ChainContextHandle>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ToolResult<serde_json::Value>> + Send + 'static,
    {
        Self::base(
            id,
            name,
            StepKind::Custom,
            StepBody::Custom {
                run: Arc::new(move |ctx| Box::pin(run(ctx))),
            },
        )
    }

    /// Reserved; a `Loop` step always fails when executed (spec §9).
    pub fn reserved_loop(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::base(id, name, StepKind::Loop, StepBody::Loop)
    }

    pub fn with_dependencies(mut self, deps: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn retryable(mut self, max_retries: u32) -> Self {
        self.is_retryable = true;
        self.max_retries = max_retries;
        self
    }
}
