//! # toolforge
//!
//! A process-local runtime for registering, executing, caching, and
//! chaining tools.
//!
//! - **Type-safe tool definitions** via `Tool<I, O>`, with a type-erased
//!   `DynTool` boundary for dynamic registration
//! - **Deterministic fingerprinting** of tool invocations for caching
//! - **An execution cache** with priority-aware LRU eviction, sliding and
//!   absolute expiration, and dependency-graph invalidation
//! - **A caching executor** decorator that activates per-request
//! - **A DAG-structured chain engine** with retry/backoff, conditional
//!   branching, parallel fan-out, and transform steps
//! - **A metrics collector** with percentiles, trends, and multi-format
//!   export
//! - **A lifecycle manager** tying registration, discovery, maintenance,
//!   and shutdown together
//!
//! ## Quick Start
//!
//! ```rust
//! use toolforge::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct CalculatorInput {
//!     operation: String,
//!     a: f64,
//!     b: f64,
//! }
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct CalculatorOutput {
//!     result: f64,
//! }
//!
//! impl ToolInput for CalculatorInput {}
//! impl ToolOutput for CalculatorOutput {}
//!
//! #[derive(Clone)]
//! struct Calculator {
//!     metadata: ToolMetadata,
//! }
//!
//! impl Calculator {
//!     fn new() -> Self {
//!         Self {
//!             metadata: ToolMetadata::new::<CalculatorInput, CalculatorOutput>(
//!                 "calculator",
//!                 "A simple calculator tool"
//!             ),
//!         }
//!     }
//! }
//!
//! #[async_trait]
//! impl Tool<CalculatorInput, CalculatorOutput> for Calculator {
//!     fn metadata(&self) -> &ToolMetadata {
//!         &self.metadata
//!     }
//!
//!     async fn execute(&self, input: CalculatorInput) -> ToolResult<CalculatorOutput> {
//!         let result = match input.operation.as_str() {
//!             "add" => input.a + input.b,
//!             "subtract" => input.a - input.b,
//!             "multiply" => input.a * input.b,
//!             "divide" => input.a / input.b,
//!             _ => return Err(error_context().invalid_parameters("Invalid operation")),
//!         };
//!         Ok(CalculatorOutput { result })
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Create a tool registry and register tools
//! let registry = ToolRegistry::builder()
//!     .with_tool(Calculator::new())?
//!     .build();
//!
//! // Create an executor
//! let executor = ToolExecutor::builder(registry)
//!     .timeout(std::time::Duration::from_secs(30))
//!     .build();
//!
//! // Execute a tool
//! let input = serde_json::json!({
//!     "operation": "add",
//!     "a": 10.0,
//!     "b": 20.0
//! });
//! let result = executor.execute_tool("calculator", input, None).await?;
//! println!("Result: {}", serde_json::to_string_pretty(&result.data)?);
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod core;
pub mod error;
pub mod macros;
pub mod parameters;
pub mod registry;

// Fingerprinting, caching, and the caching decorator
pub mod cache;
pub mod caching_executor;
pub mod fingerprint;

// Execution
pub mod executor;

// Chain engine
pub mod chain;

// Discovery and lifecycle
pub mod discovery;
pub mod lifecycle;

// Metrics
pub mod metrics;

// Built-in tools
#[cfg(feature = "builtin-tools")]
pub mod builtin;

// Enterprise features
#[cfg(feature = "config-management")]
pub mod config;

/// Prelude module for convenient imports
pub mod prelude {
    //! Common imports for using toolforge.
    //!
    //! This module re-exports the most commonly used types and traits,
    //! making it easy to get started.

    // Core traits and types
    pub use crate::core::{conversions, DynTool, IntoDynTool, Tool, ToolInput, ToolMetadata, ToolWrapper};

    // Registry and execution
    pub use crate::executor::{
        ExecutionConfig, ExecutionContext, ExecutionRequest, ExecutionResult, Executor, ExecutorBuilder, ToolExecutor,
    };
    pub use crate::registry::{RegistryBuilder, ToolRegistry};

    // Caching
    pub use crate::cache::{CacheSetOptions, ExecutionCache, Priority};
    pub use crate::caching_executor::CachingExecutor;
    pub use crate::fingerprint::{fingerprint, FingerprintContext};

    // Chain engine
    pub use crate::chain::{Chain, ChainContextHandle, ChainEngine, ChainResult, ChainStatus, Step, StepResult};

    // Lifecycle and discovery
    pub use crate::discovery::{Discovery, DiscoveryOptions, NullDiscovery};
    pub use crate::lifecycle::{LifecycleManager, LifecycleState};

    // Metrics
    pub use crate::metrics::{ExecutionRecord, MetricsCollector};

    // Error handling
    pub use crate::error::{error_context, ToolError, ToolResult};

    // Built-in tools
    #[cfg(feature = "builtin-tools")]
    pub use crate::builtin::*;

    // External re-exports for convenience
    pub use async_trait::async_trait;
    pub use serde::{Deserialize, Serialize};

    // Macros
    pub use crate::{async_tool, simple_tool, validated_tool};
}

// Re-export commonly used types at crate root for convenience
pub use crate::core::{Tool, ToolInput, ToolMetadata, ToolOutput};
pub use crate::error::{ToolError, ToolResult};
pub use crate::executor::ToolExecutor;
pub use crate::registry::ToolRegistry;
