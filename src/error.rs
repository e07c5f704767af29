//! Error taxonomy shared across the registry, executor, cache, and chain engine.
//!
//! Mirrors the builder-style `error_context()` entry point the rest of the
//! crate calls into: accumulate context (`with_tool`, `with_step`) and then
//! finalize into a concrete [`ToolError`] variant.

use std::time::Duration;

/// Result alias used throughout the crate.
pub type ToolResult<T> = Result<T, ToolError>;

/// The error taxonomy for tool registration, execution, caching, and chain
/// orchestration (spec "Error Handling Design").
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("tool '{tool}' not found in registry")]
    ToolNotFound { tool: String },

    #[error("tool '{tool}' is already registered")]
    RegistrationError { tool: String, message: String },

    #[error("invalid parameters for '{tool}': {message}")]
    InvalidParameters { tool: String, message: String },

    #[error("serialization error for '{tool}': {source}")]
    SerializationError {
        tool: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("execution of '{tool}' failed: {message}")]
    ExecutionFailed { tool: String, message: String },

    #[error("execution of '{tool}' timed out after {duration:?}")]
    TimeoutError { tool: String, duration: Duration },

    #[error("chain validation failed: {message}")]
    ValidationError { message: String },

    #[error("step '{step}' failed: {message}")]
    StepFailed { step: String, message: String },

    #[error("step '{step}' threw an exception: {message}")]
    StepException { step: String, message: String },

    #[error("execution was cancelled")]
    Cancelled,

    #[error("chain engine encountered an unexpected failure: {message}")]
    ChainException { message: String },

    #[error("cache operation failed: {message}")]
    CacheError { message: String },

    #[error("security violation reported by executor: {message}")]
    SecurityViolation { message: String },
}

/// Accumulates context (tool name, step name) before finalizing into a
/// [`ToolError`]. Entry point is the free function [`error_context`].
#[derive(Debug, Default, Clone)]
pub struct ErrorContext {
    tool: Option<String>,
    step: Option<String>,
}

impl ErrorContext {
    /// Attach a tool name to the error about to be constructed.
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = Some(tool.into());
        self
    }

    /// Attach a step name to the error about to be constructed.
    pub fn with_step(mut self, step: impl Into<String>) -> Self {
        self.step = Some(step.into());
        self
    }

    fn tool_or_unknown(&self) -> String {
        self.tool.clone().unwrap_or_else(|| "<unknown>".to_string())
    }

    fn step_or_unknown(&self) -> String {
        self.step.clone().unwrap_or_else(|| "<unknown>".to_string())
    }

    pub fn tool_not_found(self) -> ToolError {
        ToolError::ToolNotFound {
            tool: self.tool_or_unknown(),
        }
    }

    pub fn registration_error(self, message: impl Into<String>) -> ToolError {
        ToolError::RegistrationError {
            tool: self.tool_or_unknown(),
            message: message.into(),
        }
    }

    pub fn invalid_parameters(self, message: impl Into<String>) -> ToolError {
        ToolError::InvalidParameters {
            tool: self.tool_or_unknown(),
            message: message.into(),
        }
    }

    pub fn serialization_error(self, source: serde_json::Error) -> ToolError {
        ToolError::SerializationError {
            tool: self.tool_or_unknown(),
            source,
        }
    }

    pub fn execution_failed(self, message: impl Into<String>) -> ToolError {
        ToolError::ExecutionFailed {
            tool: self.tool_or_unknown(),
            message: message.into(),
        }
    }

    pub fn timeout_error(self, duration: Duration) -> ToolError {
        ToolError::TimeoutError {
            tool: self.tool_or_unknown(),
            duration,
        }
    }

    pub fn validation_error(self, message: impl Into<String>) -> ToolError {
        ToolError::ValidationError {
            message: message.into(),
        }
    }

    pub fn step_failed(self, message: impl Into<String>) -> ToolError {
        ToolError::StepFailed {
            step: self.step_or_unknown(),
            message: message.into(),
        }
    }

    pub fn step_exception(self, message: impl Into<String>) -> ToolError {
        ToolError::StepException {
            step: self.step_or_unknown(),
            message: message.into(),
        }
    }

    pub fn cancelled_error(self) -> ToolError {
        ToolError::Cancelled
    }

    pub fn chain_exception(self, message: impl Into<String>) -> ToolError {
        ToolError::ChainException {
            message: message.into(),
        }
    }

    pub fn cache_error(self, message: impl Into<String>) -> ToolError {
        ToolError::CacheError {
            message: message.into(),
        }
    }

    pub fn security_violation(self, message: impl Into<String>) -> ToolError {
        ToolError::SecurityViolation {
            message: message.into(),
        }
    }
}

/// Start building a [`ToolError`]: `error_context().with_tool("x").tool_not_found()`.
pub fn error_context() -> ErrorContext {
    ErrorContext::default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_context_includes_tool_name() {
        let err = error_context()
            .with_tool("calculator")
            .invalid_parameters("bad operand");
        let message = format!("{}", err);
        assert!(message.contains("calculator"));
        assert!(message.contains("bad operand"));
    }

    #[test]
    fn missing_context_falls_back_to_unknown() {
        let err = error_context().tool_not_found();
        assert!(matches!(err, ToolError::ToolNotFound { .. }));
    }
}
