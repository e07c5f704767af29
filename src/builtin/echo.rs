//! A deliberately trivial tool used by the chain engine and cache tests
//! (and anywhere a doctest needs a tool without bringing in the
//! calculator's validation rules).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{Tool, ToolInput, ToolMetadata, ToolOutput};
use crate::error::ToolResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EchoInput {
    pub value: serde_json::Value,
}

impl ToolInput for EchoInput {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EchoOutput {
    pub value: serde_json::Value,
}

impl ToolOutput for EchoOutput {}

/// Returns its input unchanged. Useful as a cheap, side-effect-free step
/// in chain and cache scenarios where the point under test is the
/// orchestration, not the tool body.
#[derive(Debug, Clone)]
pub struct EchoTool {
    metadata: ToolMetadata,
}

impl EchoTool {
    pub fn new() -> Self {
        Self {
            metadata: ToolMetadata::new::<EchoInput, EchoOutput>("echo", "Returns its input unchanged")
                .version("1.0.0")
                .category("debug")
                .tags(["debug", "echo"]),
        }
    }
}

impl Default for EchoTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool<EchoInput, EchoOutput> for EchoTool {
    fn metadata(&self) -> &ToolMetadata {
        &self.metadata
    }

    async fn execute(&self, input: EchoInput) -> ToolResult<EchoOutput> {
        Ok(EchoOutput { value: input.value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_its_input() {
        let tool = EchoTool::new();
        let out = tool
            .execute(EchoInput {
                value: serde_json::json!({"a": 1}),
            })
            .await
            .unwrap();
        assert_eq!(out.value, serde_json::json!({"a": 1}));
    }
}
