//! Declarative macros for simplified tool creation, mirroring the
//! teacher's `toolkits::macros` module one-for-one but against this
//! crate's flat `crate::core`/`crate::error` layout instead of a nested
//! `toolkits` module.

/// Build a tool from a synchronous closure, skipping the usual
/// struct + `Tool<I, O>` impl boilerplate.
#[macro_export]
macro_rules! simple_tool {
    (
        name: $name:expr,
        description: $desc:expr,
        input: $input_type:ty,
        output: $output_type:ty,
        execute: $execute_fn:expr
    ) => {{
        use $crate::core::*;
        use $crate::error::*;

        #[derive(Clone)]
        struct SimpleTool {
            metadata: ToolMetadata,
        }

        impl SimpleTool {
            fn new() -> Self {
                Self {
                    metadata: ToolMetadata::new::<$input_type, $output_type>($name, $desc),
                }
            }
        }

        #[$crate::prelude::async_trait]
        impl Tool<$input_type, $output_type> for SimpleTool {
            fn metadata(&self) -> &ToolMetadata {
                &self.metadata
            }

            async fn execute(&self, input: $input_type) -> ToolResult<$output_type> {
                let execute_fn: fn($input_type) -> ToolResult<$output_type> = $execute_fn;
                execute_fn(input)
            }
        }

        SimpleTool::new()
    }};
}

/// Build a tool from an `async fn`-shaped closure returning a boxed
/// future, for bodies that need to `.await` something.
#[macro_export]
macro_rules! async_tool {
    (
        name: $name:expr,
        description: $desc:expr,
        input: $input_type:ty,
        output: $output_type:ty,
        execute: $execute_fn:expr
    ) => {{
        use $crate::core::*;
        use $crate::error::*;

        #[derive(Clone)]
        struct AsyncTool {
            metadata: ToolMetadata,
        }

        impl AsyncTool {
            fn new() -> Self {
                Self {
                    metadata: ToolMetadata::new::<$input_type, $output_type>($name, $desc),
                }
            }
        }

        #[$crate::prelude::async_trait]
        impl Tool<$input_type, $output_type> for AsyncTool {
            fn metadata(&self) -> &ToolMetadata {
                &self.metadata
            }

            async fn execute(&self, input: $input_type) -> ToolResult<$output_type> {
                let execute_fn: fn(
                    $input_type,
                ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ToolResult<$output_type>> + Send>> = $execute_fn;
                execute_fn(input).await
            }
        }

        AsyncTool::new()
    }};
}

/// Build a tool that runs a validation closure before the execute
/// closure, short-circuiting with the validation's error on failure.
#[macro_export]
macro_rules! validated_tool {
    (
        name: $name:expr,
        description: $desc:expr,
        input: $input_type:ty,
        output: $output_type:ty,
        validate: $validate_fn:expr,
        execute: $execute_fn:expr
    ) => {{
        use $crate::core::*;
        use $crate::error::*;

        #[derive(Clone)]
        struct ValidatedTool {
            metadata: ToolMetadata,
        }

        impl ValidatedTool {
            fn new() -> Self {
                Self {
                    metadata: ToolMetadata::new::<$input_type, $output_type>($name, $desc),
                }
            }
        }

        #[$crate::prelude::async_trait]
        impl Tool<$input_type, $output_type> for ValidatedTool {
            fn metadata(&self) -> &ToolMetadata {
                &self.metadata
            }

            async fn execute(&self, input: $input_type) -> ToolResult<$output_type> {
                let validate_fn: fn(&$input_type) -> ToolResult<()> = $validate_fn;
                validate_fn(&input)?;

                let execute_fn: fn($input_type) -> ToolResult<$output_type> = $execute_fn;
                execute_fn(input)
            }
        }

        ValidatedTool::new()
    }};
}

#[cfg(test)]
mod tests {
    use crate::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct TestInput {
        value: i32,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct TestOutput {
        result: i32,
    }

    impl ToolInput for TestInput {}
    impl ToolOutput for TestOutput {}

    #[tokio::test]
    async fn simple_tool_macro_builds_a_working_tool() {
        let tool = simple_tool! {
            name: "test_tool",
            description: "A test tool",
            input: TestInput,
            output: TestOutput,
            execute: |input: TestInput| -> ToolResult<TestOutput> {
                Ok(TestOutput { result: input.value * 2 })
            }
        };

        let output = tool.execute(TestInput { value: 5 }).await.unwrap();
        assert_eq!(output.result, 10);
    }

    #[tokio::test]
    async fn validated_tool_macro_rejects_before_executing() {
        let tool = validated_tool! {
            name: "validated",
            description: "A validated tool",
            input: TestInput,
            output: TestOutput,
            validate: |input: &TestInput| -> ToolResult<()> {
                if input.value < 0 {
                    Err($crate::error::error_context().with_tool("validated").invalid_parameters("value must be non-negative"))
                } else {
                    Ok(())
                }
            },
            execute: |input: TestInput| -> ToolResult<TestOutput> {
                Ok(TestOutput { result: input.value })
            }
        };

        assert!(tool.execute(TestInput { value: -1 }).await.is_err());
        assert!(tool.execute(TestInput { value: 1 }).await.is_ok());
    }
}
