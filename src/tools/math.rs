//! Built-in arithmetic backend: `add`, `multiply`, `divide`.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{Result, WeaveError};

use super::{LocalBackend, Tool, ToolContext, ToolOutput};

/// Name of the built-in math backend.
pub const MATH_BACKEND: &str = "math";

#[derive(Debug, Deserialize)]
struct Operands {
    a: i64,
    b: i64,
}

fn operands(args: Value) -> Result<Operands> {
    serde_json::from_value(args)
        .map_err(|e| WeaveError::Tool(format!("expected integer arguments 'a' and 'b': {}", e)))
}

fn operand_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "a": { "type": "integer", "description": "first int" },
            "b": { "type": "integer", "description": "second int" }
        },
        "required": ["a", "b"]
    })
}

/// `add(a, b) -> a + b`
pub struct AddTool;

#[async_trait]
impl Tool for AddTool {
    fn name(&self) -> &str {
        "add"
    }

    fn description(&self) -> &str {
        "Adds a and b"
    }

    fn parameters(&self) -> Value {
        operand_schema()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
        let Operands { a, b } = operands(args)?;
        let sum = a
            .checked_add(b)
            .ok_or_else(|| WeaveError::Tool("integer overflow".into()))?;
        Ok(ToolOutput::llm_only(sum.to_string()))
    }
}

/// `multiply(a, b) -> a * b`
pub struct MultiplyTool;

#[async_trait]
impl Tool for MultiplyTool {
    fn name(&self) -> &str {
        "multiply"
    }

    fn description(&self) -> &str {
        "Multiply a and b"
    }

    fn parameters(&self) -> Value {
        operand_schema()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
        let Operands { a, b } = operands(args)?;
        let product = a
            .checked_mul(b)
            .ok_or_else(|| WeaveError::Tool("integer overflow".into()))?;
        Ok(ToolOutput::llm_only(product.to_string()))
    }
}

/// `divide(a, b) -> a / b` as a float.
pub struct DivideTool;

#[async_trait]
impl Tool for DivideTool {
    fn name(&self) -> &str {
        "divide"
    }

    fn description(&self) -> &str {
        "Divide a and b"
    }

    fn parameters(&self) -> Value {
        operand_schema()
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
        let Operands { a, b } = operands(args)?;
        if b == 0 {
            return Ok(ToolOutput::error("Error: division by zero"));
        }
        let quotient = a as f64 / b as f64;
        Ok(ToolOutput::llm_only(format!("{:?}", quotient)))
    }
}

/// The local backend holding the three arithmetic tools.
pub fn math_backend() -> LocalBackend {
    LocalBackend::new(MATH_BACKEND)
        .with_tool(AddTool)
        .with_tool(MultiplyTool)
        .with_tool(DivideTool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolBackend;

    async fn run(tool: &dyn Tool, args: Value) -> Result<ToolOutput> {
        tool.execute(args, &ToolContext::new()).await
    }

    #[tokio::test]
    async fn test_add() {
        let out = run(&AddTool, json!({"a": 3, "b": 4})).await.unwrap();
        assert_eq!(out.for_llm, "7");
        assert_eq!(AddTool.description(), "Adds a and b");
    }

    #[tokio::test]
    async fn test_multiply() {
        let out = run(&MultiplyTool, json!({"a": -6, "b": 7})).await.unwrap();
        assert_eq!(out.for_llm, "-42");
    }

    #[tokio::test]
    async fn test_divide() {
        let out = run(&DivideTool, json!({"a": 7, "b": 2})).await.unwrap();
        assert_eq!(out.for_llm, "3.5");
        let out = run(&DivideTool, json!({"a": 8, "b": 2})).await.unwrap();
        assert_eq!(out.for_llm, "4.0");
    }

    #[tokio::test]
    async fn test_divide_by_zero_is_tool_error() {
        let out = run(&DivideTool, json!({"a": 1, "b": 0})).await.unwrap();
        assert!(out.is_error);
        assert!(out.for_llm.contains("division by zero"));
    }

    #[tokio::test]
    async fn test_bad_arguments() {
        let err = run(&AddTool, json!({"a": "three", "b": 4})).await.unwrap_err();
        assert!(matches!(err, WeaveError::Tool(_)));
        assert!(run(&AddTool, json!({"a": 1})).await.is_err());
    }

    #[tokio::test]
    async fn test_overflow() {
        let err = run(&MultiplyTool, json!({"a": i64::MAX, "b": 2})).await.unwrap_err();
        assert!(err.to_string().contains("overflow"));
    }

    #[tokio::test]
    async fn test_math_backend_tools() {
        let backend = math_backend();
        assert_eq!(backend.name(), MATH_BACKEND);
        let names: Vec<_> = backend
            .list_tools()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["add", "multiply", "divide"]);
    }
}
