//! Tool backends
//!
//! A backend is an independently reachable source of tools. The registry
//! only talks to backends through [`ToolBackend`], so local capability sets
//! and remote MCP servers are interchangeable.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, WeaveError};
use crate::providers::ToolDefinition;

use super::{Tool, ToolContext, ToolOutput};

/// A tool as advertised by its backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// Tool name on the backend
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// JSON Schema of the arguments
    #[serde(rename = "inputSchema", default = "empty_schema")]
    pub input_schema: Value,
}

fn empty_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

impl ToolSpec {
    pub fn new(name: &str, description: &str, input_schema: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
        }
    }

    /// Definition under the given exposed name.
    pub fn definition(&self, exposed_name: &str) -> ToolDefinition {
        ToolDefinition::new(exposed_name, &self.description, self.input_schema.clone())
    }
}

/// A source of tools.
///
/// `list_tools` doubles as the liveness probe; it must finish in bounded
/// time or be wrapped in a timeout by the caller.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    /// Backend name, used in logs and for namespacing.
    fn name(&self) -> &str;

    /// Short transport label ("local", "stdio", "http").
    fn transport(&self) -> &str;

    /// List the tools this backend offers, in its own order.
    async fn list_tools(&self) -> Result<Vec<ToolSpec>>;

    /// Invoke one tool by its backend-local name.
    async fn call_tool(&self, name: &str, args: Value, ctx: &ToolContext) -> Result<ToolOutput>;
}

/// In-process capability set built from [`Tool`] trait objects.
pub struct LocalBackend {
    name: String,
    tools: Vec<Arc<dyn Tool>>,
}

impl LocalBackend {
    /// Create an empty local backend.
    ///
    /// # Example
    /// ```
    /// use toolweave::tools::LocalBackend;
    /// use toolweave::tools::math::AddTool;
    ///
    /// let backend = LocalBackend::new("calc").with_tool(AddTool);
    /// assert_eq!(backend.len(), 1);
    /// ```
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tools: Vec::new(),
        }
    }

    /// Add a tool. A later tool with the same name shadows the earlier one.
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[async_trait]
impl ToolBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn transport(&self) -> &str {
        "local"
    }

    async fn list_tools(&self) -> Result<Vec<ToolSpec>> {
        Ok(self
            .tools
            .iter()
            .map(|t| ToolSpec::new(t.name(), t.description(), t.parameters()))
            .collect())
    }

    async fn call_tool(&self, name: &str, args: Value, ctx: &ToolContext) -> Result<ToolOutput> {
        let tool = self
            .tools
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| WeaveError::Tool(format!("backend '{}' has no tool '{}'", self.name, name)))?;
        tool.execute(args, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::math::{AddTool, MultiplyTool};
    use serde_json::json;

    #[tokio::test]
    async fn test_local_backend_lists_in_order() {
        let backend = LocalBackend::new("calc")
            .with_tool(AddTool)
            .with_tool(MultiplyTool);
        let tools = backend.list_tools().await.unwrap();
        let names: Vec<_> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["add", "multiply"]);
        assert_eq!(backend.transport(), "local");
    }

    #[tokio::test]
    async fn test_local_backend_call() {
        let backend = LocalBackend::new("calc").with_tool(AddTool);
        let out = backend
            .call_tool("add", json!({"a": 3, "b": 4}), &ToolContext::new())
            .await
            .unwrap();
        assert_eq!(out.for_llm, "7");
    }

    #[tokio::test]
    async fn test_local_backend_unknown_tool() {
        let backend = LocalBackend::new("calc").with_tool(AddTool);
        let err = backend
            .call_tool("nope", json!({}), &ToolContext::new())
            .await
            .unwrap_err();
        assert!(matches!(err, WeaveError::Tool(_)));
    }

    #[test]
    fn test_with_tool_replaces_same_name() {
        let backend = LocalBackend::new("calc").with_tool(AddTool).with_tool(AddTool);
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn test_tool_spec_deserializes_mcp_shape() {
        let spec: ToolSpec = serde_json::from_value(json!({
            "name": "get_weather",
            "description": "Weather for a city",
            "inputSchema": {"type": "object", "properties": {"city": {"type": "string"}}}
        }))
        .unwrap();
        assert_eq!(spec.name, "get_weather");
        assert!(spec.input_schema["properties"]["city"].is_object());

        let bare: ToolSpec = serde_json::from_value(json!({"name": "ping"})).unwrap();
        assert_eq!(bare.description, "");
        assert_eq!(bare.input_schema["type"], "object");
    }
}
