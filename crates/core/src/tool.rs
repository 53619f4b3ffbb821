//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what the model may call during a step: inspect the canvas,
//! look up guidelines, or run a batch-edit script. Some tools execute
//! in-process; others are only declared to the model and executed by the
//! client that owns the canvas.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// A request to execute a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call ID this result is for
    pub call_id: String,

    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content
    pub output: String,

    /// Optional structured data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            call_id: String::new(),
            success: true,
            output: output.into(),
            data: None,
        }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self {
            success: false,
            ..Self::ok(output)
        }
    }

    /// Structured result; `output` carries the pretty-printed JSON.
    pub fn json(success: bool, data: serde_json::Value) -> Self {
        let output = serde_json::to_string_pretty(&data).unwrap_or_else(|_| data.to_string());
        Self {
            call_id: String::new(),
            success,
            output,
            data: Some(data),
        }
    }
}

/// The core Tool trait.
///
/// Each executable tool implements this trait. Tools are registered in the
/// [`ToolRegistry`] and made available to the session driver.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "batch_design", "get_guidelines").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

enum Entry {
    Executable(Box<dyn Tool>),
    Declared(ToolDefinition),
}

impl Entry {
    fn name(&self) -> &str {
        match self {
            Entry::Executable(tool) => tool.name(),
            Entry::Declared(def) => &def.name,
        }
    }
}

/// An ordered registry of available tools.
///
/// The session driver uses this to:
/// 1. Get tool definitions to send to the LLM, in registration order
/// 2. Look up and execute tools when the LLM requests them
/// 3. Tell declaration-only tools apart so their calls can be relayed
pub struct ToolRegistry {
    entries: Vec<Entry>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn upsert(&mut self, entry: Entry) {
        match self.entries.iter_mut().find(|e| e.name() == entry.name()) {
            Some(slot) => *slot = entry,
            None => self.entries.push(entry),
        }
    }

    /// Register an executable tool. Replaces any existing entry with the same name
    /// while keeping its position.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.upsert(Entry::Executable(tool));
    }

    /// Declare a tool the model may call but that executes elsewhere.
    pub fn declare(&mut self, definition: ToolDefinition) {
        self.upsert(Entry::Declared(definition));
    }

    /// Get an executable tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.entries.iter().find_map(|e| match e {
            Entry::Executable(tool) if tool.name() == name => Some(tool.as_ref()),
            _ => None,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name() == name)
    }

    pub fn is_executable(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Get all tool definitions (for sending to the LLM).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.entries
            .iter()
            .map(|e| match e {
                Entry::Executable(tool) => tool.to_definition(),
                Entry::Declared(def) => def.clone(),
            })
            .collect()
    }

    /// Execute a tool call.
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        let tool = match self.get(&call.name) {
            Some(tool) => tool,
            None if self.contains(&call.name) => {
                return Err(ToolError::ClientSide(call.name.clone()));
            }
            None => return Err(ToolError::NotFound(call.name.clone())),
        };
        let mut result = tool.execute(call.arguments.clone()).await?;
        result.call_id = call.id.clone();
        Ok(result)
    }

    /// List all registered tool names, in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
            let text = arguments["text"].as_str().unwrap_or("").to_string();
            Ok(ToolResult::ok(text))
        }
    }

    fn declared(name: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.into(),
            description: "client side".into(),
            parameters: serde_json::json!({"type": "object"}),
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn registry_keeps_insertion_order() {
        let mut registry = ToolRegistry::new();
        registry.declare(declared("zeta"));
        registry.register(Box::new(EchoTool));
        registry.declare(declared("alpha"));
        assert_eq!(registry.names(), vec!["zeta", "echo", "alpha"]);
        let defs = registry.definitions();
        assert_eq!(defs[1].name, "echo");
    }

    #[test]
    fn declared_tools_are_not_executable() {
        let mut registry = ToolRegistry::new();
        registry.declare(declared("batch_design"));
        assert!(registry.contains("batch_design"));
        assert!(!registry.is_executable("batch_design"));
    }

    #[tokio::test]
    async fn registry_execute_tool_sets_call_id() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        let call = ToolCall {
            id: "call_1".into(),
            name: "echo".into(),
            arguments: serde_json::json!({"text": "hello world"}),
        };
        let result = registry.execute(&call).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output, "hello world");
        assert_eq!(result.call_id, "call_1");
    }

    #[tokio::test]
    async fn registry_execute_missing_and_client_side() {
        let mut registry = ToolRegistry::new();
        registry.declare(declared("get_variables"));
        let call = ToolCall {
            id: "call_1".into(),
            name: "nonexistent".into(),
            arguments: serde_json::json!({}),
        };
        let err = registry.execute(&call).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));

        let call = ToolCall {
            name: "get_variables".into(),
            ..call
        };
        let err = registry.execute(&call).await.unwrap_err();
        assert!(matches!(err, ToolError::ClientSide(_)));
    }
}
