//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act on the project:
//! read and edit files, run commands, search directories. The registry is
//! the boundary the agent talks to: it validates raw arguments, invokes
//! tools, and exposes the static safety partition of tool names.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::provider::ToolDefinition;

/// Risk classification of a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyTier {
    /// Read-only or informational
    Benign,
    /// Mutates files
    Dangerous,
    /// Deletes data or executes arbitrary commands
    Critical,
}

impl SafetyTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Benign => "benign",
            Self::Dangerous => "dangerous",
            Self::Critical => "critical",
        }
    }
}

/// The result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content
    pub output: String,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>) -> Self {
        Self { success: true, output: output.into() }
    }

    pub fn failed(output: impl Into<String>) -> Self {
        Self { success: false, output: output.into() }
    }
}

/// The core Tool trait.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "read_file", "execute_command").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// How risky this tool is.
    fn tier(&self) -> SafetyTier {
        SafetyTier::Benign
    }

    /// Whether this tool only inspects the project (granted during planning).
    fn is_read_only(&self) -> bool {
        false
    }

    /// Execute the tool with already-validated arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools, ordered by name.
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// All tool definitions (for sending to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// Definitions of the read-only tools only.
    pub fn read_only_definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .values()
            .filter(|t| t.is_read_only())
            .map(|t| t.to_definition())
            .collect()
    }

    /// Safety tier of a tool name. Unknown names are treated as dangerous.
    pub fn tier(&self, name: &str) -> SafetyTier {
        self.get(name).map_or(SafetyTier::Dangerous, |t| t.tier())
    }

    /// Whether a tool name belongs to the read-only partition.
    pub fn is_read_only(&self, name: &str) -> bool {
        self.get(name).is_some_and(|t| t.is_read_only())
    }

    /// Parse and validate raw JSON arguments against the tool's schema.
    ///
    /// An empty argument string is read as `{}`.
    pub fn validate(&self, name: &str, raw_arguments: &str) -> Result<serde_json::Value, ToolError> {
        let tool = self.get(name).ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let raw = raw_arguments.trim();
        let raw = if raw.is_empty() { "{}" } else { raw };
        let arguments: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| ToolError::InvalidArguments(format!("arguments are not valid JSON: {e}")))?;

        let schema = tool.parameters_schema();
        let validator = jsonschema::validator_for(&schema)
            .map_err(|e| ToolError::InvalidArguments(format!("tool schema is invalid: {e}")))?;
        if let Err(err) = validator.validate(&arguments) {
            return Err(ToolError::InvalidArguments(err.to_string()));
        }

        Ok(arguments)
    }

    /// Invoke a tool with validated arguments.
    pub async fn invoke(&self, name: &str, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let tool = self.tools.get(name).ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.execute(arguments).await
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
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
        fn name(&self) -> &str { "echo" }
        fn description(&self) -> &str { "Echoes back the input" }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        fn is_read_only(&self) -> bool { true }
        async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::ok(arguments["text"].as_str().unwrap_or("")))
        }
    }

    struct WipeTool;

    #[async_trait]
    impl Tool for WipeTool {
        fn name(&self) -> &str { "wipe" }
        fn description(&self) -> &str { "Deletes everything" }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({ "type": "object", "properties": {} })
        }
        fn tier(&self) -> SafetyTier { SafetyTier::Critical }
        async fn execute(&self, _arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
            Ok(ToolResult::ok("wiped"))
        }
    }

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        registry.register(Box::new(WipeTool));
        registry
    }

    #[test]
    fn registry_register_and_lookup() {
        let registry = registry();
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.names(), vec!["echo", "wipe"]);
    }

    #[test]
    fn partition_by_tier_and_access() {
        let registry = registry();
        assert_eq!(registry.tier("echo"), SafetyTier::Benign);
        assert_eq!(registry.tier("wipe"), SafetyTier::Critical);
        assert_eq!(registry.tier("unknown"), SafetyTier::Dangerous);
        assert!(registry.is_read_only("echo"));
        assert!(!registry.is_read_only("wipe"));

        let defs = registry.read_only_definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
    }

    #[test]
    fn validate_accepts_matching_arguments() {
        let args = registry().validate("echo", r#"{"text":"hi"}"#).unwrap();
        assert_eq!(args["text"], "hi");
    }

    #[test]
    fn validate_rejects_malformed_json() {
        let err = registry().validate("echo", r#"{"text":"#).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(ref m) if m.contains("not valid JSON")));
    }

    #[test]
    fn validate_rejects_missing_required_field() {
        let err = registry().validate("echo", "{}").unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }

    #[test]
    fn validate_treats_empty_arguments_as_empty_object() {
        assert!(registry().validate("wipe", "").is_ok());
    }

    #[test]
    fn validate_unknown_tool() {
        let err = registry().validate("nope", "{}").unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[tokio::test]
    async fn registry_invoke_tool() {
        let registry = registry();
        let args = registry.validate("echo", r#"{"text":"hello world"}"#).unwrap();
        let result = registry.invoke("echo", args).await.unwrap();
        assert!(result.success);
        assert_eq!(result.output, "hello world");
    }

    #[tokio::test]
    async fn registry_invoke_missing_tool() {
        let err = ToolRegistry::new()
            .invoke("nonexistent", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }
}
