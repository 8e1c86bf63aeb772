//! `delete_file`: remove a single file inside the workspace.

use async_trait::async_trait;
use codeclaw_core::error::ToolError;
use codeclaw_core::tool::{SafetyTier, Tool, ToolResult};

use crate::path::PathPolicy;

pub struct FileDeleteTool {
    policy: PathPolicy,
}

impl FileDeleteTool {
    pub fn new(policy: PathPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for FileDeleteTool {
    fn name(&self) -> &str {
        "delete_file"
    }

    fn description(&self) -> &str {
        "Delete a single file. Directories are not removed."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "The file to delete" }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    fn tier(&self) -> SafetyTier {
        SafetyTier::Critical
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        let resolved = self.policy.resolve(path).map_err(|e| ToolError::PermissionDenied {
            tool_name: "delete_file".into(),
            reason: e.to_string(),
        })?;

        if resolved.is_dir() {
            return Ok(ToolResult::failed(format!("{path} is a directory")));
        }

        match tokio::fs::remove_file(&resolved).await {
            Ok(()) => Ok(ToolResult::ok(format!("Deleted {}", self.policy.display(&resolved)))),
            Err(e) => Ok(ToolResult::failed(format!("Failed to delete file: {e}"))),
        }
    }
}
