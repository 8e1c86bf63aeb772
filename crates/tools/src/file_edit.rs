//! `edit_file`: replace one exact occurrence of a snippet in a file.

use async_trait::async_trait;
use codeclaw_core::error::ToolError;
use codeclaw_core::tool::{SafetyTier, Tool, ToolResult};

use crate::path::PathPolicy;

pub struct FileEditTool {
    policy: PathPolicy,
}

impl FileEditTool {
    pub fn new(policy: PathPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for FileEditTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Replace an exact snippet of a file with new text. old_text must occur exactly once; \
         include enough surrounding lines to make it unique."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "old_text": { "type": "string", "minLength": 1 },
                "new_text": { "type": "string" }
            },
            "required": ["path", "old_text", "new_text"],
            "additionalProperties": false
        })
    }

    fn tier(&self) -> SafetyTier {
        SafetyTier::Dangerous
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;
        let old_text = arguments["old_text"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'old_text' argument".into()))?;
        let new_text = arguments["new_text"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'new_text' argument".into()))?;

        let resolved = self.policy.resolve(path).map_err(|e| ToolError::PermissionDenied {
            tool_name: "edit_file".into(),
            reason: e.to_string(),
        })?;

        let content = match tokio::fs::read_to_string(&resolved).await {
            Ok(content) => content,
            Err(e) => return Ok(ToolResult::failed(format!("Failed to read file: {e}"))),
        };

        match content.matches(old_text).count() {
            0 => return Ok(ToolResult::failed(format!("old_text not found in {path}"))),
            1 => {}
            n => {
                return Ok(ToolResult::failed(format!(
                    "old_text occurs {n} times in {path}; add context so it matches once"
                )));
            }
        }

        let updated = content.replacen(old_text, new_text, 1);
        match tokio::fs::write(&resolved, &updated).await {
            Ok(()) => Ok(ToolResult::ok(format!("Edited {}", self.policy.display(&resolved)))),
            Err(e) => Ok(ToolResult::failed(format!("Failed to write file: {e}"))),
        }
    }
}
