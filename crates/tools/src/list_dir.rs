//! `list_directory`: list a directory tree inside the workspace.

use async_trait::async_trait;
use codeclaw_core::error::ToolError;
use codeclaw_core::tool::{Tool, ToolResult};

use crate::path::PathPolicy;
use crate::walk::walk;

const MAX_ENTRIES: usize = 500;

pub struct ListDirectoryTool {
    policy: PathPolicy,
}

impl ListDirectoryTool {
    pub fn new(policy: PathPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List files and directories. Hidden entries and build output are skipped. \
         Directories end with '/'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Directory to list (default: project root)" },
                "depth": { "type": "integer", "minimum": 1, "maximum": 5, "description": "How many levels to descend (default 1)" }
            },
            "additionalProperties": false
        })
    }

    fn is_read_only(&self) -> bool {
        true
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = arguments["path"].as_str().unwrap_or(".");
        let depth = arguments["depth"].as_u64().unwrap_or(1) as usize;

        let resolved = self.policy.resolve(path).map_err(|e| ToolError::PermissionDenied {
            tool_name: "list_directory".into(),
            reason: e.to_string(),
        })?;
        if !resolved.is_dir() {
            return Ok(ToolResult::failed(format!("{path} is not a directory")));
        }

        let root = resolved.clone();
        let (entries, truncated) = tokio::task::spawn_blocking(move || walk(&root, depth, MAX_ENTRIES))
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "list_directory".into(),
                reason: e.to_string(),
            })?;

        let mut lines: Vec<String> = entries
            .iter()
            .map(|e| {
                let rel = e.path.strip_prefix(&resolved).unwrap_or(&e.path).to_string_lossy();
                if e.is_dir { format!("{rel}/") } else { rel.into_owned() }
            })
            .collect();
        if lines.is_empty() {
            lines.push("(empty)".into());
        }
        if truncated {
            lines.push(format!("... (truncated at {MAX_ENTRIES} entries)"));
        }

        Ok(ToolResult::ok(lines.join("\n")))
    }
}
