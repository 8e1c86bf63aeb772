//! `read_file`: read a text file inside the workspace.

use async_trait::async_trait;
use codeclaw_core::error::ToolError;
use codeclaw_core::tool::{Tool, ToolResult};

use crate::path::PathPolicy;

pub struct FileReadTool {
    policy: PathPolicy,
}

impl FileReadTool {
    pub fn new(policy: PathPolicy) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file. Paths are relative to the project root. \
         Optionally restrict to a 1-based inclusive line range."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "The file path to read" },
                "start_line": { "type": "integer", "minimum": 1 },
                "end_line": { "type": "integer", "minimum": 1 }
            },
            "required": ["path"],
            "additionalProperties": false
        })
    }

    fn is_read_only(&self) -> bool {
        true
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        let resolved = self.policy.resolve(path).map_err(|e| ToolError::PermissionDenied {
            tool_name: "read_file".into(),
            reason: e.to_string(),
        })?;

        let content = match tokio::fs::read_to_string(&resolved).await {
            Ok(content) => content,
            Err(e) => return Ok(ToolResult::failed(format!("Failed to read file: {e}"))),
        };

        let start = arguments["start_line"].as_u64();
        let end = arguments["end_line"].as_u64();
        if start.is_none() && end.is_none() {
            return Ok(ToolResult::ok(content));
        }

        let start = start.unwrap_or(1).max(1) as usize;
        let end = end.map_or(usize::MAX, |e| e as usize);
        let selected: Vec<&str> = content
            .lines()
            .enumerate()
            .filter(|(i, _)| (start..=end).contains(&(i + 1)))
            .map(|(_, line)| line)
            .collect();
        Ok(ToolResult::ok(selected.join("\n")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool(dir: &tempfile::TempDir) -> FileReadTool {
        FileReadTool::new(PathPolicy::new(dir.path(), &[]))
    }

    #[test]
    fn tool_definition() {
        let dir = tempfile::tempdir().unwrap();
        let tool = tool(&dir);
        assert_eq!(tool.name(), "read_file");
        assert!(tool.is_read_only());
        let schema = tool.parameters_schema();
        assert_eq!(schema["required"], serde_json::json!(["path"]));
    }

    #[tokio::test]
    async fn read_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("test.txt"), "Hello, world!\n").unwrap();

        let result = tool(&dir)
            .execute(serde_json::json!({ "path": "test.txt" }))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.output.contains("Hello, world!"));
    }

    #[tokio::test]
    async fn read_line_range() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lines.txt"), "one\ntwo\nthree\nfour\n").unwrap();

        let result = tool(&dir)
            .execute(serde_json::json!({ "path": "lines.txt", "start_line": 2, "end_line": 3 }))
            .await
            .unwrap();
        assert_eq!(result.output, "two\nthree");
    }

    #[tokio::test]
    async fn read_nonexistent_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = tool(&dir)
            .execute(serde_json::json!({ "path": "missing.txt" }))
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.output.contains("Failed to read file"));
    }

    #[tokio::test]
    async fn path_traversal_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let result = tool(&dir)
            .execute(serde_json::json!({ "path": "../../../etc/passwd" }))
            .await;
        assert!(matches!(result, Err(ToolError::PermissionDenied { .. })));
    }
}
