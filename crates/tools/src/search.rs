//! `search_files`: literal text search across workspace files.

use std::path::Path;

use async_trait::async_trait;
use codeclaw_core::error::ToolError;
use codeclaw_core::tool::{Tool, ToolResult};

use crate::path::PathPolicy;
use crate::walk::walk;

const MAX_FILES: usize = 5_000;
const MAX_MATCHES: usize = 200;
const MAX_FILE_BYTES: u64 = 1024 * 1024;

pub struct SearchFilesTool {
    policy: PathPolicy,
}

impl SearchFilesTool {
    pub fn new(policy: PathPolicy) -> Self {
        Self { policy }
    }
}

/// Search every text file under `dir`, returning `path:line: text` hits.
fn search_dir(dir: &Path, display_root: &Path, query: &str, ignore_case: bool) -> (Vec<String>, bool) {
    let needle = if ignore_case { query.to_lowercase() } else { query.to_string() };
    let (entries, _) = walk(dir, usize::MAX, MAX_FILES);
    let mut hits = Vec::new();

    for entry in entries.iter().filter(|e| !e.is_dir) {
        if std::fs::metadata(&entry.path).map_or(true, |m| m.len() > MAX_FILE_BYTES) {
            continue;
        }
        // Binary or non-UTF-8 files are skipped.
        let Ok(content) = std::fs::read_to_string(&entry.path) else {
            continue;
        };
        let rel = entry.path.strip_prefix(display_root).unwrap_or(&entry.path).to_string_lossy();
        for (i, line) in content.lines().enumerate() {
            let matched = if ignore_case {
                line.to_lowercase().contains(&needle)
            } else {
                line.contains(&needle)
            };
            if matched {
                if hits.len() >= MAX_MATCHES {
                    return (hits, true);
                }
                hits.push(format!("{rel}:{}: {}", i + 1, line.trim()));
            }
        }
    }

    (hits, false)
}

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        "search_files"
    }

    fn description(&self) -> &str {
        "Search project files for a literal string. Returns matching lines as path:line: text."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string", "minLength": 1 },
                "path": { "type": "string", "description": "Directory to search (default: project root)" },
                "ignore_case": { "type": "boolean" }
            },
            "required": ["query"],
            "additionalProperties": false
        })
    }

    fn is_read_only(&self) -> bool {
        true
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let query = arguments["query"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'query' argument".into()))?
            .to_string();
        let path = arguments["path"].as_str().unwrap_or(".");
        let ignore_case = arguments["ignore_case"].as_bool().unwrap_or(false);

        let dir = self.policy.resolve(path).map_err(|e| ToolError::PermissionDenied {
            tool_name: "search_files".into(),
            reason: e.to_string(),
        })?;
        let root = self.policy.root().to_path_buf();

        let (hits, truncated) = tokio::task::spawn_blocking(move || search_dir(&dir, &root, &query, ignore_case))
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "search_files".into(),
                reason: e.to_string(),
            })?;

        if hits.is_empty() {
            return Ok(ToolResult::ok("No matches found."));
        }
        let mut output = hits.join("\n");
        if truncated {
            output.push_str(&format!("\n... (stopped after {MAX_MATCHES} matches)"));
        }
        Ok(ToolResult::ok(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "fn main() {\n    run_agent();\n}\n").unwrap();
        std::fs::write(dir.path().join("README.md"), "Run_Agent docs\n").unwrap();
        dir
    }

    #[tokio::test]
    async fn finds_matches_with_line_numbers() {
        let dir = project();
        let tool = SearchFilesTool::new(PathPolicy::new(dir.path(), &[]));
        let result = tool.execute(serde_json::json!({ "query": "run_agent" })).await.unwrap();
        assert_eq!(result.output, "src/main.rs:2: run_agent();");
    }

    #[tokio::test]
    async fn ignore_case_widens_matches() {
        let dir = project();
        let tool = SearchFilesTool::new(PathPolicy::new(dir.path(), &[]));
        let result = tool
            .execute(serde_json::json!({ "query": "run_agent", "ignore_case": true }))
            .await
            .unwrap();
        assert!(result.output.contains("README.md:1:"));
        assert!(result.output.contains("src/main.rs:2:"));
    }

    #[tokio::test]
    async fn no_matches() {
        let dir = project();
        let tool = SearchFilesTool::new(PathPolicy::new(dir.path(), &[]));
        let result = tool.execute(serde_json::json!({ "query": "zebra" })).await.unwrap();
        assert_eq!(result.output, "No matches found.");
    }
}
