//! Control tools: `ask_user` and `done`.
//!
//! These are declared to the model like any other tool, but the agent loop
//! intercepts them by name: `ask_user` suspends the run for a human reply,
//! `done` ends the run. `execute` is only reached when a caller invokes
//! them directly through the registry.

use async_trait::async_trait;
use codeclaw_core::error::ToolError;
use codeclaw_core::tool::{Tool, ToolResult};

pub const ASK_USER: &str = "ask_user";
pub const DONE: &str = "done";

pub struct AskUserTool;

#[async_trait]
impl Tool for AskUserTool {
    fn name(&self) -> &str {
        ASK_USER
    }

    fn description(&self) -> &str {
        "Ask the user a question and wait for their answer. Use when a decision or missing detail blocks progress."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "question": { "type": "string", "minLength": 1 }
            },
            "required": ["question"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let question = arguments["question"].as_str().unwrap_or_default();
        Ok(ToolResult::failed(format!("No user available to answer: {question}")))
    }
}

pub struct DoneTool;

#[async_trait]
impl Tool for DoneTool {
    fn name(&self) -> &str {
        DONE
    }

    fn description(&self) -> &str {
        "Signal that the task is complete. Call this exactly once, after all work is finished, with a short summary."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "summary": { "type": "string", "description": "What was done" }
            },
            "additionalProperties": false
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        Ok(ToolResult::ok(arguments["summary"].as_str().unwrap_or("Task complete.")))
    }
}
