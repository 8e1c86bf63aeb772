//! Safety gate: decides when a human must approve a tool call, asks, and
//! runs the tool only on a yes.

use std::fmt;
use std::sync::Arc;

use codeclaw_core::agent::{AgentRunState, SafetyLevel};
use codeclaw_core::human::HumanIo;
use codeclaw_core::tool::{SafetyTier, ToolRegistry};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::event::RunView;

const PREVIEW_CHARS: usize = 200;

/// Whether a call of `tier` needs confirmation at `level`.
pub fn requires_confirmation(level: SafetyLevel, tier: SafetyTier) -> bool {
    match level {
        SafetyLevel::Full => matches!(tier, SafetyTier::Dangerous | SafetyTier::Critical),
        SafetyLevel::DeleteOnly => tier == SafetyTier::Critical,
        SafetyLevel::Off => false,
    }
}

/// Tool-result text returned to the model when the user says no.
pub fn denial_message(tool: &str) -> String {
    format!(
        "User declined to run `{tool}`. The operation was not performed. \
         Ask the user how to proceed or try a different approach."
    )
}

/// What the user sees before approving a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationSummary {
    pub operation: String,
    pub target: Option<String>,
    pub preview: Option<String>,
}

impl OperationSummary {
    pub fn describe(tool: &str, tier: SafetyTier, arguments: &Value) -> Self {
        let field = |key: &str| arguments.get(key).and_then(Value::as_str);

        let operation = match tool {
            "write_file" => "Write file".to_string(),
            "edit_file" => "Edit file".to_string(),
            "delete_file" => "Delete file".to_string(),
            "execute_command" => "Run command".to_string(),
            other => format!("{other} ({})", tier.as_str()),
        };
        let target = field("path").or_else(|| field("command")).map(String::from);
        let preview = field("content")
            .or_else(|| field("new_text"))
            .map(|text| preview(text, PREVIEW_CHARS));

        Self {
            operation,
            target,
            preview,
        }
    }
}

impl fmt::Display for OperationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.operation)?;
        if let Some(target) = &self.target {
            write!(f, ": {target}")?;
        }
        if let Some(preview) = &self.preview {
            write!(f, "\n---\n{preview}\n---")?;
        }
        Ok(())
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((cut, _)) => format!("{}…", &text[..cut]),
    }
}

/// Result of passing one call through the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    /// The tool ran and reported success.
    Completed(String),
    /// The tool ran (or failed to) and the output describes the failure.
    Failed(String),
    /// The user declined; the tool was not invoked.
    Denied(String),
}

impl GateOutcome {
    /// Text fed back to the model as the tool result.
    pub fn as_tool_result(&self) -> &str {
        match self {
            Self::Completed(text) | Self::Failed(text) | Self::Denied(text) => text,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

pub struct SafetyGate {
    tools: Arc<ToolRegistry>,
    human: Arc<dyn HumanIo>,
}

impl SafetyGate {
    pub fn new(tools: Arc<ToolRegistry>, human: Arc<dyn HumanIo>) -> Self {
        Self { tools, human }
    }

    /// Confirm if needed, then invoke `tool` with validated `arguments`.
    ///
    /// Never fails: errors become [`GateOutcome::Failed`], refusals and
    /// unreadable input become [`GateOutcome::Denied`].
    pub async fn dispatch(
        &self,
        level: SafetyLevel,
        tool: &str,
        arguments: Value,
        view: &mut dyn RunView,
    ) -> GateOutcome {
        let tier = self.tools.tier(tool);

        if requires_confirmation(level, tier) {
            let summary = OperationSummary::describe(tool, tier, &arguments);
            view.state_changed(AgentRunState::Waiting);

            let approved = match self.human.confirm(&format!("{summary}\nProceed? [y/N] ")).await {
                Ok(approved) => approved,
                Err(e) => {
                    warn!(tool, error = %e, "Confirmation input failed; treating as denial");
                    false
                }
            };
            info!(tool, tier = tier.as_str(), level = level.as_str(), approved, "Safety gate decision");

            if !approved {
                return GateOutcome::Denied(denial_message(tool));
            }
        } else {
            debug!(tool, tier = tier.as_str(), level = level.as_str(), "No confirmation required");
        }

        view.state_changed(AgentRunState::Executing);
        match self.tools.invoke(tool, arguments).await {
            Ok(result) if result.success => GateOutcome::Completed(result.output),
            Ok(result) => GateOutcome::Failed(result.output),
            Err(e) => {
                warn!(tool, error = %e, "Tool execution failed");
                GateOutcome::Failed(format!("Error: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NullView;
    use async_trait::async_trait;
    use codeclaw_core::error::{HumanIoError, ToolError};
    use codeclaw_core::tool::{Tool, ToolResult};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTool {
        name: &'static str,
        tier: SafetyTier,
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Tool for CountingTool {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "test tool"
        }
        fn parameters_schema(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        fn tier(&self) -> SafetyTier {
            self.tier
        }
        async fn execute(&self, _arguments: Value) -> Result<ToolResult, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ToolError::ExecutionFailed {
                    tool_name: self.name.into(),
                    reason: "disk full".into(),
                });
            }
            Ok(ToolResult::ok("ran"))
        }
    }

    struct Answers {
        answers: Mutex<Vec<&'static str>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Answers {
        fn new(answers: &[&'static str]) -> Arc<Self> {
            Arc::new(Self {
                answers: Mutex::new(answers.iter().rev().copied().collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl HumanIo for Answers {
        async fn ask(&self, prompt: &str) -> Result<Option<String>, HumanIoError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let answer = self.answers.lock().unwrap().pop().ok_or(HumanIoError::Closed)?;
            Ok((!answer.trim().is_empty()).then(|| answer.to_string()))
        }
    }

    fn gate(human: Arc<Answers>, fail: bool) -> (SafetyGate, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ToolRegistry::new();
        for (name, tier) in [
            ("read_file", SafetyTier::Benign),
            ("write_file", SafetyTier::Dangerous),
            ("delete_file", SafetyTier::Critical),
            ("execute_command", SafetyTier::Critical),
        ] {
            registry.register(Box::new(CountingTool {
                name,
                tier,
                calls: calls.clone(),
                fail,
            }));
        }
        (SafetyGate::new(Arc::new(registry), human), calls)
    }

    #[test]
    fn decision_table() {
        use SafetyLevel::*;
        use SafetyTier::*;
        let cases = [
            (Full, Benign, false),
            (Full, Dangerous, true),
            (Full, Critical, true),
            (DeleteOnly, Benign, false),
            (DeleteOnly, Dangerous, false),
            (DeleteOnly, Critical, true),
            (Off, Benign, false),
            (Off, Dangerous, false),
            (Off, Critical, false),
        ];
        for (level, tier, expected) in cases {
            assert_eq!(requires_confirmation(level, tier), expected, "{level:?} / {tier:?}");
            assert_eq!(requires_confirmation(level, tier), expected);
        }
    }

    #[tokio::test]
    async fn denial_skips_the_tool() {
        let human = Answers::new(&["n"]);
        let (gate, calls) = gate(human.clone(), false);

        let outcome = gate
            .dispatch(
                SafetyLevel::Full,
                "execute_command",
                serde_json::json!({"command": "rm -rf build"}),
                &mut NullView,
            )
            .await;

        assert!(matches!(outcome, GateOutcome::Denied(_)));
        assert!(outcome.as_tool_result().contains("declined"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let prompts = human.prompts.lock().unwrap();
        assert!(prompts[0].contains("Run command: rm -rf build"));
    }

    #[tokio::test]
    async fn empty_answer_is_denial() {
        let (gate, calls) = gate(Answers::new(&[""]), false);
        let outcome = gate
            .dispatch(SafetyLevel::Full, "write_file", serde_json::json!({"path": "a"}), &mut NullView)
            .await;
        assert!(matches!(outcome, GateOutcome::Denied(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn closed_input_is_denial() {
        let (gate, _) = gate(Answers::new(&[]), false);
        let outcome = gate
            .dispatch(SafetyLevel::Full, "delete_file", serde_json::json!({"path": "a"}), &mut NullView)
            .await;
        assert!(matches!(outcome, GateOutcome::Denied(_)));
    }

    #[tokio::test]
    async fn approval_runs_the_tool() {
        let (gate, calls) = gate(Answers::new(&[" YES "]), false);
        let outcome = gate
            .dispatch(SafetyLevel::Full, "write_file", serde_json::json!({"path": "a"}), &mut NullView)
            .await;
        assert_eq!(outcome, GateOutcome::Completed("ran".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn delete_only_lets_writes_through() {
        let human = Answers::new(&[]);
        let (gate, calls) = gate(human.clone(), false);
        let outcome = gate
            .dispatch(SafetyLevel::DeleteOnly, "write_file", serde_json::json!({}), &mut NullView)
            .await;
        assert!(outcome.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(human.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn tool_errors_become_failed_results() {
        let (gate, _) = gate(Answers::new(&[]), true);
        let outcome = gate
            .dispatch(SafetyLevel::Off, "read_file", serde_json::json!({}), &mut NullView)
            .await;
        match outcome {
            GateOutcome::Failed(text) => assert!(text.starts_with("Error: ")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[test]
    fn summary_truncates_preview() {
        let args = serde_json::json!({"path": "src/lib.rs", "content": "x".repeat(500)});
        let summary = OperationSummary::describe("write_file", SafetyTier::Dangerous, &args);
        assert_eq!(summary.target.as_deref(), Some("src/lib.rs"));
        assert_eq!(summary.preview.as_ref().map(|p| p.chars().count()), Some(201));
        assert!(summary.to_string().starts_with("Write file: src/lib.rs\n---\n"));
    }
}
