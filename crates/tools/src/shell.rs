//! `execute_command`: run a shell command in the workspace root.
//!
//! The command runs under `sh -c` with a wall-clock timeout. On expiry the
//! child is killed and whatever output it produced so far is returned.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use codeclaw_core::error::ToolError;
use codeclaw_core::tool::{SafetyTier, Tool, ToolResult};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, warn};

/// How long to wait for the pipes to drain after the child exits.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

pub struct ShellTool {
    workdir: PathBuf,
    timeout: Duration,
}

impl ShellTool {
    pub fn new(workdir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            workdir: workdir.into(),
            timeout,
        }
    }
}

type Sink = Arc<Mutex<Vec<u8>>>;

/// Copy a pipe into a shared buffer until EOF.
async fn pump<R: AsyncRead + Unpin>(mut reader: R, sink: Sink) {
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if let Ok(mut sink) = sink.lock() {
                    sink.extend_from_slice(&buf[..n]);
                }
            }
        }
    }
}

fn snapshot(sink: &Sink) -> String {
    sink.lock()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

fn combine(stdout: &str, stderr: &str) -> String {
    match (stdout.trim().is_empty(), stderr.trim().is_empty()) {
        (_, true) => stdout.trim_end().to_string(),
        (true, false) => format!("[stderr]: {}", stderr.trim_end()),
        (false, false) => format!("{}\n[stderr]: {}", stdout.trim_end(), stderr.trim_end()),
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "execute_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the project root and return stdout/stderr. \
         Use for builds, tests, git, and other programs. Long-running commands are killed on timeout."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "minLength": 1, "description": "The shell command to execute" }
            },
            "required": ["command"],
            "additionalProperties": false
        })
    }

    fn tier(&self) -> SafetyTier {
        SafetyTier::Critical
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let command = arguments["command"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'command' argument".into()))?;

        debug!(command = %command, "Executing shell command");

        let mut child = Command::new("sh")
            .args(["-c", command])
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: "execute_command".into(),
                reason: e.to_string(),
            })?;

        let stdout: Sink = Arc::default();
        let stderr: Sink = Arc::default();
        let mut pumps = Vec::new();
        if let Some(out) = child.stdout.take() {
            pumps.push(tokio::spawn(pump(out, stdout.clone())));
        }
        if let Some(err) = child.stderr.take() {
            pumps.push(tokio::spawn(pump(err, stderr.clone())));
        }

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                return Err(ToolError::ExecutionFailed {
                    tool_name: "execute_command".into(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                let secs = self.timeout.as_secs();
                warn!(command = %command, timeout_secs = secs, "Command timed out, killing");
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "Failed to kill timed-out command");
                }
                let partial = combine(&snapshot(&stdout), &snapshot(&stderr));
                return Ok(ToolResult::failed(format!(
                    "[timed out after {secs}s; partial output follows]\n{partial}"
                )));
            }
        };

        // Background grandchildren may hold the pipes open; don't wait on them forever.
        for handle in pumps {
            let _ = tokio::time::timeout(DRAIN_GRACE, handle).await;
        }

        let output = combine(&snapshot(&stdout), &snapshot(&stderr));
        if status.success() {
            Ok(ToolResult::ok(output))
        } else {
            let code = status.code().unwrap_or(-1);
            warn!(command = %command, exit_code = code, "Command failed");
            Ok(ToolResult::failed(format!("[exit code: {code}]\n{output}")))
        }
    }
}
