//! System prompt construction.
//!
//! Rebuilt at the start of every run from, in order:
//!
//! 1. **Role and rules**: built-in instructions for a coding agent
//! 2. **Project context**: `CODECLAW.md` and `.codeclaw/AGENTS.md` in the workspace
//! 3. **Project map**: a depth-limited listing of the workspace
//! 4. **Tool catalogue**: name and description of every granted tool
//! 5. **Completion protocol**: how to finish (full runs) or how to present
//!    a plan (planning runs)
//!
//! Missing context files are skipped. Sections are wrapped in XML-style
//! tags so the model can tell them apart.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use codeclaw_core::provider::ToolDefinition;
use codeclaw_tools::walk;
use tracing::debug;

pub const PROJECT_FILE: &str = "CODECLAW.md";
pub const AGENTS_FILE: &str = ".codeclaw/AGENTS.md";

/// Heading the planning prompt asks for; its presence marks a plan.
pub const PLAN_MARKER: &str = "EXECUTION PLAN";

const ROLE: &str = "\
You are codeclaw, a coding agent working inside the user's project directory. \
You read, search and modify files and run shell commands through tools. \
Work in small verified steps: inspect before you edit, keep changes minimal, \
and prefer editing existing files over rewriting them. \
Paths are relative to the project root.";

const DONE_PROTOCOL: &str = "\
Keep calling tools until the task is finished. Plain text without a tool call \
does not end the task. When everything is done, call the `done` tool exactly \
once with a short summary of what changed. If you need a decision from the \
user, call `ask_user`.";

const PLANNING_PROTOCOL: &str = "\
You are in PLANNING mode. Explore the project with the read-only tools only; \
do not modify anything. When you understand the task, reply with plain text \
(no tool call) containing a heading `EXECUTION PLAN` followed by a `Steps:` \
section of numbered, concrete steps naming the files to change.";

#[derive(Debug, Clone)]
pub struct SystemPromptBuilder {
    workspace: PathBuf,
    map_depth: usize,
    map_limit: usize,
}

impl SystemPromptBuilder {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            map_depth: 3,
            map_limit: 200,
        }
    }

    pub fn with_map_limits(mut self, depth: usize, limit: usize) -> Self {
        self.map_depth = depth;
        self.map_limit = limit;
        self
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    /// Prompt for a normal run with the full tool set.
    pub fn build(&self, tools: &[ToolDefinition]) -> String {
        self.assemble(tools, DONE_PROTOCOL)
    }

    /// Prompt for a planning run restricted to read-only tools.
    pub fn build_planning(&self, tools: &[ToolDefinition]) -> String {
        self.assemble(tools, PLANNING_PROTOCOL)
    }

    fn assemble(&self, tools: &[ToolDefinition], protocol: &str) -> String {
        let mut prompt = String::with_capacity(4096);
        push_section(&mut prompt, "role", ROLE);

        for (file, tag) in [(PROJECT_FILE, "project_context"), (AGENTS_FILE, "project_agent_instructions")] {
            let path = self.workspace.join(file);
            if let Ok(content) = std::fs::read_to_string(&path)
                && !content.trim().is_empty()
            {
                debug!(file = %path.display(), "Loaded project context file");
                push_section(&mut prompt, tag, &content);
            }
        }

        push_section(&mut prompt, "project_map", &self.project_map());

        let mut catalogue = String::new();
        for tool in tools {
            let _ = writeln!(catalogue, "- {}: {}", tool.name, tool.description);
        }
        push_section(&mut prompt, "tools", &catalogue);
        push_section(&mut prompt, "protocol", protocol);
        prompt
    }

    fn project_map(&self) -> String {
        let (mut entries, truncated) = walk::walk(&self.workspace, self.map_depth, self.map_limit);
        // Path order puts children directly under their parent
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        let mut map = String::new();
        for entry in &entries {
            let relative = entry.path.strip_prefix(&self.workspace).unwrap_or(&entry.path);
            let indent = "  ".repeat(entry.depth.saturating_sub(1));
            let suffix = if entry.is_dir { "/" } else { "" };
            let name = relative.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
            let _ = writeln!(map, "{indent}{name}{suffix}");
        }
        if entries.is_empty() {
            map.push_str("(empty)\n");
        }
        if truncated {
            let _ = writeln!(map, "... (listing capped at {} entries)", self.map_limit);
        }
        map
    }
}

fn push_section(prompt: &mut String, tag: &str, content: &str) {
    if !prompt.is_empty() {
        prompt.push('\n');
    }
    let _ = write!(prompt, "<{tag}>\n{}\n</{tag}>\n", content.trim());
}

/// Whether assistant text contains a plan: the `EXECUTION PLAN` heading or
/// a `Steps:` line (markdown heading or emphasis markers ignored).
pub fn contains_plan(text: &str) -> bool {
    if text.to_uppercase().contains(PLAN_MARKER) {
        return true;
    }
    text.lines().any(|line| {
        let stripped = line.trim().trim_start_matches('#').trim().trim_matches('*').trim();
        stripped.eq_ignore_ascii_case("steps:")
    })
}
