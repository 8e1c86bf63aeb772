//! Built-in tool implementations for codeclaw.
//!
//! Tools give the agent its hands on the project: read, list and search
//! files, write and edit them, delete them, and run shell commands. File
//! tools are confined to the workspace root by [`path::PathPolicy`].
//!
//! Safety tiers:
//! - benign: `read_file`, `list_directory`, `search_files`, `ask_user`, `done`
//! - dangerous: `write_file`, `edit_file`
//! - critical: `delete_file`, `execute_command`

pub mod control;
pub mod file_delete;
pub mod file_edit;
pub mod file_read;
pub mod file_write;
pub mod list_dir;
pub mod path;
pub mod search;
pub mod shell;
pub mod walk;

use std::path::Path;
use std::time::Duration;

use codeclaw_config::AppConfig;
use codeclaw_core::tool::ToolRegistry;

pub use control::{ASK_USER, DONE};
pub use path::{PathPolicy, PathValidationError};

/// Create the registry of all built-in tools, rooted at `workspace`.
pub fn default_registry(workspace: &Path, config: &AppConfig) -> ToolRegistry {
    let policy = PathPolicy::new(workspace, &config.tools.forbidden_paths);
    let timeout = Duration::from_secs(config.tools.shell_timeout_secs);

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(file_read::FileReadTool::new(policy.clone())));
    registry.register(Box::new(list_dir::ListDirectoryTool::new(policy.clone())));
    registry.register(Box::new(search::SearchFilesTool::new(policy.clone())));
    registry.register(Box::new(file_write::FileWriteTool::new(policy.clone())));
    registry.register(Box::new(file_edit::FileEditTool::new(policy.clone())));
    registry.register(Box::new(file_delete::FileDeleteTool::new(policy.clone())));
    registry.register(Box::new(shell::ShellTool::new(policy.root(), timeout)));
    registry.register(Box::new(control::AskUserTool));
    registry.register(Box::new(control::DoneTool));
    registry
}
