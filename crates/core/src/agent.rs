//! Agent runtime settings and state types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which tool tiers require confirmation before running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SafetyLevel {
    /// Confirm dangerous and critical tools (default)
    #[default]
    Full,
    /// Confirm critical tools only
    DeleteOnly,
    /// Never confirm
    Off,
}

impl SafetyLevel {
    /// Cycle order used by the `/safety` command.
    pub const ORDER: [SafetyLevel; 3] = [Self::Full, Self::DeleteOnly, Self::Off];

    /// The level after this one, wrapping around.
    pub fn next(self) -> Self {
        let idx = Self::ORDER.iter().position(|l| *l == self).unwrap_or(0);
        Self::ORDER[(idx + 1) % Self::ORDER.len()]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::DeleteOnly => "delete-only",
            Self::Off => "off",
        }
    }
}

impl fmt::Display for SafetyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SafetyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "delete-only" | "delete_only" | "deleteonly" => Ok(Self::DeleteOnly),
            "off" => Ok(Self::Off),
            other => Err(format!("unknown safety level '{other}' (expected full, delete-only or off)")),
        }
    }
}

/// Display state of the current run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRunState {
    #[default]
    Idle,
    Thinking,
    Streaming,
    ToolCalling,
    Executing,
    Waiting,
    Complete,
    Error,
}

impl AgentRunState {
    /// Short label for status lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Thinking => "thinking",
            Self::Streaming => "streaming",
            Self::ToolCalling => "tool calling",
            Self::Executing => "executing",
            Self::Waiting => "waiting for you",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

/// Whether text is redrawn while streaming or only shown when complete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamingMode {
    #[default]
    Live,
    Final,
}

impl StreamingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Final => "final",
        }
    }
}

impl fmt::Display for StreamingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(Self::Live),
            "final" => Ok(Self::Final),
            other => Err(format!("unknown streaming mode '{other}' (expected live or final)")),
        }
    }
}

/// Presentation settings, adjustable at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiConfig {
    pub max_width: u16,
    pub markdown_enabled: bool,
    pub streaming_mode: StreamingMode,
    pub show_legend_on_startup: bool,
}

impl UiConfig {
    pub const MIN_WIDTH: u16 = 40;
    pub const MAX_WIDTH: u16 = 140;

    /// Set the panel width, clamped to [`Self::MIN_WIDTH`]..=[`Self::MAX_WIDTH`].
    /// Returns the width actually applied.
    pub fn set_max_width(&mut self, width: u16) -> u16 {
        self.max_width = width.clamp(Self::MIN_WIDTH, Self::MAX_WIDTH);
        self.max_width
    }
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            max_width: 100,
            markdown_enabled: true,
            streaming_mode: StreamingMode::Live,
            show_legend_on_startup: true,
        }
    }
}
