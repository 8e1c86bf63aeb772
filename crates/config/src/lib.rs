//! Configuration loading, validation, and management for codeclaw.
//!
//! Loads configuration from `~/.codeclaw/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use codeclaw_core::{SafetyLevel, StreamingMode, UiConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.codeclaw/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Default temperature
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Default max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Ask the endpoint to augment answers with web search
    #[serde(default)]
    pub web_search: bool,

    #[serde(default)]
    pub agent: AgentSection,

    #[serde(default)]
    pub context: ContextSection,

    #[serde(default)]
    pub retry: RetrySection,

    #[serde(default)]
    pub ui: UiSection,

    #[serde(default)]
    pub tools: ToolsSection,
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_model() -> String {
    "anthropic/claude-sonnet-4".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> u32 {
    8192
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("default_temperature", &self.default_temperature)
            .field("default_max_tokens", &self.default_max_tokens)
            .field("web_search", &self.web_search)
            .field("agent", &self.agent)
            .field("context", &self.context)
            .field("retry", &self.retry)
            .field("ui", &self.ui)
            .field("tools", &self.tools)
            .finish()
    }
}

/// Run controller settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    /// Model calls allowed before the human is asked whether to continue
    #[serde(default = "default_step_ceiling")]
    pub step_ceiling: u32,

    #[serde(default)]
    pub safety_level: SafetyLevel,

    /// Tool output kept in the persisted history
    #[serde(default = "default_history_tool_output_chars")]
    pub history_tool_output_chars: usize,

    /// Tool output sent back to the model in the current run
    #[serde(default = "default_context_tool_output_chars")]
    pub context_tool_output_chars: usize,
}

fn default_step_ceiling() -> u32 {
    15
}
fn default_history_tool_output_chars() -> usize {
    2_000
}
fn default_context_tool_output_chars() -> usize {
    12_000
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            step_ceiling: default_step_ceiling(),
            safety_level: SafetyLevel::default(),
            history_tool_output_chars: default_history_tool_output_chars(),
            context_tool_output_chars: default_context_tool_output_chars(),
        }
    }
}

/// Context window budgeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSection {
    #[serde(default = "default_max_context_tokens")]
    pub max_context_tokens: usize,

    /// Tokens held back for the system prompt
    #[serde(default = "default_system_prompt_reserve")]
    pub system_prompt_reserve: usize,

    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: f64,

    #[serde(default = "default_message_overhead_tokens")]
    pub message_overhead_tokens: usize,
}

fn default_max_context_tokens() -> usize {
    100_000
}
fn default_system_prompt_reserve() -> usize {
    1_500
}
fn default_chars_per_token() -> f64 {
    4.0
}
fn default_message_overhead_tokens() -> usize {
    4
}

impl Default for ContextSection {
    fn default() -> Self {
        Self {
            max_context_tokens: default_max_context_tokens(),
            system_prompt_reserve: default_system_prompt_reserve(),
            chars_per_token: default_chars_per_token(),
            message_overhead_tokens: default_message_overhead_tokens(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySection {
    /// Total attempts, including the first
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    1_000
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiSection {
    #[serde(default = "default_max_width")]
    pub max_width: u16,

    #[serde(default = "default_true")]
    pub markdown: bool,

    #[serde(default)]
    pub streaming: StreamingMode,

    #[serde(default = "default_true")]
    pub show_legend_on_startup: bool,

    /// Minimum interval between live redraws
    #[serde(default = "default_render_throttle_ms")]
    pub render_throttle_ms: u64,
}

fn default_max_width() -> u16 {
    100
}
fn default_render_throttle_ms() -> u64 {
    50
}

impl Default for UiSection {
    fn default() -> Self {
        Self {
            max_width: default_max_width(),
            markdown: true,
            streaming: StreamingMode::default(),
            show_legend_on_startup: true,
            render_throttle_ms: default_render_throttle_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsSection {
    #[serde(default = "default_shell_timeout_secs")]
    pub shell_timeout_secs: u64,

    /// Paths no tool may touch, in addition to the built-in list
    #[serde(default)]
    pub forbidden_paths: Vec<String>,
}

fn default_shell_timeout_secs() -> u64 {
    60
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            shell_timeout_secs: default_shell_timeout_secs(),
            forbidden_paths: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.codeclaw/config.toml).
    ///
    /// Also checks environment variables:
    /// - `CODECLAW_API_KEY`, `OPENROUTER_API_KEY`, `OPENAI_API_KEY` (in that order)
    /// - `CODECLAW_MODEL`
    /// - `CODECLAW_BASE_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("CODECLAW_API_KEY")
                .or_else(|| lookup("OPENROUTER_API_KEY"))
                .or_else(|| lookup("OPENAI_API_KEY"));
        }

        if let Some(model) = lookup("CODECLAW_MODEL") {
            self.default_model = model;
        }

        if let Some(url) = lookup("CODECLAW_BASE_URL") {
            self.base_url = url;
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".codeclaw")
    }

    /// Where the conversation is persisted between sessions.
    pub fn session_path() -> PathBuf {
        Self::config_dir().join("session.json")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            return Err(ConfigError::ValidationError(
                "default_temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.step_ceiling == 0 {
            return Err(ConfigError::ValidationError("agent.step_ceiling must be > 0".into()));
        }

        if self.context.chars_per_token <= 0.0 {
            return Err(ConfigError::ValidationError("context.chars_per_token must be > 0".into()));
        }

        if self.context.system_prompt_reserve >= self.context.max_context_tokens {
            return Err(ConfigError::ValidationError(
                "context.system_prompt_reserve must be smaller than context.max_context_tokens".into(),
            ));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError("retry.max_attempts must be >= 1".into()));
        }

        if self.tools.shell_timeout_secs == 0 {
            return Err(ConfigError::ValidationError("tools.shell_timeout_secs must be > 0".into()));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    /// The presentation settings as the agent uses them, width clamped.
    pub fn ui_config(&self) -> UiConfig {
        let mut ui = UiConfig {
            max_width: self.ui.max_width,
            markdown_enabled: self.ui.markdown,
            streaming_mode: self.ui.streaming,
            show_legend_on_startup: self.ui.show_legend_on_startup,
        };
        ui.set_max_width(self.ui.max_width);
        ui
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            default_model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            web_search: false,
            agent: AgentSection::default(),
            context: ContextSection::default(),
            retry: RetrySection::default(),
            ui: UiSection::default(),
            tools: ToolsSection::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.step_ceiling, 15);
        assert_eq!(config.agent.safety_level, SafetyLevel::Full);
        assert_eq!(config.context.max_context_tokens, 100_000);
        assert_eq!(config.context.system_prompt_reserve, 1_500);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.ui.max_width, 100);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_model, config.default_model);
        assert_eq!(parsed.agent.safety_level, config.agent.safety_level);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            default_temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_step_ceiling_rejected() {
        let mut config = AppConfig::default();
        config.agent.step_ceiling = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_model, default_model());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_model = "openai/gpt-4o"

[agent]
safety_level = "delete-only"

[ui]
streaming = "final"
max_width = 400
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.default_model, "openai/gpt-4o");
        assert_eq!(config.agent.safety_level, SafetyLevel::DeleteOnly);
        assert_eq!(config.agent.step_ceiling, 15);
        assert_eq!(config.ui.streaming, StreamingMode::Final);

        let ui = config.ui_config();
        assert_eq!(ui.max_width, UiConfig::MAX_WIDTH);
        assert_eq!(ui.streaming_mode, StreamingMode::Final);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "default_model = [").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn env_overrides_follow_priority() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("OPENROUTER_API_KEY", "or-key"),
            ("OPENAI_API_KEY", "oa-key"),
            ("CODECLAW_MODEL", "openai/gpt-4o-mini"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.api_key.as_deref(), Some("or-key"));
        assert_eq!(config.default_model, "openai/gpt-4o-mini");
        assert_eq!(config.base_url, default_base_url());
    }

    #[test]
    fn file_api_key_wins_over_env() {
        let mut config = AppConfig {
            api_key: Some("file-key".into()),
            ..AppConfig::default()
        };
        config.apply_env(|k| (k == "CODECLAW_API_KEY").then(|| "env-key".to_string()));
        assert_eq!(config.api_key.as_deref(), Some("file-key"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = AppConfig {
            api_key: Some("sk-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("[agent]"));
        assert!(toml_str.contains("step_ceiling = 15"));
    }
}
