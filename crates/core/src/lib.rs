//! # codeclaw core
//!
//! Domain types, traits, and error definitions for the codeclaw terminal
//! coding agent. This crate does no I/O of its own: it defines the model
//! that the provider, tool, session and agent crates implement against.
//!
//! ## Seams
//!
//! - [`Provider`]: a streaming chat-completions backend
//! - [`Tool`] / [`ToolRegistry`]: validated, tiered local capabilities
//! - [`HumanIo`]: line-based prompts answered by the person at the terminal

pub mod agent;
pub mod error;
pub mod human;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{AgentRunState, SafetyLevel, StreamingMode, UiConfig};
pub use error::{HumanIoError, ProviderError, ToolError};
pub use human::{HumanIo, is_affirmative};
pub use message::{Message, MessageToolCall, Role, TokenUsage};
pub use provider::{ChunkReceiver, Provider, ProviderRequest, StreamChunk, ToolCallDelta, ToolDefinition, Usage};
pub use tool::{SafetyTier, Tool, ToolRegistry, ToolResult};
