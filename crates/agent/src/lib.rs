//! The codeclaw agent engine.
//!
//! A run takes one user request through repeated turns:
//!
//! 1. **Budget** the conversation to the context window ([`context`])
//! 2. **Stream** the model's reply and reassemble tool calls ([`stream_assembler`])
//! 3. **Gate** each tool call on the safety level and execute it ([`safety`])
//! 4. **Repeat** until the model calls `done`
//!
//! [`planning`] adds a read-only variant that stores a plan for later
//! execution, and [`render`] draws streaming text in place.

pub mod context;
pub mod error;
pub mod event;
pub mod guard;
pub mod intent;
pub mod loop_runner;
pub mod planning;
pub mod prompt;
pub mod render;
pub mod safety;
pub mod stream_assembler;
pub mod truncate;

pub use context::{ContextBudget, TokenEstimator};
pub use error::AgentError;
pub use event::{NoticeLevel, NullView, RunView};
pub use guard::RunGuard;
pub use loop_runner::{AgentLoop, AgentSettings, RunOutcome};
pub use planning::{PendingPlan, PlanOutcome};
pub use prompt::SystemPromptBuilder;
pub use render::{LiveRenderer, render_panel};
pub use safety::{GateOutcome, SafetyGate, requires_confirmation};
pub use stream_assembler::{AssembledTurn, StreamAssembler};
