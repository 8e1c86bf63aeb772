//! Agent error type.

use codeclaw_core::error::{HumanIoError, ProviderError};

/// Errors that end a run early.
///
/// Tool failures and user denials never appear here: they become tool
/// results and the run continues.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("A run is already in progress")]
    RunInProgress,

    #[error("No pending plan; create one with /plan first")]
    NoPendingPlan,

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("Input unavailable: {0}")]
    Human(#[from] HumanIoError),

    #[error("Internal error: {0}")]
    Internal(String),
}
