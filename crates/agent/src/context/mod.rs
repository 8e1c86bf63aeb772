//! Context window management: token estimation and budget trimming.

pub mod budget;
pub mod token;

pub use budget::ContextBudget;
pub use token::TokenEstimator;
