//! Context budget: keep the conversation under the model's token ceiling.
//!
//! When the estimate exceeds `max_context_tokens - system_prompt_reserve`,
//! the oldest messages are dropped in a single bulk step:
//!
//! ```text
//! excess    = estimated - available
//! avg       = estimated / count
//! to_remove = min(ceil(excess / avg), count - 1)
//! ```
//!
//! At least one message always survives. Tool results orphaned at the front
//! (their requesting assistant turn was dropped) are removed as well; if
//! nothing but tool results would survive, the assistant turn that asked
//! for them is kept instead.

use codeclaw_config::ContextSection;
use codeclaw_core::message::{Message, Role};
use tracing::{debug, info};

use super::token::TokenEstimator;

#[derive(Debug, Clone, Copy)]
pub struct ContextBudget {
    max_context_tokens: usize,
    system_prompt_reserve: usize,
    estimator: TokenEstimator,
}

impl ContextBudget {
    pub fn new(max_context_tokens: usize, system_prompt_reserve: usize, estimator: TokenEstimator) -> Self {
        Self {
            max_context_tokens,
            system_prompt_reserve,
            estimator,
        }
    }

    pub fn from_config(section: &ContextSection) -> Self {
        Self::new(
            section.max_context_tokens,
            section.system_prompt_reserve,
            TokenEstimator::new(section.chars_per_token, section.message_overhead_tokens),
        )
    }

    /// Tokens available to the conversation after the system prompt reserve.
    pub fn available(&self) -> usize {
        self.max_context_tokens.saturating_sub(self.system_prompt_reserve)
    }

    pub fn estimator(&self) -> &TokenEstimator {
        &self.estimator
    }

    /// How many of the oldest messages must go to fit; 0 when it already fits.
    pub fn removal_count(&self, messages: &[Message]) -> usize {
        let count = messages.len();
        let estimated = self.estimator.messages(messages);
        let available = self.available();
        if count == 0 || estimated <= available {
            return 0;
        }

        let avg = estimated as f64 / count as f64;
        if avg <= 0.0 {
            return 0;
        }
        let excess = (estimated - available) as f64;
        ((excess / avg).ceil() as usize).min(count - 1)
    }

    /// Trim `messages` in place. Returns the number of messages removed.
    pub fn fit(&self, messages: &mut Vec<Message>, model: &str) -> usize {
        let to_remove = self.removal_count(messages);
        if to_remove == 0 {
            return 0;
        }

        let estimated = self.estimator.messages(messages);
        let cut = match messages[to_remove..].iter().position(|m| m.role != Role::Tool) {
            Some(offset) => to_remove + offset,
            None => messages[..to_remove]
                .iter()
                .rposition(|m| m.role == Role::Assistant)
                .unwrap_or(to_remove),
        };
        if cut == 0 {
            return 0;
        }
        messages.drain(..cut);

        info!(
            model,
            removed = cut,
            estimated,
            available = self.available(),
            remaining = messages.len(),
            "Trimmed conversation to fit context budget"
        );
        debug!(after = self.estimator.messages(messages), "Estimated tokens after trim");
        cut
    }
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self::from_config(&ContextSection::default())
    }
}
