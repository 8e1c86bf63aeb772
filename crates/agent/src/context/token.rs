//! Token estimation utilities.
//!
//! Uses a character-based heuristic (default ~4 characters per token) plus a
//! fixed per-message overhead for role names and delimiters. This is an
//! approximation, not a tokenizer.

use codeclaw_core::message::Message;

#[derive(Debug, Clone, Copy)]
pub struct TokenEstimator {
    chars_per_token: f64,
    message_overhead: usize,
}

impl TokenEstimator {
    pub fn new(chars_per_token: f64, message_overhead: usize) -> Self {
        Self {
            chars_per_token: if chars_per_token > 0.0 { chars_per_token } else { 4.0 },
            message_overhead,
        }
    }

    /// Estimate the token count for a string. Rounds up.
    pub fn text(&self, text: &str) -> usize {
        let chars = text.chars().count();
        if chars == 0 {
            return 0;
        }
        (chars as f64 / self.chars_per_token).ceil() as usize
    }

    /// Estimate tokens for one message: overhead, text, and any tool calls.
    pub fn message(&self, message: &Message) -> usize {
        let calls: usize = message
            .tool_calls
            .iter()
            .map(|c| self.text(&c.name) + self.text(&c.arguments))
            .sum();
        self.message_overhead + self.text(&message.content) + calls
    }

    /// Estimate tokens for a slice of messages.
    pub fn messages(&self, messages: &[Message]) -> usize {
        messages.iter().map(|m| self.message(m)).sum()
    }
}

impl Default for TokenEstimator {
    fn default() -> Self {
        Self::new(4.0, 4)
    }
}
