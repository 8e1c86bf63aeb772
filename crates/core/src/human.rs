//! The human at the terminal, seen as an async question/answer channel.

use async_trait::async_trait;

use crate::error::HumanIoError;

/// Line-based prompts answered by the person running the agent.
///
/// `ask` returns `None` when the answer is empty after trimming.
#[async_trait]
pub trait HumanIo: Send + Sync {
    /// Print `prompt` and wait for one line of input.
    async fn ask(&self, prompt: &str) -> Result<Option<String>, HumanIoError>;

    /// Ask a yes/no question. Anything other than `y`/`yes` is a no.
    async fn confirm(&self, prompt: &str) -> Result<bool, HumanIoError> {
        let answer = self.ask(prompt).await?;
        Ok(answer.as_deref().is_some_and(is_affirmative))
    }
}

/// `y` or `yes`, case-insensitive, surrounding whitespace ignored.
pub fn is_affirmative(answer: &str) -> bool {
    let answer = answer.trim();
    answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}
