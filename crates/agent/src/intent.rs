//! Change-intent policy: does the assistant's text wait on the user?
//!
//! A best-effort heuristic. It looks for a trailing question mark or one of
//! a fixed list of phrases; it will miss some questions and flag some
//! statements. It is only consulted on turns without tool calls.

/// Phrases that suggest the model is waiting on a decision.
pub const QUESTION_PHRASES: &[&str] = &[
    "would you like",
    "should i",
    "let me know",
    "do you want",
    "shall i",
];

/// Whether `text` reads as a question to the user.
pub fn asks_for_input(text: &str) -> bool {
    let trimmed = text.trim_end();
    if trimmed.ends_with('?') {
        return true;
    }
    let lower = trimmed.to_lowercase();
    QUESTION_PHRASES.iter().any(|phrase| lower.contains(phrase))
}
