//! Tool output truncation.

/// Cut `text` to at most `max_chars` characters, at a char boundary, and
/// note how much was dropped.
pub fn truncate_output(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((cut, _)) => {
            let dropped = text[cut..].chars().count();
            format!("{}\n[... truncated {dropped} chars]", &text[..cut])
        }
    }
}
