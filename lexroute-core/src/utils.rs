// lexroute-core/src/utils.rs
//! Small helpers shared by the client and router.

/// Shortens `input` to at most `max_chars` characters for logging, marking
/// the cut with an ellipsis. Counts characters, not bytes.
pub fn preview(input: &str, max_chars: usize) -> String {
    match input.char_indices().nth(max_chars) {
        None => input.to_string(),
        Some(_) if max_chars < 3 => input.chars().take(max_chars).collect(),
        Some(_) => {
            let kept: String = input.chars().take(max_chars - 3).collect();
            format!("{}...", kept)
        }
    }
}
