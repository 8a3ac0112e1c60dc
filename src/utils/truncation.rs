/// Cap on stored free-text fields (checklist comments, processing notes).
pub const MAX_COMMENT_LENGTH: usize = 1024;
const MAX_ERROR_LENGTH: usize = 2_000;

/// First `max_chars` characters of `text`, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Like `truncate_chars`, appending an ellipsis when something was cut.
/// The result including the ellipsis fits in `max_chars`.
pub fn truncate_with_ellipsis(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    format!("{}...", truncate_chars(text, keep))
}

pub fn truncate_error(error: &str) -> String {
    truncate_with_ellipsis(error, MAX_ERROR_LENGTH)
}
