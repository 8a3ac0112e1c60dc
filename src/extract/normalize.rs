use regex::Regex;
use std::sync::LazyLock;
use crate::utils::truncation::truncate_chars;

static INLINE_WS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t\u{00A0}]+").unwrap());
static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n(\s*\n)+").unwrap());

pub fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Fit `text` into `cap` characters. Whitespace is collapsed only when the
/// text is over the cap; what still does not fit is cut.
pub fn fit_to_cap(text: &str, cap: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= cap {
        return trimmed.to_string();
    }

    let collapsed = INLINE_WS.replace_all(trimmed, " ");
    let collapsed = BLANK_LINES.replace_all(&collapsed, "\n\n");
    let collapsed: String = collapsed
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");

    truncate_chars(&collapsed, cap).trim_end().to_string()
}
