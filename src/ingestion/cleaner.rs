//! Normalization applied to extracted text before validation and hashing.

use regex::Regex;
use std::sync::LazyLock;

static CONTROL_CHARS: LazyLock<Regex> = LazyLock::new(|| compile(r"[\x00-\x1F\x7F-\x9F]"));
static WHITESPACE_RUNS: LazyLock<Regex> = LazyLock::new(|| compile(r"\s+"));
static DIGIT_ONLY_LINES: LazyLock<Regex> = LazyLock::new(|| compile(r"(?m)^\s*[0-9]+\s*$"));
static DOUBLE_QUOTES: LazyLock<Regex> = LazyLock::new(|| compile("[\u{201C}-\u{201F}\u{2033}]"));
static SINGLE_QUOTES: LazyLock<Regex> = LazyLock::new(|| compile("[\u{2018}-\u{201B}\u{2032}]"));

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("built-in pattern")
}

/// Clean raw chunk text.
///
/// Steps, in order: control characters become spaces, whitespace runs collapse to one space,
/// digit-only lines (page numbers) disappear, typographic quotes become ASCII, and the result is
/// trimmed. Absent or empty input yields an empty string. Applying the function to its own output
/// returns the same text.
pub fn clean_text(content: Option<&str>) -> String {
    let Some(content) = content.filter(|value| !value.is_empty()) else {
        return String::new();
    };

    let text = CONTROL_CHARS.replace_all(content, " ");
    let text = WHITESPACE_RUNS.replace_all(&text, " ");
    let text = DIGIT_ONLY_LINES.replace_all(&text, "");
    let text = DOUBLE_QUOTES.replace_all(&text, "\"");
    let text = SINGLE_QUOTES.replace_all(&text, "'");
    text.trim().to_string()
}
