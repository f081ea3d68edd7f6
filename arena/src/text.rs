//! Response sanitation shared by fighter, judge, and topic calls.

use std::sync::OnceLock;

use regex::Regex;

/// Strip `<think>...</think>` reasoning blocks and surrounding whitespace.
/// Several open-weight models leak their scratchpad into completions.
pub fn clean_response(text: &str) -> String {
    static THINK_BLOCK: OnceLock<Regex> = OnceLock::new();
    let re = THINK_BLOCK.get_or_init(|| Regex::new(r"(?s)<think>.*?</think>").expect("valid regex"));
    re.replace_all(text, "").trim().to_string()
}

/// First `limit` characters of a string, trimmed.
pub fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect::<String>().trim().to_string()
}
