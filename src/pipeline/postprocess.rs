//! Cleanup of the raw model reply before JSON parsing.
//!
//! Chat models asked for "only valid JSON" still sometimes wrap the object in
//! a ```` ```json ```` fence. Only that outer fence is removed here; anything
//! else (commentary, truncated objects) is left alone so it fails to parse
//! and takes the degraded path.

use once_cell::sync::Lazy;
use regex::Regex;

static RE_OUTER_FENCES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[A-Za-z]*[ \t]*\r?\n(.*?)\r?\n?```$").expect("static regex")
});

/// Trim whitespace and strip one enclosing markdown code fence.
pub fn clean_reply(input: &str) -> &str {
    let trimmed = input.trim();
    match RE_OUTER_FENCES.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => trimmed,
    }
}
