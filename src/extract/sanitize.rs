//! Field sanitation for extracted text.
//!
//! Every string leaving the extraction engine passes through here:
//! whitespace collapsed, trailing legal/cookie boilerplate stripped,
//! length capped with an ellipsis. Empty-after-sanitize becomes absent.

use lazy_static::lazy_static;
use regex::Regex;

/// Per-field length caps, in characters.
pub const MAX_STATUS: usize = 120;
pub const MAX_NAME: usize = 64;
pub const MAX_STORE: usize = 80;
pub const MAX_ADDRESS: usize = 120;
pub const MAX_UNIT: usize = 48;
pub const MAX_DELIVERY: usize = 64;
pub const MAX_NOTE: usize = 200;
pub const MAX_ITEM: usize = 96;

lazy_static! {
    static ref RE_BOILERPLATE: Regex = Regex::new(
        r"(?i)\s*(?:privacy policy|terms of service|terms and conditions|cookie(?:s)? (?:policy|notice|settings)|all rights reserved|©\s?\d{4}).*$"
    )
    .unwrap();
}

/// Sanitize one extracted field.
pub fn clean(raw: &str, max_chars: usize) -> Option<String> {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let stripped = RE_BOILERPLATE.replace(&collapsed, "");
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(truncate(trimmed, max_chars))
}

/// Truncate on a character boundary, marking the cut with an ellipsis.
fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}
