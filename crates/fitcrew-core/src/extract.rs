//! Recovery of a JSON object embedded in free-form model output.
//!
//! This is a heuristic, not a parser: it returns the span from the first `{`
//! to the last `}`. Braces inside string literals or several disjoint objects
//! can produce a merged span. Downstream JSON parsing is the real gate.

use tracing::warn;

/// Longest preview of rejected text written to the log.
const PREVIEW_CHARS: usize = 120;

/// Return the outermost `{ ... }` span of `text`, inclusive.
///
/// Returns `None` when there is no opening brace, no closing brace, or the
/// last closing brace precedes the first opening one.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let span = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => Some(&text[start..=end]),
        _ => None,
    };
    if span.is_none() {
        warn!(
            len = text.len(),
            preview = %preview(text),
            "no JSON object found in model output"
        );
    }
    span
}

/// First few characters of `text` on one line.
pub fn preview(text: &str) -> String {
    let flat: String = text
        .chars()
        .take(PREVIEW_CHARS)
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    if text.chars().count() > PREVIEW_CHARS {
        format!("{flat}...")
    } else {
        flat
    }
}
