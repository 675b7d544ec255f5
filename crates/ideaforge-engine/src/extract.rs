//! Recover a JSON value from free-form model output.
//!
//! Models wrap JSON in fences, surround it with chatter, or emit it bare. [`extract`]
//! tries three strategies in a fixed order and returns the first value that parses.

use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::OnceLock;

/// Extract the first recoverable JSON object or array from `text`.
///
/// 1. The first fenced code block (any or no language tag).
/// 2. The slice from the first `[`/`{` to the last matching closer.
/// 3. The whole input.
///
/// A failed step falls through to the next one. Never panics.
pub fn extract(text: &str) -> Option<Value> {
    from_fence(text)
        .or_else(|| from_bracket_span(text))
        .or_else(|| serde_json::from_str(text.trim()).ok())
}

fn from_fence(text: &str) -> Option<Value> {
    static FENCE_RE: OnceLock<Regex> = OnceLock::new();
    let fence_re =
        FENCE_RE.get_or_init(|| Regex::new(r"(?s)```[\w-]*\s*(.*?)```").expect("valid regex"));

    let inner = fence_re.captures(text)?.get(1)?.as_str().trim();
    serde_json::from_str(inner).ok()
}

fn from_bracket_span(text: &str) -> Option<Value> {
    let start = match (text.find('['), text.find('{')) {
        (Some(list), Some(obj)) => list.min(obj),
        (Some(list), None) => list,
        (None, Some(obj)) => obj,
        (None, None) => return None,
    };
    let closer = if text.as_bytes()[start] == b'[' { ']' } else { '}' };
    let end = text.rfind(closer)?;
    if end <= start {
        return None;
    }
    // Both indices sit on ASCII bytes, so the slice is on char boundaries.
    serde_json::from_str(&text[start..=end]).ok()
}

/// Strip `<think>...</think>` blocks that reasoning models (qwen3, deepseek) emit.
pub fn strip_think_blocks(text: &str) -> String {
    let mut result = text.to_string();
    while let Some(start) = result.find("<think>") {
        if let Some(end_offset) = result[start..].find("</think>") {
            let end = start + end_offset + "</think>".len();
            result = format!("{}{}", &result[..start], &result[end..]);
        } else {
            // Unclosed think block: everything after it is reasoning
            result.truncate(start);
            break;
        }
    }
    result.trim().to_string()
}

/// Truncate to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

// ---------------------------------------------------------------------------
// Lenient field readers for `#[serde(deserialize_with)]`
// ---------------------------------------------------------------------------

/// Integer score from a number or numeric string. Anything else is `0`.
pub(crate) fn score_from_value(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

pub(crate) fn text_from_value(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

pub(crate) fn lenient_score<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
    Ok(score_from_value(&Value::deserialize(d)?))
}

pub(crate) fn lenient_text<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(text_from_value(&Value::deserialize(d)?))
}

pub(crate) fn lenient_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items.iter().filter_map(text_from_value).collect(),
        _ => Vec::new(),
    })
}
