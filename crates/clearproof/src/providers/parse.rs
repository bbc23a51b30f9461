//! Lenient decoding of model output.
//!
//! Models wrap JSON in markdown fences, prepend chatter, or ignore the
//! requested format altogether. These helpers pull out what is usable and
//! report `None` for the rest; none of them panic on arbitrary input.

use crate::model::{normalize_tag, normalize_tags, ThemePayload};

use super::prompts::NO_TEXT_SENTINEL;

/// Most items kept from a generated list.
pub const MAX_LIST_ITEMS: usize = 5;

/// Plain-text tag fallbacks with more segments than this are prose, not tags.
const MAX_PLAIN_TAGS: usize = 25;

/// Removes a surrounding markdown code fence (```json ... ```), if any.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }

    let Some(newline) = trimmed.find('\n') else {
        return trimmed.trim_matches('`').trim();
    };
    let body = &trimmed[newline + 1..];
    match body.rfind("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Finds the first balanced JSON array or object in `text`.
///
/// String literals and escapes are tracked so brackets inside strings do
/// not end the span early.
pub fn extract_json_span(text: &str) -> Option<&str> {
    let start = text.find(['[', '{'])?;
    let (open, close) = if text[start..].starts_with('[') {
        ('[', ']')
    } else {
        ('{', '}')
    };

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[start..start + i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Parses a JSON array of short strings, e.g. `["bold colors", "clean layout"]`.
///
/// Items are trimmed, empty ones dropped, and at most [`MAX_LIST_ITEMS`]
/// kept. Returns `None` when no array can be decoded.
pub fn parse_string_array(text: &str) -> Option<Vec<String>> {
    let body = strip_code_fence(text);
    let span = extract_json_span(body)?;
    let values: Vec<serde_json::Value> = serde_json::from_str(span).ok()?;

    let items = values
        .into_iter()
        .filter_map(|v| match v {
            serde_json::Value::String(s) => Some(s.trim().to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .take(MAX_LIST_ITEMS)
        .collect();
    Some(items)
}

/// Decodes a theme-extraction answer.
///
/// Accepts a categorized object, a plain JSON array of tags, or a
/// comma/newline separated tag list.
pub fn parse_theme_response(text: &str) -> Option<ThemePayload> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return None;
    }

    if let Some(span) = extract_json_span(body) {
        return match serde_json::from_str::<ThemePayload>(span).ok()? {
            ThemePayload::Insights(insights) => Some(ThemePayload::Insights(insights.normalized())),
            ThemePayload::Tags(tags) => Some(ThemePayload::Tags(normalize_tags(tags.iter()))),
        };
    }

    let segments: Vec<&str> = body
        .split([',', '\n'])
        .map(|s| s.trim().trim_start_matches(['-', '*']).trim())
        .filter(|s| !s.is_empty())
        .collect();
    let looks_like_tags = segments.len() <= MAX_PLAIN_TAGS
        && segments.iter().all(|s| s.split_whitespace().count() <= 4);
    if !looks_like_tags {
        return None;
    }

    let tags: Vec<String> = segments.into_iter().filter_map(normalize_tag).collect();
    Some(ThemePayload::Tags(normalize_tags(tags.iter())))
}

/// Decodes an OCR answer.
///
/// `Some("")` when the model reports no text, `None` when the answer is
/// empty (no usable response), otherwise the transcribed text.
pub fn parse_ocr_response(text: &str) -> Option<String> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return None;
    }
    if body.trim_matches(|c: char| c == '"' || c == '.').eq_ignore_ascii_case(NO_TEXT_SENTINEL) {
        return Some(String::new());
    }
    Some(body.to_string())
}
