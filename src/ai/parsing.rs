//! JSON parsing helpers for model replies.
//!
//! Replies are often wrapped in a Markdown code fence. The fence is removed and what is left must
//! be the JSON we asked for; there is no attempt to repair or search for JSON inside prose.

use crate::error::{tagged, ErrorType, Res};
use super::prompts::READY;
use crate::model::ColumnMapping;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Removes a leading ```` ``` ```` or ```` ```json ```` line and a trailing ```` ``` ````.
pub(super) fn strip_code_fence(reply: &str) -> &str {
    let mut text = reply.trim();
    if let Some(rest) = text.strip_prefix("```") {
        // Drop the rest of the opening line, which may name a language.
        text = match rest.find('\n') {
            Some(newline) => &rest[newline + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
    }
    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// Whether a probe reply is the ready token, ignoring case, surrounding whitespace, quotes and
/// trailing punctuation.
pub(super) fn is_ready(reply: &str) -> bool {
    reply
        .trim()
        .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
        .eq_ignore_ascii_case(READY)
}

#[derive(Debug, Deserialize)]
struct ColumnReply {
    category: Option<usize>,
    amount: Option<usize>,
}

/// Parses `{"category": <index|null>, "amount": <index|null>}`.
pub(super) fn parse_classification(reply: &str) -> Res<ColumnMapping> {
    let json = strip_code_fence(reply);
    let parsed: ColumnReply = serde_json::from_str(json).map_err(|e| {
        tagged(
            ErrorType::Classification,
            format!("The model's column answer is not valid JSON: {e} | Raw: {}", truncate(json)),
        )
    })?;
    Ok(ColumnMapping::new(parsed.category, parsed.amount))
}

/// Parses a JSON object of raw category name to canonical name.
pub(super) fn parse_normalization(reply: &str) -> Res<BTreeMap<String, String>> {
    let json = strip_code_fence(reply);
    serde_json::from_str(json).map_err(|e| {
        tagged(
            ErrorType::Normalization,
            format!("The model's category answer is not valid JSON: {e} | Raw: {}", truncate(json)),
        )
    })
}

/// Shortens long replies for error messages.
fn truncate(s: &str) -> String {
    const MAX: usize = 200;
    match s.char_indices().nth(MAX) {
        Some((ix, _)) => format!("{}...", &s[..ix]),
        None => s.to_string(),
    }
}
