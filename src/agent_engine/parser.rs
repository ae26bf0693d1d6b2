//! Line-oriented scanner for the vision service's `FIELD: value` protocol.
//!
//! Parsing never fails: every missing or malformed field falls back to its
//! default, so any text yields a usable (possibly inert) directive.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::agent_engine::directive::{ActionDirective, ActionType, Confidence};

/// A whole word followed by a colon, optionally through markdown emphasis
/// (`**Action:**`, `**VALUE**:`). Word boundaries are Unicode-aware.
static TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Za-z]+)\b[ \t*_`]*:").expect("tag pattern compiles"));

/// Emphasis that may wrap a value; stripped from both ends.
const VALUE_EMPHASIS: &[char] = &['*', '`'];

const NOT_APPLICABLE: &[&str] = &["n/a", "na", "none", "not applicable"];

/// Value of the first non-empty `tag:` field (case-insensitive tag).
///
/// The tag may appear anywhere on a line, so numbered lists, bullets and
/// prose prefixes (`Next step: ACTION: complete`) are understood. The value
/// runs to the end of that line.
pub fn extract_field(text: &str, tag: &str) -> Option<String> {
    text.lines().find_map(|line| field_on_line(line, tag))
}

fn field_on_line(line: &str, tag: &str) -> Option<String> {
    TAG.captures_iter(line).find_map(|caps| {
        if !caps.get(1)?.as_str().eq_ignore_ascii_case(tag) {
            return None;
        }
        let value = clean_value(&line[caps.get(0)?.end()..]);
        (!value.is_empty()).then_some(value)
    })
}

fn clean_value(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches(|c: char| VALUE_EMPHASIS.contains(&c)).trim();
    let unbracketed = trimmed
        .strip_prefix('[')
        .map(|s| s.strip_suffix(']').unwrap_or(s))
        .unwrap_or(trimmed);
    unbracketed.trim().to_string()
}

fn is_not_applicable(value: &str) -> bool {
    let lower = value.trim().trim_end_matches('.').to_ascii_lowercase();
    NOT_APPLICABLE.contains(&lower.as_str())
}

/// Converts a free-text answer into a directive.
///
/// Defaults: action `wait`, empty target, no value, empty reason, `medium` confidence.
pub fn parse_directive(text: &str) -> ActionDirective {
    let action_type = extract_field(text, "ACTION")
        .map(|raw| ActionType::parse(&raw))
        .unwrap_or(ActionType::Wait);
    let confidence = extract_field(text, "CONFIDENCE")
        .map(|raw| Confidence::parse(&raw))
        .unwrap_or_default();

    ActionDirective {
        action_type,
        target: extract_field(text, "TARGET").unwrap_or_default(),
        value: extract_field(text, "VALUE").filter(|v| !is_not_applicable(v)),
        reason: extract_field(text, "REASON").unwrap_or_default(),
        confidence,
    }
}

/// Literal answer from a question-answering reply.
///
/// `ANSWER: NOT_FOUND` (or an empty reply) is no answer; an untagged reply is
/// returned as-is.
pub fn parse_answer(text: &str) -> Option<String> {
    match extract_field(text, "ANSWER") {
        Some(answer) => {
            let normalized = answer.to_ascii_uppercase().replace([' ', '-'], "_");
            (normalized != "NOT_FOUND").then_some(answer)
        }
        None => {
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
    }
}
