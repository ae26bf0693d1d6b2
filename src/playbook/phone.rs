//! North-American phone number extraction from page text.

use once_cell::sync::Lazy;
use regex::Regex;

static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?1[-.\s]*)?(?:\(\d{3}\)|\d{3})[-.\s]*\d{3}[-.\s]*\d{4}")
        .expect("phone pattern compiles")
});

static TOKEN_SPLIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W+").expect("token pattern compiles"));

/// Bytes of context on each side of a match searched for query tokens.
const PROXIMITY: usize = 80;

fn query_tokens(query: &str) -> Vec<String> {
    TOKEN_SPLIT
        .split(&query.to_lowercase())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn window(text: &str, start: usize, end: usize) -> &str {
    let mut from = start.saturating_sub(PROXIMITY);
    while !text.is_char_boundary(from) {
        from -= 1;
    }
    let mut to = (end + PROXIMITY).min(text.len());
    while !text.is_char_boundary(to) {
        to += 1;
    }
    &text[from..to]
}

/// `(XXX) XXX-XXXX` from the last ten digits; shorter input is returned as is.
pub fn format_phone(digits: &str) -> String {
    let tail = &digits[digits.len().saturating_sub(10)..];
    if tail.len() != 10 {
        return tail.to_string();
    }
    format!("({}) {}-{}", &tail[..3], &tail[3..6], &tail[6..])
}

/// Best phone number in `text` for `query`, formatted.
///
/// Each match scores 1, +1 with at least ten digits, +2 when a query token
/// appears nearby. The first highest-scoring match wins.
pub fn extract_phone_number(text: &str, query: &str) -> Option<String> {
    let tokens = query_tokens(query);
    let mut best: Option<(u32, String)> = None;

    for m in PHONE_RE.find_iter(text) {
        let digits: String = m.as_str().chars().filter(char::is_ascii_digit).collect();
        let mut score = 1;
        if digits.len() >= 10 {
            score += 1;
        }
        let nearby = window(text, m.start(), m.end()).to_lowercase();
        if tokens.iter().any(|t| nearby.contains(t.as_str())) {
            score += 2;
        }
        if best.as_ref().map_or(true, |(s, _)| score > *s) {
            best = Some((score, format_phone(&digits)));
        }
    }

    let phone = best.map(|(_, p)| p)?;
    tracing::info!(%phone, query, "extracted phone number");
    Some(phone)
}
