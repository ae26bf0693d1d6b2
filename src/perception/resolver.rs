//! Element resolver: natural-language element description → ordered selector
//! candidates, most specific first.
//!
//! Pure and driver-independent. An empty result means "nothing to look for",
//! never "match anything".

use crate::perception::types::{ElementType, Selector};

const MAX_KEYWORDS: usize = 3;

const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "in", "on", "at", "to", "for", "of", "with", "button", "link", "input",
    "field", "box", "element",
];

/// Which selector family a description asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    Button,
    Link,
    Field,
    Generic,
}

impl TargetKind {
    pub fn classify(description: &str) -> Self {
        let lower = description.to_lowercase();
        if lower.contains("button") {
            TargetKind::Button
        } else if lower.contains("link") {
            TargetKind::Link
        } else if ["field", "input", "search"].iter().any(|w| lower.contains(w)) {
            TargetKind::Field
        } else {
            TargetKind::Generic
        }
    }

    /// Whether the description names an element type explicitly.
    pub fn is_typed(&self) -> bool {
        !matches!(self, TargetKind::Generic)
    }
}

/// Up to three meaningful lower-case words from `description`.
pub fn extract_keywords(description: &str) -> Vec<String> {
    description
        .split_whitespace()
        .map(|w| {
            w.to_lowercase()
                .trim_matches(|c: char| matches!(c, '.' | ',' | '!' | '?' | '"' | '\'' | ':' | ';'))
                .to_string()
        })
        .filter(|w| !w.is_empty() && !STOP_WORDS.contains(&w.as_str()))
        .take(MAX_KEYWORDS)
        .collect()
}

/// Ordered selector candidates for `description`.
pub fn selector_candidates(description: &str) -> Vec<Selector> {
    let lower = description.to_lowercase();
    let keywords = extract_keywords(description);
    let mut selectors = Vec::new();

    match TargetKind::classify(description) {
        TargetKind::Button => {
            for kw in &keywords {
                selectors.push(Selector::has_text(ElementType::Button, kw.as_str()));
                selectors.push(Selector::has_text(ElementType::InputButton, kw.as_str()));
                selectors.push(Selector::has_text(ElementType::Submit, kw.as_str()));
                selectors.push(Selector::has_text(ElementType::Link, kw.as_str()));
            }
        }
        TargetKind::Link => {
            for kw in &keywords {
                selectors.push(Selector::has_text(ElementType::Link, kw.as_str()));
            }
        }
        TargetKind::Field => {
            if lower.contains("search") {
                selectors.push(Selector::SearchInput);
                selectors.push(Selector::attribute(ElementType::Input, "placeholder", "search"));
                selectors.push(Selector::attribute(ElementType::Input, "name", "search"));
            } else {
                for kw in &keywords {
                    selectors.push(Selector::attribute(ElementType::Input, "placeholder", kw.as_str()));
                    selectors.push(Selector::attribute(ElementType::Input, "name", kw.as_str()));
                }
            }
        }
        TargetKind::Generic => {
            for kw in &keywords {
                selectors.push(Selector::text(kw.as_str()));
                selectors.push(Selector::has_text(ElementType::Any, kw.as_str()));
            }
        }
    }

    tracing::trace!(description, candidates = selectors.len(), "resolved selector candidates");
    selectors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_drop_stop_words_and_punctuation() {
        assert_eq!(
            extract_keywords("Click the 'Sign in' button, please!"),
            vec!["click", "sign", "please"]
        );
        assert_eq!(extract_keywords("The Submit button."), vec!["submit"]);
    }

    #[test]
    fn keywords_are_capped_at_three() {
        assert_eq!(
            extract_keywords("red green blue yellow"),
            vec!["red", "green", "blue"]
        );
    }

    #[test]
    fn search_box_prefers_dedicated_search_input() {
        let candidates = selector_candidates("search box");
        assert_eq!(candidates[0], Selector::SearchInput);
        let placeholder = candidates
            .iter()
            .position(|s| matches!(s, Selector::Attribute { attr, .. } if attr == "placeholder"))
            .unwrap();
        assert!(placeholder > 0);
        assert!(candidates.iter().all(|s| matches!(
            s,
            Selector::SearchInput | Selector::Attribute { element: ElementType::Input, .. }
        )));
    }

    #[test]
    fn button_description_targets_clickables_per_keyword() {
        let candidates = selector_candidates("Submit button");
        assert_eq!(
            candidates,
            vec![
                Selector::has_text(ElementType::Button, "submit"),
                Selector::has_text(ElementType::InputButton, "submit"),
                Selector::has_text(ElementType::Submit, "submit"),
                Selector::has_text(ElementType::Link, "submit"),
            ]
        );
    }

    #[test]
    fn link_description_targets_anchors() {
        assert_eq!(
            selector_candidates("Pricing link"),
            vec![Selector::has_text(ElementType::Link, "pricing")]
        );
    }

    #[test]
    fn email_field_uses_attribute_matches() {
        assert_eq!(
            selector_candidates("email field"),
            vec![
                Selector::attribute(ElementType::Input, "placeholder", "email"),
                Selector::attribute(ElementType::Input, "name", "email"),
            ]
        );
    }

    #[test]
    fn generic_description_falls_back_to_text_matches() {
        assert_eq!(
            selector_candidates("Inbox"),
            vec![
                Selector::text("inbox"),
                Selector::has_text(ElementType::Any, "inbox"),
            ]
        );
    }

    #[test]
    fn no_keywords_means_no_candidates() {
        assert!(selector_candidates("").is_empty());
        assert!(selector_candidates("   ").is_empty());
        assert!(selector_candidates("the a an").is_empty());
        assert!(selector_candidates("the button").is_empty());
        assert!(selector_candidates("link").is_empty());
        assert!(selector_candidates("input field").is_empty());
    }
}
