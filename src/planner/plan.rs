use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::agent_engine::directive::ActionDirective;
use crate::perception::resolver::{selector_candidates, TargetKind};
use crate::perception::types::Selector;

pub const DEFAULT_MAX_RETRIES: u32 = 2;

const TARGET_GUARD_TIMEOUT: Duration = Duration::from_secs(15);
const PAGE_STABLE_TIMEOUT: Duration = Duration::from_secs(8);

/// Element state an expectation waits for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElementState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl ElementState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementState::Visible => "visible",
            ElementState::Hidden => "hidden",
            ElementState::Attached => "attached",
            ElementState::Detached => "detached",
        }
    }
}

/// A named check against the live UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiExpectation {
    pub label: String,
    pub selector: Selector,
    pub state: ElementState,
    #[serde(with = "duration_ms")]
    pub timeout: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl UiExpectation {
    pub fn visible(label: impl Into<String>, selector: Selector, timeout: Duration) -> Self {
        Self {
            label: label.into(),
            selector,
            state: ElementState::Visible,
            timeout,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Guards, validations and retry budget for one directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub preconditions: Vec<UiExpectation>,
    pub postconditions: Vec<UiExpectation>,
    pub max_retries: u32,
}

impl Plan {
    pub fn new(max_retries: u32) -> Self {
        Self {
            preconditions: Vec::new(),
            postconditions: Vec::new(),
            max_retries,
        }
    }

    /// Upper bound on guard → act → validate cycles.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

impl Default for Plan {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

struct ResultPattern {
    keywords: &'static [&'static str],
    css: &'static str,
    timeout: Duration,
    description: &'static str,
}

/// Ordered keyword table for predicting what an action should reveal.
const RESULT_PATTERNS: &[ResultPattern] = &[
    ResultPattern {
        keywords: &["search", "lookup", "phone", "google"],
        css: "#search",
        timeout: Duration::from_secs(60),
        description: "search results loaded",
    },
    ResultPattern {
        keywords: &["gmail", "inbox", "email"],
        css: "div[role='main']",
        timeout: Duration::from_secs(45),
        description: "main content ready",
    },
    ResultPattern {
        keywords: &["calendar", "meeting"],
        css: "div[role='grid']",
        timeout: Duration::from_secs(45),
        description: "calendar grid visible",
    },
    ResultPattern {
        keywords: &["drive", "file"],
        css: "div[data-target='doclist']",
        timeout: Duration::from_secs(45),
        description: "file list ready",
    },
];

/// Zero or one guard for the directive's target.
///
/// Only targets that name an element type get a guard; the guard uses the
/// resolver's first (most specific) candidate.
pub fn synthesize_precondition(directive: &ActionDirective) -> Option<UiExpectation> {
    if !TargetKind::classify(&directive.target).is_typed() {
        return None;
    }
    let selector = selector_candidates(&directive.target).into_iter().next()?;
    Some(
        UiExpectation::visible("target_visible", selector, TARGET_GUARD_TIMEOUT)
            .with_description(format!("target '{}' is visible", directive.target)),
    )
}

fn match_patterns(haystack: &str) -> Vec<UiExpectation> {
    let haystack = haystack.to_lowercase();
    RESULT_PATTERNS
        .iter()
        .filter(|p| p.keywords.iter().any(|k| haystack.contains(k)))
        .map(|p| {
            UiExpectation::visible(p.css, Selector::css(p.css), p.timeout)
                .with_description(p.description)
        })
        .collect()
}

/// Postconditions predicted from the directive's target and value.
///
/// `task` is only consulted when target and value match nothing.
pub fn predict_postconditions(directive: &ActionDirective, task: Option<&str>) -> Vec<UiExpectation> {
    let haystack = format!("{} {}", directive.target, directive.value.as_deref().unwrap_or(""));
    let predicted = match_patterns(&haystack);
    if !predicted.is_empty() {
        return predicted;
    }
    task.map(match_patterns).unwrap_or_default()
}

pub fn page_stable() -> UiExpectation {
    UiExpectation::visible("page_stable", Selector::document_root(), PAGE_STABLE_TIMEOUT)
        .with_description("page finished updating")
}

pub fn build_plan(directive: &ActionDirective, task: Option<&str>, max_retries: u32) -> Plan {
    let mut plan = Plan::new(max_retries);
    plan.preconditions.extend(synthesize_precondition(directive));
    plan.postconditions = predict_postconditions(directive, task);
    if plan.postconditions.is_empty() {
        plan.postconditions.push(page_stable());
    }
    plan
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
