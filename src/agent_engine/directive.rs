use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of UI interaction a directive asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Click,
    Type,
    Scroll,
    Navigate,
    Wait,
    Complete,
}

impl ActionType {
    /// Lenient parse: the first word decides, anything unrecognised is `Wait`.
    pub fn parse(raw: &str) -> Self {
        let word: String = raw
            .trim()
            .chars()
            .skip_while(|c| !c.is_ascii_alphabetic())
            .take_while(|c| c.is_ascii_alphabetic())
            .collect::<String>()
            .to_ascii_lowercase();
        match word.as_str() {
            "click" => ActionType::Click,
            "type" => ActionType::Type,
            "scroll" => ActionType::Scroll,
            "navigate" => ActionType::Navigate,
            "complete" => ActionType::Complete,
            _ => ActionType::Wait,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Click => "click",
            ActionType::Type => "type",
            ActionType::Scroll => "scroll",
            ActionType::Navigate => "navigate",
            ActionType::Wait => "wait",
            ActionType::Complete => "complete",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Advisory only; never gates execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    High,
    #[default]
    Medium,
    Low,
}

impl Confidence {
    pub fn parse(raw: &str) -> Self {
        let lower = raw.trim().to_ascii_lowercase();
        if lower.starts_with("high") {
            Confidence::High
        } else if lower.starts_with("low") {
            Confidence::Low
        } else {
            Confidence::Medium
        }
    }
}

/// One normalised instruction from the vision service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDirective {
    pub action_type: ActionType,
    /// Element description or destination; may be empty.
    pub target: String,
    /// Text to type, wait seconds, URL suffix. `None` also covers an explicit "N/A".
    pub value: Option<String>,
    pub reason: String,
    pub confidence: Confidence,
}

impl ActionDirective {
    pub fn new(action_type: ActionType, target: impl Into<String>) -> Self {
        Self {
            action_type,
            target: target.into(),
            value: None,
            reason: String::new(),
            confidence: Confidence::default(),
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// A complete directive ends the task; nothing is requested after it.
    pub fn is_complete(&self) -> bool {
        self.action_type == ActionType::Complete
    }
}

impl Default for ActionDirective {
    fn default() -> Self {
        Self::new(ActionType::Wait, "")
    }
}
