use serde::{Deserialize, Serialize};

use crate::perception::types::Selector;

/// Default wait for a step's confirmation selector.
pub const DEFAULT_CONFIRM_TIMEOUT_MS: u64 = 45_000;

/// A named, deterministic sequence of UI steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playbook {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub steps: Vec<PlaybookStep>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybookStep {
    pub name: String,
    #[serde(flatten)]
    pub action: PlaybookAction,
    /// Selector that must be visible once the step has run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for: Option<Selector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_timeout_ms: Option<u64>,
}

impl PlaybookStep {
    pub fn new(name: impl Into<String>, action: PlaybookAction) -> Self {
        Self {
            name: name.into(),
            action,
            wait_for: None,
            wait_timeout_ms: None,
        }
    }

    pub fn confirm(mut self, selector: Selector) -> Self {
        self.wait_for = Some(selector);
        self
    }

    pub fn confirm_timeout_ms(&self) -> u64 {
        self.wait_timeout_ms.unwrap_or(DEFAULT_CONFIRM_TIMEOUT_MS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PlaybookAction {
    Navigate { url: String },
    Click { selector: Selector },
    /// Click into `selector`, then type `text`.
    Fill { selector: Selector, text: String },
    PressKey { key: String },
    WaitFor { selector: Selector, timeout_ms: u64 },
    /// Capture the viewport; stored as `<name>.png` when persistence is on.
    Screenshot { name: String },
    Back,
}

impl PlaybookAction {
    pub fn kind(&self) -> &'static str {
        match self {
            PlaybookAction::Navigate { .. } => "navigate",
            PlaybookAction::Click { .. } => "click",
            PlaybookAction::Fill { .. } => "fill",
            PlaybookAction::PressKey { .. } => "press_key",
            PlaybookAction::WaitFor { .. } => "wait_for",
            PlaybookAction::Screenshot { .. } => "screenshot",
            PlaybookAction::Back => "back",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub step: String,
    pub action: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
