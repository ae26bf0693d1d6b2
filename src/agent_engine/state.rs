use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent_engine::directive::ActionDirective;
use crate::planner::machine::ExecutionSummary;
use crate::playbook::types::StepOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Success,
    Incomplete,
}

/// One perceive → decide → act iteration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    /// 1-based.
    pub step: u32,
    /// Where the step's screenshot was saved, if anywhere.
    pub screenshot: Option<PathBuf>,
    pub vision_response: String,
    pub directive: ActionDirective,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution: Option<ExecutionSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub status: TaskStatus,
    pub reason: String,
    pub steps: u32,
    pub history: Vec<StepRecord>,
    pub answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupOutcome {
    pub status: TaskStatus,
    pub reason: String,
    pub playbook: Vec<StepOutcome>,
    pub phone: Option<String>,
    pub answer: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchOutcome {
    pub status: TaskStatus,
    pub reason: String,
    pub playbook: Vec<StepOutcome>,
    /// Saved result screenshots, in rank order.
    pub captures: Vec<PathBuf>,
    pub answer: Option<String>,
}
