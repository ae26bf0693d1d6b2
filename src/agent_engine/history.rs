use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent_engine::state::{StepRecord, TaskOutcome, TaskStatus};
use crate::errors::PilotResult;
use crate::playbook::types::StepOutcome;

/// One line of a session file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEntry {
    Step(StepRecord),
    Outcome(OutcomeLine),
    Playbook(PlaybookLine),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeLine {
    pub task: String,
    pub status: TaskStatus,
    pub reason: String,
    pub steps: u32,
    pub answer: Option<String>,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybookLine {
    pub name: String,
    pub outcomes: Vec<StepOutcome>,
    pub answer: Option<String>,
    pub ts: DateTime<Utc>,
}

/// Append-only JSONL log of one session.
#[derive(Debug, Clone)]
pub struct SessionHistory {
    pub session_id: String,
    file_path: PathBuf,
}

impl SessionHistory {
    /// A fresh session file under the user's local data directory.
    pub fn new() -> PilotResult<Self> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let dir = sessions_dir();
        std::fs::create_dir_all(&dir)?;
        let file_path = dir.join(format!("session_{session_id}.jsonl"));
        Ok(Self {
            session_id,
            file_path,
        })
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            file_path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn append(&self, entry: &SessionEntry) -> PilotResult<()> {
        let line = serde_json::to_string(entry)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        writeln!(file, "{line}")?;
        tracing::debug!(path = %self.file_path.display(), "history entry flushed");
        Ok(())
    }

    pub fn append_step(&self, record: &StepRecord) -> PilotResult<()> {
        self.append(&SessionEntry::Step(record.clone()))
    }

    /// Closing line of a task run; its steps are appended as they happen.
    pub fn append_outcome(&self, task: &str, outcome: &TaskOutcome) -> PilotResult<()> {
        self.append(&SessionEntry::Outcome(OutcomeLine {
            task: task.to_string(),
            status: outcome.status,
            reason: outcome.reason.clone(),
            steps: outcome.steps,
            answer: outcome.answer.clone(),
            ts: Utc::now(),
        }))
    }

    pub fn record_playbook(
        &self,
        name: &str,
        outcomes: &[StepOutcome],
        answer: Option<&str>,
    ) -> PilotResult<()> {
        self.append(&SessionEntry::Playbook(PlaybookLine {
            name: name.to_string(),
            outcomes: outcomes.to_vec(),
            answer: answer.map(str::to_string),
            ts: Utc::now(),
        }))
    }

    pub fn read_entries(&self) -> PilotResult<Vec<SessionEntry>> {
        let file = std::fs::File::open(&self.file_path)?;
        let mut entries = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            entries.push(serde_json::from_str(&line)?);
        }
        Ok(entries)
    }

    /// Step records in the order they were written.
    pub fn read_steps(&self) -> PilotResult<Vec<StepRecord>> {
        Ok(self
            .read_entries()?
            .into_iter()
            .filter_map(|e| match e {
                SessionEntry::Step(record) => Some(record),
                _ => None,
            })
            .collect())
    }
}

/// `<data_local_dir>/visionpilot/sessions`, falling back to the working directory.
fn sessions_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("visionpilot").join("sessions"))
        .unwrap_or_else(|| PathBuf::from("."))
}
