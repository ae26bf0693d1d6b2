pub mod library;
pub mod phone;
pub mod runner;
pub mod types;

pub use runner::PlaybookRunner;
pub use types::{Playbook, PlaybookAction, PlaybookStep, StepOutcome, StepStatus};
