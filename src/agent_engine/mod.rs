pub mod directive;
pub mod engine;
pub mod history;
pub mod loop_control;
pub mod parser;
pub mod state;

pub use directive::{ActionDirective, ActionType, Confidence};
pub use engine::VisionActionAgent;
pub use history::SessionHistory;
pub use state::{LookupOutcome, ResearchOutcome, StepRecord, TaskOutcome, TaskStatus};
