pub mod machine;
pub mod plan;

pub use machine::{ExecutionSummary, PlannerError, UiPlanner};
pub use plan::{build_plan, ElementState, Plan, UiExpectation};
