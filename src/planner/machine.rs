//! Guard → act → validate → recover state machine around one directive.
//!
//! Each full guard-act-validate cycle is one attempt; a plan never runs more
//! than `max_retries + 1` attempts. Expectation checks are boolean; only the
//! executor can abort a run with an error.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agent_engine::directive::{ActionDirective, ActionType};
use crate::config::PlannerConfig;
use crate::errors::{PilotError, PilotResult};
use crate::executor::dispatcher::ActionExecutor;
use crate::executor::driver::{ScrollDirection, UiDriver};
use crate::perception::types::Selector;
use crate::planner::plan::{build_plan, ElementState, Plan, UiExpectation};

// ── State machine ────────────────────────────────────────────────────────────

/// Which check failed and therefore which recovery ladder applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Guard,
    Post,
}

impl Stage {
    /// Recovery strategies in priority order.
    pub fn strategies(&self) -> &'static [RecoveryStrategy] {
        match self {
            Stage::Guard => &[
                RecoveryStrategy::Scroll,
                RecoveryStrategy::WaitShort,
                RecoveryStrategy::Reload,
            ],
            Stage::Post => &[
                RecoveryStrategy::WaitLong,
                RecoveryStrategy::Scroll,
                RecoveryStrategy::Reload,
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Guard,
    Act,
    Validate,
    Recover(Stage),
    Done,
    Failed(Stage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Passed,
    Missed,
    Acted,
    Recovered,
    Exhausted,
}

const TRANSITIONS: &[(Phase, Signal, Phase)] = &[
    (Phase::Guard, Signal::Passed, Phase::Act),
    (Phase::Guard, Signal::Missed, Phase::Recover(Stage::Guard)),
    (Phase::Act, Signal::Acted, Phase::Validate),
    (Phase::Validate, Signal::Passed, Phase::Done),
    (Phase::Validate, Signal::Missed, Phase::Recover(Stage::Post)),
    (Phase::Recover(Stage::Guard), Signal::Recovered, Phase::Guard),
    (Phase::Recover(Stage::Guard), Signal::Exhausted, Phase::Failed(Stage::Guard)),
    (Phase::Recover(Stage::Post), Signal::Recovered, Phase::Guard),
    (Phase::Recover(Stage::Post), Signal::Exhausted, Phase::Failed(Stage::Post)),
];

/// Next phase, or `None` if `signal` is meaningless in `from`.
pub fn transition(from: Phase, signal: Signal) -> Option<Phase> {
    TRANSITIONS
        .iter()
        .find(|(phase, sig, _)| *phase == from && *sig == signal)
        .map(|(_, _, to)| *to)
}

// ── Execution records ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    Scroll,
    WaitShort,
    WaitLong,
    Reload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Ok,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckRecord {
    pub label: String,
    pub selector: Selector,
    pub state: ElementState,
    pub timeout_ms: u64,
    pub status: CheckStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryRecord {
    pub strategy: RecoveryStrategy,
    /// Whether the strategy itself could be applied.
    pub applied: bool,
    /// Re-check of the failing expectation after the strategy.
    pub recheck: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    Performed,
    Raised { error: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Ok,
    GuardFailed,
    ActionFailed,
    PostconditionFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub preconditions: Vec<CheckRecord>,
    pub action: Option<ActionOutcome>,
    pub postconditions: Vec<CheckRecord>,
    pub recovery: Vec<RecoveryRecord>,
    pub status: Option<AttemptStatus>,
}

impl AttemptRecord {
    fn new(attempt: u32) -> Self {
        Self {
            attempt,
            preconditions: Vec::new(),
            action: None,
            postconditions: Vec::new(),
            recovery: Vec::new(),
            status: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Ok,
    Failed,
}

/// Attempt-indexed trace of one planned directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub action: ActionType,
    pub target: String,
    pub preconditions: Vec<UiExpectation>,
    pub postconditions: Vec<UiExpectation>,
    pub attempts: Vec<AttemptRecord>,
    pub status: ExecutionStatus,
    pub reason: Option<String>,
    /// Attempt that succeeded.
    pub attempt: Option<u32>,
}

impl ExecutionSummary {
    fn new(directive: &ActionDirective, plan: &Plan) -> Self {
        Self {
            action: directive.action_type,
            target: directive.target.clone(),
            preconditions: plan.preconditions.clone(),
            postconditions: plan.postconditions.clone(),
            attempts: Vec::new(),
            status: ExecutionStatus::Failed,
            reason: None,
            attempt: None,
        }
    }

    fn finish_failed(&mut self, reason: impl Into<String>) {
        self.status = ExecutionStatus::Failed;
        self.reason = Some(reason.into());
    }
}

// ── Errors ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    TargetNotReachable,
    PostconditionNotMet,
    Stalled,
}

#[derive(Debug, Error)]
#[error("{reason}")]
pub struct PlannerFailure {
    pub kind: FailureKind,
    pub reason: String,
    pub summary: Box<ExecutionSummary>,
}

#[derive(Debug, Error)]
pub enum PlannerError {
    /// Guard or postcondition still unmet after recovery and retries.
    #[error(transparent)]
    Failed(#[from] PlannerFailure),

    /// The executor raised; never retried.
    #[error("executor raised: {source}")]
    Executor {
        #[source]
        source: PilotError,
        summary: Box<ExecutionSummary>,
    },
}

impl PlannerError {
    pub fn summary(&self) -> &ExecutionSummary {
        match self {
            PlannerError::Failed(f) => &f.summary,
            PlannerError::Executor { summary, .. } => summary,
        }
    }

    pub fn into_summary(self) -> ExecutionSummary {
        match self {
            PlannerError::Failed(f) => *f.summary,
            PlannerError::Executor { summary, .. } => *summary,
        }
    }
}

fn failure(
    stage: Stage,
    failing: Option<&UiExpectation>,
    mut summary: ExecutionSummary,
    exhausted: bool,
) -> PlannerError {
    let selector = failing
        .map(|e| e.selector.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let (kind, mut reason) = match stage {
        Stage::Guard => (
            FailureKind::TargetNotReachable,
            format!("Target not reachable ({selector})"),
        ),
        Stage::Post => (
            FailureKind::PostconditionNotMet,
            format!("Postcondition not met ({selector})"),
        ),
    };
    if exhausted {
        reason.push_str(": retries exhausted");
    }
    summary.finish_failed(reason.clone());
    PlannerFailure {
        kind,
        reason,
        summary: Box::new(summary),
    }
    .into()
}

// ── Planner ──────────────────────────────────────────────────────────────────

pub struct UiPlanner {
    driver: Arc<dyn UiDriver>,
    executor: Arc<dyn ActionExecutor>,
    config: PlannerConfig,
}

impl UiPlanner {
    pub fn new(
        driver: Arc<dyn UiDriver>,
        executor: Arc<dyn ActionExecutor>,
        config: PlannerConfig,
    ) -> Self {
        Self {
            driver,
            executor,
            config,
        }
    }

    pub fn plan(&self, directive: &ActionDirective, task: Option<&str>) -> Plan {
        let task = task.filter(|_| self.config.predict_from_task);
        build_plan(directive, task, self.config.max_retries)
    }

    /// Plans and executes `directive`.
    pub async fn run(
        &self,
        directive: &ActionDirective,
        task: Option<&str>,
    ) -> Result<ExecutionSummary, PlannerError> {
        let plan = self.plan(directive, task);
        self.execute(directive, &plan).await
    }

    pub async fn execute(
        &self,
        directive: &ActionDirective,
        plan: &Plan,
    ) -> Result<ExecutionSummary, PlannerError> {
        let mut summary = ExecutionSummary::new(directive, plan);
        let mut attempt = 1;
        let mut record = AttemptRecord::new(attempt);
        let mut failing: Option<UiExpectation> = None;
        let mut phase = Phase::Guard;

        tracing::info!(
            action = %directive.action_type,
            target = %directive.target,
            guards = plan.preconditions.len(),
            validations = plan.postconditions.len(),
            "planner run"
        );

        loop {
            let signal = match phase {
                Phase::Guard => {
                    let (checks, missed) = self.verify(&plan.preconditions).await;
                    record.preconditions = checks;
                    match missed {
                        Some(exp) => {
                            record.status = Some(AttemptStatus::GuardFailed);
                            failing = Some(exp);
                            Signal::Missed
                        }
                        None => Signal::Passed,
                    }
                }
                Phase::Act => match self.executor.execute(directive).await {
                    Ok(()) => {
                        record.action = Some(ActionOutcome::Performed);
                        Signal::Acted
                    }
                    Err(source) => {
                        tracing::error!(attempt, error = %source, "executor raised");
                        record.action = Some(ActionOutcome::Raised {
                            error: source.to_string(),
                        });
                        record.status = Some(AttemptStatus::ActionFailed);
                        summary.attempts.push(record);
                        summary.finish_failed("executor raised");
                        return Err(PlannerError::Executor {
                            source,
                            summary: Box::new(summary),
                        });
                    }
                },
                Phase::Validate => {
                    let (checks, missed) = self.verify(&plan.postconditions).await;
                    record.postconditions = checks;
                    match missed {
                        Some(exp) => {
                            record.status = Some(AttemptStatus::PostconditionFailed);
                            failing = Some(exp);
                            Signal::Missed
                        }
                        None => {
                            record.status = Some(AttemptStatus::Ok);
                            Signal::Passed
                        }
                    }
                }
                Phase::Recover(stage) => {
                    let recovered = match failing.as_ref() {
                        Some(exp) => self.recover(stage, exp, &mut record).await,
                        None => false,
                    };
                    if recovered {
                        Signal::Recovered
                    } else {
                        Signal::Exhausted
                    }
                }
                Phase::Done => {
                    summary.attempts.push(record);
                    summary.status = ExecutionStatus::Ok;
                    summary.attempt = Some(attempt);
                    tracing::info!(attempt, "planner succeeded");
                    return Ok(summary);
                }
                Phase::Failed(stage) => {
                    summary.attempts.push(record);
                    let err = failure(stage, failing.as_ref(), summary, false);
                    tracing::warn!(attempt, reason = %err, "planner failed");
                    return Err(err);
                }
            };

            let Some(next) = transition(phase, signal) else {
                summary.attempts.push(record);
                let reason = format!("planner stalled in {phase:?} on {signal:?}");
                summary.finish_failed(reason.clone());
                return Err(PlannerFailure {
                    kind: FailureKind::Stalled,
                    reason,
                    summary: Box::new(summary),
                }
                .into());
            };

            if let (Phase::Recover(stage), Phase::Guard) = (phase, next) {
                let finished = std::mem::replace(&mut record, AttemptRecord::new(attempt + 1));
                summary.attempts.push(finished);
                if attempt >= plan.max_attempts() {
                    let err = failure(stage, failing.as_ref(), summary, true);
                    tracing::warn!(attempt, reason = %err, "planner retries exhausted");
                    return Err(err);
                }
                attempt += 1;
                failing = None;
                tracing::info!(attempt, ?stage, "recovered; restarting attempt");
            }
            phase = next;
        }
    }

    /// Evaluates expectations in order, stopping at the first miss.
    async fn verify(
        &self,
        expectations: &[UiExpectation],
    ) -> (Vec<CheckRecord>, Option<UiExpectation>) {
        let mut checks = Vec::with_capacity(expectations.len());
        for exp in expectations {
            let ok = self.check(exp, exp.timeout).await;
            checks.push(CheckRecord {
                label: exp.label.clone(),
                selector: exp.selector.clone(),
                state: exp.state,
                timeout_ms: exp.timeout.as_millis() as u64,
                status: if ok { CheckStatus::Ok } else { CheckStatus::Missing },
            });
            if !ok {
                return (checks, Some(exp.clone()));
            }
        }
        (checks, None)
    }

    async fn check(&self, exp: &UiExpectation, timeout: Duration) -> bool {
        match self.driver.wait_for(&exp.selector, exp.state, timeout).await {
            Ok(ok) => ok,
            Err(e) => {
                tracing::warn!(selector = %exp.selector, error = %e, "expectation check errored");
                false
            }
        }
    }

    async fn recover(
        &self,
        stage: Stage,
        failing: &UiExpectation,
        record: &mut AttemptRecord,
    ) -> bool {
        let recheck_timeout = failing
            .timeout
            .min(Duration::from_millis(self.config.recheck_cap_ms));
        for &strategy in stage.strategies() {
            if let Err(e) = self.apply(strategy).await {
                tracing::warn!(?strategy, error = %e, "recovery strategy failed");
                record.recovery.push(RecoveryRecord {
                    strategy,
                    applied: false,
                    recheck: None,
                });
                continue;
            }
            let ok = self.check(failing, recheck_timeout).await;
            record.recovery.push(RecoveryRecord {
                strategy,
                applied: true,
                recheck: Some(ok),
            });
            if ok {
                tracing::info!(?strategy, selector = %failing.selector, "recovery satisfied expectation");
                return true;
            }
        }
        false
    }

    async fn apply(&self, strategy: RecoveryStrategy) -> PilotResult<()> {
        match strategy {
            RecoveryStrategy::Scroll => self.driver.scroll(ScrollDirection::Down).await,
            RecoveryStrategy::WaitShort => {
                tokio::time::sleep(Duration::from_millis(self.config.short_wait_ms)).await;
                Ok(())
            }
            RecoveryStrategy::WaitLong => {
                tokio::time::sleep(Duration::from_millis(self.config.long_wait_ms)).await;
                Ok(())
            }
            RecoveryStrategy::Reload => self.driver.reload().await,
        }
    }
}
