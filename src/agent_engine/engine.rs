use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use crate::agent_engine::history::SessionHistory;
use crate::agent_engine::loop_control::LoopController;
use crate::agent_engine::parser::{parse_answer, parse_directive};
use crate::agent_engine::state::{
    LookupOutcome, ResearchOutcome, StepRecord, TaskOutcome, TaskStatus,
};
use crate::config::{AgentConfig, PlannerConfig};
use crate::errors::PilotResult;
use crate::executor::dispatcher::DirectiveDispatcher;
use crate::executor::driver::UiDriver;
use crate::llm::prompts::{action_prompt, answer_prompt};
use crate::llm::provider::VisionProvider;
use crate::perception::screenshot::{prepare_for_vision, ScreenshotStore};
use crate::perception::types::Selector;
use crate::planner::machine::{PlannerError, UiPlanner};
use crate::playbook::library::{build_lookup_playbook, build_research_playbook};
use crate::playbook::phone::extract_phone_number;
use crate::playbook::runner::PlaybookRunner;
use crate::playbook::types::{Playbook, StepOutcome, StepStatus};

const RESEARCH_QUESTION: &str = "Summarize the key findings from the captured search results.";

/// Perceive → decide → act loop over one UI session.
///
/// The agent owns no state between tasks; each call builds its own history.
pub struct VisionActionAgent {
    vision: Arc<dyn VisionProvider>,
    driver: Arc<dyn UiDriver>,
    planner: UiPlanner,
    playbooks: PlaybookRunner,
    config: AgentConfig,
    screenshots: Option<ScreenshotStore>,
    history: Option<SessionHistory>,
}

impl VisionActionAgent {
    pub fn new(
        vision: Arc<dyn VisionProvider>,
        driver: Arc<dyn UiDriver>,
        config: AgentConfig,
        planner_config: PlannerConfig,
    ) -> PilotResult<Self> {
        let screenshots = match &config.screenshot_dir {
            Some(dir) => Some(ScreenshotStore::new(dir.clone())?),
            None => None,
        };
        let executor = Arc::new(DirectiveDispatcher::new(Arc::clone(&driver)));
        let planner = UiPlanner::new(Arc::clone(&driver), executor, planner_config);
        let playbooks = PlaybookRunner::new(Arc::clone(&driver), screenshots.clone());
        tracing::info!(
            provider = vision.name(),
            max_steps = config.max_steps,
            "vision action agent ready"
        );
        Ok(Self {
            vision,
            driver,
            planner,
            playbooks,
            config,
            screenshots,
            history: None,
        })
    }

    /// Streams step records and outcomes into `history`.
    pub fn with_history(mut self, history: SessionHistory) -> Self {
        self.history = Some(history);
        self
    }

    pub fn history(&self) -> Option<&SessionHistory> {
        self.history.as_ref()
    }

    /// Runs `task` until the vision service reports completion or the step
    /// budget runs out.
    ///
    /// Planner failures are recorded per step. Screenshot, vision transport
    /// and navigation faults abort the run.
    pub async fn execute_task(
        &self,
        task: &str,
        starting_url: Option<&str>,
    ) -> PilotResult<TaskOutcome> {
        let start = starting_url.unwrap_or(&self.config.start_url);
        tracing::info!(task, start, "starting task");
        self.driver.navigate(start).await?;
        tokio::time::sleep(self.config.settle()).await;

        let mut ctrl = LoopController::new(self.config.max_steps);
        let mut history: Vec<StepRecord> = Vec::new();
        let prompt = action_prompt(task);

        while let Some(step) = ctrl.next_step() {
            tracing::info!(step, max_steps = ctrl.max_steps(), "step");

            let png = self.driver.screenshot().await?;
            let screenshot = self.persist(&format!("step_{step:02}"), &png);
            let vision_response = self.vision.analyze(&prepare_for_vision(png), &prompt).await?;
            tracing::debug!(step, response = %vision_response, "vision response");

            let directive = parse_directive(&vision_response);
            tracing::info!(
                step,
                action = %directive.action_type,
                target = %directive.target,
                confidence = ?directive.confidence,
                "directive"
            );

            let mut record = StepRecord {
                step,
                screenshot,
                vision_response,
                directive: directive.clone(),
                execution: None,
                error: None,
                timestamp: Utc::now(),
            };

            if directive.is_complete() {
                tracing::info!(step, reason = %directive.reason, "task complete");
                self.log_step(&record);
                history.push(record);
                let answer = self.answer_task(task).await;
                return Ok(self.finish(
                    task,
                    TaskOutcome {
                        status: TaskStatus::Success,
                        reason: directive.reason,
                        steps: step,
                        history,
                        answer,
                    },
                ));
            }

            let settle = match self.planner.run(&directive, Some(task)).await {
                Ok(summary) => {
                    record.execution = Some(summary);
                    true
                }
                Err(err) => {
                    tracing::error!(step, error = %err, "planner failed");
                    ctrl.record_failure();
                    record.error = Some(err.to_string());
                    // Executor faults still give the page time to settle.
                    let settle = matches!(err, PlannerError::Executor { .. });
                    record.execution = Some(err.into_summary());
                    settle
                }
            };
            let failed = record.error.is_some();
            self.log_step(&record);
            history.push(record);

            if failed && ctrl.is_last_step() {
                tracing::warn!(step, "failure on final allowed step");
                break;
            }
            if settle {
                tokio::time::sleep(self.config.settle()).await;
            }
        }

        tracing::warn!(max_steps = ctrl.max_steps(), failures = ctrl.failures(), "max steps reached");
        let answer = self.answer_task(task).await;
        Ok(self.finish(
            task,
            TaskOutcome {
                status: TaskStatus::Incomplete,
                reason: format!("Max steps ({}) reached", ctrl.max_steps()),
                steps: ctrl.step(),
                history,
                answer,
            },
        ))
    }

    /// Runs a predefined playbook (logins, approvals and the like) on this
    /// session. Failed steps are reported, never raised.
    pub async fn run_playbook(&self, playbook: &Playbook) -> Vec<StepOutcome> {
        let steps = self.playbooks.run(playbook).await;
        self.log_playbook(&playbook.name, &steps, None);
        steps
    }

    /// Searches for `query`, opens the first result and scans its text for a
    /// phone number, falling back to the vision service.
    pub async fn lookup_phone_number(&self, query: &str) -> LookupOutcome {
        let playbook = build_lookup_playbook(query);
        let steps = self.playbooks.run(&playbook).await;
        let phone = self.extract_phone(query).await;
        let answer = match &phone {
            Some(p) => Some(format!("The phone number for {query} is {p}.")),
            None => {
                self.answer_task(&format!("What is the phone number for {query}?"))
                    .await
            }
        };
        self.log_playbook(&playbook.name, &steps, answer.as_deref());
        LookupOutcome {
            status: TaskStatus::Success,
            reason: format!("Lookup completed for {query}"),
            playbook: steps,
            phone,
            answer,
        }
    }

    /// Opens the top `result_count` results for `query` in turn, capturing each.
    pub async fn research_topic(&self, query: &str, result_count: usize) -> ResearchOutcome {
        let playbook = build_research_playbook(query, result_count);
        let steps = self.playbooks.run(&playbook).await;
        let captures = if self.screenshots.is_some() {
            saved_captures(&steps)
        } else {
            Vec::new()
        };
        let answer = self.answer_task(RESEARCH_QUESTION).await;
        self.log_playbook(&playbook.name, &steps, answer.as_deref());
        ResearchOutcome {
            status: TaskStatus::Success,
            reason: format!("Research run for {query}"),
            playbook: steps,
            captures,
            answer,
        }
    }

    /// Final question-answering pass over a full-page screenshot. Never fails
    /// the task.
    pub async fn answer_task(&self, question: &str) -> Option<String> {
        if !self.config.answer_task {
            return None;
        }
        let png = match self.driver.full_page_screenshot().await {
            Ok(png) => png,
            Err(e) => {
                tracing::warn!(error = %e, "answer screenshot failed");
                return None;
            }
        };
        self.persist("final_answer", &png);
        match self
            .vision
            .analyze(&prepare_for_vision(png), &answer_prompt(question))
            .await
        {
            Ok(reply) => {
                tracing::debug!(reply = %reply, "answer reply");
                parse_answer(&reply)
            }
            Err(e) => {
                tracing::warn!(error = %e, "answer extraction failed");
                None
            }
        }
    }

    async fn extract_phone(&self, query: &str) -> Option<String> {
        match self.driver.read_text(&Selector::document_root()).await {
            Ok(body) => extract_phone_number(&body, query),
            Err(e) => {
                tracing::warn!(error = %e, "failed to read body text");
                None
            }
        }
    }

    fn persist(&self, name: &str, png: &[u8]) -> Option<PathBuf> {
        let store = self.screenshots.as_ref()?;
        match store.save(name, png) {
            Ok(path) => Some(path),
            Err(e) => {
                tracing::warn!(name, error = %e, "screenshot not saved");
                None
            }
        }
    }

    fn log_step(&self, record: &StepRecord) {
        if let Some(history) = &self.history {
            if let Err(e) = history.append_step(record) {
                tracing::warn!(error = %e, "history write failed");
            }
        }
    }

    fn log_playbook(&self, name: &str, steps: &[StepOutcome], answer: Option<&str>) {
        if let Some(history) = &self.history {
            if let Err(e) = history.record_playbook(name, steps, answer) {
                tracing::warn!(error = %e, "history write failed");
            }
        }
    }

    fn finish(&self, task: &str, outcome: TaskOutcome) -> TaskOutcome {
        if let Some(history) = &self.history {
            if let Err(e) = history.append_outcome(task, &outcome) {
                tracing::warn!(error = %e, "history write failed");
            }
        }
        outcome
    }
}

fn saved_captures(steps: &[StepOutcome]) -> Vec<PathBuf> {
    steps
        .iter()
        .filter(|s| s.action == "screenshot" && s.status == StepStatus::Ok)
        .filter_map(|s| s.result.as_ref().map(PathBuf::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_engine::directive::ActionType;
    use crate::agent_engine::history::SessionEntry;
    use crate::errors::PilotError;
    use crate::perception::types::ElementType;
    use crate::planner::machine::ExecutionStatus;
    use crate::playbook::library::{result_link, SEARCH_BOX};
    use crate::playbook::types::{PlaybookAction, PlaybookStep};
    use crate::testing::{DriverCall, FakeDriver, ScriptedVision};

    fn config(max_steps: u32, answer_task: bool) -> AgentConfig {
        AgentConfig {
            max_steps,
            answer_task,
            ..AgentConfig::default()
        }
    }

    fn agent(
        vision: &Arc<ScriptedVision>,
        driver: &Arc<FakeDriver>,
        config: AgentConfig,
    ) -> VisionActionAgent {
        VisionActionAgent::new(
            vision.clone(),
            driver.clone(),
            config,
            PlannerConfig::default(),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn complete_on_first_step_ends_the_loop() {
        let vision = Arc::new(ScriptedVision::new(&[
            "ACTION: complete\nREASON: results already shown",
            "ANSWER: 42\nCONFIDENCE: high\nEVIDENCE: headline",
        ]));
        let driver = Arc::new(FakeDriver::new());

        let outcome = agent(&vision, &driver, config(20, true))
            .execute_task("what is the answer", None)
            .await
            .unwrap();

        assert_eq!(outcome.status, TaskStatus::Success);
        assert_eq!(outcome.steps, 1);
        assert_eq!(outcome.reason, "results already shown");
        assert_eq!(outcome.answer.as_deref(), Some("42"));
        assert_eq!(outcome.history.len(), 1);
        assert!(outcome.history[0].execution.is_none());
        assert_eq!(driver.full_page_captures(), 1);
        assert_eq!(
            driver.calls(),
            vec![DriverCall::Navigate("https://www.google.com".into())]
        );
        let prompts = vision.prompts();
        assert!(prompts[0].contains("TASK: what is the answer"));
        assert!(prompts[1].contains("QUESTION: what is the answer"));
    }

    #[tokio::test(start_paused = true)]
    async fn actions_run_through_the_planner_until_complete() {
        let vision = Arc::new(ScriptedVision::new(&[
            "ACTION: navigate\nTARGET: example.com\nVALUE: N/A",
            "ACTION: complete\nREASON: page open",
        ]));
        let driver = Arc::new(FakeDriver::new());

        let outcome = agent(&vision, &driver, config(20, false))
            .execute_task("open example", Some("https://start.test"))
            .await
            .unwrap();

        assert_eq!(outcome.status, TaskStatus::Success);
        assert_eq!(outcome.steps, 2);
        assert_eq!(outcome.answer, None);
        assert_eq!(driver.full_page_captures(), 0);
        let execution = outcome.history[0].execution.as_ref().unwrap();
        assert_eq!(execution.status, ExecutionStatus::Ok);
        assert_eq!(execution.action, ActionType::Navigate);
        assert_eq!(
            driver.calls(),
            vec![
                DriverCall::Navigate("https://start.test".into()),
                DriverCall::Navigate("https://example.com".into()),
            ]
        );
        assert_eq!(vision.prompts().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_is_incomplete() {
        let vision = Arc::new(ScriptedVision::new(&[
            "ACTION: scroll\nTARGET: down",
            "ACTION: scroll\nTARGET: down",
            "ANSWER: NOT_FOUND",
        ]));
        let driver = Arc::new(FakeDriver::new());

        let outcome = agent(&vision, &driver, config(2, true))
            .execute_task("keep scrolling", None)
            .await
            .unwrap();

        assert_eq!(outcome.status, TaskStatus::Incomplete);
        assert_eq!(outcome.reason, "Max steps (2) reached");
        assert_eq!(outcome.steps, 2);
        assert_eq!(outcome.history.len(), 2);
        assert_eq!(outcome.answer, None);
        assert_eq!(vision.prompts().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn answer_failure_is_swallowed() {
        let vision = Arc::new(ScriptedVision::new(&["ACTION: complete\nREASON: ok"]));
        vision.push_error("connection reset");
        let driver = Arc::new(FakeDriver::new());

        let outcome = agent(&vision, &driver, config(5, true))
            .execute_task("t", None)
            .await
            .unwrap();

        assert_eq!(outcome.status, TaskStatus::Success);
        assert_eq!(outcome.answer, None);
    }

    #[tokio::test(start_paused = true)]
    async fn planner_failure_is_recorded_and_loop_continues() {
        let vision = Arc::new(ScriptedVision::new(&[
            "ACTION: click\nTARGET: Submit button",
            "ACTION: complete\nREASON: gave up on submit",
        ]));
        let driver = Arc::new(FakeDriver::new());
        driver.never(Selector::has_text(ElementType::Button, "submit"));

        let outcome = agent(&vision, &driver, config(3, false))
            .execute_task("submit the form", None)
            .await
            .unwrap();

        assert_eq!(outcome.status, TaskStatus::Success);
        assert_eq!(outcome.steps, 2);
        let failed = &outcome.history[0];
        assert!(failed.error.as_deref().unwrap().contains("not reachable"));
        assert_eq!(
            failed.execution.as_ref().unwrap().status,
            ExecutionStatus::Failed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failure_on_final_allowed_step_exits_early() {
        let vision = Arc::new(ScriptedVision::new(&["ACTION: click\nTARGET: Submit button"]));
        let driver = Arc::new(FakeDriver::new());
        driver.never(Selector::has_text(ElementType::Button, "submit"));

        let outcome = agent(&vision, &driver, config(2, false))
            .execute_task("submit the form", None)
            .await
            .unwrap();

        assert_eq!(outcome.status, TaskStatus::Incomplete);
        assert_eq!(outcome.steps, 1);
        assert_eq!(outcome.history.len(), 1);
        assert_eq!(vision.prompts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn executor_fault_is_recorded() {
        let vision = Arc::new(ScriptedVision::new(&[
            "ACTION: click\nTARGET: Compose",
            "ACTION: complete\nREASON: done",
        ]));
        let driver = Arc::new(FakeDriver::new());

        let outcome = agent(&vision, &driver, config(5, false))
            .execute_task("write an email", None)
            .await
            .unwrap();

        assert_eq!(outcome.status, TaskStatus::Success);
        let error = outcome.history[0].error.as_deref().unwrap();
        assert!(error.contains("Could not find element: Compose"));
    }

    #[tokio::test(start_paused = true)]
    async fn executor_fault_on_final_allowed_step_exits_early() {
        let vision = Arc::new(ScriptedVision::new(&["ACTION: click\nTARGET: Compose"]));
        let driver = Arc::new(FakeDriver::new());

        let outcome = agent(&vision, &driver, config(2, false))
            .execute_task("write an email", None)
            .await
            .unwrap();

        assert_eq!(outcome.status, TaskStatus::Incomplete);
        assert_eq!(outcome.reason, "Max steps (2) reached");
        assert_eq!(outcome.steps, 1);
        assert_eq!(outcome.history.len(), 1);
        assert!(outcome.history[0]
            .error
            .as_deref()
            .unwrap()
            .contains("Could not find element: Compose"));
        assert_eq!(vision.prompts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn inline_completion_ends_the_task() {
        let vision = Arc::new(ScriptedVision::new(&[
            "Looking at the page. Next step: ACTION: complete\nREASON: order placed",
        ]));
        let driver = Arc::new(FakeDriver::new());

        let outcome = agent(&vision, &driver, config(5, false))
            .execute_task("place the order", None)
            .await
            .unwrap();

        assert_eq!(outcome.status, TaskStatus::Success);
        assert_eq!(outcome.steps, 1);
        assert_eq!(outcome.reason, "order placed");
    }

    #[tokio::test(start_paused = true)]
    async fn custom_playbook_runs_on_the_session() {
        let dir = tempfile::tempdir().unwrap();
        let vision = Arc::new(ScriptedVision::new(&[]));
        let driver = Arc::new(FakeDriver::new());
        driver.clickable(Selector::css("#login"));
        let playbook = Playbook {
            name: "intranet_login".into(),
            description: "Sign in to the intranet".into(),
            steps: vec![
                PlaybookStep::new(
                    "open",
                    PlaybookAction::Navigate {
                        url: "https://intranet.test".into(),
                    },
                )
                .confirm(Selector::css("#login")),
                PlaybookStep::new(
                    "approve",
                    PlaybookAction::Click {
                        selector: Selector::css("#approve"),
                    },
                ),
                PlaybookStep::new(
                    "login",
                    PlaybookAction::Click {
                        selector: Selector::css("#login"),
                    },
                ),
            ],
        };
        let history = SessionHistory::with_path(dir.path().join("session.jsonl"));
        let agent = agent(&vision, &driver, config(20, true)).with_history(history);

        let steps = agent.run_playbook(&playbook).await;

        let statuses: Vec<StepStatus> = steps.iter().map(|s| s.status).collect();
        assert_eq!(statuses, vec![StepStatus::Ok, StepStatus::Error, StepStatus::Ok]);
        assert_eq!(driver.calls()[0], DriverCall::Navigate("https://intranet.test".into()));
        assert!(vision.prompts().is_empty());

        let entries = agent.history().unwrap().read_entries().unwrap();
        assert!(matches!(
            &entries[..],
            [SessionEntry::Playbook(line)] if line.name == "intranet_login" && line.outcomes == steps
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn vision_transport_error_aborts_the_run() {
        let vision = Arc::new(ScriptedVision::new(&[]));
        vision.push_error("timed out");
        let driver = Arc::new(FakeDriver::new());

        let err = agent(&vision, &driver, config(5, true))
            .execute_task("t", None)
            .await
            .unwrap_err();
        assert!(matches!(err, PilotError::VisionProvider(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn screenshots_and_history_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let vision = Arc::new(ScriptedVision::new(&[
            "ACTION: wait\nVALUE: 1",
            "ACTION: complete\nREASON: done",
            "ANSWER: yes",
        ]));
        let driver = Arc::new(FakeDriver::new());
        let cfg = AgentConfig {
            screenshot_dir: Some(dir.path().join("shots")),
            ..config(5, true)
        };
        let history = SessionHistory::with_path(dir.path().join("session.jsonl"));

        let agent = agent(&vision, &driver, cfg).with_history(history);
        let outcome = agent.execute_task("t", None).await.unwrap();

        let shots = dir.path().join("shots");
        assert_eq!(outcome.history[0].screenshot, Some(shots.join("step_01.png")));
        assert_eq!(outcome.history[1].screenshot, Some(shots.join("step_02.png")));
        assert!(shots.join("final_answer.png").exists());

        let entries = agent.history().unwrap().read_entries().unwrap();
        assert_eq!(entries.len(), 3);
        assert!(matches!(&entries[2], SessionEntry::Outcome(o) if o.answer.as_deref() == Some("yes")));
        assert_eq!(agent.history().unwrap().read_steps().unwrap(), outcome.history);
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_extracts_phone_from_page_text() {
        let vision = Arc::new(ScriptedVision::new(&[]));
        let driver = Arc::new(FakeDriver::new());
        driver.clickable(Selector::css(SEARCH_BOX));
        driver.clickable(result_link(1));
        driver.set_body_text("Joe's Pizza | Call (555) 123-4567 for delivery");

        let outcome = agent(&vision, &driver, config(20, true))
            .lookup_phone_number("Joe's Pizza")
            .await;

        assert_eq!(outcome.phone.as_deref(), Some("(555) 123-4567"));
        assert_eq!(
            outcome.answer.as_deref(),
            Some("The phone number for Joe's Pizza is (555) 123-4567.")
        );
        assert_eq!(outcome.playbook.len(), 6);
        assert!(outcome.playbook.iter().all(|s| s.status == StepStatus::Ok));
        assert!(vision.prompts().is_empty());
        assert!(driver.calls().contains(&DriverCall::Type("Joe's Pizza".into())));
        assert!(driver.calls().contains(&DriverCall::PressKey("Enter".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_falls_back_to_vision_answer() {
        let vision = Arc::new(ScriptedVision::new(&["ANSWER: NOT_FOUND\nCONFIDENCE: low"]));
        let driver = Arc::new(FakeDriver::new());
        driver.set_body_text("No numbers here");

        let outcome = agent(&vision, &driver, config(20, true))
            .lookup_phone_number("Corner Cafe")
            .await;

        assert_eq!(outcome.phone, None);
        assert_eq!(outcome.answer, None);
        assert_eq!(outcome.reason, "Lookup completed for Corner Cafe");
        assert!(vision.prompts()[0].contains("What is the phone number for Corner Cafe?"));
        // Nothing was clickable, so the click steps were recorded as errors.
        assert!(outcome.playbook.iter().any(|s| s.status == StepStatus::Error));
    }

    #[tokio::test(start_paused = true)]
    async fn research_captures_each_result() {
        let dir = tempfile::tempdir().unwrap();
        let vision = Arc::new(ScriptedVision::new(&["ANSWER: Three runtimes compared"]));
        let driver = Arc::new(FakeDriver::new());
        driver.clickable(Selector::css(SEARCH_BOX));
        driver.clickable(result_link(1));
        driver.clickable(result_link(2));
        let cfg = AgentConfig {
            screenshot_dir: Some(dir.path().to_path_buf()),
            ..config(20, true)
        };

        let outcome = agent(&vision, &driver, cfg)
            .research_topic("rust async runtimes", 2)
            .await;

        assert_eq!(
            outcome.captures,
            vec![
                dir.path().join("research_result_1.png"),
                dir.path().join("research_result_2.png")
            ]
        );
        assert_eq!(outcome.answer.as_deref(), Some("Three runtimes compared"));
        assert_eq!(driver.count(&DriverCall::Back), 2);
        assert!(vision.prompts()[0].contains(RESEARCH_QUESTION));
    }
}
