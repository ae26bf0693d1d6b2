use std::sync::Arc;
use std::time::Duration;

use crate::errors::{PilotError, PilotResult};
use crate::executor::driver::UiDriver;
use crate::perception::screenshot::ScreenshotStore;
use crate::planner::plan::ElementState;
use crate::playbook::types::{Playbook, PlaybookAction, PlaybookStep, StepOutcome, StepStatus};

const STEP_CLICK_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs playbooks step by step over a [`UiDriver`]. A failed step is recorded
/// and the run continues.
pub struct PlaybookRunner {
    driver: Arc<dyn UiDriver>,
    screenshots: Option<ScreenshotStore>,
}

impl PlaybookRunner {
    pub fn new(driver: Arc<dyn UiDriver>, screenshots: Option<ScreenshotStore>) -> Self {
        Self {
            driver,
            screenshots,
        }
    }

    pub async fn run(&self, playbook: &Playbook) -> Vec<StepOutcome> {
        tracing::info!(playbook = %playbook.name, steps = playbook.steps.len(), "running playbook");
        let mut outcomes = Vec::with_capacity(playbook.steps.len());
        for step in &playbook.steps {
            let outcome = match self.run_step(step).await {
                Ok(result) => StepOutcome {
                    step: step.name.clone(),
                    action: step.action.kind().to_string(),
                    status: StepStatus::Ok,
                    result,
                    error: None,
                },
                Err(e) => {
                    tracing::warn!(step = %step.name, error = %e, "playbook step failed");
                    StepOutcome {
                        step: step.name.clone(),
                        action: step.action.kind().to_string(),
                        status: StepStatus::Error,
                        result: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    async fn run_step(&self, step: &PlaybookStep) -> PilotResult<Option<String>> {
        let result = self.perform(&step.action).await?;
        if let Some(selector) = &step.wait_for {
            let timeout = Duration::from_millis(step.confirm_timeout_ms());
            if !self.driver.wait_for(selector, ElementState::Visible, timeout).await? {
                return Err(PilotError::Playbook(format!(
                    "'{selector}' not visible after {}ms",
                    timeout.as_millis()
                )));
            }
        }
        Ok(result)
    }

    async fn perform(&self, action: &PlaybookAction) -> PilotResult<Option<String>> {
        match action {
            PlaybookAction::Navigate { url } => self.driver.navigate(url).await?,
            PlaybookAction::Click { selector } => self.click(selector).await?,
            PlaybookAction::Fill { selector, text } => {
                self.click(selector).await?;
                self.driver.type_text(text).await?;
            }
            PlaybookAction::PressKey { key } => self.driver.press_key(key).await?,
            PlaybookAction::WaitFor {
                selector,
                timeout_ms,
            } => {
                let timeout = Duration::from_millis(*timeout_ms);
                if !self.driver.wait_for(selector, ElementState::Visible, timeout).await? {
                    return Err(PilotError::Playbook(format!(
                        "timed out waiting for '{selector}'"
                    )));
                }
            }
            PlaybookAction::Screenshot { name } => {
                let png = self.driver.screenshot().await?;
                return match &self.screenshots {
                    Some(store) => {
                        let path = store.save(name, &png)?;
                        Ok(Some(path.display().to_string()))
                    }
                    None => Ok(Some(format!("captured {} bytes", png.len()))),
                };
            }
            PlaybookAction::Back => self.driver.go_back().await?,
        }
        Ok(None)
    }

    async fn click(&self, selector: &crate::perception::types::Selector) -> PilotResult<()> {
        if self.driver.click(selector, STEP_CLICK_TIMEOUT).await? {
            Ok(())
        } else {
            Err(PilotError::Playbook(format!("nothing clickable for '{selector}'")))
        }
    }
}
