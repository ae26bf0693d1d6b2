use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::agent_engine::directive::{ActionDirective, ActionType};
use crate::errors::{PilotError, PilotResult};
use crate::executor::driver::{ScrollDirection, UiDriver};
use crate::perception::resolver::selector_candidates;
use crate::perception::types::Selector;

const CLICK_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_WAIT: Duration = Duration::from_secs(2);

/// Performs the concrete interaction for a directive.
///
/// An `Err` means the interaction itself is broken, not that the page was slow.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, directive: &ActionDirective) -> PilotResult<()>;
}

/// Executes directives against a [`UiDriver`].
pub struct DirectiveDispatcher {
    driver: Arc<dyn UiDriver>,
    click_timeout: Duration,
}

impl DirectiveDispatcher {
    pub fn new(driver: Arc<dyn UiDriver>) -> Self {
        Self {
            driver,
            click_timeout: CLICK_TIMEOUT,
        }
    }

    /// Walks the resolver's candidates in order, then falls back to a
    /// case-insensitive text match over the whole page.
    pub async fn click_by_description(&self, description: &str) -> PilotResult<()> {
        for selector in selector_candidates(description) {
            match self.driver.click(&selector, self.click_timeout).await {
                Ok(true) => {
                    tracing::debug!(%selector, "clicked candidate");
                    return Ok(());
                }
                Ok(false) => tracing::debug!(%selector, "candidate not clickable"),
                Err(e) => tracing::debug!(%selector, error = %e, "candidate failed"),
            }
        }

        let fallback = Selector::text(description);
        match self.driver.click(&fallback, self.click_timeout).await {
            Ok(true) => {
                tracing::debug!(description, "clicked by page text");
                Ok(())
            }
            Ok(false) => {
                tracing::warn!(description, "could not find element");
                Err(PilotError::Executor(format!("Could not find element: {description}")))
            }
            Err(e) => {
                tracing::warn!(description, error = %e, "could not find element");
                Err(PilotError::Executor(format!(
                    "Could not find element: {description} ({e})"
                )))
            }
        }
    }
}

pub fn normalize_url(target: &str) -> String {
    let target = target.trim();
    if target.starts_with("http://") || target.starts_with("https://") {
        target.to_string()
    } else {
        format!("https://{target}")
    }
}

pub fn scroll_direction(target: &str) -> ScrollDirection {
    let lower = target.to_lowercase();
    if lower.contains("up") && !lower.contains("down") {
        ScrollDirection::Up
    } else {
        ScrollDirection::Down
    }
}

/// Wait duration from a directive value: whole seconds, else the default.
pub fn wait_duration(value: Option<&str>) -> Duration {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_WAIT)
}

#[async_trait]
impl ActionExecutor for DirectiveDispatcher {
    async fn execute(&self, directive: &ActionDirective) -> PilotResult<()> {
        tracing::info!(
            action = %directive.action_type,
            target = %directive.target,
            "executing directive"
        );
        match directive.action_type {
            ActionType::Click => self.click_by_description(&directive.target).await,
            ActionType::Type => match directive.value.as_deref() {
                Some(text) => self.driver.type_text(text).await,
                None => {
                    tracing::warn!(target = %directive.target, "type directive has no value");
                    Ok(())
                }
            },
            ActionType::Scroll => self.driver.scroll(scroll_direction(&directive.target)).await,
            ActionType::Navigate => self.driver.navigate(&normalize_url(&directive.target)).await,
            ActionType::Wait => {
                tokio::time::sleep(wait_duration(directive.value.as_deref())).await;
                Ok(())
            }
            ActionType::Complete => Ok(()),
        }
    }
}
