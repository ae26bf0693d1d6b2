use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::PilotResult;
use crate::perception::types::Selector;
use crate::planner::plan::ElementState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollDirection {
    Up,
    Down,
}

/// Capability interface over a live UI session.
///
/// Timeouts are normal outcomes (`Ok(false)`); `Err` is reserved for contract
/// violations such as a session that is gone.
#[async_trait]
pub trait UiDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> PilotResult<()>;

    /// PNG bytes of the current viewport.
    async fn screenshot(&self) -> PilotResult<Vec<u8>>;

    /// PNG bytes of the whole scrollable page. Drivers that cannot capture
    /// beyond the viewport return the viewport.
    async fn full_page_screenshot(&self) -> PilotResult<Vec<u8>> {
        self.screenshot().await
    }

    /// Clicks the first match of `selector`. `Ok(false)` if nothing clickable
    /// appeared within `timeout`.
    async fn click(&self, selector: &Selector, timeout: Duration) -> PilotResult<bool>;

    /// Types into the focused element.
    async fn type_text(&self, text: &str) -> PilotResult<()>;

    async fn press_key(&self, key: &str) -> PilotResult<()>;

    async fn scroll(&self, direction: ScrollDirection) -> PilotResult<()>;

    /// Waits until `selector` reaches `state`; `Ok(false)` on timeout.
    async fn wait_for(
        &self,
        selector: &Selector,
        state: ElementState,
        timeout: Duration,
    ) -> PilotResult<bool>;

    /// Visible text of the first match (empty when there is none).
    async fn read_text(&self, selector: &Selector) -> PilotResult<String>;

    async fn reload(&self) -> PilotResult<()>;

    async fn go_back(&self) -> PilotResult<()>;
}
