//! Scripted collaborators for unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::agent_engine::directive::ActionDirective;
use crate::errors::{PilotError, PilotResult};
use crate::executor::dispatcher::ActionExecutor;
use crate::executor::driver::{ScrollDirection, UiDriver};
use crate::llm::provider::VisionProvider;
use crate::perception::types::Selector;
use crate::planner::plan::ElementState;

pub const FAKE_PNG: &[u8] = b"fake-png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    Navigate(String),
    Click(Selector),
    Type(String),
    PressKey(String),
    Scroll(ScrollDirection),
    Reload,
    Back,
}

/// In-memory [`UiDriver`]. Every selector is present unless scripted otherwise.
#[derive(Default)]
pub struct FakeDriver {
    calls: Mutex<Vec<DriverCall>>,
    clickable: Mutex<HashSet<Selector>>,
    wait_script: Mutex<HashMap<Selector, VecDeque<bool>>>,
    missing: Mutex<HashSet<Selector>>,
    body_text: Mutex<String>,
    full_page_captures: AtomicU32,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clickable(&self, selector: Selector) {
        self.clickable.lock().unwrap().insert(selector);
    }

    /// Successive `wait_for` results for `selector`; afterwards it is present.
    pub fn script_wait(&self, selector: Selector, results: &[bool]) {
        self.wait_script
            .lock()
            .unwrap()
            .insert(selector, results.iter().copied().collect());
    }

    /// `selector` never appears.
    pub fn never(&self, selector: Selector) {
        self.missing.lock().unwrap().insert(selector);
    }

    pub fn set_body_text(&self, text: &str) {
        *self.body_text.lock().unwrap() = text.to_string();
    }

    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &DriverCall) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    pub fn full_page_captures(&self) -> u32 {
        self.full_page_captures.load(Ordering::SeqCst)
    }

    fn record(&self, call: DriverCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl UiDriver for FakeDriver {
    async fn navigate(&self, url: &str) -> PilotResult<()> {
        self.record(DriverCall::Navigate(url.to_string()));
        Ok(())
    }

    async fn screenshot(&self) -> PilotResult<Vec<u8>> {
        Ok(FAKE_PNG.to_vec())
    }

    async fn full_page_screenshot(&self) -> PilotResult<Vec<u8>> {
        self.full_page_captures.fetch_add(1, Ordering::SeqCst);
        Ok(FAKE_PNG.to_vec())
    }

    async fn click(&self, selector: &Selector, _timeout: Duration) -> PilotResult<bool> {
        self.record(DriverCall::Click(selector.clone()));
        Ok(self.clickable.lock().unwrap().contains(selector))
    }

    async fn type_text(&self, text: &str) -> PilotResult<()> {
        self.record(DriverCall::Type(text.to_string()));
        Ok(())
    }

    async fn press_key(&self, key: &str) -> PilotResult<()> {
        self.record(DriverCall::PressKey(key.to_string()));
        Ok(())
    }

    async fn scroll(&self, direction: ScrollDirection) -> PilotResult<()> {
        self.record(DriverCall::Scroll(direction));
        Ok(())
    }

    async fn wait_for(
        &self,
        selector: &Selector,
        _state: ElementState,
        _timeout: Duration,
    ) -> PilotResult<bool> {
        if self.missing.lock().unwrap().contains(selector) {
            return Ok(false);
        }
        let scripted = self
            .wait_script
            .lock()
            .unwrap()
            .get_mut(selector)
            .and_then(|queue| queue.pop_front());
        Ok(scripted.unwrap_or(true))
    }

    async fn read_text(&self, _selector: &Selector) -> PilotResult<String> {
        Ok(self.body_text.lock().unwrap().clone())
    }

    async fn reload(&self) -> PilotResult<()> {
        self.record(DriverCall::Reload);
        Ok(())
    }

    async fn go_back(&self) -> PilotResult<()> {
        self.record(DriverCall::Back);
        Ok(())
    }
}

/// Executor that counts invocations and optionally fails.
#[derive(Default)]
pub struct CountingExecutor {
    calls: AtomicU32,
    fail: bool,
}

impl CountingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail: true,
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ActionExecutor for CountingExecutor {
    async fn execute(&self, _directive: &ActionDirective) -> PilotResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(PilotError::Executor("boom".into()))
        } else {
            Ok(())
        }
    }
}

/// Vision provider that replays queued replies, then errors.
#[derive(Default)]
pub struct ScriptedVision {
    replies: Mutex<VecDeque<PilotResult<String>>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedVision {
    pub fn new(replies: &[&str]) -> Self {
        let vision = Self::default();
        for r in replies {
            vision.push_reply(r);
        }
        vision
    }

    pub fn push_reply(&self, reply: &str) {
        self.replies.lock().unwrap().push_back(Ok(reply.to_string()));
    }

    pub fn push_error(&self, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(PilotError::VisionProvider(message.to_string())));
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl VisionProvider for ScriptedVision {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn analyze(&self, _image_bytes: &[u8], prompt: &str) -> PilotResult<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(PilotError::VisionProvider("script exhausted".into())))
    }
}
