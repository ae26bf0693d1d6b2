//! [`UiDriver`] over a Chrome tab driven through the DevTools protocol.
//!
//! `headless_chrome` is synchronous, so every tab call runs on the blocking
//! pool. Selector intents are rendered into CSS or XPath here and nowhere else.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};

use crate::config::BrowserConfig;
use crate::errors::{PilotError, PilotResult};
use crate::executor::driver::{ScrollDirection, UiDriver};
use crate::perception::types::{ElementType, Selector};
use crate::planner::plan::ElementState;

const POLL_INTERVAL: Duration = Duration::from_millis(200);
/// Vision calls can take minutes; the browser must outlive them.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(900);
const SEARCH_INPUT_CSS: &str = "input[type='search'], textarea[name='q']";
const PAGE_WIDTH_JS: &str =
    "Math.max(document.documentElement.scrollWidth, document.body ? document.body.scrollWidth : 0)";
const PAGE_HEIGHT_JS: &str =
    "Math.max(document.documentElement.scrollHeight, document.body ? document.body.scrollHeight : 0)";
const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";

/// Concrete query syntax for one selector intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Css(String),
    XPath(String),
}

/// XPath string literal for `s`, falling back to `concat()` when it holds both quote kinds.
pub fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        return format!("'{s}'");
    }
    if !s.contains('"') {
        return format!("\"{s}\"");
    }
    let parts: Vec<String> = s.split('\'').map(|p| format!("'{p}'")).collect();
    format!("concat({})", parts.join(", \"'\", "))
}

fn lowered(expr: &str) -> String {
    format!("translate({expr}, '{UPPER}', '{LOWER}')")
}

fn css_string(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

pub fn render(selector: &Selector) -> Query {
    match selector {
        Selector::Css { css } => Query::Css(css.clone()),
        Selector::XPath { xpath } => Query::XPath(xpath.clone()),
        Selector::HasText { element, text } => {
            let needle = xpath_literal(&text.to_lowercase());
            let subject = if element.labelled_by_value() {
                "@value"
            } else {
                "normalize-space(.)"
            };
            Query::XPath(format!(
                "//{}[contains({}, {needle})]",
                element.xpath_step(),
                lowered(subject)
            ))
        }
        Selector::Text { text } => Query::XPath(format!(
            "//*[text()[contains({}, {})]]",
            lowered("."),
            xpath_literal(&text.to_lowercase())
        )),
        Selector::Attribute {
            element,
            attr,
            needle,
        } => {
            let tag = match element {
                ElementType::Any => "",
                other => other.css_tag(),
            };
            Query::Css(format!("{tag}[{attr}*='{}' i]", css_string(needle)))
        }
        Selector::SearchInput => Query::Css(SEARCH_INPUT_CSS.to_string()),
    }
}

/// JS expression evaluating to the first match or `null`.
fn locate_js(query: &Query) -> String {
    // serde_json gives a valid JS string literal.
    match query {
        Query::Css(css) => format!(
            "document.querySelector({})",
            serde_json::Value::String(css.clone())
        ),
        Query::XPath(xpath) => format!(
            "document.evaluate({}, document, null, XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue",
            serde_json::Value::String(xpath.clone())
        ),
    }
}

pub fn state_probe_js(query: &Query, state: ElementState) -> String {
    let check = match state {
        ElementState::Attached => "el !== null",
        ElementState::Detached => "el === null",
        ElementState::Visible => "visible(el)",
        ElementState::Hidden => "!visible(el)",
    };
    format!(
        "(() => {{ const el = {}; \
         const visible = (e) => !!e && getComputedStyle(e).visibility !== 'hidden' \
         && !!(e.offsetWidth || e.offsetHeight || e.getClientRects().length); \
         return {check}; }})()",
        locate_js(query)
    )
}

fn read_text_js(query: &Query) -> String {
    format!("(() => {{ const el = {}; return el ? el.innerText : ''; }})()", locate_js(query))
}

fn driver_err(e: impl std::fmt::Display) -> PilotError {
    PilotError::Driver(e.to_string())
}

pub struct ChromeDriver {
    _browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeDriver {
    pub async fn launch(config: BrowserConfig) -> PilotResult<Self> {
        tokio::task::spawn_blocking(move || Self::launch_blocking(&config))
            .await
            .map_err(|e| PilotError::Driver(format!("browser launch task failed: {e}")))?
    }

    fn launch_blocking(config: &BrowserConfig) -> PilotResult<Self> {
        let options = LaunchOptions {
            headless: config.headless,
            path: config.chrome_path.clone(),
            window_size: Some((config.window_width, config.window_height)),
            idle_browser_timeout: IDLE_BROWSER_TIMEOUT,
            ..Default::default()
        };
        tracing::info!(headless = config.headless, "launching chrome");
        let browser = Browser::new(options).map_err(driver_err)?;
        let tab = browser.new_tab().map_err(driver_err)?;
        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    async fn with_tab<T, F>(&self, f: F) -> PilotResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> PilotResult<T> + Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || f(&tab))
            .await
            .map_err(|e| PilotError::Driver(format!("driver task failed: {e}")))?
    }

    async fn evaluate(&self, js: String) -> PilotResult<serde_json::Value> {
        self.with_tab(move |tab| {
            let result = tab.evaluate(&js, false).map_err(driver_err)?;
            Ok(result.value.unwrap_or(serde_json::Value::Null))
        })
        .await
    }

    async fn probe(&self, query: &Query, state: ElementState) -> PilotResult<bool> {
        let value = self.evaluate(state_probe_js(query, state)).await?;
        Ok(value.as_bool().unwrap_or(false))
    }
}

#[async_trait]
impl UiDriver for ChromeDriver {
    async fn navigate(&self, url: &str) -> PilotResult<()> {
        tracing::debug!(url, "navigate");
        let url = url.to_string();
        self.with_tab(move |tab| {
            tab.navigate_to(&url).map_err(driver_err)?;
            tab.wait_until_navigated().map_err(driver_err)?;
            Ok(())
        })
        .await
    }

    async fn screenshot(&self) -> PilotResult<Vec<u8>> {
        self.with_tab(|tab| {
            tab.capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
                .map_err(driver_err)
        })
        .await
    }

    async fn full_page_screenshot(&self) -> PilotResult<Vec<u8>> {
        let width = self.evaluate(PAGE_WIDTH_JS.to_string()).await?.as_f64().unwrap_or(0.0);
        let height = self.evaluate(PAGE_HEIGHT_JS.to_string()).await?.as_f64().unwrap_or(0.0);
        if width <= 0.0 || height <= 0.0 {
            return self.screenshot().await;
        }
        tracing::debug!(width, height, "full page capture");
        self.with_tab(move |tab| {
            let data = tab
                .call_method(Page::CaptureScreenshot {
                    format: Some(CaptureScreenshotFormatOption::Png),
                    quality: None,
                    clip: Some(Page::Viewport {
                        x: 0.0,
                        y: 0.0,
                        width,
                        height,
                        scale: 1.0,
                    }),
                    from_surface: Some(true),
                    capture_beyond_viewport: Some(true),
                    optimize_for_speed: None,
                })
                .map_err(driver_err)?
                .data;
            base64::engine::general_purpose::STANDARD
                .decode(data)
                .map_err(driver_err)
        })
        .await
    }

    async fn click(&self, selector: &Selector, timeout: Duration) -> PilotResult<bool> {
        if !self.wait_for(selector, ElementState::Visible, timeout).await? {
            return Ok(false);
        }
        let query = render(selector);
        let clicked = self
            .with_tab(move |tab| {
                let element = match &query {
                    Query::Css(css) => tab.find_element(css),
                    Query::XPath(xpath) => tab.find_element_by_xpath(xpath),
                };
                match element {
                    Ok(el) => Ok(el.click().is_ok()),
                    Err(_) => Ok(false),
                }
            })
            .await?;
        tracing::debug!(%selector, clicked, "click");
        Ok(clicked)
    }

    async fn type_text(&self, text: &str) -> PilotResult<()> {
        let text = text.to_string();
        self.with_tab(move |tab| tab.type_str(&text).map(|_| ()).map_err(driver_err))
            .await
    }

    async fn press_key(&self, key: &str) -> PilotResult<()> {
        let key = key.to_string();
        self.with_tab(move |tab| tab.press_key(&key).map(|_| ()).map_err(driver_err))
            .await
    }

    async fn scroll(&self, direction: ScrollDirection) -> PilotResult<()> {
        let key = match direction {
            ScrollDirection::Down => "PageDown",
            ScrollDirection::Up => "PageUp",
        };
        self.press_key(key).await
    }

    async fn wait_for(
        &self,
        selector: &Selector,
        state: ElementState,
        timeout: Duration,
    ) -> PilotResult<bool> {
        let query = render(selector);
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Probes fail transiently while a navigation swaps the document.
            let last_err = match self.probe(&query, state).await {
                Ok(true) => return Ok(true),
                Ok(false) => None,
                Err(e) => {
                    tracing::debug!(%selector, error = %e, "probe failed");
                    Some(e)
                }
            };
            if tokio::time::Instant::now() >= deadline {
                match last_err {
                    Some(e) => tracing::warn!(%selector, error = %e, "wait timed out on probe error"),
                    None => tracing::debug!(%selector, state = state.as_str(), "wait timed out"),
                }
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn read_text(&self, selector: &Selector) -> PilotResult<String> {
        let value = self.evaluate(read_text_js(&render(selector))).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn reload(&self) -> PilotResult<()> {
        self.with_tab(|tab| {
            tab.reload(false, None).map_err(driver_err)?;
            tab.wait_until_navigated().map_err(driver_err)?;
            Ok(())
        })
        .await
    }

    async fn go_back(&self) -> PilotResult<()> {
        self.evaluate("window.history.back()".to_string()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_handles_quotes() {
        assert_eq!(xpath_literal("sign in"), "'sign in'");
        assert_eq!(xpath_literal("joe's"), "\"joe's\"");
        assert_eq!(
            xpath_literal("say \"hi\" it's"),
            "concat('say \"hi\" it', \"'\", 's')"
        );
    }

    #[test]
    fn has_text_renders_case_insensitive_xpath() {
        let q = render(&Selector::has_text(ElementType::Button, "Send"));
        assert_eq!(
            q,
            Query::XPath(format!(
                "//button[contains(translate(normalize-space(.), '{UPPER}', '{LOWER}'), 'send')]"
            ))
        );
    }

    #[test]
    fn input_buttons_match_on_value() {
        let Query::XPath(xpath) = render(&Selector::has_text(ElementType::Submit, "go")) else {
            panic!("expected xpath");
        };
        assert!(xpath.starts_with("//input[@type='submit'][contains(translate(@value,"));
    }

    #[test]
    fn attribute_and_search_render_as_css() {
        assert_eq!(
            render(&Selector::attribute(ElementType::Input, "placeholder", "e-mail")),
            Query::Css("input[placeholder*='e-mail' i]".into())
        );
        assert_eq!(
            render(&Selector::attribute(ElementType::Any, "aria-label", "o'neil")),
            Query::Css("[aria-label*='o\\'neil' i]".into())
        );
        assert_eq!(render(&Selector::SearchInput), Query::Css(SEARCH_INPUT_CSS.into()));
        assert_eq!(
            render(&Selector::css("#search")),
            Query::Css("#search".into())
        );
    }

    #[test]
    fn text_matches_own_text_nodes() {
        let Query::XPath(xpath) = render(&Selector::text("Accept All")) else {
            panic!("expected xpath");
        };
        assert!(xpath.starts_with("//*[text()[contains(translate(.,"));
        assert!(xpath.ends_with("'accept all')]]"));
    }

    #[test]
    fn probe_script_embeds_escaped_selector() {
        let js = state_probe_js(&Query::Css("a[title=\"x\"]".into()), ElementState::Hidden);
        assert!(js.contains(r#"document.querySelector("a[title=\"x\"]")"#));
        assert!(js.contains("return !visible(el);"));

        let js = state_probe_js(&Query::XPath("//a".into()), ElementState::Detached);
        assert!(js.contains("FIRST_ORDERED_NODE_TYPE"));
        assert!(js.contains("return el === null;"));
    }
}
