use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::{PilotError, PilotResult};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub active_provider: String,
    #[serde(default)]
    pub providers: HashMap<String, ProviderEntry>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        let mut providers = HashMap::new();
        providers.insert("ollama".to_string(), ProviderEntry::default());
        Self {
            active_provider: "ollama".to_string(),
            providers,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEntry {
    pub display_name: String,
    pub api_base: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// "ollama" for the native generate API, anything else (or absent) for
    /// OpenAI-compatible chat completions.
    pub adapter: Option<String>,
    /// Vision inference is slow; requests are allowed several minutes.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Optional API key stored in config.toml (falls back to env var VISIONPILOT_<ID>_API_KEY).
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for ProviderEntry {
    fn default() -> Self {
        Self {
            display_name: "Ollama (local)".to_string(),
            api_base: "http://localhost:11434".to_string(),
            model: "qwen3-vl:4b".to_string(),
            temperature: default_temperature(),
            adapter: Some("ollama".to_string()),
            timeout_secs: default_timeout_secs(),
            api_key: None,
        }
    }
}

fn default_temperature() -> f64 {
    0.1
}

fn default_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub max_steps: u32,
    /// Run the final screenshot question-answering pass.
    pub answer_task: bool,
    pub settle_ms: u64,
    pub start_url: String,
    /// Step screenshots are only written to disk when this is set.
    pub screenshot_dir: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: 20,
            answer_task: true,
            settle_ms: 1000,
            start_url: "https://www.google.com".to_string(),
            screenshot_dir: None,
        }
    }
}

impl AgentConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    pub max_retries: u32,
    pub short_wait_ms: u64,
    pub long_wait_ms: u64,
    /// Upper bound on the re-check wait after a recovery strategy.
    pub recheck_cap_ms: u64,
    pub predict_from_task: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            short_wait_ms: 1000,
            long_wait_ms: 2500,
            recheck_cap_ms: 8000,
            predict_from_task: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub chrome_path: Option<PathBuf>,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: false,
            chrome_path: None,
            window_width: 1280,
            window_height: 900,
        }
    }
}

fn resolve_config_path() -> PilotResult<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Ok(candidate);
            }
        }
    }

    let cwd = std::env::current_dir()?;
    let candidate = cwd.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Ok(candidate);
    }

    Err(PilotError::Config(
        "config.toml not found next to executable or in working directory".into(),
    ))
}

pub fn parse_config(content: &str) -> PilotResult<AppConfig> {
    let mut config: AppConfig = toml::from_str(content)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

pub fn load_config() -> PilotResult<AppConfig> {
    let path = resolve_config_path()?;
    let content = std::fs::read_to_string(&path)?;
    let config = parse_config(&content)?;
    tracing::info!(path = %path.display(), provider = %config.llm.active_provider, "config loaded");
    Ok(config)
}

/// Like [`load_config`], but a missing or unreadable file yields the defaults.
pub fn load_or_default() -> AppConfig {
    match load_config() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(error = %e, "using default configuration");
            let mut cfg = AppConfig::default();
            apply_env_overrides(&mut cfg);
            cfg
        }
    }
}

fn apply_env_overrides(config: &mut AppConfig) {
    if let Ok(raw) = std::env::var("VISIONPILOT_MAX_STEPS") {
        match raw.trim().parse::<u32>() {
            Ok(n) if n > 0 => config.agent.max_steps = n,
            _ => tracing::warn!(value = %raw, "ignoring invalid VISIONPILOT_MAX_STEPS"),
        }
    }
}
