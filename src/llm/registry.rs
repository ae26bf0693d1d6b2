use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, ProviderEntry};
use crate::errors::{PilotError, PilotResult};
use crate::llm::provider::VisionProvider;
use crate::llm::providers::ollama::OllamaProvider;
use crate::llm::providers::openai_compatible::OpenAiCompatibleProvider;

/// Registry of all available vision providers, keyed by their config.toml identifier.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn VisionProvider>>,
    active: String,
}

impl ProviderRegistry {
    pub fn new(active: String) -> Self {
        Self {
            providers: HashMap::new(),
            active,
        }
    }

    pub fn register(&mut self, provider: Arc<dyn VisionProvider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    pub fn get_active(&self) -> PilotResult<Arc<dyn VisionProvider>> {
        self.providers.get(&self.active).cloned().ok_or_else(|| {
            PilotError::Config(format!(
                "Active provider '{}' not found in registry",
                self.active
            ))
        })
    }

    pub fn set_active(&mut self, name: String) -> PilotResult<()> {
        if self.providers.contains_key(&name) {
            self.active = name;
            Ok(())
        } else {
            Err(PilotError::Config(format!("Provider '{name}' not registered")))
        }
    }

    pub fn list_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Build a registry from the loaded app config.
    /// API keys are read from environment variables named `VISIONPILOT_<ID>_API_KEY`.
    pub fn from_config(config: &AppConfig) -> PilotResult<Self> {
        let mut registry = Self::new(config.llm.active_provider.clone());
        for (id, entry) in &config.llm.providers {
            registry.register(build_provider(id, entry)?);
        }
        tracing::info!(
            active = %registry.active,
            providers = ?registry.list_names(),
            "vision provider registry ready"
        );
        Ok(registry)
    }
}

pub fn api_key_var(id: &str) -> String {
    format!("VISIONPILOT_{}_API_KEY", id.to_uppercase().replace('-', "_"))
}

fn build_provider(id: &str, entry: &ProviderEntry) -> PilotResult<Arc<dyn VisionProvider>> {
    let timeout = Duration::from_secs(entry.timeout_secs);
    match entry.adapter.as_deref() {
        Some("ollama") => Ok(Arc::new(OllamaProvider::new(
            id.to_string(),
            &entry.api_base,
            entry.model.clone(),
            entry.temperature,
            timeout,
        )?)),
        _ => {
            let api_key = std::env::var(api_key_var(id))
                .unwrap_or_else(|_| entry.api_key.clone().unwrap_or_default());
            Ok(Arc::new(OpenAiCompatibleProvider::new(
                id.to_string(),
                entry.api_base.clone(),
                api_key,
                entry.model.clone(),
                entry.temperature,
                timeout,
            )?))
        }
    }
}
