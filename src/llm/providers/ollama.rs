use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;

use crate::errors::{PilotError, PilotResult};
use crate::llm::provider::VisionProvider;
use crate::llm::types::{GenerateOptions, GenerateRequest, GenerateResponse};

/// Ollama's native `/api/generate` endpoint with base64 images.
pub struct OllamaProvider {
    id: String,
    endpoint: String,
    model: String,
    temperature: f64,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(
        id: String,
        api_base: &str,
        model: String,
        temperature: f64,
        timeout: Duration,
    ) -> PilotResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            id,
            endpoint: generate_endpoint(api_base),
            model,
            temperature,
            client,
        })
    }
}

pub fn generate_endpoint(api_base: &str) -> String {
    format!("{}/api/generate", api_base.trim_end_matches('/'))
}

#[async_trait]
impl VisionProvider for OllamaProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn analyze(&self, image_bytes: &[u8], prompt: &str) -> PilotResult<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            images: vec![base64::engine::general_purpose::STANDARD.encode(image_bytes)],
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        tracing::debug!(
            provider = %self.id,
            model = %self.model,
            image_bytes = image_bytes.len(),
            "sending vision request"
        );

        let response = self.client.post(&self.endpoint).json(&request).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(PilotError::VisionProvider(format!("{status}: {body}")));
        }

        let data: GenerateResponse = response.json().await?;
        tracing::debug!(provider = %self.id, chars = data.response.len(), "vision reply received");
        Ok(data.response)
    }
}
