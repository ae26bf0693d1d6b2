use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;

use crate::errors::{PilotError, PilotResult};
use crate::llm::provider::VisionProvider;
use crate::llm::types::{ChatMessage, ChatRequest, ChatResponse};

/// Any chat-completions endpoint that accepts inline image parts.
pub struct OpenAiCompatibleProvider {
    id: String,
    api_base: String,
    api_key: String,
    model: String,
    temperature: f64,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        id: String,
        api_base: String,
        api_key: String,
        model: String,
        temperature: f64,
        timeout: Duration,
    ) -> PilotResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            id,
            api_base,
            api_key,
            model,
            temperature,
            client,
        })
    }
}

/// Copy of a request body with image payloads replaced, for logging.
pub fn sanitize_for_log(body: &serde_json::Value) -> String {
    let mut log_body = body.clone();
    if let Some(msgs) = log_body.get_mut("messages").and_then(|m| m.as_array_mut()) {
        for msg in msgs {
            let Some(parts) = msg.get_mut("content").and_then(|c| c.as_array_mut()) else {
                continue;
            };
            for part in parts {
                if part.get("type").and_then(|t| t.as_str()) != Some("image_url") {
                    continue;
                }
                if let Some(url) = part.get_mut("image_url").and_then(|i| i.get_mut("url")) {
                    *url = serde_json::Value::String("<omitted_base64_image>".to_string());
                }
            }
        }
    }
    serde_json::to_string(&log_body).unwrap_or_default()
}

#[async_trait]
impl VisionProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn analyze(&self, image_bytes: &[u8], prompt: &str) -> PilotResult<String> {
        let png_base64 = base64::engine::general_purpose::STANDARD.encode(image_bytes);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage::user_with_image(prompt, &png_base64)],
            temperature: self.temperature,
            stream: false,
        };
        let body = serde_json::to_value(&request)?;

        tracing::debug!(provider = %self.id, model = %self.model, "sending vision request");
        tracing::debug!(body = %sanitize_for_log(&body), "request body (sanitized, base64 omitted)");

        let mut builder = self.client.post(&self.api_base).json(&body);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }
        let response = builder.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(PilotError::VisionProvider(format!("{status}: {err_body}")));
        }

        let data: ChatResponse = response.json().await?;
        data.into_text()
            .ok_or_else(|| PilotError::VisionProvider("response had no message content".into()))
    }
}
