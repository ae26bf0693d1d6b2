use async_trait::async_trait;

use crate::errors::PilotResult;

/// A vision-capable model that answers a prompt about one screenshot.
///
/// Providers are registered from config.toml; the agent only ever talks to
/// this trait.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// The provider's identifier (matches the config.toml key).
    fn name(&self) -> &str;

    /// Sends PNG `image_bytes` with `prompt` and returns the raw reply text.
    async fn analyze(&self, image_bytes: &[u8], prompt: &str) -> PilotResult<String>;
}
