pub mod gemini;
pub mod types;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use gemini::GeminiProvider;
pub use types::*;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse>;
}

// ============================================================
// Provider Configuration
// ============================================================

/// Provider type identifier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    #[default]
    Gemini,
    /// Offline echo provider, useful for demos and tests
    Stub,
}

/// Configuration for the generative-model backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_id")]
    pub id: String,
    #[serde(rename = "type", default)]
    pub provider_type: ProviderType,
    /// API key, usually `${GOOGLE_API_KEY}` in config files
    #[serde(default)]
    pub api_key: Option<String>,
    /// Custom base URL (optional, uses the provider default)
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_provider_id() -> String {
    "gemini".to_string()
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            id: default_provider_id(),
            provider_type: ProviderType::Gemini,
            api_key: Some("${GOOGLE_API_KEY}".to_string()),
            base_url: None,
        }
    }
}

impl ProviderConfig {
    pub fn new(id: impl Into<String>, provider_type: ProviderType) -> Self {
        Self {
            id: id.into(),
            provider_type,
            api_key: None,
            base_url: None,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }
}

/// Create a provider from configuration.
pub fn create_provider(config: &ProviderConfig) -> Result<Arc<dyn LlmProvider>> {
    let provider: Arc<dyn LlmProvider> = match config.provider_type {
        ProviderType::Gemini => {
            let key = config
                .api_key
                .as_deref()
                .filter(|k| !k.trim().is_empty())
                .ok_or_else(|| anyhow!("gemini requires api_key"))?;
            let base_url = config.base_url.as_deref().unwrap_or(gemini::GEMINI_API_BASE);
            Arc::new(GeminiProvider::with_base_url(key, base_url))
        }
        ProviderType::Stub => Arc::new(StubProvider),
    };
    tracing::info!(
        "Created provider: {} ({:?})",
        config.id,
        config.provider_type
    );
    Ok(provider)
}

pub struct StubProvider;

#[async_trait]
impl LlmProvider for StubProvider {
    async fn chat(&self, request: LlmRequest) -> Result<LlmResponse> {
        let user_text = request.last_user_text();
        Ok(LlmResponse::text(format!(
            "[stub:{}] {} [finish]",
            request.model, user_text
        )))
    }
}
