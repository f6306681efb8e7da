//! The fetch seam polled by the engine.

use std::sync::Arc;

use async_trait::async_trait;
use manabar_core::ProviderKind;
use tracing::debug;

use crate::anthropic::AnthropicUsageClient;
use crate::error::FetchError;
use crate::http::HttpClient;
use crate::keychain::CredentialStore;
use crate::openai::OpenAiUsageClient;
use crate::payload::RawPayload;

// ============================================================================
// Usage Source Trait
// ============================================================================

/// Anything that can produce a raw usage payload for a provider.
///
/// Implementations must be safe to call concurrently for different
/// providers.
#[async_trait]
pub trait UsageSource: Send + Sync {
    /// Fetches the current raw usage of one provider.
    async fn fetch(&self, provider: ProviderKind) -> Result<RawPayload, FetchError>;
}

// ============================================================================
// HTTP Usage Source
// ============================================================================

/// Production source that talks to the provider APIs.
pub struct HttpUsageSource {
    anthropic: AnthropicUsageClient,
    openai: OpenAiUsageClient,
    credentials: Arc<dyn CredentialStore>,
}

impl HttpUsageSource {
    /// Creates a source with default clients.
    pub fn new(credentials: Arc<dyn CredentialStore>) -> Self {
        let http = HttpClient::new();
        Self {
            anthropic: AnthropicUsageClient::new(http.clone()),
            openai: OpenAiUsageClient::new(http),
            credentials,
        }
    }

    /// Replaces the Claude client.
    #[must_use]
    pub fn with_anthropic(mut self, client: AnthropicUsageClient) -> Self {
        self.anthropic = client;
        self
    }

    /// Replaces the `OpenAI` client.
    #[must_use]
    pub fn with_openai(mut self, client: OpenAiUsageClient) -> Self {
        self.openai = client;
        self
    }

    async fn api_key(&self, provider: ProviderKind) -> Result<String, FetchError> {
        self.credentials.get(provider).await?.ok_or_else(|| {
            FetchError::Auth(format!("no API key stored for {}", provider.display_name()))
        })
    }
}

#[async_trait]
impl UsageSource for HttpUsageSource {
    async fn fetch(&self, provider: ProviderKind) -> Result<RawPayload, FetchError> {
        debug!(provider = %provider, "Fetching usage");
        match provider {
            ProviderKind::Anthropic => Ok(self.anthropic.fetch().await?.into()),
            ProviderKind::OpenAI => {
                let key = self.api_key(provider).await?;
                Ok(self.openai.fetch(&key).await?.into())
            }
            other => Err(FetchError::Unsupported(other)),
        }
    }
}
