//! Provider and credential pool construction for facade consumers.

use std::sync::Arc;
use std::time::Duration;

use pprovider::adapters::openai::{DEFAULT_BASE_URL, OpenAiHttpTransport, OpenAiProvider};
use pprovider::{CredentialPool, ModelProvider, ProviderError, QuotaPolicy};
use reqwest::Client;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderBuildConfig {
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Upper bound on a whole HTTP exchange, including a streamed body.
    /// `None` leaves long replies bounded only by the chat policy.
    pub timeout: Option<Duration>,
}

impl Default for ProviderBuildConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            timeout: None,
        }
    }
}

impl ProviderBuildConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// An OpenAI-compatible chat-completions provider over reqwest.
pub fn build_provider(config: ProviderBuildConfig) -> Result<Arc<dyn ModelProvider>, ProviderError> {
    let base_url = config.base_url.trim().trim_end_matches('/').to_string();
    if base_url.is_empty() {
        return Err(ProviderError::invalid_request(
            "provider base_url must not be empty",
        ));
    }

    let mut builder = Client::builder().connect_timeout(config.connect_timeout);
    if let Some(timeout) = config.timeout {
        builder = builder.timeout(timeout);
    }
    let http = builder
        .build()
        .map_err(|err| ProviderError::transport(err.to_string()))?;

    let transport = Arc::new(OpenAiHttpTransport::new(http).with_base_url(base_url));
    Ok(Arc::new(OpenAiProvider::new(transport)))
}

pub fn build_credential_pool<I, S>(
    api_keys: I,
    quota: QuotaPolicy,
) -> Result<Arc<CredentialPool>, ProviderError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Ok(Arc::new(CredentialPool::new(api_keys)?.with_policy(quota)))
}
