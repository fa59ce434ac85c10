//! Client configuration with sensible defaults.
//!
//! [`ClientConfig`] holds everything a [`CourierClient`](crate::CourierClient)
//! needs besides the transport: where the relay lives, which provider to
//! target, the credential to send, and the retry policy for buffered calls.

use std::collections::HashMap;

use crate::DEFAULT_BASE_URL;
use crate::api::retry::RetryConfig;
use crate::provider::Provider;

/// Environment variable holding the relay base URL.
pub const ENV_BASE_URL: &str = "COURIER_BASE_URL";
/// Environment variable holding the provider name.
pub const ENV_PROVIDER: &str = "COURIER_PROVIDER";
/// Environment variable holding a provider-independent API key.
pub const ENV_API_KEY: &str = "COURIER_API_KEY";

/// Configuration for a [`CourierClient`](crate::CourierClient).
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Relay base URL. Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,
    /// Provider name as configured. Resolved (with fallback) when the
    /// client is built. `None` selects the default provider.
    pub provider: Option<String>,
    /// Credential sent for whichever provider is selected, unless a call
    /// overrides it.
    pub api_key: Option<String>,
    /// Per-provider credentials, used when `api_key` is unset. Looked up
    /// against the provider the client actually resolves to.
    pub provider_keys: HashMap<Provider, String>,
    /// Backoff policy for buffered calls.
    pub retry: RetryConfig,
    /// `User-Agent` for the HTTP transport.
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            provider: None,
            api_key: None,
            provider_keys: HashMap::new(),
            retry: RetryConfig::default(),
            user_agent: format!("courier/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_provider_key(mut self, provider: Provider, api_key: impl Into<String>) -> Self {
        self.provider_keys.insert(provider, api_key.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// The credential to send to `provider`: the explicit key if set, else
    /// that provider's own key. Never another provider's key.
    pub fn api_key_for(&self, provider: Provider) -> Option<&str> {
        self.api_key
            .as_deref()
            .or_else(|| self.provider_keys.get(&provider).map(String::as_str))
    }

    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    ///
    /// [`ENV_API_KEY`] becomes the explicit key. Every provider's own
    /// variable (`ANTHROPIC_API_KEY`, `OPENAI_API_KEY`, `GEMINI_API_KEY`,
    /// `XAI_API_KEY`) is loaded into `provider_keys`, so the right one is
    /// picked even if the provider is changed afterwards. Empty values
    /// count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut config = Self::default();
        if let Some(base_url) = get(ENV_BASE_URL) {
            config.base_url = base_url;
        }
        config.provider = get(ENV_PROVIDER);
        config.api_key = get(ENV_API_KEY);
        for provider in Provider::ALL {
            if let Some(key) = get(provider.api_key_env()) {
                config.provider_keys.insert(provider, key);
            }
        }
        config
    }
}
