//! The closed set of LLM backends and their fixed per-provider constants.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the four supported LLM backends.
///
/// Selecting a provider is a pure lookup: every constant a call needs
/// (endpoint paths, credential header, defaults, transient statuses) hangs
/// off this enum.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
    Gemini,
    Grok,
}

/// Provider used when the configured identity is missing or unrecognized.
pub const DEFAULT_PROVIDER: Provider = Provider::Anthropic;

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::Anthropic,
        Provider::OpenAi,
        Provider::Gemini,
        Provider::Grok,
    ];

    /// Lowercase identifier used in endpoint paths and config values.
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::OpenAi => "openai",
            Provider::Gemini => "gemini",
            Provider::Grok => "grok",
        }
    }

    /// Relay path for buffered (request/response) calls.
    pub fn endpoint_path(self) -> &'static str {
        match self {
            Provider::Anthropic => "/api/anthropic",
            Provider::OpenAi => "/api/openai",
            Provider::Gemini => "/api/gemini",
            Provider::Grok => "/api/grok",
        }
    }

    /// Relay path for streaming calls.
    pub fn stream_path(self) -> &'static str {
        match self {
            Provider::Anthropic => "/api/anthropic/stream",
            Provider::OpenAi => "/api/openai/stream",
            Provider::Gemini => "/api/gemini/stream",
            Provider::Grok => "/api/grok/stream",
        }
    }

    /// Header carrying the plaintext API key.
    pub fn credential_header(self) -> &'static str {
        match self {
            Provider::Anthropic => "x-api-key",
            Provider::OpenAi => "x-openai-key",
            Provider::Gemini => "x-goog-api-key",
            Provider::Grok => "x-grok-key",
        }
    }

    /// Environment variable holding this provider's key when
    /// `COURIER_API_KEY` is not set.
    pub fn api_key_env(self) -> &'static str {
        match self {
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
            Provider::Grok => "XAI_API_KEY",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            Provider::Anthropic => "claude-sonnet-4-5",
            Provider::OpenAi => "gpt-5",
            Provider::Gemini => "gemini-2.5-pro",
            Provider::Grok => "grok-4",
        }
    }

    pub fn default_max_tokens(self) -> u32 {
        match self {
            Provider::Anthropic => 8192,
            Provider::OpenAi => 16384,
            Provider::Gemini => 8192,
            Provider::Grok => 8192,
        }
    }

    /// Statuses that signal a transient upstream condition for this provider.
    ///
    /// Every set contains 429 (rate limited) and 503 (unavailable).
    pub fn retryable_statuses(self) -> &'static [u16] {
        match self {
            // 529: Anthropic's "overloaded".
            Provider::Anthropic => &[429, 503, 529],
            Provider::OpenAi => &[429, 500, 502, 503],
            Provider::Gemini => &[429, 500, 503],
            Provider::Grok => &[429, 502, 503],
        }
    }

    pub fn is_retryable_status(self, status: u16) -> bool {
        self.retryable_statuses().contains(&status)
    }

    /// Look up a provider by name or alias, case-insensitively.
    pub fn from_name(name: &str) -> Option<Provider> {
        match name.trim().to_ascii_lowercase().as_str() {
            "anthropic" | "claude" => Some(Provider::Anthropic),
            "openai" | "gpt" | "chatgpt" => Some(Provider::OpenAi),
            "gemini" | "google" => Some(Provider::Gemini),
            "grok" | "xai" => Some(Provider::Grok),
            _ => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::from_name(s).ok_or_else(|| format!("unknown provider: {s:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_provider_retries_rate_limit_and_unavailable() {
        for provider in Provider::ALL {
            assert!(provider.is_retryable_status(429), "{provider}");
            assert!(provider.is_retryable_status(503), "{provider}");
            assert!(!provider.is_retryable_status(400), "{provider}");
            assert!(!provider.is_retryable_status(401), "{provider}");
        }
    }

    #[test]
    fn name_lookup_accepts_aliases() {
        assert_eq!(Provider::from_name("Claude"), Some(Provider::Anthropic));
        assert_eq!(Provider::from_name(" openai "), Some(Provider::OpenAi));
        assert_eq!(Provider::from_name("google"), Some(Provider::Gemini));
        assert_eq!(Provider::from_name("xai"), Some(Provider::Grok));
        assert_eq!(Provider::from_name("mistral"), None);
        assert!("".parse::<Provider>().is_err());
    }

    #[test]
    fn paths_are_distinct_per_provider() {
        for provider in Provider::ALL {
            assert!(provider.stream_path().starts_with(provider.endpoint_path()));
            assert_eq!(provider.to_string(), provider.as_str());
        }
    }

    #[test]
    fn serde_uses_config_names() {
        let json = serde_json::to_string(&Provider::OpenAi).unwrap();
        assert_eq!(json, "\"openai\"");
        let parsed: Provider = serde_json::from_str("\"grok\"").unwrap();
        assert_eq!(parsed, Provider::Grok);
    }
}
