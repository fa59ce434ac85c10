//! Provider resolution and request routing.
//!
//! Turns a configured provider name into a [`Provider`] (falling back to
//! [`DEFAULT_PROVIDER`] with a warning when the name is unknown) and turns a
//! normalized request into the [`HttpRequest`] for the relay endpoint.

use tracing::{debug, warn};

use super::transport::HttpRequest;
use crate::error::CourierError;
use crate::normalize::{self, ProviderRequest};
use crate::provider::{DEFAULT_PROVIDER, Provider};
use crate::{CallOptions, Message};

/// Outcome of resolving a configured provider name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProvider {
    pub provider: Provider,
    /// True when the name was missing or unrecognized and the default was
    /// substituted.
    pub fell_back: bool,
    /// The name as configured, if any.
    pub requested: Option<String>,
}

impl ResolvedProvider {
    pub fn exact(provider: Provider) -> Self {
        Self {
            provider,
            fell_back: false,
            requested: Some(provider.as_str().to_string()),
        }
    }
}

/// Resolve a provider name, case-insensitively and with aliases.
pub fn resolve_provider(name: Option<&str>) -> ResolvedProvider {
    let requested = name.map(str::to_string);
    match name.and_then(Provider::from_name) {
        Some(provider) => ResolvedProvider {
            provider,
            fell_back: false,
            requested,
        },
        None => {
            warn!(
                "Unknown provider {:?}; falling back to {DEFAULT_PROVIDER}",
                name.unwrap_or_default()
            );
            ResolvedProvider {
                provider: DEFAULT_PROVIDER,
                fell_back: true,
                requested,
            }
        }
    }
}

/// Join the base URL and an endpoint path without doubling the slash.
pub fn endpoint_url(base_url: &str, path: &str) -> String {
    format!("{}{path}", base_url.trim_end_matches('/'))
}

/// Build the relay request for `provider`.
///
/// `api_key` is sent in the provider's credential header when present and
/// non-empty.
pub fn route(
    provider: Provider,
    base_url: &str,
    api_key: Option<&str>,
    messages: &[Message],
    options: &CallOptions,
    stream: bool,
) -> Result<(ProviderRequest, HttpRequest), CourierError> {
    let request = normalize::build_request(provider, messages, options, stream);
    let body = serde_json::to_value(&request)
        .map_err(|e| CourierError::Config(format!("failed to serialize request: {e}")))?;

    let path = if stream {
        provider.stream_path()
    } else {
        provider.endpoint_path()
    };
    let mut headers = Vec::new();
    if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
        headers.push((provider.credential_header().to_string(), key.to_string()));
    }

    let http = HttpRequest {
        url: endpoint_url(base_url, path),
        headers,
        body,
    };
    debug!(
        "Routed {provider} request to {} (model={}, max_tokens={})",
        http.url,
        request.model(),
        request.max_tokens()
    );
    Ok((request, http))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_names_resolve_without_fallback() {
        let resolved = resolve_provider(Some("GPT"));
        assert_eq!(resolved.provider, Provider::OpenAi);
        assert!(!resolved.fell_back);
        assert_eq!(resolved.requested.as_deref(), Some("GPT"));
    }

    #[test]
    fn unknown_or_missing_names_fall_back() {
        for name in [Some("mistral"), Some(""), None] {
            let resolved = resolve_provider(name);
            assert_eq!(resolved.provider, Provider::Anthropic);
            assert!(resolved.fell_back, "{name:?}");
        }
    }

    #[test]
    fn endpoint_url_trims_trailing_slash() {
        assert_eq!(
            endpoint_url("http://relay:8787/", "/api/gemini"),
            "http://relay:8787/api/gemini"
        );
    }

    #[test]
    fn route_picks_path_and_credential_header() {
        let messages = [Message::user("hi")];
        let (_, buffered) = route(
            Provider::Gemini,
            "http://relay",
            Some("g-key"),
            &messages,
            &CallOptions::default(),
            false,
        )
        .unwrap();
        assert_eq!(buffered.url, "http://relay/api/gemini");
        assert_eq!(buffered.header("x-goog-api-key"), Some("g-key"));

        let (request, streaming) = route(
            Provider::Grok,
            "http://relay",
            Some("  "),
            &messages,
            &CallOptions::default(),
            true,
        )
        .unwrap();
        assert_eq!(streaming.url, "http://relay/api/grok/stream");
        assert!(streaming.headers.is_empty());
        assert_eq!(request.provider(), Provider::Grok);
        assert_eq!(streaming.body["stream"], true);
    }
}
