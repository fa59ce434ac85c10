//! Error type shared by every call path.
//!
//! The buffered path consults [`CourierError::is_retryable_for`] to decide
//! whether another attempt is worth making. The streaming path never retries,
//! so there the classification is informational only.

use crate::provider::Provider;

/// Message attached to truncation errors. Retrying reproduces the same cut-off,
/// so the caller has to shrink the input instead.
pub const TRUNCATION_HINT: &str =
    "the response was cut off at the output token limit; reduce the input size and try again";

/// Errors returned by [`CourierClient`](crate::CourierClient) calls.
#[derive(Debug, thiserror::Error)]
pub enum CourierError {
    /// The server answered with a non-success status.
    ///
    /// `message` is the server-supplied error message when the body carried
    /// one, otherwise the raw status line.
    #[error("{provider} API HTTP {status}: {message}")]
    Http {
        provider: Provider,
        status: u16,
        message: String,
    },

    /// The request never produced a response (connection refused, reset, DNS).
    #[error("request failed: {0}")]
    Transport(String),

    /// A success response whose body could not be parsed.
    #[error("failed to parse {provider} response: {message}")]
    Decode { provider: Provider, message: String },

    /// Output stopped at the token ceiling. Terminal, never retried.
    #[error("{provider}: {}", TRUNCATION_HINT)]
    Truncated { provider: Provider },

    /// An in-band error frame or a failed chunk read on a stream.
    #[error("stream error: {0}")]
    Stream(String),

    /// The caller's cancellation token fired.
    #[error("request cancelled")]
    Cancelled,

    /// Invalid client configuration (e.g. an HTTP client that failed to build).
    #[error("configuration error: {0}")]
    Config(String),
}

impl CourierError {
    /// Whether the buffered path should spend another attempt on this error.
    ///
    /// HTTP statuses are retryable only when they appear in the provider's
    /// transient set. Transport and decode failures are always retried;
    /// truncation, stream errors and cancellation never are.
    pub fn is_retryable_for(&self, provider: Provider) -> bool {
        match self {
            CourierError::Http { status, .. } => provider.is_retryable_status(*status),
            CourierError::Transport(_) | CourierError::Decode { .. } => true,
            CourierError::Truncated { .. }
            | CourierError::Stream(_)
            | CourierError::Cancelled
            | CourierError::Config(_) => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CourierError::Cancelled)
    }

    pub fn is_truncated(&self) -> bool {
        matches!(self, CourierError::Truncated { .. })
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            CourierError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Pull the most useful error message out of a non-success response body.
///
/// Looks for `error.message`, then a string `error`, then a top-level
/// `message`. Falls back to the status line (`"503 Service Unavailable"`).
pub fn extract_error_message(status: u16, body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        let candidate = json
            .pointer("/error/message")
            .or_else(|| json.get("error").filter(|e| e.is_string()))
            .or_else(|| json.get("message"))
            .and_then(|m| m.as_str())
            .map(str::trim)
            .filter(|m| !m.is_empty());
        if let Some(message) = candidate {
            return message.to_string();
        }
    }
    status_line(status)
}

/// `"<code> <reason>"`, or just the code for statuses without a canonical reason.
pub fn status_line(status: u16) -> String {
    match reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
    {
        Some(reason) => format!("{status} {reason}"),
        None => status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_nested_error_message() {
        let body = r#"{"error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        assert_eq!(extract_error_message(529, body), "Overloaded");
    }

    #[test]
    fn extracts_string_error_and_top_level_message() {
        assert_eq!(
            extract_error_message(400, r#"{"error":"bad key"}"#),
            "bad key"
        );
        assert_eq!(
            extract_error_message(400, r#"{"message":"nope"}"#),
            "nope"
        );
    }

    #[test]
    fn falls_back_to_status_line() {
        assert_eq!(
            extract_error_message(503, "<html>upstream down</html>"),
            "503 Service Unavailable"
        );
        assert_eq!(extract_error_message(503, r#"{"error":{}}"#), "503 Service Unavailable");
        assert_eq!(extract_error_message(529, ""), "529");
    }

    #[test]
    fn retry_classification() {
        let overloaded = CourierError::Http {
            provider: Provider::Anthropic,
            status: 529,
            message: "Overloaded".into(),
        };
        assert!(overloaded.is_retryable_for(Provider::Anthropic));
        assert!(!overloaded.is_retryable_for(Provider::OpenAi));

        let bad_request = CourierError::Http {
            provider: Provider::OpenAi,
            status: 400,
            message: "bad".into(),
        };
        assert!(!bad_request.is_retryable_for(Provider::OpenAi));

        assert!(CourierError::Transport("reset".into()).is_retryable_for(Provider::Gemini));
        assert!(
            !CourierError::Truncated {
                provider: Provider::Grok
            }
            .is_retryable_for(Provider::Grok)
        );
        assert!(!CourierError::Cancelled.is_retryable_for(Provider::Grok));
    }

    #[test]
    fn truncation_message_tells_caller_to_shrink_input() {
        let err = CourierError::Truncated {
            provider: Provider::Gemini,
        };
        assert!(err.to_string().contains("reduce the input size"));
        assert!(err.is_truncated());
    }
}
