//! The public client: one object per configured provider.
//!
//! [`CourierClient`] ties the pieces together. A call normalizes the
//! conversation for the resolved provider, routes it to the relay, and either
//! reads a whole response (buffered) or decodes an event stream (streaming).
//!
//! # Retry asymmetry
//!
//! Buffered calls ([`call`](CourierClient::call)) retry transient failures
//! with exponential backoff per the client's [`RetryConfig`]. Streaming calls
//! ([`call_streaming`](CourierClient::call_streaming)) are **never retried**:
//! a failed open or a mid-stream failure is raised immediately, because text
//! may already have reached the caller's callback and replaying it would
//! duplicate output. Callers that want a retry on streaming must decide for
//! themselves whether partial output is acceptable.
//!
//! ```ignore
//! use courier::prelude::*;
//!
//! let client = CourierClient::new(ClientConfig::from_env().with_provider("gemini"))?;
//! let reply = client
//!     .call(&[Message::user("Name three primes.")], &CallOptions::default())
//!     .await?;
//! println!("{reply}");
//! println!("{}", client.usage().summary());
//! ```

use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::api::retry::{RetryConfig, with_retry};
use crate::api::router::{ResolvedProvider, resolve_provider, route};
use crate::api::streaming::decode_stream;
use crate::api::transport::{HttpRequest, HttpTransport, Transport};
use crate::api::usage::UsageTracker;
use crate::config::ClientConfig;
use crate::error::{CourierError, extract_error_message};
use crate::provider::Provider;
use crate::response::ProviderResponse;
use crate::{CallOptions, Message};

/// Multi-provider client for the relay.
///
/// Cheap to share behind an `Arc`; concurrent calls only share the
/// [`UsageTracker`].
pub struct CourierClient {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    resolved: ResolvedProvider,
    usage: Arc<UsageTracker>,
}

impl CourierClient {
    /// Create a client that talks HTTP through `reqwest`.
    pub fn new(config: ClientConfig) -> Result<Self, CourierError> {
        let transport = HttpTransport::new(&config.user_agent)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client over an arbitrary transport.
    ///
    /// The provider name is resolved here; an unknown name falls back to the
    /// default provider (see [`fell_back`](Self::fell_back)).
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        let resolved = resolve_provider(config.provider.as_deref());
        Self {
            transport,
            config,
            resolved,
            usage: Arc::new(UsageTracker::new()),
        }
    }

    /// Use `tracker` for usage accounting instead of a private one.
    pub fn with_usage_tracker(mut self, tracker: Arc<UsageTracker>) -> Self {
        self.usage = tracker;
        self
    }

    pub fn provider(&self) -> Provider {
        self.resolved.provider
    }

    /// Whether the configured provider name was unknown and the default was
    /// used instead.
    pub fn fell_back(&self) -> bool {
        self.resolved.fell_back
    }

    pub fn resolved_provider(&self) -> &ResolvedProvider {
        &self.resolved
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.config.retry
    }

    /// Running token usage across every call made through this client.
    pub fn usage(&self) -> &Arc<UsageTracker> {
        &self.usage
    }

    // ── Buffered ──────────────────────────────────────────────────

    /// Send a conversation and wait for the complete answer.
    ///
    /// Returns the trimmed text of the first non-thinking segment, or an
    /// empty string when the response has none. Transient failures are
    /// retried; truncation is not.
    pub async fn call(
        &self,
        messages: &[Message],
        options: &CallOptions,
    ) -> Result<String, CourierError> {
        self.call_with_cancel(messages, options, &CancellationToken::new())
            .await
    }

    /// [`call`](Self::call) that aborts with [`CourierError::Cancelled`] when
    /// `cancel` fires, including during backoff waits.
    pub async fn call_with_cancel(
        &self,
        messages: &[Message],
        options: &CallOptions,
        cancel: &CancellationToken,
    ) -> Result<String, CourierError> {
        let provider = self.provider();
        let http = self.prepare(messages, options, false)?;

        with_retry(&self.config.retry, provider, cancel, |_| {
            self.attempt(provider, http.clone())
        })
        .await
    }

    async fn attempt(&self, provider: Provider, http: HttpRequest) -> Result<String, CourierError> {
        let start = Instant::now();
        let resp = self.transport.send(http).await?;
        debug!(
            "LLM response: HTTP {} in {:.1}s ({} bytes)",
            resp.status,
            start.elapsed().as_secs_f64(),
            resp.body.len()
        );

        if !resp.is_success() {
            return Err(CourierError::Http {
                provider,
                status: resp.status,
                message: extract_error_message(resp.status, &resp.body),
            });
        }

        let parsed = ProviderResponse::parse(provider, &resp.body)?;
        if parsed.is_truncated() {
            return Err(CourierError::Truncated { provider });
        }

        let usage = parsed.usage();
        debug!(
            "Token usage: input={}, output={}, cache_read={}, cache_creation={}",
            usage.input, usage.output, usage.cache_read, usage.cache_creation
        );
        self.usage.merge(usage);

        let text = parsed.text();
        debug!("LLM output: {} chars text", text.len());
        Ok(text)
    }

    // ── Streaming ─────────────────────────────────────────────────

    /// Send a conversation and receive the answer incrementally.
    ///
    /// `on_chunk` is invoked after each text frame with the **full** text
    /// accumulated so far, so every invocation extends the previous one.
    /// Returns the trimmed final text.
    ///
    /// Never retried; see the [module docs](self).
    pub async fn call_streaming(
        &self,
        messages: &[Message],
        options: &CallOptions,
        on_chunk: impl FnMut(&str),
    ) -> Result<String, CourierError> {
        self.call_streaming_with_cancel(messages, options, &CancellationToken::new(), on_chunk)
            .await
    }

    /// [`call_streaming`](Self::call_streaming) that abandons the stream
    /// with [`CourierError::Cancelled`] when `cancel` fires.
    pub async fn call_streaming_with_cancel(
        &self,
        messages: &[Message],
        options: &CallOptions,
        cancel: &CancellationToken,
        on_chunk: impl FnMut(&str),
    ) -> Result<String, CourierError> {
        let provider = self.provider();
        let http = self.prepare(messages, options, true)?;

        let start = Instant::now();
        let resp = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CourierError::Cancelled),
            resp = self.transport.open_stream(http) => resp?,
        };
        debug!(
            "LLM stream opened: HTTP {} in {:.1}s",
            resp.status,
            start.elapsed().as_secs_f64()
        );

        if !resp.is_success() {
            let status = resp.status;
            let body = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(CourierError::Cancelled),
                body = resp.into_text() => body,
            };
            return Err(CourierError::Http {
                provider,
                status,
                message: extract_error_message(status, &body),
            });
        }

        decode_stream(provider, resp.body, cancel, &self.usage, on_chunk).await
    }

    // ── Helpers ───────────────────────────────────────────────────

    fn prepare(
        &self,
        messages: &[Message],
        options: &CallOptions,
        stream: bool,
    ) -> Result<HttpRequest, CourierError> {
        let provider = self.provider();
        let api_key = options
            .api_key
            .as_deref()
            .or_else(|| self.config.api_key_for(provider));
        let (request, http) = route(
            provider,
            &self.config.base_url,
            api_key,
            messages,
            options,
            stream,
        )?;

        debug!(
            "LLM request: provider={}, model={}, messages={}, max_tokens={}, stream={}",
            provider,
            request.model(),
            messages.len(),
            request.max_tokens(),
            stream,
        );
        trace!("Request payload size: {} bytes", http.body.to_string().len());
        Ok(http)
    }
}

impl std::fmt::Debug for CourierClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CourierClient")
            .field("provider", &self.resolved.provider)
            .field("fell_back", &self.resolved.fell_back)
            .field("base_url", &self.config.base_url)
            .finish_non_exhaustive()
    }
}
