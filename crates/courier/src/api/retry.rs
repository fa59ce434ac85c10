//! Automatic retry with exponential backoff for buffered calls.
//!
//! An attempt that fails with an error the provider considers transient
//! (see [`CourierError::is_retryable_for`]) is retried after
//! `base_delay × multiplier^n`, up to `max_attempts` attempts in total. The
//! last error is raised once the budget is spent. Every wait races the
//! caller's cancellation token.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::CourierError;
use crate::provider::Provider;

/// Configuration for retry behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts, including the first (1 = never retry).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Backoff multiplier applied per retry.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(3000),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Default backoff with the given attempt budget.
    pub fn with_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// A config that makes exactly one attempt.
    pub fn disabled() -> Self {
        Self::with_attempts(1)
    }

    /// Delay after the given failed attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(self.base_delay.as_secs_f64() * factor)
    }
}

/// Run `call` until it succeeds, fails permanently, or the attempt budget is
/// spent.
///
/// `call` receives the 0-indexed attempt number.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    provider: Provider,
    cancel: &CancellationToken,
    mut call: F,
) -> Result<T, CourierError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, CourierError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CourierError::Cancelled),
            r = call(attempt) => r,
        };
        match result {
            Ok(v) => return Ok(v),
            Err(e) if attempt + 1 < max_attempts && e.is_retryable_for(provider) => {
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    "Transient {provider} error (attempt {}/{}): {e}. Retrying in {delay:?}...",
                    attempt + 1,
                    max_attempts,
                );
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(CourierError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn http(status: u16) -> CourierError {
        CourierError::Http {
            provider: Provider::Anthropic,
            status,
            message: "x".into(),
        }
    }

    #[test]
    fn default_config_three_attempts() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay, Duration::from_secs(3));
    }

    #[test]
    fn delay_doubles_without_jitter() {
        let config = RetryConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(3));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(6));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(12));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let start = Instant::now();
        let counter = calls.clone();
        let result: Result<(), _> = with_retry(
            &RetryConfig::default(),
            Provider::Anthropic,
            &CancellationToken::new(),
            |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(http(529)) }
            },
        )
        .await;
        assert_eq!(result.unwrap_err().status(), Some(529));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two waits: 3s + 6s.
        assert_eq!(start.elapsed(), Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_status_fails_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = with_retry(
            &RetryConfig::default(),
            Provider::Anthropic,
            &CancellationToken::new(),
            |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                // 500 is transient for OpenAI but not for Anthropic.
                async { Err(http(500)) }
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_second_attempt() {
        let result = with_retry(
            &RetryConfig::default(),
            Provider::Grok,
            &CancellationToken::new(),
            |attempt| async move {
                if attempt == 0 {
                    Err(CourierError::Transport("connection reset".into()))
                } else {
                    Ok(attempt)
                }
            },
        )
        .await;
        assert_eq!(result.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn truncation_is_never_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let result: Result<(), _> = with_retry(
            &RetryConfig::default(),
            Provider::Gemini,
            &CancellationToken::new(),
            |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(CourierError::Truncated {
                        provider: Provider::Gemini,
                    })
                }
            },
        )
        .await;
        assert!(result.unwrap_err().is_truncated());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_backoff() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });
        let start = Instant::now();
        let result: Result<(), _> = with_retry(
            &RetryConfig::default(),
            Provider::OpenAi,
            &cancel,
            |_| async { Err(http(503)) },
        )
        .await;
        assert!(result.unwrap_err().is_cancelled());
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let result = with_retry(
            &RetryConfig::with_attempts(0),
            Provider::Anthropic,
            &CancellationToken::new(),
            |_| async { Ok::<_, CourierError>(7) },
        )
        .await;
        assert_eq!(result.unwrap(), 7);
    }
}
