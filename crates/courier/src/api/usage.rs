//! Token usage accounting and cost estimation.
//!
//! Every successful call produces a [`TokenUsage`] that is merged once into
//! the client's [`UsageTracker`]. The tracker is the only state shared
//! between concurrent calls; it only ever grows.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};
use std::sync::Mutex;

/// Token counts reported for one call (or accumulated across many).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(default)]
pub struct TokenUsage {
    #[serde(alias = "input_tokens")]
    pub input: u64,
    #[serde(alias = "output_tokens")]
    pub output: u64,
    #[serde(rename = "cacheRead", alias = "cache_read")]
    pub cache_read: u64,
    #[serde(rename = "cacheCreation", alias = "cache_creation")]
    pub cache_creation: u64,
}

impl TokenUsage {
    pub fn new(input: u64, output: u64) -> Self {
        Self {
            input,
            output,
            ..Default::default()
        }
    }

    /// Input plus output tokens.
    pub fn total(&self) -> u64 {
        self.input.saturating_add(self.output)
    }

    pub fn is_empty(&self) -> bool {
        *self == TokenUsage::default()
    }
}

impl Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, rhs: TokenUsage) -> TokenUsage {
        TokenUsage {
            input: self.input.saturating_add(rhs.input),
            output: self.output.saturating_add(rhs.output),
            cache_read: self.cache_read.saturating_add(rhs.cache_read),
            cache_creation: self.cache_creation.saturating_add(rhs.cache_creation),
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: TokenUsage) {
        *self = *self + rhs;
    }
}

/// Running usage total shared by every call made through one client.
///
/// Share it with `Arc` to pool accounting across clients, or give each
/// client its own instance to keep totals apart.
#[derive(Debug, Default)]
pub struct UsageTracker {
    inner: Mutex<TrackerState>,
}

#[derive(Debug, Default)]
struct TrackerState {
    total: TokenUsage,
    calls: u64,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one call's usage to the running total.
    pub fn merge(&self, usage: TokenUsage) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.total += usage;
        state.calls += 1;
    }

    /// Snapshot of the running total.
    pub fn read(&self) -> TokenUsage {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).total
    }

    /// Number of merges so far.
    pub fn calls(&self) -> u64 {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).calls
    }

    /// Format as a short summary string.
    pub fn summary(&self) -> String {
        let total = self.read();
        format!(
            "tokens: {} input + {} output = {} total (cache: {} read, {} written) over {} call(s)",
            total.input,
            total.output,
            total.total(),
            total.cache_read,
            total.cache_creation,
            self.calls(),
        )
    }
}

/// Per-model pricing for cost estimation (USD per 1M tokens).
#[derive(Debug, Clone, PartialEq)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
    pub cache_read_per_million: f64,
    pub cache_write_per_million: f64,
}

impl ModelPricing {
    const fn new(input: f64, output: f64, cache_read: f64, cache_write: f64) -> Self {
        Self {
            input_per_million: input,
            output_per_million: output,
            cache_read_per_million: cache_read,
            cache_write_per_million: cache_write,
        }
    }

    /// Estimate cost for the given usage.
    pub fn estimate_cost(&self, usage: &TokenUsage) -> f64 {
        let per = |tokens: u64, rate: f64| (tokens as f64 / 1_000_000.0) * rate;
        per(usage.input, self.input_per_million)
            + per(usage.output, self.output_per_million)
            + per(usage.cache_read, self.cache_read_per_million)
            + per(usage.cache_creation, self.cache_write_per_million)
    }
}

impl Default for ModelPricing {
    fn default() -> Self {
        // Mid-range estimate for unknown models.
        Self::new(3.0, 15.0, 0.30, 3.75)
    }
}

/// Lookup approximate pricing for a model by name.
///
/// Only the segment after the last `/` is matched, so relay-prefixed names
/// like `"anthropic/claude-sonnet-4-5"` resolve the same as bare ones.
pub fn pricing_for_model(model: &str) -> ModelPricing {
    let name = model.rsplit('/').next().unwrap_or(model).to_lowercase();

    // Approximate list prices. Cost tracking is for spotting runaway spend,
    // not billing.
    if name.contains("opus") {
        ModelPricing::new(15.0, 75.0, 1.50, 18.75)
    } else if name.contains("sonnet") {
        ModelPricing::new(3.0, 15.0, 0.30, 3.75)
    } else if name.contains("haiku") {
        ModelPricing::new(0.80, 4.0, 0.08, 1.0)
    } else if name.starts_with("gpt-5") && name.contains("mini") {
        ModelPricing::new(0.25, 2.0, 0.025, 0.0)
    } else if name.starts_with("gpt-5") {
        ModelPricing::new(1.25, 10.0, 0.125, 0.0)
    } else if name.starts_with("gpt-4o") || name.starts_with("gpt-4.1") {
        ModelPricing::new(2.0, 8.0, 0.50, 0.0)
    } else if name.contains("gemini") && name.contains("flash") {
        ModelPricing::new(0.30, 2.50, 0.075, 0.0)
    } else if name.contains("gemini") {
        ModelPricing::new(1.25, 10.0, 0.31, 0.0)
    } else if name.starts_with("grok-3-mini") {
        ModelPricing::new(0.30, 0.50, 0.075, 0.0)
    } else if name.starts_with("grok") {
        ModelPricing::new(3.0, 15.0, 0.75, 0.0)
    } else {
        ModelPricing::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn merge_adds_every_field() {
        let tracker = UsageTracker::new();
        tracker.merge(TokenUsage::new(1, 1));
        tracker.merge(TokenUsage {
            input: 10,
            output: 5,
            cache_read: 3,
            cache_creation: 2,
        });
        assert_eq!(
            tracker.read(),
            TokenUsage {
                input: 11,
                output: 6,
                cache_read: 3,
                cache_creation: 2
            }
        );
        assert_eq!(tracker.calls(), 2);
    }

    #[test]
    fn huge_counts_saturate_instead_of_overflowing() {
        let tracker = UsageTracker::new();
        tracker.merge(TokenUsage {
            input: u64::MAX,
            output: u64::MAX,
            cache_read: u64::MAX,
            cache_creation: u64::MAX,
        });
        tracker.merge(TokenUsage {
            input: 1,
            output: 1,
            cache_read: 1,
            cache_creation: 1,
        });
        let total = tracker.read();
        assert_eq!(total.input, u64::MAX);
        assert_eq!(total.cache_creation, u64::MAX);
        assert_eq!(total.total(), u64::MAX);
        assert_eq!(tracker.calls(), 2);
    }

    #[test]
    fn independent_trackers_do_not_share_totals() {
        let a = UsageTracker::new();
        let b = UsageTracker::new();
        a.merge(TokenUsage::new(5, 5));
        assert!(b.read().is_empty());
    }

    #[tokio::test]
    async fn concurrent_merges_are_not_lost() {
        let tracker = Arc::new(UsageTracker::new());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let t = tracker.clone();
                tokio::spawn(async move {
                    for _ in 0..100 {
                        t.merge(TokenUsage::new(1, 2));
                    }
                })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(tracker.read(), TokenUsage::new(1600, 3200));
        assert_eq!(tracker.calls(), 1600);
    }

    #[test]
    fn deserializes_relay_and_snake_case_names() {
        let camel: TokenUsage =
            serde_json::from_str(r#"{"input":3,"output":4,"cacheRead":5,"cacheCreation":6}"#)
                .unwrap();
        assert_eq!(camel.cache_creation, 6);

        let snake: TokenUsage =
            serde_json::from_str(r#"{"input_tokens":3,"output_tokens":4,"cache_read":1}"#).unwrap();
        assert_eq!(snake, TokenUsage { input: 3, output: 4, cache_read: 1, cache_creation: 0 });
    }

    #[test]
    fn cost_estimation() {
        let pricing = ModelPricing::new(3.0, 15.0, 0.0, 0.0);
        let cost = pricing.estimate_cost(&TokenUsage::new(1_000_000, 100_000));
        assert!((cost - 4.5).abs() < 0.01);
    }

    #[test]
    fn pricing_lookup_known_models() {
        assert!(pricing_for_model("claude-opus-4-1").input_per_million > 10.0);
        assert!(pricing_for_model("anthropic/claude-3-5-haiku").input_per_million < 1.0);
        assert!(pricing_for_model("gemini-2.5-flash").output_per_million < 5.0);
        assert!(pricing_for_model("some-unknown-model").input_per_million > 0.0);
    }

    #[test]
    fn summary_format() {
        let tracker = UsageTracker::new();
        tracker.merge(TokenUsage::new(1000, 500));
        let summary = tracker.summary();
        assert!(summary.contains("1500 total"));
        assert!(summary.contains("1 call(s)"));
    }
}
