//! Convenience re-exports for common `courier` types.
//!
//! ```ignore
//! use courier::prelude::*;
//! ```
//!
//! Transport internals, request builders and per-provider response shapes
//! are left out; import those from their modules directly.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::{
    CallOptions, ContentBlock, CourierClient, CourierError, Message, MessageContent, MessageRole,
    Provider, ReasoningEffort, Verbosity,
};

// ── Configuration ───────────────────────────────────────────────────
pub use crate::api::retry::RetryConfig;
pub use crate::config::ClientConfig;

// ── Usage ───────────────────────────────────────────────────────────
pub use crate::api::usage::{TokenUsage, UsageTracker, pricing_for_model};

// ── Cancellation ────────────────────────────────────────────────────
pub use tokio_util::sync::CancellationToken;
