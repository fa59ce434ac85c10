//! Everything between a normalized request and the wire.
//!
//! - [`router`]: provider name resolution with fallback, and relay endpoint
//!   selection.
//! - [`transport`]: the [`Transport`](transport::Transport) seam, with a
//!   `reqwest` implementation and a scripted fake.
//! - [`retry`]: bounded exponential backoff for buffered calls.
//! - [`streaming`]: frame reassembly and decoding for streaming calls.
//! - [`usage`]: token accounting shared across calls, plus pricing tables.

pub mod retry;
pub mod router;
pub mod streaming;
pub mod transport;
pub mod usage;

pub use retry::RetryConfig;
pub use router::{ResolvedProvider, resolve_provider};
pub use streaming::StreamEvent;
pub use transport::{HttpTransport, ScriptedReply, ScriptedTransport, Transport};
pub use usage::{ModelPricing, TokenUsage, UsageTracker, pricing_for_model};
