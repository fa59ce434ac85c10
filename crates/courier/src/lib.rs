//! Multi-provider LLM client with buffered and streaming calls.
//!
//! `courier` sends provider-agnostic prompts to one of four LLM backends
//! (Anthropic, OpenAI, Gemini, Grok) through a relay. It normalizes each
//! provider's request and response shapes, retries transient failures on the
//! buffered path, decodes the relay's event stream into text deltas, and keeps
//! a running token-usage total.
//!
//! # Getting started
//!
//! ```ignore
//! use courier::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), CourierError> {
//!     let config = ClientConfig::from_env();
//!     let client = CourierClient::new(config)?;
//!
//!     let messages = vec![Message::user("Summarize this statement.")];
//!     let options = CallOptions::default().with_max_tokens(1024);
//!
//!     // Buffered: the whole answer at once, retried on transient failures.
//!     let text = client.call(&messages, &options).await?;
//!
//!     // Streaming: the callback sees the full accumulated text every time.
//!     let text = client
//!         .call_streaming(&messages, &options, |so_far| println!("{so_far}"))
//!         .await?;
//!
//!     println!("{}", client.usage().summary());
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`normalize`] | Per-provider request builders and capability clamps |
//! | [`response`] | Per-provider response parsing (text, usage, truncation) |
//! | [`api`] | Retry executor, stream decoder, usage tracker, dispatcher, transport |
//! | [`client`] | [`CourierClient`], the entry point for both call modes |
//! | [`config`] | [`ClientConfig`](config::ClientConfig) and environment loading |

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod normalize;
pub mod prelude;
pub mod provider;
pub mod response;

use serde::{Deserialize, Serialize};

pub use client::CourierClient;
pub use error::CourierError;
pub use provider::Provider;

// ── Constants ──────────────────────────────────────────────────────

/// Relay base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8787";

/// Headroom kept above an extended-thinking budget so the final answer still
/// fits under the output token ceiling.
pub const THINKING_MARGIN_TOKENS: u32 = 4096;

// ── Message types ──────────────────────────────────────────────────

/// Role of a message in the conversation.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// One piece of structured message content.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    /// A base64-encoded document attachment (PDF, plain text, ...).
    Document {
        media_type: String,
        data: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    /// A provider-native block. Passed through unchanged where the target
    /// accepts structured blocks, serialized to JSON text elsewhere.
    Opaque {
        block: serde_json::Value,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn document(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        ContentBlock::Document {
            media_type: media_type.into(),
            data: data.into(),
            title: None,
        }
    }

    /// The block rendered as a single string: text verbatim, anything else
    /// as its JSON serialization.
    pub fn to_flat_text(&self) -> String {
        match self {
            ContentBlock::Text { text } => text.clone(),
            ContentBlock::Opaque { block } => block.to_string(),
            other => serde_json::to_string(other).unwrap_or_default(),
        }
    }
}

/// Message content: a plain string or a list of blocks.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl MessageContent {
    /// Flatten to one string, joining blocks with blank lines.
    pub fn to_flat_text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Blocks(blocks) => blocks
                .iter()
                .map(ContentBlock::to_flat_text)
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }

    /// Borrow the content as a block list, wrapping plain text in one block.
    pub fn blocks(&self) -> std::borrow::Cow<'_, [ContentBlock]> {
        match self {
            MessageContent::Text(text) => {
                std::borrow::Cow::Owned(vec![ContentBlock::text(text.clone())])
            }
            MessageContent::Blocks(blocks) => std::borrow::Cow::Borrowed(blocks),
        }
    }
}

/// A message in the conversation. Order is preserved; role sequencing is the
/// caller's concern.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub role: MessageRole,
    pub content: MessageContent,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn user_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: MessageRole::User,
            content: MessageContent::Blocks(blocks),
        }
    }
}

// ── Call options ───────────────────────────────────────────────────

/// Reasoning effort level, ordered from least to most effort.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    None,
    Minimal,
    Low,
    Medium,
    High,
    Xhigh,
}

impl ReasoningEffort {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasoningEffort::None => "none",
            ReasoningEffort::Minimal => "minimal",
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
            ReasoningEffort::Xhigh => "xhigh",
        }
    }

    /// Snap to the nearest level in `supported`. Ties go to the lower level.
    ///
    /// Returns `None` only when `supported` is empty.
    pub fn clamp_to(self, supported: &[ReasoningEffort]) -> Option<ReasoningEffort> {
        let rank = |e: ReasoningEffort| e as i32;
        supported
            .iter()
            .copied()
            .min_by_key(|&s| ((rank(s) - rank(self)).abs(), rank(s)))
    }
}

impl std::str::FromStr for ReasoningEffort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(ReasoningEffort::None),
            "minimal" => Ok(ReasoningEffort::Minimal),
            "low" => Ok(ReasoningEffort::Low),
            "medium" => Ok(ReasoningEffort::Medium),
            "high" => Ok(ReasoningEffort::High),
            "xhigh" => Ok(ReasoningEffort::Xhigh),
            other => Err(format!("unknown reasoning level: {other:?}")),
        }
    }
}

/// Output verbosity hint (OpenAI GPT-5 family only).
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    Low,
    Medium,
    High,
}

impl std::str::FromStr for Verbosity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Verbosity::Low),
            "medium" => Ok(Verbosity::Medium),
            "high" => Ok(Verbosity::High),
            other => Err(format!("unknown verbosity: {other:?}")),
        }
    }
}

/// Per-call options. Every unset field falls back to a provider default
/// chosen by the normalizer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CallOptions {
    pub max_tokens: Option<u32>,
    pub system_prompt: Option<String>,
    pub model: Option<String>,
    /// Ask for no internal reasoning. Models that cannot turn it off get
    /// their minimum instead.
    pub disable_thinking: bool,
    pub reasoning_level: Option<ReasoningEffort>,
    /// Token budget for extended thinking (Anthropic, Gemini).
    pub thinking_budget: Option<u32>,
    pub verbosity: Option<Verbosity>,
    /// Plaintext API key overriding the client's configured key.
    pub api_key: Option<String>,
}

impl CallOptions {
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_thinking_disabled(mut self) -> Self {
        self.disable_thinking = true;
        self
    }

    pub fn with_reasoning_level(mut self, level: ReasoningEffort) -> Self {
        self.reasoning_level = Some(level);
        self
    }

    pub fn with_thinking_budget(mut self, budget: u32) -> Self {
        self.thinking_budget = Some(budget);
        self
    }

    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = Some(verbosity);
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

/// Whether a provider or relay finish reason means the output hit its token
/// ceiling.
pub fn is_truncation_reason(reason: &str) -> bool {
    matches!(
        reason.to_ascii_lowercase().as_str(),
        "max_tokens" | "length" | "max_output_tokens" | "truncated"
    )
}
