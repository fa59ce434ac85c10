//! Grok (xAI) chat-completions request builder. Content is flattened to one
//! string per message.

use serde::Serialize;

use super::{resolve_max_tokens, resolve_model};
use crate::provider::Provider;
use crate::{CallOptions, Message, MessageRole, ReasoningEffort};

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GrokRequest {
    pub model: String,
    pub messages: Vec<GrokMessage>,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<ReasoningEffort>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GrokMessage {
    pub role: MessageRole,
    pub content: String,
}

/// Only the grok-3-mini family accepts `reasoning_effort`, and only low/high.
fn supported_efforts(model: &str) -> &'static [ReasoningEffort] {
    if model.to_ascii_lowercase().starts_with("grok-3-mini") {
        &[ReasoningEffort::Low, ReasoningEffort::High]
    } else {
        &[]
    }
}

pub(crate) fn build(messages: &[Message], options: &CallOptions, stream: bool) -> GrokRequest {
    let model = resolve_model(Provider::Grok, options);

    let requested = if options.disable_thinking {
        Some(ReasoningEffort::None)
    } else {
        options.reasoning_level
    };
    let reasoning_effort = requested.and_then(|level| level.clamp_to(supported_efforts(&model)));

    let system = options
        .system_prompt
        .iter()
        .filter(|s| !s.trim().is_empty())
        .map(|s| GrokMessage {
            role: MessageRole::System,
            content: s.clone(),
        });
    let rest = messages.iter().map(|m| GrokMessage {
        role: m.role,
        content: m.content.to_flat_text(),
    });

    GrokRequest {
        messages: system.chain(rest).collect(),
        max_tokens: resolve_max_tokens(Provider::Grok, options),
        reasoning_effort,
        stream,
        model,
    }
}
