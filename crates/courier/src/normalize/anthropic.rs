//! Anthropic Messages API request builder.
//!
//! System text goes to the top-level `system` field. Content blocks are sent
//! natively. Extended thinking is enabled from a budget (or a reasoning level
//! mapped to one), and `max_tokens` is raised so the budget plus
//! [`THINKING_MARGIN_TOKENS`] always fits.

use serde::Serialize;
use serde_json::{Value, json};

use super::{collect_system, conversation, requested_budget, resolve_max_tokens, resolve_model};
use crate::provider::Provider;
use crate::{CallOptions, ContentBlock, Message, MessageContent, MessageRole, THINKING_MARGIN_TOKENS};

/// Smallest thinking budget the API accepts.
pub const MIN_THINKING_BUDGET: u32 = 1024;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AnthropicRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<ThinkingConfig>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct AnthropicMessage {
    pub role: &'static str,
    /// A plain string, or an array of content blocks.
    pub content: Value,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct ThinkingConfig {
    #[serde(rename = "type")]
    pub thinking_type: &'static str,
    pub budget_tokens: u32,
}

/// Output ceiling for a model family.
pub fn model_output_ceiling(model: &str) -> u32 {
    let m = model.to_ascii_lowercase();
    if m.starts_with("claude-3") && m.contains("haiku") {
        8192
    } else if m.contains("opus") {
        32000
    } else {
        64000
    }
}

/// Claude 3.x models other than 3.7 have no extended thinking.
pub fn supports_thinking(model: &str) -> bool {
    let m = model.to_ascii_lowercase();
    !m.starts_with("claude-3") || m.starts_with("claude-3-7")
}

pub(crate) fn build(messages: &[Message], options: &CallOptions, stream: bool) -> AnthropicRequest {
    let model = resolve_model(Provider::Anthropic, options);
    let ceiling = model_output_ceiling(&model);
    let mut max_tokens = resolve_max_tokens(Provider::Anthropic, options).min(ceiling);

    let budget = requested_budget(options)
        .filter(|&b| b > 0 && supports_thinking(&model))
        .and_then(|b| clamp_budget(b, ceiling));

    if let Some(budget) = budget {
        max_tokens = max_tokens.max(budget + THINKING_MARGIN_TOKENS).min(ceiling);
    }

    AnthropicRequest {
        model,
        max_tokens,
        system: collect_system(messages, options),
        messages: conversation(messages).map(convert_message).collect(),
        thinking: budget.map(|budget_tokens| ThinkingConfig {
            thinking_type: "enabled",
            budget_tokens,
        }),
        stream,
    }
}

/// Raise the budget to the API minimum and shrink it so that budget plus
/// margin fits under the ceiling. `None` when even the minimum cannot fit.
fn clamp_budget(requested: u32, ceiling: u32) -> Option<u32> {
    let max_budget = ceiling.checked_sub(THINKING_MARGIN_TOKENS)?;
    if max_budget < MIN_THINKING_BUDGET {
        return None;
    }
    Some(requested.max(MIN_THINKING_BUDGET).min(max_budget))
}

fn convert_message(message: &Message) -> AnthropicMessage {
    let role = match message.role {
        MessageRole::Assistant => "assistant",
        _ => "user",
    };
    let content = match &message.content {
        MessageContent::Text(text) => Value::String(text.clone()),
        MessageContent::Blocks(blocks) => Value::Array(blocks.iter().map(convert_block).collect()),
    };
    AnthropicMessage { role, content }
}

fn convert_block(block: &ContentBlock) -> Value {
    match block {
        ContentBlock::Text { text } => json!({ "type": "text", "text": text }),
        ContentBlock::Document {
            media_type,
            data,
            title,
        } => {
            let mut doc = json!({
                "type": "document",
                "source": { "type": "base64", "media_type": media_type, "data": data },
            });
            if let Some(title) = title {
                doc["title"] = Value::String(title.clone());
            }
            doc
        }
        ContentBlock::Opaque { block } => block.clone(),
    }
}
