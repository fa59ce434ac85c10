//! OpenAI Responses API request builder.

use serde::Serialize;
use serde_json::{Value, json};

use super::{collect_system, conversation, resolve_max_tokens, resolve_model};
use crate::provider::Provider;
use crate::{CallOptions, ContentBlock, Message, MessageRole, ReasoningEffort, Verbosity};

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct OpenAiRequest {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    pub input: Vec<OpenAiInputItem>,
    pub max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<OpenAiReasoning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<OpenAiTextConfig>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct OpenAiInputItem {
    pub role: &'static str,
    pub content: Vec<Value>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct OpenAiReasoning {
    pub effort: ReasoningEffort,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct OpenAiTextConfig {
    pub verbosity: Verbosity,
}

/// Reasoning levels a model accepts. Empty for non-reasoning models.
pub fn supported_efforts(model: &str) -> &'static [ReasoningEffort] {
    use ReasoningEffort::*;
    let m = model.to_ascii_lowercase();
    if m.starts_with("gpt-5") && m.contains("-pro") {
        &[High]
    } else if m.starts_with("gpt-5.2") {
        &[None, Low, Medium, High, Xhigh]
    } else if m.starts_with("gpt-5.1") {
        &[None, Low, Medium, High]
    } else if m.starts_with("gpt-5") {
        &[Minimal, Low, Medium, High]
    } else if is_o_series(&m) {
        &[Low, Medium, High]
    } else {
        &[]
    }
}

fn is_o_series(model: &str) -> bool {
    let mut chars = model.chars();
    chars.next() == Some('o') && chars.next().is_some_and(|c| c.is_ascii_digit())
}

fn supports_verbosity(model: &str) -> bool {
    model.to_ascii_lowercase().starts_with("gpt-5")
}

pub(crate) fn build(messages: &[Message], options: &CallOptions, stream: bool) -> OpenAiRequest {
    let model = resolve_model(Provider::OpenAi, options);

    let requested = if options.disable_thinking {
        Some(ReasoningEffort::None)
    } else {
        options.reasoning_level
    };
    let reasoning = requested
        .and_then(|level| level.clamp_to(supported_efforts(&model)))
        .map(|effort| OpenAiReasoning { effort });

    let text = options
        .verbosity
        .filter(|_| supports_verbosity(&model))
        .map(|verbosity| OpenAiTextConfig { verbosity });

    OpenAiRequest {
        max_output_tokens: resolve_max_tokens(Provider::OpenAi, options),
        instructions: collect_system(messages, options),
        input: conversation(messages).map(convert_message).collect(),
        reasoning,
        text,
        stream,
        model,
    }
}

fn convert_message(message: &Message) -> OpenAiInputItem {
    let assistant = message.role == MessageRole::Assistant;
    OpenAiInputItem {
        role: if assistant { "assistant" } else { "user" },
        content: message
            .content
            .blocks()
            .iter()
            .map(|b| convert_block(b, assistant))
            .collect(),
    }
}

fn convert_block(block: &ContentBlock, assistant: bool) -> Value {
    let text_type = if assistant { "output_text" } else { "input_text" };
    match block {
        ContentBlock::Text { text } => json!({ "type": text_type, "text": text }),
        ContentBlock::Document {
            media_type,
            data,
            title,
        } if !assistant => json!({
            "type": "input_file",
            "filename": title.as_deref().unwrap_or("attachment"),
            "file_data": format!("data:{media_type};base64,{data}"),
        }),
        other => json!({ "type": text_type, "text": other.to_flat_text() }),
    }
}
