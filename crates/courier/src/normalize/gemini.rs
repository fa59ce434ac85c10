//! Gemini `generateContent` request builder.
//!
//! Gemini 2.5 models take a numeric `thinkingBudget` whose valid range
//! depends on the tier (Pro cannot turn thinking off). Gemini 3 models take a
//! `thinkingLevel` instead.

use serde::Serialize;
use serde_json::{Value, json};

use super::{collect_system, conversation, requested_budget, resolve_max_tokens, resolve_model};
use crate::provider::Provider;
use crate::{CallOptions, ContentBlock, Message, MessageRole, ReasoningEffort, THINKING_MARGIN_TOKENS};

/// Largest `maxOutputTokens` any current Gemini model accepts.
pub const MAX_OUTPUT_CEILING: u32 = 65_536;

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiContent>,
    pub contents: Vec<GeminiContent>,
    pub generation_config: GeminiGenerationConfig,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<&'static str>,
    pub parts: Vec<Value>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    pub max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_config: Option<GeminiThinkingConfig>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GeminiThinkingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_budget: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking_level: Option<ReasoningEffort>,
    pub include_thoughts: bool,
}

/// Valid thinking budget range for a budget-based model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetRange {
    pub min: u32,
    pub max: u32,
    pub can_disable: bool,
}

impl BudgetRange {
    pub fn clamp(self, requested: u32) -> u32 {
        if requested == 0 && self.can_disable {
            0
        } else {
            requested.clamp(self.min, self.max)
        }
    }
}

/// Budget range for 2.5-series models. `None` for models without a numeric
/// budget (Gemini 3 and pre-2.5 models).
pub fn budget_range(model: &str) -> Option<BudgetRange> {
    let m = model.to_ascii_lowercase();
    if !m.contains("2.5") {
        None
    } else if m.contains("pro") {
        Some(BudgetRange {
            min: 128,
            max: 32_768,
            can_disable: false,
        })
    } else if m.contains("flash-lite") {
        Some(BudgetRange {
            min: 512,
            max: 24_576,
            can_disable: true,
        })
    } else {
        Some(BudgetRange {
            min: 1,
            max: 24_576,
            can_disable: true,
        })
    }
}

fn uses_thinking_level(model: &str) -> bool {
    model.to_ascii_lowercase().starts_with("gemini-3")
}

pub(crate) fn build(messages: &[Message], options: &CallOptions, stream: bool) -> GeminiRequest {
    let model = resolve_model(Provider::Gemini, options);
    let mut max_output_tokens = resolve_max_tokens(Provider::Gemini, options);

    let thinking_config = if uses_thinking_level(&model) {
        let requested = if options.disable_thinking {
            Some(ReasoningEffort::Low)
        } else {
            options.reasoning_level
        };
        requested
            .and_then(|level| level.clamp_to(&[ReasoningEffort::Low, ReasoningEffort::High]))
            .map(|level| GeminiThinkingConfig {
                thinking_budget: None,
                thinking_level: Some(level),
                include_thoughts: false,
            })
    } else {
        budget_range(&model)
            .zip(requested_budget(options))
            .map(|(range, requested)| GeminiThinkingConfig {
                thinking_budget: Some(range.clamp(requested)),
                thinking_level: None,
                include_thoughts: false,
            })
    };

    if let Some(budget) = thinking_config.as_ref().and_then(|c| c.thinking_budget)
        && budget > 0
    {
        max_output_tokens = max_output_tokens.max(budget + THINKING_MARGIN_TOKENS);
    }

    GeminiRequest {
        system_instruction: collect_system(messages, options).map(|text| GeminiContent {
            role: None,
            parts: vec![json!({ "text": text })],
        }),
        contents: conversation(messages).map(convert_message).collect(),
        generation_config: GeminiGenerationConfig {
            max_output_tokens: max_output_tokens.min(MAX_OUTPUT_CEILING),
            thinking_config,
        },
        stream,
        model,
    }
}

fn convert_message(message: &Message) -> GeminiContent {
    GeminiContent {
        role: Some(match message.role {
            MessageRole::Assistant => "model",
            _ => "user",
        }),
        parts: message.content.blocks().iter().map(convert_block).collect(),
    }
}

fn convert_block(block: &ContentBlock) -> Value {
    match block {
        ContentBlock::Text { text } => json!({ "text": text }),
        ContentBlock::Document {
            media_type, data, ..
        } => json!({ "inline_data": { "mime_type": media_type, "data": data } }),
        ContentBlock::Opaque { .. } => json!({ "text": block.to_flat_text() }),
    }
}
