//! Buffered response parsing.
//!
//! Each provider answers in its own shape. [`ProviderResponse`] is a closed
//! union with one variant per provider, and each variant knows how to report
//! its text, usage and truncation state. Adding a provider without handling
//! it here is a compile error.

use serde::Deserialize;

use crate::api::usage::TokenUsage;
use crate::error::CourierError;
use crate::is_truncation_reason;
use crate::provider::Provider;

/// A parsed success body from one provider.
#[derive(Debug, Clone)]
pub enum ProviderResponse {
    Anthropic(AnthropicResponse),
    OpenAi(OpenAiResponse),
    Gemini(GeminiResponse),
    Grok(GrokResponse),
}

impl ProviderResponse {
    /// Parse a success body. Malformed JSON becomes [`CourierError::Decode`].
    pub fn parse(provider: Provider, body: &str) -> Result<Self, CourierError> {
        let decode = |e: serde_json::Error| CourierError::Decode {
            provider,
            message: e.to_string(),
        };
        Ok(match provider {
            Provider::Anthropic => ProviderResponse::Anthropic(serde_json::from_str(body).map_err(decode)?),
            Provider::OpenAi => ProviderResponse::OpenAi(serde_json::from_str(body).map_err(decode)?),
            Provider::Gemini => ProviderResponse::Gemini(serde_json::from_str(body).map_err(decode)?),
            Provider::Grok => ProviderResponse::Grok(serde_json::from_str(body).map_err(decode)?),
        })
    }

    pub fn provider(&self) -> Provider {
        match self {
            ProviderResponse::Anthropic(_) => Provider::Anthropic,
            ProviderResponse::OpenAi(_) => Provider::OpenAi,
            ProviderResponse::Gemini(_) => Provider::Gemini,
            ProviderResponse::Grok(_) => Provider::Grok,
        }
    }

    /// Whether output stopped at the token ceiling.
    pub fn is_truncated(&self) -> bool {
        match self {
            ProviderResponse::Anthropic(r) => r.stop_reason.as_deref().is_some_and(is_truncation_reason),
            ProviderResponse::OpenAi(r) => {
                r.status.as_deref() == Some("incomplete")
                    && r
                        .incomplete_details
                        .as_ref()
                        .and_then(|d| d.reason.as_deref())
                        .is_none_or(is_truncation_reason)
            }
            ProviderResponse::Gemini(r) => r
                .candidates
                .first()
                .and_then(|c| c.finish_reason.as_deref())
                .is_some_and(is_truncation_reason),
            ProviderResponse::Grok(r) => r
                .choices
                .first()
                .and_then(|c| c.finish_reason.as_deref())
                .is_some_and(is_truncation_reason),
        }
    }

    /// Token counts reported by the provider. Missing fields count as zero.
    pub fn usage(&self) -> TokenUsage {
        match self {
            ProviderResponse::Anthropic(r) => r
                .usage
                .as_ref()
                .map(|u| TokenUsage {
                    input: u.input_tokens,
                    output: u.output_tokens,
                    cache_read: u.cache_read_input_tokens,
                    cache_creation: u.cache_creation_input_tokens,
                })
                .unwrap_or_default(),
            ProviderResponse::OpenAi(r) => r
                .usage
                .as_ref()
                .map(|u| TokenUsage {
                    input: u.input_tokens,
                    output: u.output_tokens,
                    cache_read: u
                        .input_tokens_details
                        .as_ref()
                        .map_or(0, |d| d.cached_tokens),
                    cache_creation: 0,
                })
                .unwrap_or_default(),
            ProviderResponse::Gemini(r) => r
                .usage_metadata
                .as_ref()
                .map(|u| TokenUsage {
                    input: u.prompt_token_count,
                    // Thinking tokens are billed as output.
                    output: u.candidates_token_count + u.thoughts_token_count,
                    cache_read: u.cached_content_token_count,
                    cache_creation: 0,
                })
                .unwrap_or_default(),
            ProviderResponse::Grok(r) => r
                .usage
                .as_ref()
                .map(|u| TokenUsage {
                    input: u.prompt_tokens,
                    output: u.completion_tokens,
                    cache_read: u
                        .prompt_tokens_details
                        .as_ref()
                        .map_or(0, |d| d.cached_tokens),
                    cache_creation: 0,
                })
                .unwrap_or_default(),
        }
    }

    /// The final answer: the first non-thinking segment carrying text,
    /// trimmed. Empty when the response has no such segment.
    pub fn text(&self) -> String {
        let found = match self {
            ProviderResponse::Anthropic(r) => r
                .content
                .iter()
                .filter(|b| b.block_type == "text")
                .find_map(|b| b.text.as_deref().filter(|t| !t.trim().is_empty())),
            ProviderResponse::OpenAi(r) => r
                .output
                .iter()
                .filter(|item| item.item_type == "message")
                .flat_map(|item| item.content.iter())
                .filter(|part| part.part_type == "output_text")
                .find_map(|part| part.text.as_deref().filter(|t| !t.trim().is_empty()))
                .or(r.output_text.as_deref()),
            ProviderResponse::Gemini(r) => r
                .candidates
                .first()
                .and_then(|c| c.content.as_ref())
                .and_then(|content| {
                    content
                        .parts
                        .iter()
                        .filter(|p| !p.thought)
                        .find_map(|p| p.text.as_deref().filter(|t| !t.trim().is_empty()))
                }),
            ProviderResponse::Grok(r) => r
                .choices
                .first()
                .and_then(|c| c.message.as_ref())
                .and_then(|m| m.content.as_deref()),
        };
        found.map(str::trim).unwrap_or_default().to_string()
    }
}

// ── Anthropic ─────────────────────────────────────────────────────

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AnthropicResponse {
    pub content: Vec<AnthropicBlock>,
    pub stop_reason: Option<String>,
    pub usage: Option<AnthropicUsage>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AnthropicBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    pub text: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct AnthropicUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_input_tokens: u64,
    pub cache_creation_input_tokens: u64,
}

// ── OpenAI ────────────────────────────────────────────────────────

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct OpenAiResponse {
    pub status: Option<String>,
    pub output: Vec<OpenAiOutputItem>,
    /// Convenience aggregate some relays add alongside `output`.
    pub output_text: Option<String>,
    pub incomplete_details: Option<OpenAiIncompleteDetails>,
    pub usage: Option<OpenAiUsage>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct OpenAiOutputItem {
    #[serde(rename = "type")]
    pub item_type: String,
    pub content: Vec<OpenAiOutputPart>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct OpenAiOutputPart {
    #[serde(rename = "type")]
    pub part_type: String,
    pub text: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct OpenAiIncompleteDetails {
    pub reason: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct OpenAiUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub input_tokens_details: Option<CachedTokens>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct CachedTokens {
    pub cached_tokens: u64,
}

// ── Gemini ────────────────────────────────────────────────────────

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct GeminiResponse {
    pub candidates: Vec<GeminiCandidate>,
    pub usage_metadata: Option<GeminiUsage>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct GeminiCandidate {
    pub content: Option<GeminiCandidateContent>,
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct GeminiCandidateContent {
    pub parts: Vec<GeminiPart>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct GeminiPart {
    pub text: Option<String>,
    pub thought: bool,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct GeminiUsage {
    pub prompt_token_count: u64,
    pub candidates_token_count: u64,
    pub thoughts_token_count: u64,
    pub cached_content_token_count: u64,
}

// ── Grok ──────────────────────────────────────────────────────────

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct GrokResponse {
    pub choices: Vec<GrokChoice>,
    pub usage: Option<GrokUsage>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct GrokChoice {
    pub message: Option<GrokResponseMessage>,
    pub finish_reason: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct GrokResponseMessage {
    /// The answer. Reasoning models also send `reasoning_content`, which is
    /// never part of the answer and is left undecoded.
    pub content: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct GrokUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub prompt_tokens_details: Option<CachedTokens>,
}
