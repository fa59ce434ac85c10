//! Message normalization: provider-agnostic messages and options in, one
//! provider's request body out.
//!
//! Every builder is a pure function. Nothing here fails: a configuration the
//! selected model cannot honor is clamped to the nearest supported value
//! instead of being rejected.
//!
//! | Provider | Wire shape | Structured blocks |
//! |----------|-----------|-------------------|
//! | [`anthropic`] | Messages API | native (`text`, `document`, passthrough) |
//! | [`openai`] | Responses API | `input_text` / `input_file`, opaque → JSON text |
//! | [`gemini`] | `generateContent` | `text` / `inline_data` parts, opaque → JSON text |
//! | [`grok`] | chat completions | flattened to one string per message |

pub mod anthropic;
pub mod gemini;
pub mod grok;
pub mod openai;

use serde::Serialize;

use crate::provider::Provider;
use crate::{CallOptions, Message, MessageRole, ReasoningEffort};

pub use anthropic::AnthropicRequest;
pub use gemini::GeminiRequest;
pub use grok::GrokRequest;
pub use openai::OpenAiRequest;

/// A request body for exactly one provider.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum ProviderRequest {
    Anthropic(AnthropicRequest),
    OpenAi(OpenAiRequest),
    Gemini(GeminiRequest),
    Grok(GrokRequest),
}

impl ProviderRequest {
    pub fn provider(&self) -> Provider {
        match self {
            ProviderRequest::Anthropic(_) => Provider::Anthropic,
            ProviderRequest::OpenAi(_) => Provider::OpenAi,
            ProviderRequest::Gemini(_) => Provider::Gemini,
            ProviderRequest::Grok(_) => Provider::Grok,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            ProviderRequest::Anthropic(r) => &r.model,
            ProviderRequest::OpenAi(r) => &r.model,
            ProviderRequest::Gemini(r) => &r.model,
            ProviderRequest::Grok(r) => &r.model,
        }
    }

    /// The output token ceiling after clamping.
    pub fn max_tokens(&self) -> u32 {
        match self {
            ProviderRequest::Anthropic(r) => r.max_tokens,
            ProviderRequest::OpenAi(r) => r.max_output_tokens,
            ProviderRequest::Gemini(r) => r.generation_config.max_output_tokens,
            ProviderRequest::Grok(r) => r.max_tokens,
        }
    }
}

/// Build the request body for `provider`.
pub fn build_request(
    provider: Provider,
    messages: &[Message],
    options: &CallOptions,
    stream: bool,
) -> ProviderRequest {
    match provider {
        Provider::Anthropic => {
            ProviderRequest::Anthropic(anthropic::build(messages, options, stream))
        }
        Provider::OpenAi => ProviderRequest::OpenAi(openai::build(messages, options, stream)),
        Provider::Gemini => ProviderRequest::Gemini(gemini::build(messages, options, stream)),
        Provider::Grok => ProviderRequest::Grok(grok::build(messages, options, stream)),
    }
}

// ── Shared helpers ────────────────────────────────────────────────

/// Resolve the model: the caller's choice, or the provider default.
pub fn resolve_model(provider: Provider, options: &CallOptions) -> String {
    options
        .model
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(provider.default_model())
        .to_string()
}

pub(crate) fn resolve_max_tokens(provider: Provider, options: &CallOptions) -> u32 {
    options
        .max_tokens
        .filter(|&t| t > 0)
        .unwrap_or(provider.default_max_tokens())
}

/// Combine the options' system prompt with any system-role messages, in
/// that order. `None` when nothing is left after trimming.
pub(crate) fn collect_system(messages: &[Message], options: &CallOptions) -> Option<String> {
    let parts: Vec<String> = options
        .system_prompt
        .iter()
        .cloned()
        .chain(
            messages
                .iter()
                .filter(|m| m.role == MessageRole::System)
                .map(|m| m.content.to_flat_text()),
        )
        .filter(|s| !s.trim().is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

/// Messages that travel in the conversation body (everything but system).
pub(crate) fn conversation(messages: &[Message]) -> impl Iterator<Item = &Message> {
    messages.iter().filter(|m| m.role != MessageRole::System)
}

/// Thinking budget implied by a reasoning level, for budget-based providers.
pub(crate) fn budget_for_level(level: ReasoningEffort) -> u32 {
    match level {
        ReasoningEffort::None | ReasoningEffort::Minimal => 0,
        ReasoningEffort::Low => 2048,
        ReasoningEffort::Medium => 8192,
        ReasoningEffort::High => 16384,
        ReasoningEffort::Xhigh => 32000,
    }
}

/// The thinking budget the caller asked for, before any model clamp.
///
/// `Some(0)` means "off". `None` means "not specified".
pub(crate) fn requested_budget(options: &CallOptions) -> Option<u32> {
    if options.disable_thinking {
        return Some(0);
    }
    options
        .thinking_budget
        .or_else(|| options.reasoning_level.map(budget_for_level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_precedes_system_messages() {
        let messages = vec![
            Message::system("from message"),
            Message::user("hi"),
            Message::system("  "),
        ];
        let options = CallOptions::default().with_system_prompt("from options");
        assert_eq!(
            collect_system(&messages, &options).as_deref(),
            Some("from options\n\nfrom message")
        );
        assert_eq!(collect_system(&[], &CallOptions::default()), None);
    }

    #[test]
    fn defaults_fill_missing_model_and_tokens() {
        let options = CallOptions::default();
        assert_eq!(resolve_model(Provider::OpenAi, &options), "gpt-5");
        assert_eq!(resolve_max_tokens(Provider::Anthropic, &options), 8192);

        let zero = CallOptions::default().with_max_tokens(0).with_model(" ");
        assert_eq!(resolve_max_tokens(Provider::Grok, &zero), 8192);
        assert_eq!(resolve_model(Provider::Grok, &zero), "grok-4");
    }

    #[test]
    fn disable_thinking_wins_over_budget() {
        let options = CallOptions::default()
            .with_thinking_budget(5000)
            .with_thinking_disabled();
        assert_eq!(requested_budget(&options), Some(0));

        let level = CallOptions::default().with_reasoning_level(ReasoningEffort::Medium);
        assert_eq!(requested_budget(&level), Some(8192));
        assert_eq!(requested_budget(&CallOptions::default()), None);
    }

    #[test]
    fn dispatch_matches_provider() {
        let messages = vec![Message::user("ping")];
        for provider in Provider::ALL {
            let req = build_request(provider, &messages, &CallOptions::default(), false);
            assert_eq!(req.provider(), provider);
            assert_eq!(req.model(), provider.default_model());
        }
    }

    #[test]
    fn message_order_is_preserved() {
        let messages = vec![
            Message::user("one"),
            Message::assistant("two"),
            Message::user("three"),
        ];
        for provider in Provider::ALL {
            let body = serde_json::to_string(&build_request(
                provider,
                &messages,
                &CallOptions::default(),
                false,
            ))
            .unwrap();
            let (a, b, c) = (
                body.find("one").unwrap(),
                body.find("two").unwrap(),
                body.find("three").unwrap(),
            );
            assert!(a < b && b < c, "{provider}: {body}");
        }
    }
}
