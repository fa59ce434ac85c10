//! Relay event-stream decoding.
//!
//! The relay's `/stream` endpoints answer with newline-terminated frames, one
//! JSON [`StreamEvent`] per frame behind a `data:` prefix, whatever the
//! upstream provider:
//!
//! ```text
//! data: {"type":"text","text":"He"}
//! data: {"type":"text","text":"llo"}
//! data: {"type":"done","usage":{"input":12,"output":2}}
//! ```
//!
//! Network reads split frames at arbitrary byte boundaries, so
//! [`FrameDecoder`] keeps an append-only byte buffer and only ever hands back
//! complete lines. [`decode_stream`] drives a decoder over a transport body,
//! accumulating text and reporting it to a callback.

use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::transport::ByteStream;
use super::usage::{TokenUsage, UsageTracker};
use crate::error::CourierError;
use crate::is_truncation_reason;
use crate::provider::Provider;

/// Prefix that marks a frame line.
pub const FRAME_PREFIX: &str = "data:";

/// One decoded frame.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// An incremental piece of the answer.
    Text {
        #[serde(default)]
        text: String,
    },
    /// An in-band failure reported by the relay after the stream opened.
    Error {
        #[serde(default)]
        error: Value,
    },
    /// Generation finished. Does not end the stream by itself.
    Done {
        #[serde(default)]
        usage: Option<TokenUsage>,
        #[serde(default, alias = "finishReason")]
        finish_reason: Option<String>,
    },
}

impl StreamEvent {
    /// Human-readable message of an `error` frame. The relay sends either a
    /// bare string or an object with a `message` field.
    pub fn error_message(error: &Value) -> String {
        match error {
            Value::String(s) => s.clone(),
            Value::Null => "stream error".to_string(),
            other => other
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| other.to_string()),
        }
    }
}

/// Parse one complete line. Blank lines, comments, keep-alives and payloads
/// that are not a known event all yield `None`.
pub fn parse_frame(line: &str) -> Option<StreamEvent> {
    let data = line.trim_end_matches('\r').strip_prefix(FRAME_PREFIX)?;
    let data = data.strip_prefix(' ').unwrap_or(data);
    match serde_json::from_str(data) {
        Ok(event) => Some(event),
        Err(e) => {
            trace!("Skipping unparseable frame: {e}");
            None
        }
    }
}

/// Reassembles frames from arbitrarily split byte chunks.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every event completed by it, in order.
    ///
    /// Bytes after the last newline stay buffered until a later chunk
    /// completes the line. Lines are decoded as UTF-8 only once complete, so
    /// a multi-byte character split across chunks is never mangled.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        // The buffer never holds a newline between pushes, so only the new
        // bytes need scanning.
        let Some(last_newline) = chunk.iter().rposition(|&b| b == b'\n') else {
            self.buffer.extend_from_slice(chunk);
            return Vec::new();
        };
        let start = self.buffer.len();
        self.buffer.extend_from_slice(chunk);
        let rest = self.buffer.split_off(start + last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, rest);

        complete
            .split(|&b| b == b'\n')
            .filter(|line| !line.is_empty())
            .filter_map(|line| parse_frame(&String::from_utf8_lossy(line)))
            .collect()
    }

    /// Number of buffered bytes not yet terminated by a newline.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// Consume a relay event stream to completion.
///
/// `on_text` is called after every non-empty text frame with the full text
/// accumulated so far. Usage from `done` frames is merged into `usage`. The
/// trimmed accumulated text is returned once the transport reports the end of
/// the body. An unterminated final line is dropped.
///
/// # Errors
///
/// - [`CourierError::Stream`] for an `error` frame or a failed chunk read.
/// - [`CourierError::Truncated`] for a `done` frame carrying a token-limit
///   finish reason.
/// - [`CourierError::Cancelled`] when `cancel` fires between or during reads.
pub async fn decode_stream(
    provider: Provider,
    mut body: ByteStream,
    cancel: &CancellationToken,
    usage: &UsageTracker,
    mut on_text: impl FnMut(&str),
) -> Result<String, CourierError> {
    let mut decoder = FrameDecoder::new();
    let mut text = String::new();
    let mut frames = 0usize;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(CourierError::Cancelled),
            next = body.next() => next,
        };
        let Some(chunk) = next else { break };
        let chunk = chunk?;

        for event in decoder.push(&chunk) {
            frames += 1;
            match event {
                StreamEvent::Text { text: delta } => {
                    if delta.is_empty() {
                        continue;
                    }
                    text.push_str(&delta);
                    on_text(&text);
                }
                StreamEvent::Error { error } => {
                    return Err(CourierError::Stream(StreamEvent::error_message(&error)));
                }
                StreamEvent::Done {
                    usage: reported,
                    finish_reason,
                } => {
                    if finish_reason.as_deref().is_some_and(is_truncation_reason) {
                        return Err(CourierError::Truncated { provider });
                    }
                    if let Some(reported) = reported {
                        usage.merge(reported);
                    }
                }
            }
        }
    }

    if decoder.pending() > 0 {
        debug!(
            "Stream ended with {} unterminated bytes; dropping partial frame",
            decoder.pending()
        );
    }
    debug!("Stream completed with {frames} frames ({} chars)", text.len());
    Ok(text.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    const HELLO: &str = concat!(
        "data: {\"type\":\"text\",\"text\":\"He\"}\n",
        "data: {\"type\":\"text\",\"text\":\"llo\"}\n",
        "data: {\"type\":\"done\"}\n",
    );

    fn body(chunks: Vec<Vec<u8>>) -> ByteStream {
        Box::pin(stream::iter(chunks.into_iter().map(Ok)))
    }

    async fn decode(chunks: Vec<Vec<u8>>) -> (Result<String, CourierError>, Vec<String>) {
        let mut seen = Vec::new();
        let result = decode_stream(
            Provider::Anthropic,
            body(chunks),
            &CancellationToken::new(),
            &UsageTracker::new(),
            |t| seen.push(t.to_string()),
        )
        .await;
        (result, seen)
    }

    #[test]
    fn parse_frame_variants() {
        assert_eq!(
            parse_frame(r#"data: {"type":"text","text":"a"}"#),
            Some(StreamEvent::Text { text: "a".into() })
        );
        assert_eq!(
            parse_frame("data:{\"type\":\"done\",\"finishReason\":\"stop\"}\r"),
            Some(StreamEvent::Done {
                usage: None,
                finish_reason: Some("stop".into())
            })
        );
        assert_eq!(parse_frame(": keep-alive"), None);
        assert_eq!(parse_frame("data: [DONE]"), None);
        assert_eq!(parse_frame(r#"data: {"type":"ping"}"#), None);
        assert_eq!(parse_frame(r#"event: {"type":"text","text":"a"}"#), None);
    }

    #[test]
    fn error_message_shapes() {
        assert_eq!(StreamEvent::error_message(&Value::from("boom")), "boom");
        assert_eq!(
            StreamEvent::error_message(&serde_json::json!({"message": "overloaded"})),
            "overloaded"
        );
        assert_eq!(StreamEvent::error_message(&Value::Null), "stream error");
    }

    #[test]
    fn decoder_rebuffers_partial_line() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: {\"type\":\"te").is_empty());
        assert!(decoder.pending() > 0);
        let events = decoder.push(b"xt\",\"text\":\"hi\"}\ndata: {");
        assert_eq!(events, vec![StreamEvent::Text { text: "hi".into() }]);
        assert_eq!(decoder.pending(), "data: {".len());
    }

    #[test]
    fn decoder_handles_long_frame_fed_one_byte_at_a_time() {
        let long = "x".repeat(4096);
        let frame = format!("data: {{\"type\":\"text\",\"text\":\"{long}\"}}\ndata: {{");
        let mut decoder = FrameDecoder::new();
        let mut events = Vec::new();
        for byte in frame.as_bytes() {
            events.extend(decoder.push(std::slice::from_ref(byte)));
        }
        assert_eq!(events, vec![StreamEvent::Text { text: long }]);
        assert_eq!(decoder.pending(), "data: {".len());

        let events = decoder.push(b"\"type\":\"done\"}\n");
        assert!(matches!(events.as_slice(), [StreamEvent::Done { .. }]));
        assert_eq!(decoder.pending(), 0);
    }

    #[tokio::test]
    async fn reconstructs_two_chunk_split() {
        let (head, tail) = HELLO.as_bytes().split_at(20);
        let (result, seen) = decode(vec![head.to_vec(), tail.to_vec()]).await;
        assert_eq!(result.unwrap(), "Hello");
        assert_eq!(seen, vec!["He", "Hello"]);
    }

    #[tokio::test]
    async fn every_split_point_yields_same_text() {
        let frames = concat!(
            "data: {\"type\":\"text\",\"text\":\"Grüße \"}\n",
            "data: {\"type\":\"text\",\"text\":\"日本語 ✓\"}\n",
            "data: {\"type\":\"done\"}\n",
        )
        .as_bytes();
        for split in 0..=frames.len() {
            let (head, tail) = frames.split_at(split);
            let (result, _) = decode(vec![head.to_vec(), tail.to_vec()]).await;
            assert_eq!(result.unwrap(), "Grüße 日本語 ✓", "split at {split}");
        }

        let bytewise = frames.iter().map(|b| vec![*b]).collect();
        let (result, seen) = decode(bytewise).await;
        assert_eq!(result.unwrap(), "Grüße 日本語 ✓");
        assert_eq!(seen.len(), 2);
    }

    #[tokio::test]
    async fn callbacks_grow_monotonically() {
        let frames: String = (0..20)
            .map(|i| format!("data: {{\"type\":\"text\",\"text\":\"{i},\"}}\n"))
            .collect();
        let chunks = frames.as_bytes().chunks(7).map(<[u8]>::to_vec).collect();
        let (_, seen) = decode(chunks).await;
        assert_eq!(seen.len(), 20);
        for pair in seen.windows(2) {
            assert!(pair[1].starts_with(&pair[0]));
            assert!(pair[1].len() > pair[0].len());
        }
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() {
        let frames = concat!(
            "data: {\"type\":\"text\",\"text\":\"a\"}\n",
            "data: {not json\n",
            ": comment\n",
            "\n",
            "data: {\"type\":\"text\",\"text\":\"b\"}\n",
        );
        let (result, seen) = decode(vec![frames.as_bytes().to_vec()]).await;
        assert_eq!(result.unwrap(), "ab");
        assert_eq!(seen, vec!["a", "ab"]);
    }

    #[tokio::test]
    async fn crlf_line_endings_accepted() {
        let frames = "data: {\"type\":\"text\",\"text\":\"x\"}\r\ndata: {\"type\":\"done\"}\r\n";
        let (result, _) = decode(vec![frames.as_bytes().to_vec()]).await;
        assert_eq!(result.unwrap(), "x");
    }

    #[tokio::test]
    async fn trailing_partial_frame_is_dropped() {
        let frames = "data: {\"type\":\"text\",\"text\":\"kept\"}\ndata: {\"type\":\"text\",\"text\":\"lost\"}";
        let (result, seen) = decode(vec![frames.as_bytes().to_vec()]).await;
        assert_eq!(result.unwrap(), "kept");
        assert_eq!(seen, vec!["kept"]);
    }

    #[tokio::test]
    async fn error_frame_raises() {
        let frames = "data: {\"type\":\"text\",\"text\":\"a\"}\ndata: {\"type\":\"error\",\"error\":{\"message\":\"overloaded\"}}\n";
        let (result, _) = decode(vec![frames.as_bytes().to_vec()]).await;
        match result.unwrap_err() {
            CourierError::Stream(msg) => assert_eq!(msg, "overloaded"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn truncated_done_raises() {
        let frames = "data: {\"type\":\"text\",\"text\":\"a\"}\ndata: {\"type\":\"done\",\"finishReason\":\"max_tokens\"}\n";
        let (result, _) = decode(vec![frames.as_bytes().to_vec()]).await;
        assert!(result.unwrap_err().is_truncated());
    }

    #[tokio::test]
    async fn done_usage_is_merged_and_stream_continues() {
        let frames = concat!(
            "data: {\"type\":\"done\",\"usage\":{\"input\":7,\"output\":3}}\n",
            "data: {\"type\":\"text\",\"text\":\"late\"}\n",
        );
        let tracker = UsageTracker::new();
        let result = decode_stream(
            Provider::Grok,
            body(vec![frames.as_bytes().to_vec()]),
            &CancellationToken::new(),
            &tracker,
            |_| {},
        )
        .await;
        assert_eq!(result.unwrap(), "late");
        assert_eq!(tracker.read(), TokenUsage::new(7, 3));
    }

    #[tokio::test]
    async fn repeated_done_usage_saturates() {
        let frames = concat!(
            "data: {\"type\":\"done\",\"usage\":{\"input\":18446744073709551615}}\n",
            "data: {\"type\":\"done\",\"usage\":{\"input\":1}}\n",
        );
        let tracker = UsageTracker::new();
        let result = decode_stream(
            Provider::Anthropic,
            body(vec![frames.as_bytes().to_vec()]),
            &CancellationToken::new(),
            &tracker,
            |_| {},
        )
        .await;
        assert_eq!(result.unwrap(), "");
        assert_eq!(tracker.read().input, u64::MAX);
    }

    #[tokio::test]
    async fn cancelled_while_waiting_for_chunk() {
        let cancel = CancellationToken::new();
        let stalled: ByteStream = Box::pin(
            stream::iter(vec![Ok(b"data: {\"type\":\"text\",\"text\":\"a\"}\n".to_vec())])
                .chain(stream::pending()),
        );
        let trigger = cancel.clone();
        let mut seen = Vec::new();
        let result = decode_stream(
            Provider::OpenAi,
            stalled,
            &cancel,
            &UsageTracker::new(),
            |t| {
                seen.push(t.to_string());
                trigger.cancel();
            },
        )
        .await;
        assert!(result.unwrap_err().is_cancelled());
        assert_eq!(seen, vec!["a"]);
    }
}
