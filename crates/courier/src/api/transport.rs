//! The network boundary.
//!
//! [`Transport`] is the only thing that touches the network: a JSON
//! request/response exchange for buffered calls, and a response whose body
//! arrives as a sequence of byte chunks for streaming calls.
//! [`HttpTransport`] implements it with `reqwest`; [`ScriptedTransport`] is a
//! queue-based fake for tests.

use futures::Stream;
use futures::stream::{self, StreamExt};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use tracing::trace;

use crate::error::CourierError;

/// Boxed future returned by [`Transport`] methods.
pub type TransportFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, CourierError>> + Send + 'a>>;

/// A response body delivered chunk by chunk. The stream ending is the
/// transport's end-of-body signal.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, CourierError>> + Send>>;

/// An outbound JSON POST.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A fully buffered response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A response whose body has not been read yet.
pub struct StreamResponse {
    pub status: u16,
    pub body: ByteStream,
}

impl StreamResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Drain the body into a string. Used to read error bodies on a failed
    /// stream open.
    pub async fn into_text(mut self) -> String {
        let mut bytes = Vec::new();
        while let Some(Ok(chunk)) = self.body.next().await {
            bytes.extend_from_slice(&chunk);
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl std::fmt::Debug for StreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// HTTP primitive used by the client.
///
/// Implementations report non-success statuses as ordinary responses; only
/// failures to get a response at all are errors.
pub trait Transport: Send + Sync {
    /// POST a JSON body and read the whole response.
    fn send(&self, request: HttpRequest) -> TransportFuture<'_, HttpResponse>;

    /// POST a JSON body and hand back the response with an unread body.
    fn open_stream(&self, request: HttpRequest) -> TransportFuture<'_, StreamResponse>;
}

// ── reqwest ───────────────────────────────────────────────────────

/// [`Transport`] over a `reqwest::Client`.
///
/// No request timeout is set: long generations are the reason streaming
/// exists, and a fixed deadline would cut them off.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str) -> Result<Self, CourierError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| CourierError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn post(&self, request: &HttpRequest) -> reqwest::RequestBuilder {
        let mut builder = self.client.post(&request.url).json(&request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        builder
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: HttpRequest) -> TransportFuture<'_, HttpResponse> {
        Box::pin(async move {
            let resp = self
                .post(&request)
                .send()
                .await
                .map_err(|e| CourierError::Transport(e.to_string()))?;
            let status = resp.status().as_u16();
            let body = resp
                .text()
                .await
                .map_err(|e| CourierError::Transport(format!("failed to read response: {e}")))?;
            Ok(HttpResponse { status, body })
        })
    }

    fn open_stream(&self, request: HttpRequest) -> TransportFuture<'_, StreamResponse> {
        Box::pin(async move {
            let resp = self
                .post(&request)
                .send()
                .await
                .map_err(|e| CourierError::Transport(e.to_string()))?;
            let status = resp.status().as_u16();

            // Read incrementally via chunk() so long responses never wait on
            // a single whole-body read.
            let body = stream::unfold(Some(resp), |state| async move {
                let mut resp = state?;
                match resp.chunk().await {
                    Ok(Some(chunk)) => Some((Ok(chunk.to_vec()), Some(resp))),
                    Ok(None) => None,
                    Err(e) => Some((
                        Err(CourierError::Stream(format!(
                            "failed to read streaming chunk: {e}"
                        ))),
                        None,
                    )),
                }
            });

            Ok(StreamResponse {
                status,
                body: Box::pin(body),
            })
        })
    }
}

// ── Scripted fake ─────────────────────────────────────────────────

/// One scripted outcome for a [`ScriptedTransport`] call.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// A buffered response.
    Response { status: u16, body: String },
    /// A streamed response delivered as these chunks, in order.
    Stream { status: u16, chunks: Vec<Vec<u8>> },
    /// A stream that yields these chunks, then fails mid-body.
    BrokenStream { chunks: Vec<Vec<u8>>, error: String },
    /// A stream that yields these chunks and then never ends.
    StalledStream { chunks: Vec<Vec<u8>> },
    /// No response at all.
    TransportError(String),
    /// A request that never completes.
    Hang,
}

impl ScriptedReply {
    pub fn json(status: u16, body: serde_json::Value) -> Self {
        ScriptedReply::Response {
            status,
            body: body.to_string(),
        }
    }

    pub fn stream<S: AsRef<[u8]>>(chunks: impl IntoIterator<Item = S>) -> Self {
        ScriptedReply::Stream {
            status: 200,
            chunks: chunks.into_iter().map(|c| c.as_ref().to_vec()).collect(),
        }
    }
}

/// Queue-based [`Transport`] fake.
///
/// Each call pops the next [`ScriptedReply`] and records the request for
/// later assertions. Once the queue is empty every call fails with a
/// transport error.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    replies: Arc<Mutex<VecDeque<ScriptedReply>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies(replies: impl IntoIterator<Item = ScriptedReply>) -> Self {
        let transport = Self::new();
        for reply in replies {
            transport.push(reply);
        }
        transport
    }

    pub fn push(&self, reply: ScriptedReply) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn next(&self, request: HttpRequest) -> ScriptedReply {
        trace!(url = %request.url, "scripted transport call");
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| ScriptedReply::TransportError("no scripted reply left".into()))
    }
}

fn chunk_stream(chunks: Vec<Vec<u8>>) -> impl Stream<Item = Result<Vec<u8>, CourierError>> + Send {
    stream::iter(chunks.into_iter().map(Ok))
}

fn boxed(body: impl Stream<Item = Result<Vec<u8>, CourierError>> + Send + 'static) -> ByteStream {
    Box::pin(body)
}

impl Transport for ScriptedTransport {
    fn send(&self, request: HttpRequest) -> TransportFuture<'_, HttpResponse> {
        let reply = self.next(request);
        Box::pin(async move {
            match reply {
                ScriptedReply::Response { status, body } => Ok(HttpResponse { status, body }),
                ScriptedReply::Stream { status, chunks } => Ok(HttpResponse {
                    status,
                    body: String::from_utf8_lossy(&chunks.concat()).into_owned(),
                }),
                ScriptedReply::TransportError(message) => Err(CourierError::Transport(message)),
                ScriptedReply::Hang => std::future::pending().await,
                other => Err(CourierError::Transport(format!(
                    "scripted {other:?} is not a buffered reply"
                ))),
            }
        })
    }

    fn open_stream(&self, request: HttpRequest) -> TransportFuture<'_, StreamResponse> {
        let reply = self.next(request);
        Box::pin(async move {
            let (status, body) = match reply {
                ScriptedReply::Response { status, body } => {
                    (status, boxed(chunk_stream(vec![body.into_bytes()])))
                }
                ScriptedReply::Stream { status, chunks } => (status, boxed(chunk_stream(chunks))),
                ScriptedReply::BrokenStream { chunks, error } => (
                    200,
                    boxed(
                        chunk_stream(chunks)
                            .chain(stream::once(async move { Err(CourierError::Stream(error)) })),
                    ),
                ),
                ScriptedReply::StalledStream { chunks } => {
                    (200, boxed(chunk_stream(chunks).chain(stream::pending())))
                }
                ScriptedReply::TransportError(message) => {
                    return Err(CourierError::Transport(message));
                }
                ScriptedReply::Hang => std::future::pending::<(u16, ByteStream)>().await,
            };
            Ok(StreamResponse { status, body })
        })
    }
}
