//! First-fragment inspection for upstream streaming responses.
//!
//! Upstreams frequently answer a streaming request with a normal `200` whose first
//! SSE event is an error object. [`guard_stream`] pulls exactly one fragment,
//! classifies it, and either fails with [`GatewayError::StreamIntegrity`] or hands
//! back a [`GuardedStream`] that replays the fragment before the rest of the upstream.

use std::borrow::Cow;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt};
use serde_json::Value;

use super::GatewayError;

pub const DEFAULT_STREAM_STATUS: u16 = 200;
/// Detail reported when the upstream produced nothing usable before data.
pub const NO_DATA_RETURNED: &str = "data: {'error': 'No data returned'}";

const DONE_SENTINEL: &str = "[DONE]";
const ERROR_DETAIL_MAX_CHARS: usize = 300;

/// One unit of an upstream streaming response.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamFragment {
    Bytes(Bytes),
    Text(String),
    Structured(Value),
}

impl StreamFragment {
    /// Fallback for upstream items that are none of the three shapes.
    pub fn display(value: impl fmt::Display) -> Self {
        Self::Text(value.to_string())
    }

    /// The text forwarded to the caller.
    pub fn into_text(self) -> String {
        match self {
            Self::Bytes(bytes) => match String::from_utf8(bytes.into()) {
                Ok(text) => text,
                Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
            },
            Self::Text(text) => text,
            Self::Structured(value) => format!("data: {value}\n\n"),
        }
    }

    fn as_text(&self) -> Cow<'_, str> {
        match self {
            Self::Bytes(bytes) => String::from_utf8_lossy(bytes),
            Self::Text(text) => Cow::Borrowed(text),
            Self::Structured(value) => Cow::Owned(format!("data: {value}\n\n")),
        }
    }
}

impl From<Bytes> for StreamFragment {
    fn from(value: Bytes) -> Self {
        Self::Bytes(value)
    }
}

impl From<Vec<u8>> for StreamFragment {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(value))
    }
}

impl From<String> for StreamFragment {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for StreamFragment {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Value> for StreamFragment {
    fn from(value: Value) -> Self {
        Self::Structured(value)
    }
}

/// An in-memory fragment sequence, e.g. a replayed or canned upstream response.
pub fn fragments_from_iter<I>(items: I) -> BoxStream<'static, StreamFragment>
where
    I: IntoIterator,
    I::IntoIter: Send + 'static,
    I::Item: Into<StreamFragment> + 'static,
{
    stream::iter(items).map(Into::<StreamFragment>::into).boxed()
}

#[derive(Debug, PartialEq)]
enum FirstFragment {
    Data,
    Done,
    Malformed,
    Error(Value),
}

fn strip_data_prefix(text: &str) -> &str {
    text.strip_prefix("data: ")
        .or_else(|| text.strip_prefix("data:"))
        .unwrap_or(text)
}

/// The whole payload must be one JSON document; trailing whitespace is allowed.
fn parse_payload(payload: &str) -> Option<Value> {
    serde_json::from_str(payload).ok()
}

fn classify_value(value: Value) -> FirstFragment {
    match &value {
        Value::Object(map) if map.contains_key("error") => FirstFragment::Error(value),
        _ => FirstFragment::Data,
    }
}

fn classify(fragment: &StreamFragment) -> FirstFragment {
    if let StreamFragment::Structured(value) = fragment {
        return classify_value(value.clone());
    }

    let text = fragment.as_text();
    let payload = strip_data_prefix(&text);
    if payload.starts_with(DONE_SENTINEL) {
        return FirstFragment::Done;
    }
    match parse_payload(payload) {
        Some(value) => classify_value(value),
        None => FirstFragment::Malformed,
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

fn no_data_returned(status: u16) -> GatewayError {
    GatewayError::StreamIntegrity {
        status,
        detail: NO_DATA_RETURNED.to_string(),
    }
}

/// Pulls the first upstream fragment and decides whether the stream is safe to forward.
///
/// Fails with `status` when the upstream ends immediately, opens with `[DONE]`, opens
/// with something that is not JSON, or opens with an object carrying an `error` key.
/// Only the first fragment is inspected; later errors are forwarded as data.
pub async fn guard_stream<S, T>(stream: S, status: u16) -> Result<GuardedStream, GatewayError>
where
    S: Stream<Item = T> + Send + 'static,
    T: Into<StreamFragment> + 'static,
{
    let mut upstream: BoxStream<'static, StreamFragment> =
        stream.map(Into::<StreamFragment>::into).boxed();

    let Some(first) = upstream.next().await else {
        tracing::error!(status, "upstream stream ended before the first fragment");
        return Err(no_data_returned(status));
    };
    tracing::debug!(fragment = ?first, "inspecting first upstream fragment");

    match classify(&first) {
        FirstFragment::Data => Ok(GuardedStream {
            first: Some(first.into_text()),
            upstream,
        }),
        FirstFragment::Done => {
            tracing::error!(status, "upstream stream opened with [DONE]");
            Err(no_data_returned(status))
        }
        FirstFragment::Malformed => {
            tracing::error!(
                status,
                fragment = %first.as_text(),
                "first upstream fragment is not JSON"
            );
            Err(no_data_returned(status))
        }
        FirstFragment::Error(value) => {
            let detail = truncate_chars(&value.to_string(), ERROR_DETAIL_MAX_CHARS);
            tracing::warn!(status, %detail, "upstream stream opened with an error");
            Err(GatewayError::StreamIntegrity { status, detail })
        }
    }
}

pub async fn guard_stream_default<S, T>(stream: S) -> Result<GuardedStream, GatewayError>
where
    S: Stream<Item = T> + Send + 'static,
    T: Into<StreamFragment> + 'static,
{
    guard_stream(stream, DEFAULT_STREAM_STATUS).await
}

/// Upstream stream that already passed first-fragment inspection.
///
/// Yields the buffered first fragment, then every remaining upstream fragment as text.
pub struct GuardedStream {
    first: Option<String>,
    upstream: BoxStream<'static, StreamFragment>,
}

impl fmt::Debug for GuardedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedStream")
            .field("first", &self.first)
            .finish_non_exhaustive()
    }
}

impl Stream for GuardedStream {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(first) = self.first.take() {
            return Poll::Ready(Some(first));
        }
        self.upstream
            .poll_next_unpin(cx)
            .map(|item| item.map(StreamFragment::into_text))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let buffered = usize::from(self.first.is_some());
        let (lower, upper) = self.upstream.size_hint();
        (
            lower.saturating_add(buffered),
            upper.and_then(|upper| upper.checked_add(buffered)),
        )
    }
}
