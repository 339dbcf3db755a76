//! Server-Sent Events (SSE) encoding of streamed query results.

use axum::http::{header, HeaderValue};
use axum::response::sse::{Event as AxumEvent, KeepAlive};
use axum::response::{IntoResponse, Response, Sse};
use futures_util::Stream;
use pin_project_lite::pin_project;
use serde_json::{json, Value};
use sidecar_client::StreamEvent;
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio_util::sync::DropGuard;

/// JSON payload sent for one stream event.
///
/// Deltas become `{"delta", "session_id"}`, the final answer
/// `{"content", "session_id", "final": true}` and failures
/// `{"error", "session_id"}`.
pub fn event_payload(event: &StreamEvent, session_id: &str) -> Value {
    match event {
        StreamEvent::Delta(delta) => json!({
            "delta": delta,
            "session_id": session_id,
        }),
        StreamEvent::Final(content) => json!({
            "content": content,
            "session_id": session_id,
            "final": true,
        }),
        StreamEvent::Error(e) => json!({
            "error": e.to_string(),
            "session_id": session_id,
        }),
    }
}

pin_project! {
    /// A stream wrapper that converts query stream events to SSE events.
    ///
    /// Holds the query's cancellation guard: when the response body is
    /// dropped, because the stream ended or the client went away, the query's
    /// subscription is released.
    pub struct SseStream<S> {
        #[pin]
        inner: S,
        session_id: String,
        _guard: Option<DropGuard>,
    }
}

impl<S> SseStream<S> {
    /// Create a new SSE stream wrapper.
    pub fn new(stream: S, session_id: impl Into<String>, guard: Option<DropGuard>) -> Self {
        Self {
            inner: stream,
            session_id: session_id.into(),
            _guard: guard,
        }
    }
}

impl<S> Stream for SseStream<S>
where
    S: Stream<Item = StreamEvent>,
{
    type Item = std::result::Result<AxumEvent, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();

        match this.inner.poll_next(cx) {
            Poll::Ready(Some(event)) => {
                let payload = event_payload(&event, this.session_id);
                Poll::Ready(Some(Ok(AxumEvent::default().data(payload.to_string()))))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Create an SSE response with custom keep-alive settings.
pub fn create_sse_response_with_keepalive<S>(
    stream: SseStream<S>,
    keepalive_interval: Duration,
    keepalive_text: impl Into<String>,
) -> Response
where
    S: Stream<Item = StreamEvent> + Send + 'static,
{
    let mut response = Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(keepalive_interval)
                .text(keepalive_text.into()),
        )
        .into_response();

    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{stream, StreamExt as _};
    use sidecar_client::ClientError;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_event_payloads() {
        let delta = event_payload(&StreamEvent::Delta("Hel".to_string()), "s-1");
        assert_eq!(delta, json!({"delta": "Hel", "session_id": "s-1"}));

        let last = event_payload(&StreamEvent::Final("Hello".to_string()), "s-1");
        assert_eq!(
            last,
            json!({"content": "Hello", "session_id": "s-1", "final": true})
        );

        let error = event_payload(
            &StreamEvent::Error(ClientError::Session("overloaded".to_string())),
            "s-1",
        );
        assert_eq!(
            error,
            json!({"error": "sidecar: overloaded", "session_id": "s-1"})
        );
    }

    #[tokio::test]
    async fn test_sse_stream() {
        let events = vec![
            StreamEvent::Delta("Hel".to_string()),
            StreamEvent::Final("Hello".to_string()),
        ];
        let mut sse_stream = SseStream::new(stream::iter(events), "s-1", None);

        let first = sse_stream.next().await.unwrap().unwrap();
        let second = sse_stream.next().await.unwrap().unwrap();

        assert!(format!("{:?}", first).contains("Hel"));
        assert!(format!("{:?}", second).contains("final"));
        assert!(sse_stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_stream_cancels_query() {
        let cancel = CancellationToken::new();
        let sse_stream = SseStream::new(
            stream::empty::<StreamEvent>(),
            "s-1",
            Some(cancel.clone().drop_guard()),
        );

        assert!(!cancel.is_cancelled());
        drop(sse_stream);
        assert!(cancel.is_cancelled());
    }
}
