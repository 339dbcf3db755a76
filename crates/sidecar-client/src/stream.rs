//! Streaming queries: relay partial content as the agent produces it.

use futures_util::Stream;
use sidecar_types::{SessionEvent, SessionEventType};
use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::client::Client;
use crate::error::{ClientError, Result};
use crate::query::error_message;
use crate::transport::lock;

/// One item of a streamed answer.
///
/// A stream yields any number of [`StreamEvent::Delta`] items followed by
/// exactly one terminal item, either [`StreamEvent::Final`] or
/// [`StreamEvent::Error`]. A stream whose query is cancelled before the
/// terminal event ends without one.
#[derive(Debug)]
pub enum StreamEvent {
    /// A fragment of the answer, in emission order.
    Delta(String),
    /// The complete answer.
    Final(String),
    /// The agent reported an error; no final content follows.
    Error(ClientError),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Delta(_))
    }
}

/// Lazily consumed sequence of [`StreamEvent`]s for one query.
pub struct EventStream {
    session_id: String,
    inner: Pin<Box<dyn Stream<Item = StreamEvent> + Send>>,
}

impl EventStream {
    fn new(session_id: String, mut receiver: mpsc::UnboundedReceiver<StreamEvent>) -> Self {
        let inner = async_stream::stream! {
            while let Some(event) = receiver.recv().await {
                yield event;
            }
        };

        Self {
            session_id,
            inner: Box::pin(inner),
        }
    }

    /// Session the query runs in.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Stream for EventStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

/// Maps session events onto stream items until the terminal event.
struct Relay {
    content: String,
    sender: Option<mpsc::UnboundedSender<StreamEvent>>,
}

impl Relay {
    fn handle(&mut self, event: &SessionEvent) {
        if self.sender.is_none() {
            return;
        }

        match event.event_type {
            SessionEventType::AssistantMessageDelta => {
                let delta = match event.data.delta_content.as_deref() {
                    Some(delta) if !delta.is_empty() => delta,
                    _ => return,
                };
                self.content.push_str(delta);
                if let Some(sender) = &self.sender {
                    let _ = sender.send(StreamEvent::Delta(delta.to_string()));
                }
            }
            SessionEventType::AssistantMessage => {
                if let Some(content) = &event.data.content {
                    self.content = content.clone();
                }
            }
            SessionEventType::SessionIdle => {
                if let Some(sender) = self.sender.take() {
                    let _ = sender.send(StreamEvent::Final(std::mem::take(&mut self.content)));
                }
            }
            SessionEventType::SessionError => {
                if let Some(sender) = self.sender.take() {
                    let _ = sender.send(StreamEvent::Error(ClientError::Session(error_message(
                        event,
                    ))));
                }
            }
            SessionEventType::Unknown => {}
        }
    }
}

impl Client {
    /// Send `prompt` and stream the answer.
    ///
    /// Setup and send failures are returned directly; once a stream is
    /// returned, remote errors arrive as its terminal [`StreamEvent::Error`].
    /// The event handler stays registered until `cancel` fires, even after the
    /// stream has ended, so callers should cancel once they are done with it.
    /// Cancelling closes the stream; no terminal item is produced for it.
    pub async fn query_stream(
        &self,
        cancel: &CancellationToken,
        session_id: Option<&str>,
        prompt: &str,
    ) -> Result<EventStream> {
        if prompt.is_empty() {
            return Err(ClientError::EmptyPrompt);
        }
        self.ensure_connected().await?;

        let session = self.resolve_session(session_id).await?;

        let (sender, receiver) = mpsc::unbounded_channel();
        let relay = Arc::new(Mutex::new(Relay {
            content: String::new(),
            sender: Some(sender),
        }));

        let handler_relay = relay.clone();
        let subscription = session.subscribe(Arc::new(move |event: &SessionEvent| {
            lock(&handler_relay).handle(event);
        }));

        let message_id = session
            .send(prompt)
            .await
            .map_err(ClientError::SendMessage)?;
        log::debug!(
            "Sent message {} to session {} (streaming)",
            message_id,
            session.id()
        );

        let cancel = cancel.clone();
        let watched_session = session.id().to_string();
        tokio::spawn(async move {
            cancel.cancelled().await;
            subscription.unsubscribe();
            lock(&relay).sender = None;
            log::debug!("Released stream subscription on session {}", watched_session);
        });

        Ok(EventStream::new(session.id().to_string(), receiver))
    }
}
