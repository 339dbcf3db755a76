//! Single-result queries: send one prompt and wait for the complete answer.

use sidecar_types::{SessionEvent, SessionEventType};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::client::Client;
use crate::error::{ClientError, Result};
use crate::transport::lock;

/// Message reported when the agent signals an error without describing it.
pub(crate) const DEFAULT_SESSION_ERROR: &str = "session error";

/// The outcome of a completed query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResult {
    pub content: String,
    /// Session the query ran in. Pass it back to continue the conversation.
    pub session_id: String,
}

/// Event state shared between the subscription handler and the waiting query.
#[derive(Default)]
struct Collector {
    content: String,
    error: Option<String>,
    done: Option<oneshot::Sender<()>>,
}

impl Collector {
    fn handle(&mut self, event: &SessionEvent) {
        if self.done.is_none() {
            return;
        }

        match event.event_type {
            SessionEventType::AssistantMessage => {
                if let Some(content) = &event.data.content {
                    self.content = content.clone();
                }
            }
            SessionEventType::SessionIdle => self.finish(),
            SessionEventType::SessionError => {
                self.error = Some(error_message(event));
                self.finish();
            }
            SessionEventType::AssistantMessageDelta | SessionEventType::Unknown => {}
        }
    }

    fn finish(&mut self) {
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

/// The message carried by an error event, or a generic one when it has none.
pub(crate) fn error_message(event: &SessionEvent) -> String {
    event
        .data
        .message
        .clone()
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| DEFAULT_SESSION_ERROR.to_string())
}

impl Client {
    /// Send `prompt` in a new session and return the final content.
    pub async fn query(&self, cancel: &CancellationToken, prompt: &str) -> Result<String> {
        self.query_with_session(cancel, None, prompt)
            .await
            .map(|result| result.content)
    }

    /// Send `prompt` and wait for the agent to finish.
    ///
    /// Resumes `session_id` when it is given and non-empty, otherwise creates a
    /// new session. Cancelling `cancel` aborts the message on the sidecar and
    /// returns [`ClientError::Cancelled`]; partial content is discarded.
    pub async fn query_with_session(
        &self,
        cancel: &CancellationToken,
        session_id: Option<&str>,
        prompt: &str,
    ) -> Result<QueryResult> {
        if prompt.is_empty() {
            return Err(ClientError::EmptyPrompt);
        }
        self.ensure_connected().await?;

        let session = self.resolve_session(session_id).await?;

        let (done_tx, done_rx) = oneshot::channel();
        let collector = Arc::new(Mutex::new(Collector {
            done: Some(done_tx),
            ..Default::default()
        }));

        let handler_collector = collector.clone();
        let _subscription = session.subscribe(Arc::new(move |event: &SessionEvent| {
            lock(&handler_collector).handle(event);
        }));

        let message_id = session
            .send(prompt)
            .await
            .map_err(ClientError::SendMessage)?;
        log::debug!("Sent message {} to session {}", message_id, session.id());

        tokio::select! {
            biased;
            _ = done_rx => {}
            _ = cancel.cancelled() => {
                if let Err(e) = session.abort().await {
                    log::warn!("Failed to abort session {}: {:#}", session.id(), e);
                }
                return Err(ClientError::Cancelled);
            }
        }

        let collector = lock(&collector);
        if let Some(message) = &collector.error {
            return Err(ClientError::Session(message.clone()));
        }

        Ok(QueryResult {
            content: collector.content.clone(),
            session_id: session.id().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::mock::{MockSession, MockTransport};
    use std::time::Duration;

    #[tokio::test]
    async fn test_query_returns_final_content() {
        let transport = MockTransport::new();
        transport.script(vec![
            SessionEvent::message("SKU ABC123 has 42 units in stock."),
            SessionEvent::idle(),
        ]);
        let client = transport.connected_client(ClientConfig::new());

        let result = client
            .query_with_session(
                &CancellationToken::new(),
                None,
                "What is the stock level for SKU ABC123?",
            )
            .await
            .unwrap();

        assert!(result.content.contains("42 units"));
        assert_eq!(result.session_id, "mock-session-1");
        assert_eq!(transport.created_configs().len(), 1);

        let session = transport.session("mock-session-1").unwrap();
        assert_eq!(
            session.sent_prompts(),
            vec!["What is the stock level for SKU ABC123?".to_string()]
        );
        assert_eq!(session.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_query_without_session_id() {
        let transport = MockTransport::new();
        transport.script(vec![SessionEvent::message("pong"), SessionEvent::idle()]);
        let client = transport.connected_client(ClientConfig::new());

        let content = client
            .query(&CancellationToken::new(), "ping")
            .await
            .unwrap();

        assert_eq!(content, "pong");
    }

    #[tokio::test]
    async fn test_query_resumes_session() {
        let transport = MockTransport::new();
        transport.add_session(MockSession::new("conversation-3"));
        transport.script(vec![SessionEvent::message("still here"), SessionEvent::idle()]);
        let client = transport.connected_client(ClientConfig::new());

        let result = client
            .query_with_session(&CancellationToken::new(), Some("conversation-3"), "hello?")
            .await
            .unwrap();

        assert_eq!(result.session_id, "conversation-3");
        assert_eq!(transport.resumed_configs().len(), 1);
        assert!(transport.created_configs().is_empty());
    }

    #[tokio::test]
    async fn test_last_full_message_wins() {
        let transport = MockTransport::new();
        transport.script(vec![
            SessionEvent::delta("dr"),
            SessionEvent::message("draft"),
            SessionEvent::message("final answer"),
            SessionEvent::idle(),
        ]);
        let client = transport.connected_client(ClientConfig::new());

        let content = client.query(&CancellationToken::new(), "q").await.unwrap();
        assert_eq!(content, "final answer");
    }

    #[tokio::test]
    async fn test_idle_without_message_returns_empty_content() {
        let transport = MockTransport::new();
        transport.script(vec![SessionEvent::idle()]);
        let client = transport.connected_client(ClientConfig::new());

        let content = client.query(&CancellationToken::new(), "q").await.unwrap();
        assert_eq!(content, "");
    }

    #[tokio::test]
    async fn test_empty_prompt_fails_before_remote_calls() {
        let transport = MockTransport::new();
        let client = transport.connected_client(ClientConfig::new());

        let err = client
            .query_with_session(&CancellationToken::new(), Some("s"), "")
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::EmptyPrompt));
        assert!(transport.created_configs().is_empty());
        assert!(transport.resumed_configs().is_empty());
    }

    #[tokio::test]
    async fn test_query_requires_connection() {
        let transport = MockTransport::new();
        let client = Client::new(ClientConfig::new(), transport.clone()).unwrap();

        let err = client
            .query(&CancellationToken::new(), "hello")
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::NotConnected));
        assert!(transport.created_configs().is_empty());
    }

    #[tokio::test]
    async fn test_session_error_event() {
        let transport = MockTransport::new();
        transport.script(vec![SessionEvent::error(Some("rate limited".to_string()))]);
        let client = transport.connected_client(ClientConfig::new());

        let err = client.query(&CancellationToken::new(), "q").await.unwrap_err();

        assert!(matches!(&err, ClientError::Session(message) if message == "rate limited"));
        assert_eq!(err.to_string(), "sidecar: rate limited");
    }

    #[tokio::test]
    async fn test_session_error_without_message() {
        let transport = MockTransport::new();
        transport.script(vec![
            SessionEvent::message("partial"),
            SessionEvent::error(None),
        ]);
        let client = transport.connected_client(ClientConfig::new());

        let err = client.query(&CancellationToken::new(), "q").await.unwrap_err();
        assert_eq!(err.to_string(), "sidecar: session error");
    }

    #[tokio::test]
    async fn test_send_failure_is_wrapped() {
        let transport = MockTransport::new();
        transport.fail_send("connection reset by peer");
        let client = transport.connected_client(ClientConfig::new());

        let err = client.query(&CancellationToken::new(), "q").await.unwrap_err();

        assert!(matches!(err, ClientError::SendMessage(_)));
        assert_eq!(err.to_string(), "sending message: connection reset by peer");
        let session = transport.session("mock-session-1").unwrap();
        assert_eq!(session.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_session_setup_failure() {
        let transport = MockTransport::new();
        transport.fail_session_setup("no such session");
        let client = transport.connected_client(ClientConfig::new());

        let err = client
            .query_with_session(&CancellationToken::new(), Some("gone"), "q")
            .await
            .unwrap_err();

        assert!(matches!(err, ClientError::SessionSetup(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_remote_message() {
        let transport = MockTransport::new();
        // The agent never finishes.
        transport.script(vec![SessionEvent::message("thinking")]);
        let client = transport.connected_client(ClientConfig::new());

        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let err = client.query(&cancel, "long task").await.unwrap_err();

        assert!(matches!(err, ClientError::Cancelled));
        let session = transport.session("mock-session-1").unwrap();
        assert_eq!(session.abort_calls(), 1);
        assert_eq!(session.subscriber_count(), 0);
    }

    #[test]
    fn test_collector_ignores_events_after_terminal() {
        let (done_tx, _done_rx) = oneshot::channel();
        let mut collector = Collector {
            done: Some(done_tx),
            ..Default::default()
        };

        collector.handle(&SessionEvent::message("answer"));
        collector.handle(&SessionEvent::idle());
        collector.handle(&SessionEvent::message("late"));
        collector.handle(&SessionEvent::error(Some("late error".to_string())));

        assert_eq!(collector.content, "answer");
        assert!(collector.error.is_none());
    }
}
