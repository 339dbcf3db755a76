//! Session event types emitted by the sidecar agent.

use serde::{Deserialize, Serialize};

/// The type of event emitted on a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEventType {
    /// An incremental fragment of the assistant's reply.
    #[serde(rename = "assistant.message_delta")]
    AssistantMessageDelta,
    /// The complete assistant reply.
    #[serde(rename = "assistant.message")]
    AssistantMessage,
    /// The session finished processing the last message.
    #[serde(rename = "session.idle")]
    SessionIdle,
    /// The session failed while processing the last message.
    #[serde(rename = "session.error")]
    SessionError,
    /// Any event type this crate does not model (tool progress, usage, ...).
    #[serde(other)]
    Unknown,
}

/// Optional payload fields carried by a session event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEventData {
    /// Full content of an assistant message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Incremental content of a delta event.
    #[serde(rename = "deltaContent", skip_serializing_if = "Option::is_none")]
    pub delta_content: Option<String>,
    /// Error message of a session error event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// An event delivered to session subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    /// The type of event.
    #[serde(rename = "type")]
    pub event_type: SessionEventType,
    /// Event payload.
    #[serde(default)]
    pub data: SessionEventData,
}

impl SessionEvent {
    /// Create an event of the given type with an empty payload.
    pub fn new(event_type: SessionEventType) -> Self {
        Self {
            event_type,
            data: SessionEventData::default(),
        }
    }

    /// Create a delta event carrying a content fragment.
    pub fn delta(delta: impl Into<String>) -> Self {
        let mut event = Self::new(SessionEventType::AssistantMessageDelta);
        event.data.delta_content = Some(delta.into());
        event
    }

    /// Create an assistant message event carrying the full content.
    pub fn message(content: impl Into<String>) -> Self {
        let mut event = Self::new(SessionEventType::AssistantMessage);
        event.data.content = Some(content.into());
        event
    }

    /// Create an idle event.
    pub fn idle() -> Self {
        Self::new(SessionEventType::SessionIdle)
    }

    /// Create an error event, optionally carrying a message.
    pub fn error(message: Option<String>) -> Self {
        let mut event = Self::new(SessionEventType::SessionError);
        event.data.message = message;
        event
    }

    /// Whether this event ends the processing of a message.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.event_type,
            SessionEventType::SessionIdle | SessionEventType::SessionError
        )
    }
}
