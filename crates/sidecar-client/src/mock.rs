//! Scriptable transport used by the client's unit tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sidecar_types::{PingResponse, SessionConfig, SessionEvent};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::client::Client;
use crate::config::ClientConfig;
use crate::transport::{lock, AgentSession, AgentTransport, EventHandler, SubscriberSet, Subscription};

#[derive(Default)]
struct TransportState {
    start_calls: u32,
    failing_starts: u32,
    hang_starts: bool,
    stop_calls: u32,
    stop_error: Option<String>,
    ping_messages: Vec<String>,
    deleted_sessions: Vec<String>,
    created: Vec<SessionConfig>,
    resumed: Vec<(String, SessionConfig)>,
    sessions: HashMap<String, MockSession>,
    next_session: u32,
    setup_error: Option<String>,
    send_error: Option<String>,
    script: Vec<SessionEvent>,
}

/// Transport whose behaviour is set up by the test and whose calls are recorded.
#[derive(Default)]
pub(crate) struct MockTransport {
    state: Mutex<TransportState>,
}

impl MockTransport {
    pub(crate) fn new() -> Arc<Self> {
        let _ = env_logger::builder().is_test(true).try_init();
        Arc::new(Self::default())
    }

    /// A client over this transport that is already connected.
    pub(crate) fn connected_client(self: &Arc<Self>, config: ClientConfig) -> Client {
        Client::from_parts(config, self.clone(), true)
    }

    /// Fail the next `count` start attempts.
    pub(crate) fn fail_starts(&self, count: u32) {
        lock(&self.state).failing_starts = count;
    }

    /// Make every start attempt hang until it times out.
    pub(crate) fn hang_starts(&self) {
        lock(&self.state).hang_starts = true;
    }

    pub(crate) fn fail_stop(&self, message: &str) {
        lock(&self.state).stop_error = Some(message.to_string());
    }

    pub(crate) fn fail_session_setup(&self, message: &str) {
        lock(&self.state).setup_error = Some(message.to_string());
    }

    pub(crate) fn fail_send(&self, message: &str) {
        lock(&self.state).send_error = Some(message.to_string());
    }

    /// Events every session emits, in order, when a prompt is sent.
    pub(crate) fn script(&self, events: Vec<SessionEvent>) {
        lock(&self.state).script = events;
    }

    /// Register a session that can be resumed by id.
    pub(crate) fn add_session(&self, session: MockSession) {
        lock(&self.state)
            .sessions
            .insert(session.id().to_string(), session);
    }

    pub(crate) fn session(&self, id: &str) -> Option<MockSession> {
        lock(&self.state).sessions.get(id).cloned()
    }

    pub(crate) fn start_calls(&self) -> u32 {
        lock(&self.state).start_calls
    }

    pub(crate) fn stop_calls(&self) -> u32 {
        lock(&self.state).stop_calls
    }

    pub(crate) fn ping_messages(&self) -> Vec<String> {
        lock(&self.state).ping_messages.clone()
    }

    pub(crate) fn deleted_sessions(&self) -> Vec<String> {
        lock(&self.state).deleted_sessions.clone()
    }

    pub(crate) fn created_configs(&self) -> Vec<SessionConfig> {
        lock(&self.state).created.clone()
    }

    pub(crate) fn resumed_configs(&self) -> Vec<(String, SessionConfig)> {
        lock(&self.state).resumed.clone()
    }
}

#[async_trait]
impl AgentTransport for MockTransport {
    async fn start(&self) -> Result<()> {
        let hang = {
            let mut state = lock(&self.state);
            state.start_calls += 1;
            if state.failing_starts > 0 {
                state.failing_starts -= 1;
                return Err(anyhow!("connection refused"));
            }
            state.hang_starts
        };

        if hang {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let mut state = lock(&self.state);
        state.stop_calls += 1;
        match &state.stop_error {
            Some(message) => Err(anyhow!("{}", message)),
            None => Ok(()),
        }
    }

    async fn ping(&self, message: &str) -> Result<PingResponse> {
        lock(&self.state).ping_messages.push(message.to_string());
        Ok(PingResponse::new(message))
    }

    async fn create_session(&self, config: SessionConfig) -> Result<Arc<dyn AgentSession>> {
        let mut state = lock(&self.state);
        if let Some(message) = &state.setup_error {
            return Err(anyhow!("{}", message));
        }

        state.next_session += 1;
        let session = MockSession::new(&format!("mock-session-{}", state.next_session));
        session.configure(state.script.clone(), state.send_error.clone());
        state.created.push(config);
        state
            .sessions
            .insert(session.id().to_string(), session.clone());

        Ok(Arc::new(session))
    }

    async fn resume_session(
        &self,
        session_id: &str,
        config: SessionConfig,
    ) -> Result<Arc<dyn AgentSession>> {
        let mut state = lock(&self.state);
        if let Some(message) = &state.setup_error {
            return Err(anyhow!("{}", message));
        }

        let session = state
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| MockSession::new(session_id))
            .clone();
        session.configure(state.script.clone(), state.send_error.clone());
        state.resumed.push((session_id.to_string(), config));

        Ok(Arc::new(session))
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let mut state = lock(&self.state);
        state.sessions.remove(session_id);
        state.deleted_sessions.push(session_id.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct SessionState {
    script: Vec<SessionEvent>,
    send_error: Option<String>,
    sent_prompts: Vec<String>,
    abort_calls: u32,
}

/// Session that emits its script synchronously from `send`.
#[derive(Clone)]
pub(crate) struct MockSession {
    id: String,
    subscribers: SubscriberSet,
    state: Arc<Mutex<SessionState>>,
}

impl MockSession {
    pub(crate) fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            subscribers: SubscriberSet::new(),
            state: Arc::new(Mutex::new(SessionState::default())),
        }
    }

    fn configure(&self, script: Vec<SessionEvent>, send_error: Option<String>) {
        let mut state = lock(&self.state);
        state.script = script;
        state.send_error = send_error;
    }

    /// Deliver an event to the current subscribers.
    pub(crate) fn emit(&self, event: SessionEvent) {
        self.subscribers.emit(&event);
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub(crate) fn sent_prompts(&self) -> Vec<String> {
        lock(&self.state).sent_prompts.clone()
    }

    pub(crate) fn abort_calls(&self) -> u32 {
        lock(&self.state).abort_calls
    }
}

#[async_trait]
impl AgentSession for MockSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn subscribe(&self, handler: EventHandler) -> Subscription {
        self.subscribers.subscribe(handler)
    }

    async fn send(&self, prompt: &str) -> Result<String> {
        let script = {
            let mut state = lock(&self.state);
            if let Some(message) = &state.send_error {
                return Err(anyhow!("{}", message));
            }
            state.sent_prompts.push(prompt.to_string());
            state.script.clone()
        };

        for event in script {
            self.subscribers.emit(&event);
        }
        Ok(format!("{}-message", self.id))
    }

    async fn abort(&self) -> Result<()> {
        lock(&self.state).abort_calls += 1;
        Ok(())
    }
}
