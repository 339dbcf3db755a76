//! In-process transport for local development and tests
//!
//! [`LoopbackTransport`] answers prompts without a sidecar process. Each
//! message produces a scripted event sequence on a background task, so callers
//! observe the same asynchronous delivery they would get from a real agent.
//! Prompts of the form `/tool <name> <json arguments>` are dispatched to the
//! tools configured on the session, which makes the tool bridge testable end
//! to end.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sidecar_types::{
    PingResponse, ProtocolError, SessionConfig, SessionEvent, SessionEventType, ToolInvocation,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use crate::transport::{
    lock, AgentSession, AgentTransport, EventHandler, SubscriberSet, Subscription, TransportOptions,
};

/// Produces the events emitted in answer to a prompt.
pub type Responder = Arc<dyn Fn(&str) -> Vec<SessionEvent> + Send + Sync>;

const TOOL_COMMAND: &str = "/tool ";

/// Default responder: echoes the prompt word by word, then as a full message.
pub fn echo_responder(prompt: &str) -> Vec<SessionEvent> {
    let reply = format!("Echo: {}", prompt);

    let mut events: Vec<SessionEvent> = reply
        .split_inclusive(' ')
        .map(|word| SessionEvent::delta(word))
        .collect();
    events.push(SessionEvent::message(reply.as_str()));
    events.push(SessionEvent::idle());
    events
}

/// Maps the sidecar's log level names onto a filter for the agent-side trace.
/// Unrecognised names fall back to `error`, the sidecar default.
fn agent_log_filter(level: &str) -> log::LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "none" | "off" => log::LevelFilter::Off,
        "warning" | "warn" => log::LevelFilter::Warn,
        "info" => log::LevelFilter::Info,
        "debug" => log::LevelFilter::Debug,
        "all" | "trace" => log::LevelFilter::Trace,
        _ => log::LevelFilter::Error,
    }
}

/// An [`AgentTransport`] that runs the agent side in this process.
pub struct LoopbackTransport {
    options: TransportOptions,
    log_filter: log::LevelFilter,
    started: AtomicBool,
    sessions: Mutex<HashMap<String, LoopbackSession>>,
    responder: Responder,
    event_delay: Duration,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::with_options(TransportOptions {
            cli_url: "loopback".to_string(),
            log_level: "error".to_string(),
        })
    }

    /// Build a transport from the client's options.
    ///
    /// The log level bounds what the agent side traces about each session,
    /// the way a sidecar process honours its `--log-level` flag.
    pub fn with_options(options: TransportOptions) -> Self {
        Self {
            log_filter: agent_log_filter(&options.log_level),
            options,
            started: AtomicBool::new(false),
            sessions: Mutex::new(HashMap::new()),
            responder: Arc::new(echo_responder),
            event_delay: Duration::ZERO,
        }
    }

    /// Replace the default echo responder.
    pub fn with_responder(
        mut self,
        responder: impl Fn(&str) -> Vec<SessionEvent> + Send + Sync + 'static,
    ) -> Self {
        self.responder = Arc::new(responder);
        self
    }

    /// Wait this long before each emitted event.
    pub fn with_event_delay(mut self, delay: Duration) -> Self {
        self.event_delay = delay;
        self
    }

    pub fn options(&self) -> &TransportOptions {
        &self.options
    }

    /// Agent-side verbosity derived from the configured log level.
    pub fn log_filter(&self) -> log::LevelFilter {
        self.log_filter
    }

    pub fn session_count(&self) -> usize {
        lock(&self.sessions).len()
    }

    fn ensure_started(&self) -> Result<()> {
        if self.started.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(anyhow!("loopback transport is not started"))
        }
    }

    fn open_session(&self, id: String, config: SessionConfig) -> LoopbackSession {
        let session = LoopbackSession {
            inner: Arc::new(SessionInner {
                id,
                config,
                subscribers: SubscriberSet::new(),
                responder: self.responder.clone(),
                event_delay: self.event_delay,
                log_filter: self.log_filter,
                generation: AtomicU64::new(0),
            }),
        };
        lock(&self.sessions).insert(session.inner.id.clone(), session.clone());
        session
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentTransport for LoopbackTransport {
    async fn start(&self) -> Result<()> {
        self.started.store(true, Ordering::SeqCst);
        log::debug!(
            "Loopback transport started for {} (agent log level {})",
            self.options.cli_url,
            self.log_filter
        );
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.started.store(false, Ordering::SeqCst);
        log::debug!("Loopback transport stopped");
        Ok(())
    }

    async fn ping(&self, message: &str) -> Result<PingResponse> {
        self.ensure_started()?;
        Ok(PingResponse::new(message))
    }

    async fn create_session(&self, config: SessionConfig) -> Result<Arc<dyn AgentSession>> {
        self.ensure_started()?;

        let session = self.open_session(Uuid::new_v4().to_string(), config);
        log::debug!("Loopback session {} created", session.inner.id);
        Ok(Arc::new(session))
    }

    async fn resume_session(
        &self,
        session_id: &str,
        config: SessionConfig,
    ) -> Result<Arc<dyn AgentSession>> {
        self.ensure_started()?;

        if !lock(&self.sessions).contains_key(session_id) {
            return Err(anyhow!("session {} not found", session_id));
        }
        let session = self.open_session(session_id.to_string(), config);
        log::debug!("Loopback session {} resumed", session_id);
        Ok(Arc::new(session))
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.ensure_started()?;

        lock(&self.sessions)
            .remove(session_id)
            .map(|_| ())
            .ok_or_else(|| anyhow!("session {} not found", session_id))
    }
}

struct SessionInner {
    id: String,
    config: SessionConfig,
    subscribers: SubscriberSet,
    responder: Responder,
    event_delay: Duration,
    log_filter: log::LevelFilter,
    /// Bumped by `abort`; a reply stops emitting once it no longer matches.
    generation: AtomicU64,
}

impl SessionInner {
    /// Agent-side trace line, subject to the transport's log level.
    fn trace(&self, level: log::Level, message: fmt::Arguments<'_>) {
        if level <= self.log_filter {
            log::log!(level, "Session {}: {}", self.id, message);
        }
    }

    async fn reply(&self, prompt: &str) -> Vec<SessionEvent> {
        let events = match prompt.strip_prefix(TOOL_COMMAND) {
            Some(command) => self.call_tool(command).await,
            None => (self.responder)(prompt),
        };

        if self.config.streaming {
            events
        } else {
            events
                .into_iter()
                .filter(|event| event.event_type != SessionEventType::AssistantMessageDelta)
                .collect()
        }
    }

    async fn call_tool(&self, command: &str) -> Vec<SessionEvent> {
        let (name, arguments) = command
            .trim()
            .split_once(' ')
            .unwrap_or((command.trim(), "{}"));

        let arguments = match serde_json::from_str::<serde_json::Value>(arguments) {
            Ok(arguments) => arguments,
            Err(e) => {
                return vec![SessionEvent::error(Some(format!(
                    "invalid tool arguments: {}",
                    e
                )))]
            }
        };

        let tool = self
            .config
            .tools
            .iter()
            .flatten()
            .find(|tool| tool.name == name);
        let Some(tool) = tool else {
            return vec![SessionEvent::error(Some(
                ProtocolError::unknown_tool(name).to_string(),
            ))];
        };

        let invocation = ToolInvocation {
            session_id: self.id.clone(),
            tool_call_id: Uuid::new_v4().to_string(),
            tool_name: name.to_string(),
            arguments,
        };

        match tool.invoke(invocation).await {
            Ok(result) => {
                if let Some(entry) = &result.session_log {
                    self.trace(log::Level::Info, format_args!("{}", entry));
                }
                vec![
                    SessionEvent::message(result.text_result_for_llm),
                    SessionEvent::idle(),
                ]
            }
            Err(e) => vec![SessionEvent::error(Some(e.to_string()))],
        }
    }
}

/// Handle to a loopback session.
#[derive(Clone)]
pub struct LoopbackSession {
    inner: Arc<SessionInner>,
}

#[async_trait]
impl AgentSession for LoopbackSession {
    fn id(&self) -> &str {
        &self.inner.id
    }

    fn subscribe(&self, handler: EventHandler) -> Subscription {
        self.inner.subscribers.subscribe(handler)
    }

    async fn send(&self, prompt: &str) -> Result<String> {
        let message_id = Uuid::new_v4().to_string();
        let generation = self.inner.generation.load(Ordering::SeqCst);
        let inner = self.inner.clone();
        let prompt = prompt.to_string();

        tokio::spawn(async move {
            for event in inner.reply(&prompt).await {
                if !inner.event_delay.is_zero() {
                    tokio::time::sleep(inner.event_delay).await;
                }
                if inner.generation.load(Ordering::SeqCst) != generation {
                    log::debug!("Session {} aborted, dropping remaining events", inner.id);
                    return;
                }
                inner.trace(
                    log::Level::Debug,
                    format_args!("emitting {:?}", event.event_type),
                );
                inner.subscribers.emit(&event);
            }
        });

        Ok(message_id)
    }

    async fn abort(&self) -> Result<()> {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
