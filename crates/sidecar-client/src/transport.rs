//! The seam between the client and the process that runs the agent.
//!
//! [`AgentTransport`] and [`AgentSession`] describe everything the client
//! needs from the sidecar. Implementations own the wire protocol; the client
//! only relies on the operations and event semantics declared here.

use anyhow::Result;
use async_trait::async_trait;
use sidecar_types::{PingResponse, SessionConfig, SessionEvent};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Callback invoked for each event delivered on a session.
pub type EventHandler = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Options a transport needs to reach the sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    pub cli_url: String,
    pub log_level: String,
}

/// A connection to the sidecar agent process.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    /// Open the link to the sidecar.
    async fn start(&self) -> Result<()>;

    /// Close the link to the sidecar.
    async fn stop(&self) -> Result<()>;

    /// Check that the sidecar is responsive.
    async fn ping(&self, message: &str) -> Result<PingResponse>;

    /// Create a new session.
    async fn create_session(&self, config: SessionConfig) -> Result<Arc<dyn AgentSession>>;

    /// Resume an existing session, applying the given configuration.
    async fn resume_session(
        &self,
        session_id: &str,
        config: SessionConfig,
    ) -> Result<Arc<dyn AgentSession>>;

    /// Delete a session on the sidecar.
    async fn delete_session(&self, session_id: &str) -> Result<()>;
}

/// A live session on the sidecar.
#[async_trait]
pub trait AgentSession: Send + Sync {
    fn id(&self) -> &str;

    /// Register an event handler. Events stop being delivered to it once the
    /// returned subscription is unsubscribed or dropped.
    fn subscribe(&self, handler: EventHandler) -> Subscription;

    /// Send a prompt, returning the message id.
    async fn send(&self, prompt: &str) -> Result<String>;

    /// Abort the message currently being processed.
    async fn abort(&self) -> Result<()>;
}

type Disposer = Box<dyn FnOnce() + Send>;

/// Handle to a registered event handler.
///
/// Unsubscribing is idempotent and may race with event delivery. Dropping the
/// handle unsubscribes.
pub struct Subscription {
    disposer: Mutex<Option<Disposer>>,
}

impl Subscription {
    pub fn new(disposer: impl FnOnce() + Send + 'static) -> Self {
        Self {
            disposer: Mutex::new(Some(Box::new(disposer))),
        }
    }

    pub fn unsubscribe(&self) {
        let disposer = lock(&self.disposer).take();
        if let Some(dispose) = disposer {
            dispose();
        }
    }

    pub fn is_active(&self) -> bool {
        lock(&self.disposer).is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[derive(Default)]
struct Slots {
    next_id: u64,
    handlers: Vec<(u64, EventHandler)>,
}

/// Ordered set of event handlers for one session.
///
/// Transports use this to implement [`AgentSession::subscribe`] and to fan
/// events out to subscribers.
#[derive(Clone, Default)]
pub struct SubscriberSet {
    slots: Arc<Mutex<Slots>>,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: EventHandler) -> Subscription {
        let id = {
            let mut slots = lock(&self.slots);
            let id = slots.next_id;
            slots.next_id += 1;
            slots.handlers.push((id, handler));
            id
        };

        let slots = Arc::downgrade(&self.slots);
        Subscription::new(move || {
            if let Some(slots) = slots.upgrade() {
                lock(&slots).handlers.retain(|(slot_id, _)| *slot_id != id);
            }
        })
    }

    /// Deliver an event to every current subscriber, in subscription order.
    ///
    /// Handlers run outside the lock so they may unsubscribe themselves.
    pub fn emit(&self, event: &SessionEvent) {
        let handlers: Vec<EventHandler> = lock(&self.slots)
            .handlers
            .iter()
            .map(|(_, handler)| handler.clone())
            .collect();

        for handler in handlers {
            handler(event);
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.slots).handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for SubscriberSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberSet")
            .field("subscribers", &self.len())
            .finish()
    }
}

/// Lock a mutex, recovering the data if a handler panicked while holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}
