//! The client handle and its connection lifecycle.

use anyhow::anyhow;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::transport::AgentTransport;

/// Message sent by [`Client::ping`].
const PING_MESSAGE: &str = "health";

/// Client for a sidecar agent process.
///
/// Cheap to clone; clones share the configuration, the transport and the
/// connection state. Call [`Client::start`] before issuing queries.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    config: ClientConfig,
    transport: Arc<dyn AgentTransport>,
    connected: RwLock<bool>,
}

impl Client {
    /// Create a client over `transport`. Validates the configuration but does
    /// not connect.
    pub fn new(config: ClientConfig, transport: Arc<dyn AgentTransport>) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_parts(config, transport, false))
    }

    pub(crate) fn from_parts(
        config: ClientConfig,
        transport: Arc<dyn AgentTransport>,
        connected: bool,
    ) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                config,
                transport,
                connected: RwLock::new(connected),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub(crate) fn transport(&self) -> &Arc<dyn AgentTransport> {
        &self.inner.transport
    }

    /// Connect to the sidecar, retrying with exponential backoff.
    ///
    /// Each attempt is bounded by the configured connection timeout. The delay
    /// between attempts starts at the configured retry delay and doubles after
    /// each failure; there is no delay after the final attempt. Cancelling
    /// `cancel` abandons the remaining attempts.
    pub async fn start(&self, cancel: &CancellationToken) -> Result<()> {
        let mut connected = self.inner.connected.write().await;
        if *connected {
            return Err(ClientError::AlreadyConnected);
        }

        let config = &self.inner.config;
        let mut delay = config.retry_delay;
        let mut last_error = anyhow!("no connection attempts were made");

        for attempt in 1..=config.retry_attempts {
            match self.connect_once(cancel).await {
                Ok(()) => {
                    *connected = true;
                    log::info!(
                        "Connected to sidecar at {} (attempt {}/{})",
                        config.cli_url,
                        attempt,
                        config.retry_attempts
                    );
                    return Ok(());
                }
                Err(e) => {
                    log::warn!(
                        "Connection attempt {}/{} to {} failed: {:#}",
                        attempt,
                        config.retry_attempts,
                        config.cli_url,
                        e
                    );
                    last_error = e;
                }
            }

            if attempt < config.retry_attempts {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        return Err(ClientError::SidecarUnavailable(anyhow::Error::new(
                            ClientError::Cancelled,
                        )));
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
                delay = delay.saturating_mul(2);
            }
        }

        Err(ClientError::SidecarUnavailable(last_error))
    }

    async fn connect_once(&self, cancel: &CancellationToken) -> anyhow::Result<()> {
        let timeout = self.inner.config.conn_timeout;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(anyhow::Error::new(ClientError::Cancelled)),
            result = tokio::time::timeout(timeout, self.inner.transport.start()) => match result {
                Ok(result) => result,
                Err(_) => Err(anyhow!("connection attempt timed out after {:?}", timeout)),
            },
        }
    }

    /// Disconnect from the sidecar. Does nothing when not connected.
    ///
    /// The client is marked disconnected even when closing the link fails; the
    /// failure is still returned.
    pub async fn stop(&self) -> Result<()> {
        let mut connected = self.inner.connected.write().await;
        if !*connected {
            return Ok(());
        }

        let result = self.inner.transport.stop().await;
        *connected = false;
        log::info!("Disconnected from sidecar at {}", self.inner.config.cli_url);

        result.map_err(ClientError::Transport)
    }

    pub async fn is_connected(&self) -> bool {
        *self.inner.connected.read().await
    }

    pub(crate) async fn ensure_connected(&self) -> Result<()> {
        if self.is_connected().await {
            Ok(())
        } else {
            Err(ClientError::NotConnected)
        }
    }

    /// Check that the sidecar is responsive.
    pub async fn ping(&self) -> Result<()> {
        let connected = self.inner.connected.read().await;
        if !*connected {
            return Err(ClientError::NotConnected);
        }

        self.inner
            .transport
            .ping(PING_MESSAGE)
            .await
            .map(|_| ())
            .map_err(ClientError::Transport)
    }

    /// Delete a session on the sidecar.
    pub async fn destroy_session(&self, session_id: &str) -> Result<()> {
        self.ensure_connected().await?;

        log::debug!("Deleting session {}", session_id);
        self.inner
            .transport
            .delete_session(session_id)
            .await
            .map_err(ClientError::Transport)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("cli_url", &self.inner.config.cli_url)
            .field("model", &self.inner.config.model)
            .finish_non_exhaustive()
    }
}
