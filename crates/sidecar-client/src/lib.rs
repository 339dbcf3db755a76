//! Client SDK for a locally reachable sidecar agent
//!
//! The sidecar is a separate process that runs an LLM agent and speaks an
//! event-driven session protocol: connect, create or resume a session, send a
//! message, then receive partial content followed by exactly one terminal
//! event. This crate turns that protocol into two caller-facing contracts: a
//! single awaited answer ([`Client::query_with_session`]) and a lazily consumed
//! stream of partial results ([`Client::query_stream`]).
//!
//! Everything that talks to the sidecar goes through the [`AgentTransport`]
//! trait, so the wire protocol stays outside this crate. [`LoopbackTransport`]
//! runs the agent side in-process for local development and tests.
//!
//! ```no_run
//! use std::sync::Arc;
//! use sidecar_client::{Client, ClientConfig, LoopbackTransport};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> sidecar_client::Result<()> {
//! let client = Client::new(ClientConfig::new(), Arc::new(LoopbackTransport::new()))?;
//! let cancel = CancellationToken::new();
//!
//! client.start(&cancel).await?;
//! let answer = client.query(&cancel, "What is the stock level for SKU ABC123?").await?;
//! println!("{}", answer);
//! client.stop().await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod loopback;
pub mod query;
pub mod session;
pub mod stream;
pub mod tools;
pub mod transport;

#[cfg(test)]
mod mock;

pub use client::Client;
pub use config::{AuthMode, ClientConfig, ProviderType};
pub use error::{ClientError, ConfigError, Result};
pub use loopback::{echo_responder, LoopbackSession, LoopbackTransport, Responder};
pub use query::QueryResult;
pub use stream::{EventStream, StreamEvent};
pub use tools::{ParameterType, ToolDefinition, ToolHandler, ToolParameter, ToolRegistry};
pub use transport::{
    AgentSession, AgentTransport, EventHandler, SubscriberSet, Subscription, TransportOptions,
};
