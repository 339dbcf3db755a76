//! Type definitions for the sidecar agent session protocol
//!
//! This crate is the shared contract between the client library and any
//! transport that talks to the sidecar agent process. It models the events a
//! session emits, the configuration sent when a session is created or resumed,
//! and the tool descriptors through which the agent calls back into the
//! caller's process.
//!
//! ## Example
//!
//! ```rust
//! use sidecar_types::{SessionEvent, SessionEventType};
//!
//! let event = SessionEvent::delta("Hel");
//! assert_eq!(event.event_type, SessionEventType::AssistantMessageDelta);
//! assert!(!event.is_terminal());
//! ```

pub mod error;
pub mod events;
pub mod session;
pub mod tools;

pub use error::*;
pub use events::*;
pub use session::*;
pub use tools::*;
