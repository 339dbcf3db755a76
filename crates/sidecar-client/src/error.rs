//! Error types for the sidecar client.

use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors returned by [`crate::Client`] operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// The operation requires an active connection to the sidecar.
    #[error("client is not connected to the sidecar")]
    NotConnected,

    /// `start` was called on a client that is already connected.
    #[error("client is already connected")]
    AlreadyConnected,

    /// An empty prompt was passed to a query.
    #[error("prompt must not be empty")]
    EmptyPrompt,

    /// The sidecar could not be reached after the configured retries.
    #[error("sidecar is unavailable after retries: {0:#}")]
    SidecarUnavailable(#[source] anyhow::Error),

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,

    /// Creating or resuming the session failed.
    #[error("session setup: {0:#}")]
    SessionSetup(#[source] anyhow::Error),

    /// Sending the prompt to the session failed.
    #[error("sending message: {0:#}")]
    SendMessage(#[source] anyhow::Error),

    /// The agent reported an error while processing the message.
    #[error("sidecar: {0}")]
    Session(String),

    /// Any other failure reported by the transport.
    #[error("transport error: {0:#}")]
    Transport(#[source] anyhow::Error),

    /// The client configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl ClientError {
    /// Whether this error means the sidecar cannot currently serve requests.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            ClientError::NotConnected | ClientError::SidecarUnavailable(_)
        )
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ClientError::NotConnected => "not_connected",
            ClientError::AlreadyConnected => "already_connected",
            ClientError::EmptyPrompt => "empty_prompt",
            ClientError::SidecarUnavailable(_) => "sidecar_unavailable",
            ClientError::Cancelled => "cancelled",
            ClientError::SessionSetup(_) => "session_setup",
            ClientError::SendMessage(_) => "send_message",
            ClientError::Session(_) => "session_error",
            ClientError::Transport(_) => "transport_error",
            ClientError::Config(_) => "config_error",
        }
    }
}

/// Configuration validation errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("model is required when using BYOK auth mode")]
    MissingModel,

    #[error("provider base URL is required when using BYOK auth mode")]
    MissingProviderBaseUrl,

    #[error("CLI URL must not be empty")]
    MissingCliUrl,

    /// An option was set to a value outside its allowed range.
    #[error("invalid option: {0}")]
    InvalidOption(String),
}

impl ConfigError {
    pub fn invalid_option(msg: impl Into<String>) -> Self {
        Self::InvalidOption(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_classification() {
        assert!(ClientError::NotConnected.is_unavailable());
        assert!(ClientError::SidecarUnavailable(anyhow::anyhow!("refused")).is_unavailable());
        assert!(!ClientError::EmptyPrompt.is_unavailable());
        assert!(!ClientError::Session("boom".to_string()).is_unavailable());
    }

    #[test]
    fn test_wrapped_messages_include_cause() {
        let err = ClientError::SessionSetup(anyhow::anyhow!("connection reset"));
        assert_eq!(err.to_string(), "session setup: connection reset");

        let err = ClientError::SidecarUnavailable(anyhow::Error::new(ClientError::Cancelled));
        assert_eq!(
            err.to_string(),
            "sidecar is unavailable after retries: operation cancelled"
        );
    }

    #[test]
    fn test_config_error_converts() {
        let err: ClientError = ConfigError::MissingModel.into();
        assert_eq!(err.error_type(), "config_error");
        assert_eq!(
            err.to_string(),
            "invalid configuration: model is required when using BYOK auth mode"
        );
    }
}
