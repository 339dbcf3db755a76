//! Error types for the sidecar HTTP server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use sidecar_client::ClientError;
use thiserror::Error;

/// Result type alias for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors that can occur while serving requests.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The request body is not a valid query request
    #[error("invalid request body")]
    InvalidBody,

    /// The prompt is missing or blank
    #[error("prompt is required")]
    PromptRequired,

    /// The client failed to answer the query
    #[error(transparent)]
    Client(#[from] ClientError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Server configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Create a new configuration error.
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// Convert ServerError to HTTP status code
impl ServerError {
    pub fn status_code(&self) -> u16 {
        match self {
            ServerError::InvalidBody | ServerError::PromptRequired => 400,
            ServerError::Client(e) if e.is_unavailable() => 503,
            ServerError::Client(_)
            | ServerError::Io(_)
            | ServerError::Config(_)
            | ServerError::Internal(_) => 500,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            ServerError::InvalidBody => "invalid_body",
            ServerError::PromptRequired => "prompt_required",
            ServerError::Client(e) => e.error_type(),
            ServerError::Io(_) => "io_error",
            ServerError::Config(_) => "config_error",
            ServerError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            log::error!("Request failed ({}): {}", self.error_type(), self);
        } else {
            log::debug!("Rejected request ({}): {}", self.error_type(), self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
