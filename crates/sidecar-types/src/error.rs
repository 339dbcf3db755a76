//! Error types shared across the session protocol.

use thiserror::Error;

/// Boxed error returned across the tool invocation boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors produced while handling protocol values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProtocolError {
    /// A tool call carried arguments that are not a JSON object.
    #[error("unexpected arguments type: {found}")]
    UnexpectedArguments { found: String },

    /// A tool call named a tool that is not registered on the session.
    #[error("unknown tool: {name}")]
    UnknownTool { name: String },
}

impl ProtocolError {
    /// Create an unexpected-arguments error from the JSON kind that was found.
    pub fn unexpected_arguments(found: impl Into<String>) -> Self {
        Self::UnexpectedArguments {
            found: found.into(),
        }
    }

    /// Create an unknown-tool error.
    pub fn unknown_tool(name: impl Into<String>) -> Self {
        Self::UnknownTool { name: name.into() }
    }
}

/// Describe the JSON kind of a value, for error messages.
pub fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
